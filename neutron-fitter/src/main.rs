//! Fits the incident proton energy and neutron fraction to the
//! neutron-population TOF data, using the shift and smearing calibrated
//! by gamma-fitter, then produces the best-fit neutron energy spectrum
//! by morphing the srim-analyzer distributions.

mod config;
mod fit;
mod plot;
mod spectrum;

use anyhow::{Context, Result};
use clap::Parser;
use config::NeutronFitConfig;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tofcal_common::records::{PulseCuts, load_sim_start_times, load_time_records};
use tofcal_fitting::density::DensityBuilder;
use tofcal_fitting::morph::MorphFamily;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[clap(author, version, about)]
struct Cli {
    /// Fit configuration file (JSON)
    #[clap(long)]
    config: PathBuf,

    /// CSV file for the energy scan and best-fit values
    #[clap(long, default_value = "neutron_fit.csv")]
    results_file: PathBuf,

    /// TOF data/model overlay image
    #[clap(long, default_value = "tof_fit_neutrons.svg")]
    overlay_plot: PathBuf,

    /// Best-fit neutron energy spectrum (CSV)
    #[clap(long, default_value = "neutron_spectrum.csv")]
    spectrum_file: PathBuf,

    /// Best-fit neutron energy spectrum image
    #[clap(long, default_value = "neutron_spectrum.svg")]
    spectrum_plot: PathBuf,

    /// Seed for the template smearing draws; random when omitted
    #[clap(long)]
    seed: Option<u64>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Cli::parse();
    let config: NeutronFitConfig = serde_json::from_reader(
        File::open(&args.config)
            .with_context(|| format!("cannot open config {}", args.config.display()))?,
    )
    .context("cannot parse config")?;

    let cuts = PulseCuts {
        adc_cutoff: config.energy_calibration.adc_cutoff,
        psd_window: Some(config.psd_window),
        data_shift: config.data_shift,
        beam_period: config.beam_period,
        fit_window: config.fit_window,
    };
    let data_times = load_time_records(&config.data_file, &cuts)
        .with_context(|| format!("cannot load TOF data {}", config.data_file.display()))?;
    info!(records = data_times.len(), "Loaded neutron-population TOF data");

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    // One smeared reference template per proton energy, built with the
    // gamma-calibrated shift and smear and the wraparound policy.
    let builder = DensityBuilder::new(
        config.fit_window,
        config.n_bins(),
        config.kernel,
        config.replicates_per_event,
        config.out_of_window,
        config.beam_period,
    )?;
    let kev_cutoff = config.energy_calibration.kev_cutoff();
    let mut energies = Vec::with_capacity(config.references.len());
    let mut templates = Vec::with_capacity(config.references.len());
    for reference in &config.references {
        let sim_times =
            load_sim_start_times(&reference.sim_file, kev_cutoff, config.max_sim_entries)
                .with_context(|| {
                    format!("cannot load sim {}", reference.sim_file.display())
                })?;
        let template =
            builder.build(&sim_times, config.sim_shift, config.smear_width, &mut rng)?;
        info!(
            "Built {} keV reference template from {} events, in-window mass {:.3}",
            reference.proton_energy_kev,
            sim_times.len(),
            template.total_mass()
        );
        energies.push(reference.proton_energy_kev);
        templates.push(template);
    }
    let family = MorphFamily::new(energies, templates)?;

    let result = fit::fit_spectrum(
        &family,
        &data_times,
        config.neutron_fraction,
        config.energy_scan_points,
    )?;

    // Numeric results go to disk before anything is rendered.
    write_results(&result, &args.results_file)
        .with_context(|| format!("cannot write {}", args.results_file.display()))?;
    let (lower, upper) = result.energy_error;
    match (lower, upper) {
        (Some(lower), Some(upper)) => info!(
            "proton energy: {:.1} +{upper:.1} -{lower:.1} keV",
            result.best.energy
        ),
        _ => {
            info!("proton energy: {:.1} keV", result.best.energy);
            warn!("energy uncertainty did not bracket inside the scanned range");
        }
    }
    info!("neutron fraction: {:.3}", result.best.fraction);

    // Best-fit spectrum: morph the srim distributions to the fitted
    // proton energy.
    let spectra = config
        .references
        .iter()
        .map(|reference| spectrum::load_distribution(&reference.spectrum_file))
        .collect::<Result<Vec<_>>>()?;
    let spectrum_family = MorphFamily::new(
        config
            .references
            .iter()
            .map(|reference| reference.proton_energy_kev)
            .collect(),
        spectra,
    )?;
    let best_spectrum = spectrum_family.density_at(result.best.energy);
    spectrum::write_distribution(&best_spectrum, &args.spectrum_file)?;
    info!(
        file = %args.spectrum_file.display(),
        "Best-fit neutron spectrum persisted"
    );

    let overlay = plot::TofOverlay::new(
        &data_times,
        &family.density_at(result.best.energy),
        result.best.fraction,
    )?;
    overlay.render(
        config.fit_window,
        &format!(
            "{:.1} keV protons, neutron fraction {:.3}",
            result.best.energy, result.best.fraction
        ),
        &args.overlay_plot,
    )?;
    plot::plot_spectrum(
        &best_spectrum,
        &format!("neutron energy distribution, {:.1} keV protons", result.best.energy),
        &args.spectrum_plot,
    )?;

    Ok(())
}

/// Scan dump plus the best-fit row, one `energy,fraction,log_likelihood`
/// line per grid point.
fn write_results(result: &fit::SpectralFitResult, path: &std::path::Path) -> std::io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    writeln!(writer, "proton_energy_kev,neutron_fraction,log_likelihood,best")?;
    for point in &result.scan {
        let best = if point.energy == result.best.energy {
            1
        } else {
            0
        };
        writeln!(
            writer,
            "{},{},{},{best}",
            point.energy, point.fraction, point.log_likelihood
        )?;
    }
    writer.flush()
}
