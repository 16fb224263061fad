//! Converts SRIM proton-transmission simulations into 0-degree neutron
//! energy distributions, correcting for the change in production
//! cross-section with energy via the Liskien & Paulsen tables.
//!
//! Outputs one normalized distribution per incident proton energy
//! (consumed by neutron-fitter) plus MCNP-like source cards printed to
//! stdout. The proton flux is assumed constant through the target,
//! which is a small effect for thin films.

mod liskien;
mod transit;

use anyhow::{Context, Result};
use clap::Parser;
use plotters::prelude::*;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tofcal_common::Interval;
use tofcal_fitting::histogram::{BinnedDensity, TimeHistogram};
use tracing::info;

fn default_bin_size() -> f64 {
    2.0
}

fn default_threshold_fraction() -> f64 {
    0.01
}

fn default_energy_max() -> f64 {
    6000.0
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct SrimInput {
    proton_energy_kev: f64,
    path: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct SrimConfig {
    inputs: Vec<SrimInput>,
    /// Output bin size (keV).
    #[serde(default = "default_bin_size")]
    bin_size_kev: f64,
    /// Bins carrying less than this fraction of neutrons are left out
    /// of the source cards to simplify the source definition.
    #[serde(default = "default_threshold_fraction")]
    threshold_fraction: f64,
    #[serde(default = "default_energy_max")]
    energy_max_kev: f64,
}

#[derive(Debug, Parser)]
#[clap(author, version, about)]
struct Cli {
    /// Analysis configuration file (JSON)
    #[clap(long)]
    config: PathBuf,

    /// Directory the distribution CSVs are written to
    #[clap(long, default_value = ".")]
    output_dir: PathBuf,

    /// Combined plot of all distributions
    #[clap(long, default_value = "srim_spectra.svg")]
    spectra_plot: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Cli::parse();
    let config: SrimConfig = serde_json::from_reader(
        File::open(&args.config)
            .with_context(|| format!("cannot open config {}", args.config.display()))?,
    )
    .context("cannot parse config")?;

    let neutron_energy = liskien::neutron_energy_table();
    let cross_section = liskien::relative_cross_section_table();
    let window = Interval {
        min: 0.0,
        max: config.energy_max_kev,
    };
    let n_bins = (config.energy_max_kev / config.bin_size_kev) as usize;

    let mut distributions = Vec::with_capacity(config.inputs.len());
    for input in &config.inputs {
        let proton_energies = transit::load_proton_energies(&input.path)
            .with_context(|| format!("cannot load SRIM file {}", input.path.display()))?;
        info!(
            proton_energy_kev = input.proton_energy_kev,
            transmitted = proton_energies.len(),
            "Loaded SRIM transmission"
        );

        let mut histogram = TimeHistogram::new(window, n_bins)?;
        for &proton in &proton_energies {
            histogram.add_weighted(neutron_energy.eval(proton), cross_section.eval(proton));
        }
        let density = histogram.into_density();

        let csv_path = args.output_dir.join(format!(
            "neutron_energy_{:.0}keV.csv",
            input.proton_energy_kev
        ));
        write_distribution(&density, &csv_path)
            .with_context(|| format!("cannot write {}", csv_path.display()))?;
        info!(file = %csv_path.display(), "Distribution persisted");

        let (si_line, sp_line) =
            mcnp_source_lines(&density, config.threshold_fraction, config.bin_size_kev);
        println!("{:.0} keV:", input.proton_energy_kev);
        println!("{si_line}");
        println!("{sp_line}");
        println!();

        distributions.push((input.proton_energy_kev, density));
    }

    plot_spectra(&distributions, window, &args.spectra_plot)?;
    info!(file = %args.spectra_plot.display(), "Spectra plot rendered");
    Ok(())
}

fn write_distribution(density: &BinnedDensity, path: &Path) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    writeln!(writer, "energy_kev,probability")?;
    for bin in 0..density.n_bins() {
        writeln!(writer, "{},{}", density.bin_center(bin), density.bin_mass(bin))?;
    }
    writer.flush()?;
    Ok(())
}

/// MCNP-like source cards: `si` carries the left edges (MeV) of every
/// bin above the threshold fraction plus one closing upper edge, `sp`
/// the matching bin probabilities.
fn mcnp_source_lines(
    density: &BinnedDensity,
    threshold_fraction: f64,
    bin_size_kev: f64,
) -> (String, String) {
    let bin_size_mev = bin_size_kev / 1000.0;
    let mut si_line = String::from("si2 H ");
    let mut sp_line = String::from("sp2 0 ");
    let mut last_edge = None;
    for bin in 0..density.n_bins() {
        let mass = density.bin_mass(bin);
        if mass < threshold_fraction {
            continue;
        }
        let center_mev = density.bin_center(bin) / 1000.0;
        let left_edge = center_mev - bin_size_mev / 2.0;
        si_line.push_str(&format!("{left_edge:.3} "));
        sp_line.push_str(&format!("{mass:.3} "));
        last_edge = Some(left_edge + bin_size_mev);
    }
    if let Some(edge) = last_edge {
        si_line.push_str(&format!("{edge:.3}"));
    }
    (si_line, sp_line.trim_end().to_string())
}

fn plot_spectra(
    distributions: &[(f64, BinnedDensity)],
    window: Interval<f64>,
    path: &Path,
) -> Result<()> {
    let peak = distributions
        .iter()
        .flat_map(|(_, density)| density.masses())
        .fold(0f64, |a, &b| a.max(b))
        .max(1e-12);

    let root = SVGBackend::new(path, (900, 600)).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .x_label_area_size(35)
        .y_label_area_size(60)
        .caption("0-degree neutron energy distributions", ("sans-serif", 20))
        .build_cartesian_2d(window.min..window.max, 0f64..peak * 1.15)?;
    chart
        .configure_mesh()
        .x_desc("neutron energy (keV)")
        .y_desc("probability per bin")
        .draw()?;

    for (index, (energy, density)) in distributions.iter().enumerate() {
        let color = Palette99::pick(index).to_rgba();
        chart
            .draw_series(LineSeries::new(
                (0..density.n_bins()).map(|bin| (density.bin_center(bin), density.bin_mass(bin))),
                &color,
            ))?
            .label(format!("{energy:.0} keV"))
            .legend(move |(x, y)| PathElement::new(vec![(x - 10, y), (x + 10, y)], color));
    }
    chart
        .configure_series_labels()
        .background_style(WHITE)
        .draw()?;
    root.present()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn density_with_masses(masses: &[f64]) -> BinnedDensity {
        let mut histogram = TimeHistogram::new(
            Interval {
                min: 0.0,
                max: masses.len() as f64 * 2.0,
            },
            masses.len(),
        )
        .unwrap();
        for (bin, &mass) in masses.iter().enumerate() {
            histogram.add_weighted(bin as f64 * 2.0 + 1.0, mass);
        }
        histogram.into_density()
    }

    #[test]
    fn source_cards_skip_sub_threshold_bins() {
        // Bins at 0-2 and 4-6 keV carry the mass; the middle bin is
        // below the 1% threshold.
        let density = density_with_masses(&[0.6, 0.005, 0.395]);
        let (si_line, sp_line) = mcnp_source_lines(&density, 0.01, 2.0);
        assert_eq!(si_line, "si2 H 0.000 0.004 0.006");
        assert!(sp_line.starts_with("sp2 0 "));
        assert!(sp_line.contains("0.6"));
        assert!(!sp_line.contains("0.005"));
    }

    #[test]
    fn empty_density_yields_bare_cards() {
        let density = density_with_masses(&[0.0, 0.0]);
        let (si_line, sp_line) = mcnp_source_lines(&density, 0.01, 2.0);
        assert_eq!(si_line, "si2 H ");
        assert_eq!(sp_line, "sp2 0");
    }

    #[test]
    fn config_defaults_apply() {
        let config: SrimConfig = serde_json::from_str(
            r#"{ "inputs": [ { "proton-energy-kev": 2680, "path": "a.txt" } ] }"#,
        )
        .unwrap();
        assert_eq!(config.bin_size_kev, 2.0);
        assert_eq!(config.threshold_fraction, 0.01);
        assert_eq!(config.energy_max_kev, 6000.0);
    }
}
