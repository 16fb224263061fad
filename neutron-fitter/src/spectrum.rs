//! Neutron energy distributions produced by srim-analyzer: reading them
//! back as binned densities and writing the morphed best-fit spectrum.

use anyhow::{Context, Result, bail};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tofcal_common::Interval;
use tofcal_fitting::histogram::{BinnedDensity, TimeHistogram};

/// Reads a `energy_kev,probability` distribution file (one row per bin,
/// zero bins included) back into a density. The binning is inferred
/// from the bin centers.
pub(crate) fn load_distribution(path: &Path) -> Result<BinnedDensity> {
    let reader = BufReader::new(
        File::open(path).with_context(|| format!("cannot open {}", path.display()))?,
    );
    let mut centers = Vec::new();
    let mut masses = Vec::new();
    for (index, line) in reader.lines().enumerate().skip(1) {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let mut fields = line.split(',').map(str::trim);
        let (Some(center), Some(mass)) = (fields.next(), fields.next()) else {
            bail!("{}:{}: expected 2 fields", path.display(), index + 1);
        };
        centers.push(center.parse::<f64>().with_context(|| {
            format!("{}:{}: invalid energy", path.display(), index + 1)
        })?);
        masses.push(mass.parse::<f64>().with_context(|| {
            format!("{}:{}: invalid probability", path.display(), index + 1)
        })?);
    }
    if centers.len() < 2 {
        bail!("{}: need at least 2 bins", path.display());
    }

    let bin_width = centers[1] - centers[0];
    if !(bin_width > 0.0) {
        bail!("{}: bin centers are not increasing", path.display());
    }
    let window = Interval {
        min: centers[0] - bin_width / 2.0,
        max: centers[centers.len() - 1] + bin_width / 2.0,
    };
    let mut histogram = TimeHistogram::new(window, centers.len())?;
    for (&center, &mass) in centers.iter().zip(&masses) {
        histogram.add_weighted(center, mass);
    }
    Ok(histogram.into_density())
}

pub(crate) fn write_distribution(density: &BinnedDensity, path: &Path) -> Result<()> {
    let mut writer = BufWriter::new(
        File::create(path).with_context(|| format!("cannot create {}", path.display()))?,
    );
    writeln!(writer, "energy_kev,probability")?;
    for bin in 0..density.n_bins() {
        writeln!(writer, "{},{}", density.bin_center(bin), density.bin_mass(bin))?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn distributions_round_trip_through_the_file_format() {
        let mut histogram = TimeHistogram::new(
            Interval {
                min: 0.0,
                max: 100.0,
            },
            50,
        )
        .unwrap();
        histogram.add_weighted(31.0, 3.0);
        histogram.add_weighted(45.0, 1.0);
        let density = histogram.into_density();

        let path = std::env::temp_dir().join("tofcal_spectrum_roundtrip.csv");
        write_distribution(&density, &path).unwrap();
        let restored = load_distribution(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(restored.n_bins(), density.n_bins());
        assert_approx_eq!(restored.total_mass(), 1.0);
        for bin in 0..density.n_bins() {
            assert_approx_eq!(restored.bin_mass(bin), density.bin_mass(bin), 1e-9);
        }
    }
}
