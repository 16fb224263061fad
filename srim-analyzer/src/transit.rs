//! Parsing of SRIM TRANSMIT output files.
//!
//! The transit file carries a fixed-size header followed by one
//! whitespace-separated record per transmitted ion; the 4th field is
//! the ion energy in eV. Separator lines of `===` appear between
//! sections and are skipped.

use std::fs::File;
use std::io::{BufRead, BufReader, Error, ErrorKind};
use std::path::Path;
use tofcal_common::EnergyKev;

/// Records start on this 1-based line.
const DATA_START_LINE: usize = 13;
const ENERGY_FIELD: usize = 3;

/// Reads the transmitted proton energies, in keV.
pub(crate) fn load_proton_energies(path: &Path) -> Result<Vec<EnergyKev>, Error> {
    let reader = BufReader::new(File::open(path)?);
    let mut energies = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line_number = index + 1;
        let line = line?;
        if line_number < DATA_START_LINE || line.contains("===") || line.trim().is_empty() {
            continue;
        }
        let field = line.split_whitespace().nth(ENERGY_FIELD).ok_or_else(|| {
            Error::new(
                ErrorKind::InvalidData,
                format!("line {line_number}: missing energy field"),
            )
        })?;
        let energy_ev: f64 = field.parse().map_err(|_| {
            Error::new(
                ErrorKind::InvalidData,
                format!("line {line_number}: invalid energy '{field}'"),
            )
        })?;
        energies.push(energy_ev / 1000.0);
    }
    Ok(energies)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use std::io::Write;

    #[test]
    fn parses_energies_past_the_header() {
        let path = std::env::temp_dir().join("tofcal_srim_transit_test.txt");
        {
            let mut file = std::fs::File::create(&path).unwrap();
            for line in 0..12 {
                writeln!(file, "header line {line}").unwrap();
            }
            writeln!(file, "T 0000001 H 2.6580E+06 1.2 3.4").unwrap();
            writeln!(file, "=====================").unwrap();
            writeln!(file, "T 0000002 H 2.6400E+06 1.2 3.4").unwrap();
        }
        let energies = load_proton_energies(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(energies.len(), 2);
        assert_approx_eq!(energies[0], 2658.0);
        assert_approx_eq!(energies[1], 2640.0);
    }

    #[test]
    fn malformed_energy_fields_are_an_error() {
        let path = std::env::temp_dir().join("tofcal_srim_transit_bad.txt");
        {
            let mut file = std::fs::File::create(&path).unwrap();
            for line in 0..12 {
                writeln!(file, "header line {line}").unwrap();
            }
            writeln!(file, "T 0000001 H not-a-number 1.2").unwrap();
        }
        let result = load_proton_energies(&path);
        std::fs::remove_file(&path).ok();
        assert!(result.is_err());
    }
}
