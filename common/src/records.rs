//! Loading of experimental pulse records and simulated event records
//! from field-selected CSV sources.
//!
//! Both loaders run exactly once per analysis; failures here are fatal
//! to the run and are reported immediately by the caller.

use crate::{EnergyKev, Interval, TimeNs, wrap_into_period};
use std::fs::File;
use std::io::{BufRead, BufReader, Error, ErrorKind};
use std::path::Path;

/// One raw detector pulse, as stored in the experimental data source.
/// Fields: time to the beam reference (ns), saturation flag, integrated
/// pulse energy (ADC), optional pulse-shape discriminant.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PulseRecord {
    pub time_to_bpm: TimeNs,
    pub saturated: bool,
    pub integral_adc: f64,
    pub psd: Option<f64>,
}

impl PulseRecord {
    fn parse(line: &str, line_number: usize) -> Result<Self, Error> {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() < 3 {
            return Err(invalid_line(line_number, "expected at least 3 fields"));
        }
        let time_to_bpm = parse_field(fields[0], line_number, "time_to_bpm_ns")?;
        let saturated = parse_field::<i64>(fields[1], line_number, "saturated")? != 0;
        let integral_adc = parse_field(fields[2], line_number, "integral_adc")?;
        let psd = match fields.get(3) {
            Some(&"") | None => None,
            Some(field) => Some(parse_field(field, line_number, "psd")?),
        };
        Ok(Self {
            time_to_bpm,
            saturated,
            integral_adc,
            psd,
        })
    }
}

/// Selection applied while loading pulses into timing records.
#[derive(Clone, Copy, Debug)]
pub struct PulseCuts {
    /// Pulses at or below this integral are rejected.
    pub adc_cutoff: f64,
    /// Half-open PSD window; `None` disables the cut (gamma selection).
    pub psd_window: Option<Interval<f64>>,
    /// Fixed time-origin shift so the population of interest does not
    /// wrap around the beam period.
    pub data_shift: TimeNs,
    pub beam_period: TimeNs,
    /// Analysis window after shifting; half-open.
    pub fit_window: Interval<TimeNs>,
}

/// Applies the selection to one pulse, yielding its analysis time when
/// it survives every cut.
pub fn select_time(record: &PulseRecord, cuts: &PulseCuts) -> Option<TimeNs> {
    if record.saturated || record.integral_adc <= cuts.adc_cutoff {
        return None;
    }
    if let Some(window) = cuts.psd_window {
        if !window.contains(record.psd?) {
            return None;
        }
    }
    // Only pulses already inside one beam period are usable.
    if !(record.time_to_bpm >= 0.0 && record.time_to_bpm < cuts.beam_period) {
        return None;
    }
    let shifted = record.time_to_bpm - cuts.data_shift;
    let time = if shifted < 0.0 {
        wrap_into_period(shifted, cuts.beam_period)
    } else {
        shifted
    };
    cuts.fit_window.contains(time).then_some(time)
}

/// Loads the experimental timing records. The first line is a header.
pub fn load_time_records(path: &Path, cuts: &PulseCuts) -> Result<Vec<TimeNs>, Error> {
    let reader = BufReader::new(File::open(path)?);
    let mut times = Vec::new();
    for (index, line) in reader.lines().enumerate().skip(1) {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = PulseRecord::parse(&line, index + 1)?;
        if let Some(time) = select_time(&record, cuts) {
            times.push(time);
        }
    }
    Ok(times)
}

/// Loads simulated event start times, applying the keV-equivalent energy
/// threshold. At most `max_entries` records are read (a performance
/// knob); the cap applies before the energy cut, matching the data-side
/// entry limit. The first line is a header.
pub fn load_sim_start_times(
    path: &Path,
    kev_cutoff: EnergyKev,
    max_entries: Option<usize>,
) -> Result<Vec<TimeNs>, Error> {
    let reader = BufReader::new(File::open(path)?);
    let mut times = Vec::new();
    let mut read = 0usize;
    for (index, line) in reader.lines().enumerate().skip(1) {
        if let Some(limit) = max_entries {
            if read >= limit {
                break;
            }
        }
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        read += 1;
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() < 2 {
            return Err(invalid_line(index + 1, "expected 2 fields"));
        }
        let energy: EnergyKev = parse_field(fields[0], index + 1, "energy_kev")?;
        let start_time: TimeNs = parse_field(fields[1], index + 1, "start_time_ns")?;
        if energy >= kev_cutoff {
            times.push(start_time);
        }
    }
    Ok(times)
}

fn parse_field<T: std::str::FromStr>(
    field: &str,
    line_number: usize,
    name: &'static str,
) -> Result<T, Error> {
    field
        .parse()
        .map_err(|_| invalid_line(line_number, name))
}

fn invalid_line(line_number: usize, detail: &str) -> Error {
    Error::new(
        ErrorKind::InvalidData,
        format!("line {line_number}: invalid record ({detail})"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use std::io::Write;

    fn cuts() -> PulseCuts {
        PulseCuts {
            adc_cutoff: 2000.0,
            psd_window: None,
            data_shift: 150.0,
            beam_period: 400.0,
            fit_window: Interval {
                min: 0.0,
                max: 120.0,
            },
        }
    }

    fn record(time_to_bpm: TimeNs) -> PulseRecord {
        PulseRecord {
            time_to_bpm,
            saturated: false,
            integral_adc: 2500.0,
            psd: Some(0.3),
        }
    }

    #[test]
    fn saturated_and_low_energy_pulses_are_rejected() {
        let mut saturated = record(200.0);
        saturated.saturated = true;
        assert_eq!(select_time(&saturated, &cuts()), None);

        let mut weak = record(200.0);
        weak.integral_adc = 1500.0;
        assert_eq!(select_time(&weak, &cuts()), None);
    }

    #[test]
    fn shift_and_wraparound_are_applied() {
        // 200 - 150 = 50, inside the window.
        assert_approx_eq!(select_time(&record(200.0), &cuts()).unwrap(), 50.0);
        // 100 - 150 = -50, wraps to 350, outside the window.
        assert_eq!(select_time(&record(100.0), &cuts()), None);
        // 271 - 150 = 121, just past the window.
        assert_eq!(select_time(&record(271.0), &cuts()), None);
        // Out of the beam period entirely.
        assert_eq!(select_time(&record(450.0), &cuts()), None);
    }

    #[test]
    fn psd_window_selects_the_neutron_band() {
        let mut neutron_cuts = cuts();
        neutron_cuts.psd_window = Some(Interval {
            min: 0.24,
            max: 0.55,
        });
        neutron_cuts.fit_window = Interval {
            min: 0.0,
            max: 400.0,
        };
        assert!(select_time(&record(200.0), &neutron_cuts).is_some());

        let mut gamma_like = record(200.0);
        gamma_like.psd = Some(0.1);
        assert_eq!(select_time(&gamma_like, &neutron_cuts), None);

        let mut no_psd = record(200.0);
        no_psd.psd = None;
        assert_eq!(select_time(&no_psd, &neutron_cuts), None);
    }

    #[test]
    fn loads_and_filters_a_csv_file() {
        let path = std::env::temp_dir().join("tofcal_records_test.csv");
        {
            let mut file = std::fs::File::create(&path).unwrap();
            writeln!(file, "time_to_bpm_ns,saturated,integral_adc,psd").unwrap();
            writeln!(file, "200.0,0,2500,0.30").unwrap();
            writeln!(file, "210.0,1,2500,0.30").unwrap();
            writeln!(file, "220.0,0,1000,0.30").unwrap();
            writeln!(file, "230.0,0,3000,").unwrap();
        }
        let times = load_time_records(&path, &cuts()).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(times, vec![50.0, 80.0]);
    }

    #[test]
    fn sim_loader_caps_entries_then_cuts_energy() {
        let path = std::env::temp_dir().join("tofcal_sim_test.csv");
        {
            let mut file = std::fs::File::create(&path).unwrap();
            writeln!(file, "energy_kev,start_time_ns").unwrap();
            writeln!(file, "200.0,30.0").unwrap();
            writeln!(file, "50.0,31.0").unwrap();
            writeln!(file, "300.0,32.0").unwrap();
            writeln!(file, "400.0,33.0").unwrap();
        }
        let all = load_sim_start_times(&path, 111.4, None).unwrap();
        let capped = load_sim_start_times(&path, 111.4, Some(3)).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(all, vec![30.0, 32.0, 33.0]);
        // The cap counts records read, not records kept.
        assert_eq!(capped, vec![30.0, 32.0]);
    }
}
