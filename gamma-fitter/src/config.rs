//! Fit configuration, deserialized from a JSON file.

use serde::Deserialize;
use std::path::PathBuf;
use tofcal_common::{EnergyCalibration, Interval, TimeNs};
use tofcal_fitting::density::{OutOfWindowPolicy, SmearKernel};
use tofcal_fitting::likelihood::{ParameterBounds, ParameterVector};
use tofcal_fitting::sampler::SamplerConfig;

fn default_replicates() -> usize {
    20
}

/// Guess and allowed range for one fit parameter.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct FitParameter {
    pub(crate) guess: f64,
    pub(crate) min: f64,
    pub(crate) max: f64,
}

impl FitParameter {
    pub(crate) fn interval(&self) -> Interval<f64> {
        Interval {
            min: self.min,
            max: self.max,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct GammaFitConfig {
    /// Experimental TOF records.
    pub(crate) data_file: PathBuf,
    /// Simulated gamma transport events.
    pub(crate) sim_file: PathBuf,
    /// Reading fewer simulation entries speeds up fitting.
    #[serde(default)]
    pub(crate) max_sim_entries: Option<usize>,
    /// Smeared values generated per simulated event.
    #[serde(default = "default_replicates")]
    pub(crate) replicates_per_event: usize,
    pub(crate) kernel: SmearKernel,
    #[serde(default)]
    pub(crate) out_of_window: OutOfWindowPolicy,
    /// Initial shift applied to the data so the gamma population does
    /// not wrap around the beam period.
    pub(crate) data_shift: TimeNs,
    pub(crate) beam_period: TimeNs,
    pub(crate) energy_calibration: EnergyCalibration,
    /// Gamma fitting region, after the data shift.
    pub(crate) fit_window: Interval<TimeNs>,
    pub(crate) bins_per_ns: usize,
    pub(crate) mix_fraction: FitParameter,
    pub(crate) time_shift: FitParameter,
    pub(crate) smear_width: FitParameter,
    #[serde(default)]
    pub(crate) sampler: SamplerConfig,
}

impl GammaFitConfig {
    pub(crate) fn n_bins(&self) -> usize {
        (self.bins_per_ns as f64 * self.fit_window.width()) as usize
    }

    pub(crate) fn bounds(&self) -> ParameterBounds {
        ParameterBounds {
            mix_fraction: self.mix_fraction.interval(),
            time_shift: self.time_shift.interval(),
            smear_width: self.smear_width.interval(),
        }
    }

    pub(crate) fn initial_guess(&self) -> ParameterVector {
        ParameterVector {
            mix_fraction: self.mix_fraction.guess,
            time_shift: self.time_shift.guess,
            smear_width: self.smear_width.guess,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    const JSON_INPUT: &str = r#"
            {
                "data-file": "../data/tofData.csv",
                "sim-file": "../data/mcnpSims/tofSim_gammas.csv",
                "max-sim-entries": 2000,
                "kernel": "gaussian",
                "data-shift": 150,
                "beam-period": 400,
                "energy-calibration": {
                    "slope-adc-per-kev": 18.79,
                    "intercept-kev": 5,
                    "adc-cutoff": 2000
                },
                "fit-window": { "min": 0, "max": 120 },
                "bins-per-ns": 4,
                "mix-fraction": { "guess": 0.85, "min": 0.75, "max": 0.95 },
                "time-shift": { "guess": 78.0, "min": 75.0, "max": 81.0 },
                "smear-width": { "guess": 1.2, "min": 1.1, "max": 1.3 },
                "sampler": { "n-walkers": 300, "n-burn-in-steps": 100, "n-steps": 50 }
            }
    "#;

    #[test]
    fn full_configuration_deserializes() {
        let config: GammaFitConfig = serde_json::from_str(JSON_INPUT).unwrap();
        assert_eq!(config.n_bins(), 480);
        assert_eq!(config.max_sim_entries, Some(2000));
        assert_eq!(config.replicates_per_event, 20);
        assert_eq!(config.kernel, SmearKernel::Gaussian);
        assert_eq!(config.out_of_window, OutOfWindowPolicy::Drop);
        assert_approx_eq!(config.energy_calibration.kev_cutoff(), 2000.0 / 18.79 + 5.0);
        assert_eq!(config.sampler.n_walkers, 300);
        // Unlisted sampler fields fall back to their defaults.
        assert_approx_eq!(config.sampler.stretch_scale, 2.0);
        assert!(config.sampler.parallel);
        let bounds = config.bounds();
        assert!(bounds.validate().is_ok());
        assert!(bounds.contains(&config.initial_guess()));
    }
}
