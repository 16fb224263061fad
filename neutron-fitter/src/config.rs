//! Fit configuration, deserialized from a JSON file. The timing
//! settings are copied over from the gamma fit; `sim-shift` and
//! `smear-width` are its best-fit values.

use serde::Deserialize;
use std::path::PathBuf;
use tofcal_common::{EnergyCalibration, Interval, TimeNs};
use tofcal_fitting::density::{OutOfWindowPolicy, SmearKernel};

fn default_replicates() -> usize {
    20
}

fn default_wrap_once() -> OutOfWindowPolicy {
    OutOfWindowPolicy::WrapOnce
}

fn default_fraction_bounds() -> Interval<f64> {
    Interval { min: 0.0, max: 1.0 }
}

fn default_scan_points() -> usize {
    81
}

/// One neutron transport simulation at a fixed incident proton energy,
/// with the matching srim-analyzer energy distribution.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct ReferenceSimulation {
    pub(crate) proton_energy_kev: f64,
    pub(crate) sim_file: PathBuf,
    pub(crate) spectrum_file: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct NeutronFitConfig {
    /// Experimental TOF records.
    pub(crate) data_file: PathBuf,
    /// Reference simulations, ordered by proton energy.
    pub(crate) references: Vec<ReferenceSimulation>,
    #[serde(default)]
    pub(crate) max_sim_entries: Option<usize>,
    #[serde(default = "default_replicates")]
    pub(crate) replicates_per_event: usize,
    pub(crate) kernel: SmearKernel,
    /// The neutron population wraps smeared draws by one beam period
    /// before dropping, unlike the gamma calibration fit.
    #[serde(default = "default_wrap_once")]
    pub(crate) out_of_window: OutOfWindowPolicy,
    pub(crate) data_shift: TimeNs,
    pub(crate) beam_period: TimeNs,
    pub(crate) energy_calibration: EnergyCalibration,
    /// Clean-neutron fitting region, after the data shift.
    pub(crate) fit_window: Interval<TimeNs>,
    pub(crate) bins_per_ns: usize,
    /// Pulse-shape discriminant window selecting neutrons.
    pub(crate) psd_window: Interval<f64>,
    /// Best-fit time shift from the gamma calibration (ns).
    pub(crate) sim_shift: TimeNs,
    /// Best-fit smearing width from the gamma calibration (ns).
    pub(crate) smear_width: f64,
    #[serde(default = "default_fraction_bounds")]
    pub(crate) neutron_fraction: Interval<f64>,
    #[serde(default = "default_scan_points")]
    pub(crate) energy_scan_points: usize,
}

impl NeutronFitConfig {
    pub(crate) fn n_bins(&self) -> usize {
        (self.bins_per_ns as f64 * self.fit_window.width()) as usize
    }
}
