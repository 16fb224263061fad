//! Types shared across the TOF calibration pipeline tools.

pub mod records;

use serde::Deserialize;
use std::ops::RangeInclusive;

pub type TimeNs = f64;
pub type EnergyKev = f64;
pub type AdcValue = f64;

/// A closed numeric range, deserialized from tool configuration.
///
/// Two membership tests are provided because the pipeline uses intervals
/// in two distinct roles: fit-parameter bounds (strict interior) and
/// time windows / histogram domains (half-open).
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Interval<T> {
    pub min: T,
    pub max: T,
}

impl<T: PartialOrd + Copy> Interval<T> {
    pub fn range_inclusive(&self) -> RangeInclusive<T> {
        self.min..=self.max
    }

    /// Strict interior membership: `min < value < max`.
    pub fn is_inside(&self, value: T) -> bool {
        self.min < value && value < self.max
    }

    /// Half-open membership: `min <= value < max`.
    pub fn contains(&self, value: T) -> bool {
        self.min <= value && value < self.max
    }
}

impl Interval<f64> {
    pub fn width(&self) -> f64 {
        self.max - self.min
    }
}

/// ADC to energy conversion, `E = adc / slope + intercept`.
///
/// The ADC cutoff selects the data population; `kev_cutoff` is the
/// equivalent threshold applied to simulated deposition energies so both
/// sides of the fit see the same population (energy resolution is not
/// taken into account).
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct EnergyCalibration {
    pub slope_adc_per_kev: f64,
    pub intercept_kev: EnergyKev,
    pub adc_cutoff: AdcValue,
}

impl EnergyCalibration {
    pub fn adc_to_kev(&self, adc: AdcValue) -> EnergyKev {
        adc / self.slope_adc_per_kev + self.intercept_kev
    }

    pub fn kev_cutoff(&self) -> EnergyKev {
        self.adc_to_kev(self.adc_cutoff)
    }
}

/// Brings a time that fell at most one beam period outside `[0, period)`
/// back into range. Values further out are returned unchanged and left
/// for the caller's window cut to reject.
pub fn wrap_into_period(time: TimeNs, period: TimeNs) -> TimeNs {
    if time < 0.0 {
        time + period
    } else if time >= period {
        time - period
    } else {
        time
    }
}
