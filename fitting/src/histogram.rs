//! Fixed-width binning over a half-open time window.

use crate::error::{FitError, FitResult};
use tofcal_common::{Interval, TimeNs};

/// An accumulating histogram with `n_bins` equal bins over `[min, max)`.
/// Observations outside the window are dropped.
#[derive(Clone, Debug)]
pub struct TimeHistogram {
    window: Interval<TimeNs>,
    bin_width: f64,
    counts: Vec<f64>,
}

impl TimeHistogram {
    pub fn new(window: Interval<TimeNs>, n_bins: usize) -> FitResult<Self> {
        if !(window.width() > 0.0) {
            return Err(FitError::InvalidWindow {
                min: window.min,
                max: window.max,
            });
        }
        if n_bins == 0 {
            return Err(FitError::EmptyBinning);
        }
        Ok(Self {
            window,
            bin_width: window.width() / n_bins as f64,
            counts: vec![0.0; n_bins],
        })
    }

    pub fn bin_index(&self, time: TimeNs) -> Option<usize> {
        if !self.window.contains(time) {
            return None;
        }
        let index = ((time - self.window.min) / self.bin_width) as usize;
        // Rounding at the upper edge can land one past the last bin.
        Some(index.min(self.counts.len() - 1))
    }

    /// Records a unit-weight observation, returning whether it landed in
    /// a bin.
    pub fn fill(&mut self, time: TimeNs) -> bool {
        self.add_weighted(time, 1.0)
    }

    pub fn add_weighted(&mut self, time: TimeNs, weight: f64) -> bool {
        match self.bin_index(time) {
            Some(index) => {
                self.counts[index] += weight;
                true
            }
            None => false,
        }
    }

    pub fn n_bins(&self) -> usize {
        self.counts.len()
    }

    pub fn window(&self) -> Interval<TimeNs> {
        self.window
    }

    pub fn bin_width(&self) -> f64 {
        self.bin_width
    }

    pub fn counts(&self) -> &[f64] {
        &self.counts
    }

    pub fn total(&self) -> f64 {
        self.counts.iter().sum()
    }

    pub fn bin_center(&self, index: usize) -> TimeNs {
        self.window.min + (index as f64 + 0.5) * self.bin_width
    }

    pub fn bin_edges(&self, index: usize) -> (TimeNs, TimeNs) {
        let low = self.window.min + index as f64 * self.bin_width;
        (low, low + self.bin_width)
    }

    /// Normalizes the accumulated counts into a probability density.
    pub fn into_density(self) -> BinnedDensity {
        let total = self.total();
        let mass = if total > 0.0 {
            self.counts.iter().map(|count| count / total).collect()
        } else {
            // Nothing landed in the window; the density is evaluable
            // everywhere but carries no mass.
            vec![0.0; self.counts.len()]
        };
        BinnedDensity {
            window: self.window,
            bin_width: self.bin_width,
            mass,
        }
    }
}

/// A binned probability density over a time window. Total mass is 1 when
/// at least one source observation landed in the window, 0 otherwise.
#[derive(Clone, Debug)]
pub struct BinnedDensity {
    window: Interval<TimeNs>,
    bin_width: f64,
    mass: Vec<f64>,
}

impl BinnedDensity {
    pub(crate) fn from_masses(window: Interval<TimeNs>, bin_width: f64, mass: Vec<f64>) -> Self {
        Self {
            window,
            bin_width,
            mass,
        }
    }

    pub fn n_bins(&self) -> usize {
        self.mass.len()
    }

    pub fn window(&self) -> Interval<TimeNs> {
        self.window
    }

    pub fn bin_width(&self) -> f64 {
        self.bin_width
    }

    pub fn bin_mass(&self, index: usize) -> f64 {
        self.mass[index]
    }

    pub fn masses(&self) -> &[f64] {
        &self.mass
    }

    pub fn total_mass(&self) -> f64 {
        self.mass.iter().sum()
    }

    pub fn bin_center(&self, index: usize) -> TimeNs {
        self.window.min + (index as f64 + 0.5) * self.bin_width
    }

    /// Per-nanosecond density at `time`; 0 outside the window.
    pub fn density_at(&self, time: TimeNs) -> f64 {
        if !self.window.contains(time) {
            return 0.0;
        }
        let index =
            (((time - self.window.min) / self.bin_width) as usize).min(self.mass.len() - 1);
        self.mass[index] / self.bin_width
    }

    /// Index of the highest-mass bin, or `None` for an all-zero density.
    pub fn mode_bin(&self) -> Option<usize> {
        let (index, &mass) = self
            .mass
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))?;
        (mass > 0.0).then_some(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn window() -> Interval<TimeNs> {
        Interval {
            min: 0.0,
            max: 10.0,
        }
    }

    #[test]
    fn rejects_degenerate_windows() {
        assert!(TimeHistogram::new(Interval { min: 5.0, max: 5.0 }, 4).is_err());
        assert!(TimeHistogram::new(Interval { min: 9.0, max: 5.0 }, 4).is_err());
        assert!(TimeHistogram::new(window(), 0).is_err());
    }

    #[test]
    fn fills_and_drops() {
        let mut histogram = TimeHistogram::new(window(), 5).unwrap();
        assert!(histogram.fill(0.0));
        assert!(histogram.fill(3.9));
        assert!(histogram.fill(9.99));
        assert!(!histogram.fill(10.0));
        assert!(!histogram.fill(-0.1));
        assert_eq!(histogram.counts(), &[1.0, 1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn normalizes_to_unit_mass() {
        let mut histogram = TimeHistogram::new(window(), 4).unwrap();
        for time in [1.0, 1.2, 6.0, 8.8] {
            histogram.fill(time);
        }
        let density = histogram.into_density();
        assert_approx_eq!(density.total_mass(), 1.0);
        assert_approx_eq!(density.bin_mass(0), 0.5);
        // Mass 0.5 spread over a 2.5 ns bin.
        assert_approx_eq!(density.density_at(1.1), 0.2);
        assert_approx_eq!(density.density_at(12.0), 0.0);
    }

    #[test]
    fn empty_histogram_yields_zero_density() {
        let histogram = TimeHistogram::new(window(), 4).unwrap();
        let density = histogram.into_density();
        assert_approx_eq!(density.total_mass(), 0.0);
        assert_approx_eq!(density.density_at(5.0), 0.0);
        assert!(density.mode_bin().is_none());
    }

    #[test]
    fn mode_bin_tracks_heaviest_bin() {
        let mut histogram = TimeHistogram::new(window(), 10).unwrap();
        for time in [4.2, 4.4, 4.6, 7.1] {
            histogram.fill(time);
        }
        assert_eq!(histogram.into_density().mode_bin(), Some(4));
    }
}
