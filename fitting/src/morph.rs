//! Interpolation between reference densities across a continuous
//! parameter.
//!
//! Used by the neutron spectral fit: the TOF template at an intermediate
//! proton energy is the bin-wise linear blend of the two bracketing
//! simulated templates. A blend of normalized densities with weights
//! summing to one is itself normalized, so no renormalization step is
//! needed.

use crate::error::{FitError, FitResult};
use crate::histogram::BinnedDensity;

pub struct MorphFamily {
    parameters: Vec<f64>,
    references: Vec<BinnedDensity>,
}

impl MorphFamily {
    /// Parameters must be strictly increasing and every reference must
    /// share the same binning.
    pub fn new(parameters: Vec<f64>, references: Vec<BinnedDensity>) -> FitResult<Self> {
        if parameters.len() != references.len() {
            return Err(FitError::InvalidMorphFamily(format!(
                "{} parameters but {} references",
                parameters.len(),
                references.len()
            )));
        }
        if parameters.len() < 2 {
            return Err(FitError::InvalidMorphFamily(
                "need at least two references to morph".into(),
            ));
        }
        if !parameters.windows(2).all(|pair| pair[0] < pair[1]) {
            return Err(FitError::InvalidMorphFamily(
                "parameters must be strictly increasing".into(),
            ));
        }
        let first = &references[0];
        for reference in &references[1..] {
            if reference.n_bins() != first.n_bins() || reference.window() != first.window() {
                return Err(FitError::InvalidMorphFamily(
                    "references must share one binning".into(),
                ));
            }
        }
        Ok(Self {
            parameters,
            references,
        })
    }

    pub fn parameter_range(&self) -> (f64, f64) {
        (self.parameters[0], self.parameters[self.parameters.len() - 1])
    }

    /// Density at `parameter`, clamped to the family's range.
    pub fn density_at(&self, parameter: f64) -> BinnedDensity {
        let (low, high) = self.parameter_range();
        let parameter = parameter.clamp(low, high);

        let upper = self
            .parameters
            .partition_point(|&knot| knot < parameter)
            .clamp(1, self.parameters.len() - 1);
        let lower = upper - 1;

        let span = self.parameters[upper] - self.parameters[lower];
        let t = (parameter - self.parameters[lower]) / span;

        let left = &self.references[lower];
        let right = &self.references[upper];
        let masses = left
            .masses()
            .iter()
            .zip(right.masses())
            .map(|(a, b)| (1.0 - t) * a + t * b)
            .collect();
        BinnedDensity::from_masses(left.window(), left.bin_width(), masses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::histogram::TimeHistogram;
    use assert_approx_eq::assert_approx_eq;
    use tofcal_common::Interval;

    fn density_peaked_at(time: f64) -> BinnedDensity {
        let mut histogram = TimeHistogram::new(
            Interval {
                min: 0.0,
                max: 10.0,
            },
            10,
        )
        .unwrap();
        histogram.fill(time);
        histogram.into_density()
    }

    fn family() -> MorphFamily {
        MorphFamily::new(
            vec![2680.0, 2690.0, 2700.0],
            vec![
                density_peaked_at(2.5),
                density_peaked_at(5.5),
                density_peaked_at(8.5),
            ],
        )
        .unwrap()
    }

    #[test]
    fn reproduces_references_at_the_knots() {
        let family = family();
        let at_knot = family.density_at(2690.0);
        assert_approx_eq!(at_knot.bin_mass(5), 1.0);
        assert_approx_eq!(at_knot.total_mass(), 1.0);
    }

    #[test]
    fn halfway_blend_is_the_binwise_mean() {
        let family = family();
        let halfway = family.density_at(2685.0);
        assert_approx_eq!(halfway.bin_mass(2), 0.5);
        assert_approx_eq!(halfway.bin_mass(5), 0.5);
        assert_approx_eq!(halfway.total_mass(), 1.0);
    }

    #[test]
    fn out_of_range_parameters_clamp_to_the_ends() {
        let family = family();
        assert_approx_eq!(family.density_at(2000.0).bin_mass(2), 1.0);
        assert_approx_eq!(family.density_at(3000.0).bin_mass(8), 1.0);
    }

    #[test]
    fn mismatched_binning_is_rejected() {
        let mut other = TimeHistogram::new(
            Interval {
                min: 0.0,
                max: 10.0,
            },
            20,
        )
        .unwrap();
        other.fill(1.0);
        let result = MorphFamily::new(
            vec![1.0, 2.0],
            vec![density_peaked_at(2.5), other.into_density()],
        );
        assert!(matches!(result, Err(FitError::InvalidMorphFamily(_))));
    }
}
