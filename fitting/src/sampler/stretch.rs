//! Goodman & Weare (2010) affine-invariant stretch move.

use crate::error::{FitError, FitResult};
use ndarray::{Array2, ArrayView1};
use rand::Rng;

/// Proposal rule `y = c + z * (x - c)` against a partner walker `c`
/// drawn from the complementary half-ensemble, with the stretch factor
/// `z ~ g(z) ∝ 1/sqrt(z)` on `[1/a, a]`.
#[derive(Clone, Copy, Debug)]
pub struct StretchMove {
    scale: f64,
}

impl StretchMove {
    pub fn new(scale: f64) -> FitResult<Self> {
        if scale <= 1.0 {
            return Err(FitError::InvalidStretchScale(scale));
        }
        Ok(Self { scale })
    }

    /// Draws a stretch factor: with `u ~ U(0,1)`,
    /// `z = ((a - 1) u + 1)^2 / a`.
    pub fn sample_z<R: Rng>(&self, rng: &mut R) -> f64 {
        let u: f64 = rng.random();
        ((self.scale - 1.0) * u + 1.0).powi(2) / self.scale
    }

    /// Proposes a new position for `current`, returning the position and
    /// the stretch factor needed by the acceptance rule.
    pub fn propose<R: Rng>(
        &self,
        current: ArrayView1<f64>,
        complement: &Array2<f64>,
        rng: &mut R,
    ) -> (Vec<f64>, f64) {
        let z = self.sample_z(rng);
        let partner = complement.row(rng.random_range(0..complement.nrows()));
        let position = current
            .iter()
            .zip(partner.iter())
            .map(|(&x, &c)| c + z * (x - c))
            .collect();
        (position, z)
    }

    /// Log of the Metropolis acceptance ratio,
    /// `(d - 1) ln z + logP(y) - logP(x)`.
    pub fn log_acceptance_ratio(
        &self,
        z: f64,
        ndim: usize,
        current_log_prob: f64,
        proposed_log_prob: f64,
    ) -> f64 {
        (ndim as f64 - 1.0) * z.ln() + proposed_log_prob - current_log_prob
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn rejects_scale_at_or_below_one() {
        assert!(StretchMove::new(1.0).is_err());
        assert!(StretchMove::new(0.5).is_err());
        assert!(StretchMove::new(2.0).is_ok());
    }

    #[test]
    fn stretch_factor_stays_in_range() {
        let stretch = StretchMove::new(2.0).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..1000 {
            let z = stretch.sample_z(&mut rng);
            assert!((0.5..=2.0).contains(&z), "z = {z}");
        }
    }

    #[test]
    fn proposal_lies_on_the_line_through_the_partner() {
        let stretch = StretchMove::new(2.0).unwrap();
        let mut rng = StdRng::seed_from_u64(2);
        let current = array![1.0, 2.0, 3.0];
        let complement = array![[0.0, 0.0, 0.0]];
        let (position, z) = stretch.propose(current.view(), &complement, &mut rng);
        // With the single partner at the origin, y = z * x.
        for (proposed, start) in position.iter().zip(current.iter()) {
            assert!((proposed - z * start).abs() < 1e-12);
        }
    }
}
