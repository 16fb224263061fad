//! Retained production history of the ensemble.

use ndarray::Array2;

/// Append-only record of one (position, log-probability) pair per walker
/// per production step.
#[derive(Clone, Debug, Default)]
pub struct SampleChain {
    steps: Vec<Array2<f64>>,
    log_probs: Vec<Vec<f64>>,
    n_walkers: usize,
    ndim: usize,
    accepted: usize,
    proposed: usize,
}

impl SampleChain {
    pub(crate) fn new(n_walkers: usize, ndim: usize) -> Self {
        Self {
            n_walkers,
            ndim,
            ..Default::default()
        }
    }

    pub(crate) fn push(&mut self, positions: Array2<f64>, log_probs: Vec<f64>) {
        self.steps.push(positions);
        self.log_probs.push(log_probs);
    }

    pub(crate) fn set_acceptance(&mut self, accepted: usize, proposed: usize) {
        self.accepted = accepted;
        self.proposed = proposed;
    }

    pub fn n_steps(&self) -> usize {
        self.steps.len()
    }

    pub fn n_walkers(&self) -> usize {
        self.n_walkers
    }

    pub fn ndim(&self) -> usize {
        self.ndim
    }

    /// Total number of retained samples, walkers times steps.
    pub fn len(&self) -> usize {
        self.n_steps() * self.n_walkers
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Fraction of proposed moves accepted, averaged over the ensemble.
    /// A health signal only; nothing is gated on it.
    pub fn mean_acceptance_fraction(&self) -> f64 {
        if self.proposed == 0 {
            return 0.0;
        }
        self.accepted as f64 / self.proposed as f64
    }

    /// All samples of one parameter, step-major then walker order.
    pub fn parameter_samples(&self, parameter: usize) -> Vec<f64> {
        self.steps
            .iter()
            .flat_map(|positions| positions.column(parameter).to_vec())
            .collect()
    }

    /// One series per walker of a parameter across the production steps.
    pub fn walker_series(&self, parameter: usize) -> Vec<Vec<f64>> {
        (0..self.n_walkers)
            .map(|walker| {
                self.steps
                    .iter()
                    .map(|positions| positions[(walker, parameter)])
                    .collect()
            })
            .collect()
    }

    pub fn flat_log_probs(&self) -> Vec<f64> {
        self.log_probs.iter().flatten().copied().collect()
    }

    /// Rows of the chain in persistence order: the position vector and
    /// its log-probability, step-major then walker.
    pub fn iter_flat(&self) -> impl Iterator<Item = (Vec<f64>, f64)> + '_ {
        self.steps
            .iter()
            .zip(&self.log_probs)
            .flat_map(|(positions, log_probs)| {
                positions
                    .outer_iter()
                    .zip(log_probs.iter().copied())
                    .map(|(row, log_prob)| (row.to_vec(), log_prob))
            })
    }
}
