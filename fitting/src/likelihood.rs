//! Mixture-model log-likelihood for the timing calibration fit.
//!
//! Each evaluation receives an immutable [`ParameterVector`] and returns
//! a scalar; there is no shared mutable fit state between calls. The
//! density and mixture built for a call live on that call's stack and
//! are released when it returns.

use crate::density::DensityBuilder;
use crate::error::{FitError, FitResult};
use crate::histogram::BinnedDensity;
use crate::sampler::LogProbability;
use rand::Rng;
use serde::Deserialize;
use tofcal_common::{Interval, TimeNs};

pub const PARAMETER_LABELS: [&str; 3] = ["mix_fraction", "time_shift", "smear_width"];

/// One point in the calibration parameter space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParameterVector {
    /// Fraction of events in the gamma flash, versus flat background.
    pub mix_fraction: f64,
    /// Time shift applied to the simulation to align it with the data (ns).
    pub time_shift: f64,
    /// Scale of the timing-smear kernel (ns).
    pub smear_width: f64,
}

impl ParameterVector {
    pub const NDIM: usize = 3;

    pub fn to_array(self) -> [f64; 3] {
        [self.mix_fraction, self.time_shift, self.smear_width]
    }

    pub fn from_slice(position: &[f64]) -> Option<Self> {
        match *position {
            [mix_fraction, time_shift, smear_width] => Some(Self {
                mix_fraction,
                time_shift,
                smear_width,
            }),
            _ => None,
        }
    }
}

/// Allowed ranges for the three fit parameters. A proposal on or outside
/// any bound is rejected before a density is built.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ParameterBounds {
    pub mix_fraction: Interval<f64>,
    pub time_shift: Interval<f64>,
    pub smear_width: Interval<f64>,
}

impl ParameterBounds {
    pub fn validate(&self) -> FitResult<()> {
        for (label, interval) in PARAMETER_LABELS.iter().zip(self.as_array()) {
            if !(interval.min < interval.max) {
                return Err(FitError::InvalidBounds(format!(
                    "{label}: min {} is not below max {}",
                    interval.min, interval.max
                )));
            }
        }
        if self.smear_width.min <= 0.0 {
            return Err(FitError::InvalidBounds(format!(
                "smear_width must be positive, lower bound is {}",
                self.smear_width.min
            )));
        }
        Ok(())
    }

    pub fn as_array(&self) -> [Interval<f64>; 3] {
        [self.mix_fraction, self.time_shift, self.smear_width]
    }

    /// Strict interior test, applied component-wise.
    pub fn contains(&self, theta: &ParameterVector) -> bool {
        self.mix_fraction.is_inside(theta.mix_fraction)
            && self.time_shift.is_inside(theta.time_shift)
            && self.smear_width.is_inside(theta.smear_width)
    }

    /// Draws a position uniformly within the bounds, independently per
    /// component. Used to seed each walker.
    pub fn sample_uniform<R: Rng>(&self, rng: &mut R) -> ParameterVector {
        let draw = |interval: Interval<f64>, rng: &mut R| {
            interval.min + interval.width() * rng.random::<f64>()
        };
        ParameterVector {
            mix_fraction: draw(self.mix_fraction, rng),
            time_shift: draw(self.time_shift, rng),
            smear_width: draw(self.smear_width, rng),
        }
    }
}

/// Smeared-simulation signal mixed with a flat background over the same
/// window: `frac * signal + (1 - frac) * uniform`.
#[derive(Clone, Debug)]
pub struct MixtureDensity {
    signal: BinnedDensity,
    mix_fraction: f64,
    background_density: f64,
}

impl MixtureDensity {
    pub fn new(signal: BinnedDensity, mix_fraction: f64) -> Self {
        let background_density = 1.0 / signal.window().width();
        Self {
            signal,
            mix_fraction,
            background_density,
        }
    }

    pub fn signal(&self) -> &BinnedDensity {
        &self.signal
    }

    pub fn mix_fraction(&self) -> f64 {
        self.mix_fraction
    }

    /// Per-nanosecond mixture density at `time`; 0 outside the window.
    pub fn density_at(&self, time: TimeNs) -> f64 {
        if !self.signal.window().contains(time) {
            return 0.0;
        }
        self.mix_fraction * self.signal.density_at(time)
            + (1.0 - self.mix_fraction) * self.background_density
    }

    /// Joint log-likelihood of `times` under the mixture. A zero-density
    /// bin contributes negative infinity rather than a domain error.
    pub fn log_likelihood(&self, times: &[TimeNs]) -> f64 {
        let mut log_likelihood = 0.0;
        for &time in times {
            let density = self.density_at(time);
            if density <= 0.0 {
                return f64::NEG_INFINITY;
            }
            log_likelihood += density.ln();
        }
        log_likelihood
    }
}

/// The calibration-fit target distribution.
///
/// Data and simulation times are immutable after construction and shared
/// read-only across the sampler's worker pool.
pub struct TofLikelihood {
    data_times: Vec<TimeNs>,
    sim_times: Vec<TimeNs>,
    builder: DensityBuilder,
    bounds: ParameterBounds,
}

impl TofLikelihood {
    /// An empty data set leaves the likelihood undefined and is rejected
    /// as a configuration error rather than silently scored.
    pub fn new(
        data_times: Vec<TimeNs>,
        sim_times: Vec<TimeNs>,
        builder: DensityBuilder,
        bounds: ParameterBounds,
    ) -> FitResult<Self> {
        if data_times.is_empty() {
            return Err(FitError::EmptyDataSet);
        }
        if sim_times.is_empty() {
            return Err(FitError::EmptySimulationSet);
        }
        bounds.validate()?;
        Ok(Self {
            data_times,
            sim_times,
            builder,
            bounds,
        })
    }

    pub fn bounds(&self) -> &ParameterBounds {
        &self.bounds
    }

    pub fn data_times(&self) -> &[TimeNs] {
        &self.data_times
    }

    pub fn n_bins(&self) -> usize {
        self.builder.n_bins()
    }

    /// Builds the mixture model at one parameter point.
    ///
    /// This is also the visualization entry point: after the sampler has
    /// converged, the best-fit overlay is rendered from exactly one call
    /// at the median parameter vector. Rendering never happens inside
    /// [`Self::log_prob_with_rng`].
    pub fn mixture<R: Rng>(
        &self,
        theta: &ParameterVector,
        rng: &mut R,
    ) -> FitResult<MixtureDensity> {
        let signal = self
            .builder
            .build(&self.sim_times, theta.time_shift, theta.smear_width, rng)?;
        Ok(MixtureDensity::new(signal, theta.mix_fraction))
    }

    /// Log-probability of `theta`: the bounds prior, then the mixture
    /// log-likelihood of the data. Callers maximize the returned value.
    pub fn log_prob_with_rng<R: Rng>(&self, theta: &ParameterVector, rng: &mut R) -> f64 {
        if !self.bounds.contains(theta) {
            return f64::NEG_INFINITY;
        }
        // Bounds guarantee a positive smear width, so construction can
        // only fail on inputs already rejected above.
        match self.mixture(theta, rng) {
            Ok(mixture) => mixture.log_likelihood(&self.data_times),
            Err(_) => f64::NEG_INFINITY,
        }
    }
}

impl LogProbability for TofLikelihood {
    fn log_prob(&self, position: &[f64]) -> f64 {
        match ParameterVector::from_slice(position) {
            Some(theta) => self.log_prob_with_rng(&theta, &mut rand::rng()),
            None => f64::NEG_INFINITY,
        }
    }
}
