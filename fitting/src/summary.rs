//! Reduction of the retained chain to point estimates, and persistence
//! of the raw chain for reanalysis.

use crate::error::{FitError, FitResult};
use crate::sampler::SampleChain;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Point estimate with asymmetric uncertainties from the 16th/50th/84th
/// percentiles of the marginal posterior.
#[derive(Clone, Copy, Debug)]
pub struct ParameterEstimate {
    pub median: f64,
    pub upper_error: f64,
    pub lower_error: f64,
}

/// Linear-interpolation percentile: rank `p/100 * (n - 1)` between the
/// order statistics.
pub fn percentile(samples: &[f64], p: f64) -> FitResult<f64> {
    if samples.is_empty() {
        return Err(FitError::EmptyChain);
    }
    let mut sorted = samples.to_vec();
    sorted.sort_by(f64::total_cmp);
    let rank = (p / 100.0) * (sorted.len() - 1) as f64;
    let below = rank.floor() as usize;
    let above = rank.ceil() as usize;
    if below == above {
        return Ok(sorted[below]);
    }
    let fraction = rank - below as f64;
    Ok(sorted[below] * (1.0 - fraction) + sorted[above] * fraction)
}

/// Per-parameter estimates over all walkers and all production steps.
pub fn summarize(chain: &SampleChain) -> FitResult<Vec<ParameterEstimate>> {
    (0..chain.ndim())
        .map(|parameter| {
            let samples = chain.parameter_samples(parameter);
            let q16 = percentile(&samples, 16.0)?;
            let median = percentile(&samples, 50.0)?;
            let q84 = percentile(&samples, 84.0)?;
            Ok(ParameterEstimate {
                median,
                upper_error: q84 - median,
                lower_error: median - q16,
            })
        })
        .collect()
}

/// Appends the chain to a CSV file, one row per walker per step:
/// parameter columns then the log-probability. Append mode so repeated
/// runs accumulate into one reanalysis file.
pub fn append_chain_csv(chain: &SampleChain, path: &Path) -> std::io::Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = BufWriter::new(file);
    for (position, log_prob) in chain.iter_flat() {
        for value in &position {
            write!(writer, "{value},")?;
        }
        writeln!(writer, "{log_prob}")?;
    }
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn median_of_one_to_hundred_interpolates() {
        let samples: Vec<f64> = (1..=100).map(f64::from).collect();
        assert_approx_eq!(percentile(&samples, 50.0).unwrap(), 50.5);
    }

    #[test]
    fn percentile_endpoints_are_the_extremes() {
        let samples = vec![3.0, 1.0, 2.0];
        assert_approx_eq!(percentile(&samples, 0.0).unwrap(), 1.0);
        assert_approx_eq!(percentile(&samples, 100.0).unwrap(), 3.0);
    }

    #[test]
    fn empty_samples_are_an_error() {
        assert!(matches!(
            percentile(&[], 50.0),
            Err(FitError::EmptyChain)
        ));
    }

    #[test]
    fn quantile_spread_is_asymmetric() {
        // Right-skewed sample: the upper error exceeds the lower.
        let samples: Vec<f64> = (0..100).map(|i| (i as f64 / 10.0).powi(2)).collect();
        let q16 = percentile(&samples, 16.0).unwrap();
        let median = percentile(&samples, 50.0).unwrap();
        let q84 = percentile(&samples, 84.0).unwrap();
        assert!((q84 - median) > (median - q16));
    }
}
