//! Post-run chain diagnostics.

use super::SampleChain;

/// Fewer production steps than this and no estimate is attempted.
const MIN_STEPS: usize = 10;
/// The chain must be this many autocorrelation times long for the
/// estimate to be trusted.
const LENGTH_FACTOR: f64 = 8.0;

/// Integrated autocorrelation time of one parameter, in ensemble steps,
/// averaged over walkers.
///
/// Returns `None` when the chain is too short to support the estimate;
/// callers treat that as a warning condition, never an error.
pub fn integrated_autocorr_time(chain: &SampleChain, parameter: usize) -> Option<f64> {
    let n_steps = chain.n_steps();
    if n_steps < MIN_STEPS {
        return None;
    }
    let max_lag = n_steps / 2;

    let mut mean_autocorr = vec![0.0; max_lag];
    let mut contributing = 0usize;
    for series in chain.walker_series(parameter) {
        if let Some(autocorr) = normalized_autocorrelation(&series, max_lag) {
            for (accumulated, value) in mean_autocorr.iter_mut().zip(autocorr) {
                *accumulated += value;
            }
            contributing += 1;
        }
    }
    if contributing == 0 {
        return None;
    }
    for accumulated in &mut mean_autocorr {
        *accumulated /= contributing as f64;
    }

    // tau = 1 + 2 * sum of the positive prefix of the autocorrelation.
    let mut tau = 1.0;
    for &rho in mean_autocorr.iter().skip(1) {
        if rho <= 0.0 {
            break;
        }
        tau += 2.0 * rho;
    }

    if (n_steps as f64) < LENGTH_FACTOR * tau {
        return None;
    }
    Some(tau)
}

/// Autocorrelation function of a series at lags `0..max_lag`, normalized
/// to lag zero. `None` for a constant series (zero variance).
fn normalized_autocorrelation(series: &[f64], max_lag: usize) -> Option<Vec<f64>> {
    let n = series.len();
    let mean = series.iter().sum::<f64>() / n as f64;
    let variance = series.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64;
    if variance <= 0.0 {
        return None;
    }
    let autocorr = (0..max_lag)
        .map(|lag| {
            let covariance = series
                .iter()
                .zip(series.iter().skip(lag))
                .map(|(a, b)| (a - mean) * (b - mean))
                .sum::<f64>()
                / (n - lag) as f64;
            covariance / variance
        })
        .collect();
    Some(autocorr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn chain_from_series(series: &[Vec<f64>]) -> SampleChain {
        let n_walkers = series.len();
        let n_steps = series[0].len();
        let mut chain = SampleChain::new(n_walkers, 1);
        for step in 0..n_steps {
            let positions =
                Array2::from_shape_fn((n_walkers, 1), |(walker, _)| series[walker][step]);
            chain.push(positions, vec![0.0; n_walkers]);
        }
        chain
    }

    #[test]
    fn too_few_steps_yield_no_estimate() {
        let chain = chain_from_series(&[vec![1.0, 2.0, 3.0]]);
        assert!(integrated_autocorr_time(&chain, 0).is_none());
    }

    #[test]
    fn constant_series_yields_no_estimate() {
        let chain = chain_from_series(&[vec![2.0; 200]]);
        assert!(integrated_autocorr_time(&chain, 0).is_none());
    }

    #[test]
    fn white_noise_has_short_autocorrelation_time() {
        let mut rng = StdRng::seed_from_u64(13);
        let series: Vec<Vec<f64>> = (0..4)
            .map(|_| (0..500).map(|_| rng.random::<f64>()).collect())
            .collect();
        let tau = integrated_autocorr_time(&chain_from_series(&series), 0).unwrap();
        assert!(tau < 3.0, "tau = {tau}");
    }

    #[test]
    fn correlated_series_has_longer_time_than_noise() {
        let mut rng = StdRng::seed_from_u64(17);
        // AR(1) with strong persistence.
        let series: Vec<Vec<f64>> = (0..4)
            .map(|_| {
                let mut value = 0.0;
                (0..500)
                    .map(|_| {
                        value = 0.9 * value + rng.random::<f64>() - 0.5;
                        value
                    })
                    .collect()
            })
            .collect();
        let tau = integrated_autocorr_time(&chain_from_series(&series), 0).unwrap();
        assert!(tau > 3.0, "tau = {tau}");
    }
}
