//! Profile-likelihood fit of (proton energy, neutron fraction).
//!
//! Unlike the gamma calibration there is no sampling loop: the morphed
//! template is deterministic in the proton energy, the mixture
//! log-likelihood is concave in the fraction, and a grid scan with a
//! golden-section profile at each point is enough.

use anyhow::{Result, bail};
use tofcal_common::{Interval, TimeNs};
use tofcal_fitting::histogram::BinnedDensity;
use tofcal_fitting::morph::MorphFamily;
use tracing::debug;

const GOLDEN_RATIO: f64 = 0.618_033_988_749_894_9;
const FRACTION_TOLERANCE: f64 = 1e-6;

#[derive(Clone, Copy, Debug)]
pub(crate) struct ScanPoint {
    pub(crate) energy: f64,
    pub(crate) fraction: f64,
    pub(crate) log_likelihood: f64,
}

pub(crate) struct SpectralFitResult {
    pub(crate) best: ScanPoint,
    /// (lower, upper) half-widths where the profiled log-likelihood
    /// drops by 1/2; `None` on a side that never crosses inside the
    /// scanned range.
    pub(crate) energy_error: (Option<f64>, Option<f64>),
    pub(crate) scan: Vec<ScanPoint>,
}

/// Mixture log-likelihood without materializing a mixture object; this
/// sits in the innermost profile loop.
fn mixture_log_likelihood(signal: &BinnedDensity, fraction: f64, data: &[TimeNs]) -> f64 {
    let background = 1.0 / signal.window().width();
    let mut log_likelihood = 0.0;
    for &time in data {
        let density = fraction * signal.density_at(time) + (1.0 - fraction) * background;
        if density <= 0.0 {
            return f64::NEG_INFINITY;
        }
        log_likelihood += density.ln();
    }
    log_likelihood
}

/// Golden-section maximization over the fraction. The log-likelihood is
/// concave in the fraction, so the section search converges to the
/// global profile maximum.
fn profile_fraction(
    signal: &BinnedDensity,
    data: &[TimeNs],
    bounds: Interval<f64>,
) -> (f64, f64) {
    let (mut low, mut high) = (bounds.min, bounds.max);
    let mut inner_low = high - GOLDEN_RATIO * (high - low);
    let mut inner_high = low + GOLDEN_RATIO * (high - low);
    let mut score_low = mixture_log_likelihood(signal, inner_low, data);
    let mut score_high = mixture_log_likelihood(signal, inner_high, data);

    while high - low > FRACTION_TOLERANCE {
        if score_low < score_high {
            low = inner_low;
            inner_low = inner_high;
            score_low = score_high;
            inner_high = low + GOLDEN_RATIO * (high - low);
            score_high = mixture_log_likelihood(signal, inner_high, data);
        } else {
            high = inner_high;
            inner_high = inner_low;
            score_high = score_low;
            inner_low = high - GOLDEN_RATIO * (high - low);
            score_low = mixture_log_likelihood(signal, inner_low, data);
        }
    }
    let fraction = 0.5 * (low + high);
    (fraction, mixture_log_likelihood(signal, fraction, data))
}

/// Scans the proton energy over the family's range, profiling out the
/// fraction at each grid point.
pub(crate) fn fit_spectrum(
    family: &MorphFamily,
    data: &[TimeNs],
    fraction_bounds: Interval<f64>,
    scan_points: usize,
) -> Result<SpectralFitResult> {
    if scan_points < 3 {
        bail!("energy scan needs at least 3 points, got {scan_points}");
    }
    if data.is_empty() {
        bail!("no neutron-population records survived the cuts");
    }

    let (energy_low, energy_high) = family.parameter_range();
    let step = (energy_high - energy_low) / (scan_points - 1) as f64;

    let mut scan = Vec::with_capacity(scan_points);
    for index in 0..scan_points {
        let energy = energy_low + index as f64 * step;
        let signal = family.density_at(energy);
        let (fraction, log_likelihood) = profile_fraction(&signal, data, fraction_bounds);
        debug!(energy, fraction, log_likelihood, "scan point");
        scan.push(ScanPoint {
            energy,
            fraction,
            log_likelihood,
        });
    }

    let best_index = scan
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.log_likelihood.total_cmp(&b.log_likelihood))
        .map(|(index, _)| index)
        .unwrap_or(0);
    let best = scan[best_index];

    let energy_error = (
        half_width(&scan, best_index, best.log_likelihood - 0.5, true),
        half_width(&scan, best_index, best.log_likelihood - 0.5, false),
    );

    Ok(SpectralFitResult {
        best,
        energy_error,
        scan,
    })
}

/// Distance from the best energy to the interpolated crossing of
/// `target` on one side of the profile.
fn half_width(
    scan: &[ScanPoint],
    best_index: usize,
    target: f64,
    downward: bool,
) -> Option<f64> {
    let best_energy = scan[best_index].energy;
    let mut previous = scan[best_index];
    let indices: Box<dyn Iterator<Item = usize>> = if downward {
        Box::new((0..best_index).rev())
    } else {
        Box::new(best_index + 1..scan.len())
    };
    for index in indices {
        let point = scan[index];
        if point.log_likelihood <= target {
            // Linear interpolation between the bracketing scan points.
            let span = previous.log_likelihood - point.log_likelihood;
            let t = if span > 0.0 {
                (previous.log_likelihood - target) / span
            } else {
                0.0
            };
            let crossing = previous.energy + t * (point.energy - previous.energy);
            return Some((crossing - best_energy).abs());
        }
        previous = point;
    }
    None
}
