//! Fit machinery for the TOF calibration pipeline.
//!
//! The pieces compose into the calibration workflow: a [`density::DensityBuilder`]
//! turns simulated event times into a kernel-smeared [`histogram::BinnedDensity`],
//! a [`likelihood::TofLikelihood`] scores that density (mixed with a flat
//! background) against the observed timing records, and a
//! [`sampler::EnsembleSampler`] drives an ensemble of walkers over the
//! three fit parameters. [`summary`] reduces the retained chain to point
//! estimates, and [`morph`] interpolates reference densities across a
//! continuous parameter for the downstream neutron fit.

pub mod density;
pub mod error;
pub mod histogram;
pub mod likelihood;
pub mod morph;
pub mod sampler;
pub mod summary;

pub use error::{FitError, FitResult};
