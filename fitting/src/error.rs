use thiserror::Error;

pub type FitResult<T> = Result<T, FitError>;

#[derive(Debug, Error)]
pub enum FitError {
    #[error("data set is empty, the likelihood is undefined")]
    EmptyDataSet,
    #[error("simulation sample set is empty")]
    EmptySimulationSet,
    #[error("histogram window is empty or inverted: [{min}, {max})")]
    InvalidWindow { min: f64, max: f64 },
    #[error("histogram needs at least one bin")]
    EmptyBinning,
    #[error("smearing needs at least one replicate per event")]
    ZeroReplicates,
    #[error("invalid smear kernel scale: {0}")]
    InvalidKernelScale(f64),
    #[error("invalid parameter bounds: {0}")]
    InvalidBounds(String),
    #[error("stretch scale must be greater than 1, got {0}")]
    InvalidStretchScale(f64),
    #[error("ensemble needs at least {needed} walkers for {ndim} parameters, got {got}")]
    TooFewWalkers {
        needed: usize,
        ndim: usize,
        got: usize,
    },
    #[error("initial ensemble has shape ({got_walkers}, {got_ndim}), expected ({walkers}, {ndim})")]
    EnsembleShapeMismatch {
        walkers: usize,
        ndim: usize,
        got_walkers: usize,
        got_ndim: usize,
    },
    #[error("walker {walker} returned a non-finite log-probability ({value})")]
    NonFiniteLogProb { walker: usize, value: f64 },
    #[error("chain is empty, nothing to summarize")]
    EmptyChain,
    #[error("invalid morph family: {0}")]
    InvalidMorphFamily(String),
}
