use core_types::CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OptimizerError {
    #[error("Requested {requested} positions but only {available} candidates are available")]
    InsufficientUniverse { requested: usize, available: usize },

    #[error(
        "Bounds [{min_weight}, {max_weight}] cannot be satisfied by {positions} positions summing to 1"
    )]
    InfeasibleConstraints {
        positions: usize,
        min_weight: f64,
        max_weight: f64,
    },

    #[error("Invalid optimizer input: {0}")]
    InvalidInput(String),

    #[error("Candidate returns are not aligned with the benchmark: {0}")]
    Misaligned(#[from] CoreError),

    #[error("The solve was cancelled before it finished")]
    Cancelled,
}
