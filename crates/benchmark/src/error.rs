use core_types::CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BenchmarkError {
    #[error("Not enough data to perform calculation: {0}")]
    NotEnoughData(String),

    #[error("Series are not comparable: {0}")]
    Misaligned(#[from] CoreError),

    #[error("Metric '{0}' is undefined for a zero-variance series")]
    Degenerate(String),
}
