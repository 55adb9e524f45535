use core_types::CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RatingError {
    #[error("Return series is not aligned with the benchmark: {0}")]
    Misaligned(#[from] CoreError),

    #[error("The benchmark has {0} return period(s); at least 2 are needed to rate candidates")]
    NotEnoughPeriods(usize),

    #[error("Instrument {ticker} has an invalid {metric}")]
    InvalidMetric { ticker: String, metric: &'static str },
}
