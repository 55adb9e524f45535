use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("Invalid input for {0}: {1}")]
    InvalidInput(String, String),

    #[error("Price history is not strictly chronological at {0}")]
    UnorderedHistory(NaiveDate),

    #[error("Return series are not aligned: {left} periods vs {right} periods")]
    MisalignedSeries { left: usize, right: usize },
}
