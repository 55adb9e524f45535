use core_types::CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("No data available for '{0}'")]
    NotFound(String),

    #[error("No {from}/{to} exchange rate on or before {on}")]
    FxRateUnavailable {
        from: String,
        to: String,
        on: chrono::NaiveDate,
    },

    #[error("I/O error while reading market data: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse market data: {0}")]
    Parse(#[from] csv::Error),

    #[error("Invalid data format from provider: {0}")]
    InvalidData(#[from] CoreError),

    #[error("Provider temporarily unavailable: {0}")]
    Unavailable(String),
}

impl ProviderError {
    /// Whether retrying the same request could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::Io(_) | ProviderError::Unavailable(_))
    }
}
