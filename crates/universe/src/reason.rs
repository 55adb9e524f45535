use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

/// Why an instrument was excluded from the universe.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "code", rename_all = "kebab-case")]
pub enum RejectionReason {
    /// Market cap or closing prices that cannot be scored or priced.
    InvalidData { detail: String },
    InsufficientHistory { periods: usize, required: usize },
    /// Flagged as delisted, or no trades at all in the trailing volume window.
    Delisted,
    StaleListing { last_trade: NaiveDate },
    WrongCurrency { currency: String },
    LowVolume { average_volume: f64, minimum: f64 },
    /// The provider could not supply the instrument at all.
    DataUnavailable { detail: String },
}

impl RejectionReason {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            RejectionReason::InvalidData { .. } => "invalid-data",
            RejectionReason::InsufficientHistory { .. } => "insufficient-history",
            RejectionReason::Delisted => "delisted",
            RejectionReason::StaleListing { .. } => "stale-listing",
            RejectionReason::WrongCurrency { .. } => "wrong-currency",
            RejectionReason::LowVolume { .. } => "low-volume",
            RejectionReason::DataUnavailable { .. } => "data-unavailable",
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionReason::InvalidData { detail } => write!(f, "Invalid data ({})", detail),
            RejectionReason::InsufficientHistory { periods, required } => {
                write!(f, "Insufficient history ({} of {} periods)", periods, required)
            }
            RejectionReason::Delisted => write!(f, "Delisted"),
            RejectionReason::StaleListing { last_trade } => {
                write!(f, "Stale listing (last trade {})", last_trade)
            }
            RejectionReason::WrongCurrency { currency } => {
                write!(f, "Wrong currency ({})", currency)
            }
            RejectionReason::LowVolume { average_volume, minimum } => write!(
                f,
                "Low volume ({:.0} average, {:.0} required)",
                average_volume, minimum
            ),
            RejectionReason::DataUnavailable { detail } => {
                write!(f, "Data unavailable ({})", detail)
            }
        }
    }
}
