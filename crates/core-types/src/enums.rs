use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether an instrument is still trading on its exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    #[default]
    Active,
    Delisted,
}

impl ListingStatus {
    /// Returns true if the instrument is still listed.
    pub fn is_active(&self) -> bool {
        matches!(self, ListingStatus::Active)
    }
}

impl fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListingStatus::Active => write!(f, "active"),
            ListingStatus::Delisted => write!(f, "delisted"),
        }
    }
}

/// The sampling frequency of a return calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    #[default]
    Monthly,
}
