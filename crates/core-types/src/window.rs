use crate::error::CoreError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// An inclusive calendar range of historical data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DataWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, CoreError> {
        if start > end {
            return Err(CoreError::InvalidInput(
                "window".to_string(),
                format!("start {} is after end {}", start, end),
            ));
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// The same window stretched so that it also covers `date`.
    pub fn extended_to(&self, date: NaiveDate) -> Self {
        Self {
            start: self.start.min(date),
            end: self.end.max(date),
        }
    }
}
