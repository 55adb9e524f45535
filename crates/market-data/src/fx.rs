use crate::error::ProviderError;
use chrono::NaiveDate;
use std::collections::HashMap;

/// Dated FX quotes keyed by currency pair.
#[derive(Debug, Clone, Default)]
pub(crate) struct FxTable {
    quotes: HashMap<(String, String), Vec<(NaiveDate, f64)>>,
}

impl FxTable {
    pub(crate) fn insert(&mut self, from: &str, to: &str, date: NaiveDate, rate: f64) {
        let series = self
            .quotes
            .entry((from.to_uppercase(), to.to_uppercase()))
            .or_default();
        match series.binary_search_by_key(&date, |(d, _)| *d) {
            Ok(idx) => series[idx].1 = rate,
            Err(idx) => series.insert(idx, (date, rate)),
        }
    }

    /// Looks up the direct pair first, then the inverse of the reverse pair.
    pub(crate) fn rate(&self, from: &str, to: &str, on: NaiveDate) -> Result<f64, ProviderError> {
        let (from, to) = (from.to_uppercase(), to.to_uppercase());
        if from == to {
            return Ok(1.0);
        }
        if let Some(rate) = self.lookup(&from, &to, on) {
            return Ok(rate);
        }
        if let Some(rate) = self.lookup(&to, &from, on).filter(|r| *r > 0.0) {
            return Ok(1.0 / rate);
        }
        Err(ProviderError::FxRateUnavailable { from, to, on })
    }

    fn lookup(&self, from: &str, to: &str, on: NaiveDate) -> Option<f64> {
        let series = self.quotes.get(&(from.to_string(), to.to_string()))?;
        let idx = series.partition_point(|(d, _)| *d <= on);
        idx.checked_sub(1).map(|i| series[i].1)
    }
}
