use crate::error::ProviderError;
use crate::fx::FxTable;
use crate::MarketDataProvider;
use async_trait::async_trait;
use chrono::NaiveDate;
use core_types::{DataWindow, Instrument, PriceHistory};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// A provider that serves pre-built instruments and indices from memory.
///
/// Used as a fixture in tests and demos. It can also simulate a flaky upstream:
/// `with_transient_failures` makes the next N fetches of a ticker fail with
/// `ProviderError::Unavailable`.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProvider {
    instruments: HashMap<String, Instrument>,
    indices: HashMap<String, PriceHistory>,
    fx: FxTable,
    pending_failures: Arc<Mutex<HashMap<String, u32>>>,
    instrument_fetches: Arc<AtomicUsize>,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_instrument(mut self, instrument: Instrument) -> Self {
        self.instruments.insert(instrument.ticker.clone(), instrument);
        self
    }

    pub fn with_index(mut self, symbol: impl Into<String>, history: PriceHistory) -> Self {
        self.indices.insert(symbol.into(), history);
        self
    }

    pub fn with_fx_rate(mut self, from: &str, to: &str, on: NaiveDate, rate: f64) -> Self {
        self.fx.insert(from, to, on, rate);
        self
    }

    pub fn with_transient_failures(self, ticker: &str, failures: u32) -> Self {
        if let Ok(mut pending) = self.pending_failures.lock() {
            pending.insert(ticker.to_string(), failures);
        }
        self
    }

    /// Total number of `fetch_instrument` calls served so far, including failures.
    pub fn instrument_fetches(&self) -> usize {
        self.instrument_fetches.load(Ordering::SeqCst)
    }

    fn take_failure(&self, ticker: &str) -> bool {
        let Ok(mut pending) = self.pending_failures.lock() else {
            return false;
        };
        match pending.get_mut(ticker) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl MarketDataProvider for InMemoryProvider {
    async fn fetch_instrument(
        &self,
        ticker: &str,
        window: &DataWindow,
    ) -> Result<Instrument, ProviderError> {
        self.instrument_fetches.fetch_add(1, Ordering::SeqCst);
        if self.take_failure(ticker) {
            return Err(ProviderError::Unavailable(format!("simulated outage for {}", ticker)));
        }
        let instrument = self
            .instruments
            .get(ticker)
            .ok_or_else(|| ProviderError::NotFound(ticker.to_string()))?;
        Ok(Instrument {
            history: instrument.history.within(window.start, window.end),
            ..instrument.clone()
        })
    }

    async fn fetch_index(
        &self,
        symbol: &str,
        window: &DataWindow,
    ) -> Result<PriceHistory, ProviderError> {
        self.indices
            .get(symbol)
            .map(|h| h.within(window.start, window.end))
            .ok_or_else(|| ProviderError::NotFound(symbol.to_string()))
    }

    async fn fetch_fx_rate(
        &self,
        from: &str,
        to: &str,
        on: NaiveDate,
    ) -> Result<f64, ProviderError> {
        self.fx.rate(from, to, on)
    }
}
