//! # MarketMatch Market Data
//!
//! The boundary to the external market data provider. Everything downstream of this
//! crate works on owned `Instrument`/`PriceHistory` values, so the transport can be
//! swapped without touching the pipeline.
//!
//! ## Public API
//!
//! - `MarketDataProvider`: the async trait every data source implements.
//! - `InMemoryProvider`: a fixture provider for tests and demos.
//! - `CsvDirectoryProvider`: reads instruments, prices and FX rates from CSV files.
//! - `fetch_universe`: concurrent, retrying fetch of a whole ticker list.
//! - `parse_ticker_csv`: turns an uploaded CSV file into a ticker list.

use async_trait::async_trait;
use chrono::NaiveDate;
use core_types::{DataWindow, Instrument, PriceHistory};

pub mod csv_provider;
pub mod error;
pub mod fetch;
mod fx;
pub mod memory;
pub mod tickers;

// --- Public API ---
pub use csv_provider::CsvDirectoryProvider;
pub use error::ProviderError;
pub use fetch::{fetch_universe, FetchOutcome, UnavailableTicker};
pub use memory::InMemoryProvider;
pub use tickers::parse_ticker_csv;

/// The generic, abstract interface for a historical market data source.
/// Implementations must be cheap to share across concurrent requests.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Fetches an instrument's reference data and its daily history inside `window`.
    async fn fetch_instrument(
        &self,
        ticker: &str,
        window: &DataWindow,
    ) -> Result<Instrument, ProviderError>;

    /// Fetches the daily closes of a benchmark index inside `window`.
    async fn fetch_index(
        &self,
        symbol: &str,
        window: &DataWindow,
    ) -> Result<PriceHistory, ProviderError>;

    /// Units of `to` per unit of `from`, as of the last quote on or before `on`.
    async fn fetch_fx_rate(
        &self,
        from: &str,
        to: &str,
        on: NaiveDate,
    ) -> Result<f64, ProviderError>;
}
