use crate::error::ProviderError;
use crate::fx::FxTable;
use crate::MarketDataProvider;
use async_trait::async_trait;
use chrono::NaiveDate;
use core_types::{DataWindow, Instrument, ListingStatus, PriceHistory, PricePoint};
use serde::Deserialize;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const INSTRUMENTS_FILE: &str = "instruments.csv";
const FX_FILE: &str = "fx.csv";
const PRICES_DIR: &str = "prices";

/// Row of `instruments.csv`.
#[derive(Debug, Deserialize)]
struct InstrumentRecord {
    ticker: String,
    currency: String,
    #[serde(default)]
    exchange: String,
    #[serde(default)]
    status: ListingStatus,
    #[serde(default)]
    market_cap: f64,
}

/// Row of `prices/<TICKER>.csv`.
#[derive(Debug, Deserialize)]
struct PriceRecord {
    date: NaiveDate,
    close: f64,
    #[serde(default)]
    volume: f64,
}

/// Row of `fx.csv`.
#[derive(Debug, Deserialize)]
struct FxRecord {
    date: NaiveDate,
    from: String,
    to: String,
    rate: f64,
}

/// File-based provider over a directory laid out as:
///
/// ```text
/// <root>/instruments.csv      ticker,currency,exchange,status,market_cap
/// <root>/fx.csv               date,from,to,rate            (optional)
/// <root>/prices/<SYMBOL>.csv  date,close,volume            (instruments and indices)
/// ```
///
/// Reference data and FX quotes are loaded once; price files are read per request.
#[derive(Debug, Clone)]
pub struct CsvDirectoryProvider {
    root: PathBuf,
    reference: HashMap<String, ReferenceData>,
    fx: FxTable,
}

#[derive(Debug, Clone)]
struct ReferenceData {
    currency: String,
    exchange: String,
    status: ListingStatus,
    market_cap: f64,
}

impl CsvDirectoryProvider {
    /// Opens a data directory and loads its reference files.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, ProviderError> {
        let root = root.as_ref().to_path_buf();

        let mut reader = csv::Reader::from_path(root.join(INSTRUMENTS_FILE))?;
        let mut reference = HashMap::new();
        for row in reader.deserialize() {
            let record: InstrumentRecord = row?;
            reference.insert(
                record.ticker.trim().to_string(),
                ReferenceData {
                    currency: record.currency.trim().to_uppercase(),
                    exchange: record.exchange,
                    status: record.status,
                    market_cap: record.market_cap,
                },
            );
        }

        let mut fx = FxTable::default();
        let fx_path = root.join(FX_FILE);
        if fx_path.exists() {
            let mut reader = csv::Reader::from_path(fx_path)?;
            for row in reader.deserialize() {
                let record: FxRecord = row?;
                fx.insert(&record.from, &record.to, record.date, record.rate);
            }
        }

        tracing::info!(
            root = %root.display(),
            instruments = reference.len(),
            "Opened CSV market data directory."
        );

        Ok(Self { root, reference, fx })
    }

    async fn read_history(&self, symbol: &str, window: &DataWindow) -> Result<PriceHistory, ProviderError> {
        let path = self.root.join(PRICES_DIR).join(format!("{}.csv", symbol));
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ProviderError::NotFound(symbol.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let mut reader = csv::Reader::from_reader(bytes.as_slice());
        let mut points = Vec::new();
        for row in reader.deserialize() {
            let record: PriceRecord = row?;
            if window.contains(record.date) {
                points.push(PricePoint::new(record.date, record.close, record.volume));
            }
        }
        Ok(PriceHistory::from_unsorted(points)?)
    }
}

#[async_trait]
impl MarketDataProvider for CsvDirectoryProvider {
    async fn fetch_instrument(
        &self,
        ticker: &str,
        window: &DataWindow,
    ) -> Result<Instrument, ProviderError> {
        let reference = self
            .reference
            .get(ticker)
            .ok_or_else(|| ProviderError::NotFound(ticker.to_string()))?;
        let history = self.read_history(ticker, window).await?;
        Ok(Instrument {
            ticker: ticker.to_string(),
            currency: reference.currency.clone(),
            exchange: reference.exchange.clone(),
            status: reference.status,
            market_cap: reference.market_cap,
            history,
        })
    }

    async fn fetch_index(
        &self,
        symbol: &str,
        window: &DataWindow,
    ) -> Result<PriceHistory, ProviderError> {
        self.read_history(symbol, window).await
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
