use crate::error::ProviderError;
use crate::MarketDataProvider;
use configuration::MarketDataSettings;
use core_types::{DataWindow, Instrument};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::HashSet;

/// A ticker the provider could not supply, with the reason it was dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnavailableTicker {
    pub ticker: String,
    pub reason: String,
}

/// Result of fetching a whole universe. A failed ticker never fails the batch.
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    /// Successfully fetched instruments, in input order.
    pub instruments: Vec<Instrument>,
    pub unavailable: Vec<UnavailableTicker>,
}

/// Trims tickers, drops blanks and keeps the first occurrence of duplicates.
pub fn normalize_tickers<S: AsRef<str>>(tickers: &[S]) -> Vec<String> {
    let mut seen = HashSet::new();
    tickers
        .iter()
        .map(|t| t.as_ref().trim())
        .filter(|t| !t.is_empty())
        .filter(|t| seen.insert(t.to_string()))
        .map(str::to_string)
        .collect()
}

/// Fetches every ticker concurrently, at most `settings.fetch_concurrency` at a time.
///
/// Transient failures are retried `settings.fetch_retries` times with a fixed backoff.
/// Tickers that still fail are reported in `unavailable` and logged.
pub async fn fetch_universe<S: AsRef<str>>(
    provider: &dyn MarketDataProvider,
    tickers: &[S],
    window: &DataWindow,
    settings: &MarketDataSettings,
) -> FetchOutcome {
    let tickers = normalize_tickers(tickers);
    let concurrency = settings.fetch_concurrency.max(1);

    let results: Vec<(String, Result<Instrument, ProviderError>)> = stream::iter(tickers)
        .map(|ticker| async move {
            let result = fetch_with_retry(provider, &ticker, window, settings).await;
            (ticker, result)
        })
        .buffered(concurrency)
        .collect()
        .await;

    let mut outcome = FetchOutcome::default();
    for (ticker, result) in results {
        match result {
            Ok(instrument) => outcome.instruments.push(instrument),
            Err(e) => {
                tracing::warn!(ticker = %ticker, error = %e, "Dropping ticker: data unavailable.");
                outcome.unavailable.push(UnavailableTicker {
                    ticker,
                    reason: e.to_string(),
                });
            }
        }
    }
    outcome
}

async fn fetch_with_retry(
    provider: &dyn MarketDataProvider,
    ticker: &str,
    window: &DataWindow,
    settings: &MarketDataSettings,
) -> Result<Instrument, ProviderError> {
    let mut attempt = 0;
    loop {
        match provider.fetch_instrument(ticker, window).await {
            Ok(instrument) => return Ok(instrument),
            Err(e) if e.is_transient() && attempt < settings.fetch_retries => {
                attempt += 1;
                tracing::debug!(ticker = %ticker, attempt, error = %e, "Retrying instrument fetch.");
                tokio::time::sleep(settings.retry_backoff).await;
            }
            Err(e) => return Err(e),
        }
    }
}
