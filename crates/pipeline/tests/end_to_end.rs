use approx::assert_relative_eq;
use chrono::{Datelike, NaiveDate, Weekday};
use configuration::Settings;
use core_types::{Instrument, ListingStatus, PriceHistory, PricePoint};
use market_data::InMemoryProvider;
use pipeline::{OptimizeRequest, PipelineError, PortfolioPipeline};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn start() -> NaiveDate {
    d(2023, 1, 2)
}

fn end() -> NaiveDate {
    d(2024, 6, 28)
}

fn weekdays() -> Vec<NaiveDate> {
    start()
        .iter_days()
        .take_while(|date| *date <= end())
        .filter(|date| !matches!(date.weekday(), Weekday::Sat | Weekday::Sun))
        .collect()
}

/// Deterministic pseudo-random daily returns, different per seed.
fn lcg_returns(seed: u64, n: usize, drift: f64, scale: f64) -> Vec<f64> {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    (0..n)
        .map(|_| {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let unit = (state >> 11) as f64 / (1u64 << 53) as f64;
            drift + (unit - 0.5) * scale
        })
        .collect()
}

fn history_from(returns: &[f64], base: f64, volume: f64) -> PriceHistory {
    let mut close = base;
    let points = weekdays()
        .into_iter()
        .zip(returns)
        .map(|(date, r)| {
            close *= 1.0 + r;
            PricePoint::new(date, close, volume)
        })
        .collect();
    PriceHistory::new(points).unwrap()
}

fn stock(ticker: &str, seed: u64, currency: &str) -> Instrument {
    let n = weekdays().len();
    Instrument {
        ticker: ticker.to_string(),
        currency: currency.to_string(),
        exchange: "TEST".to_string(),
        status: ListingStatus::Active,
        market_cap: 1.0e9 * (1 + seed % 40) as f64,
        history: history_from(&lcg_returns(seed, n, 0.0004, 0.03), 50.0 + seed as f64, 500_000.0),
    }
}

fn flat_stock(ticker: &str) -> Instrument {
    let n = weekdays().len();
    Instrument {
        ticker: ticker.to_string(),
        currency: "CAD".to_string(),
        exchange: "TSX".to_string(),
        status: ListingStatus::Active,
        market_cap: 5.0e8,
        history: history_from(&vec![0.0; n], 10.0, 300_000.0),
    }
}

fn tickers(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("S{:02}", i)).collect()
}

fn provider(count: usize) -> InMemoryProvider {
    let n = weekdays().len();
    let mut provider = InMemoryProvider::new()
        .with_index("^GSPC", history_from(&lcg_returns(9001, n, 0.0005, 0.02), 4000.0, 0.0))
        .with_index("XIU.TO", history_from(&lcg_returns(9002, n, 0.0003, 0.015), 30.0, 0.0))
        .with_fx_rate("USD", "CAD", start(), 1.35)
        .with_instrument(flat_stock("FLAT"));
    for (i, ticker) in tickers(count).iter().enumerate() {
        let currency = if i % 2 == 0 { "USD" } else { "CAD" };
        provider = provider.with_instrument(stock(ticker, i as u64 + 1, currency));
    }
    provider
}

fn settings() -> Settings {
    let mut settings = Settings::default();
    settings.market_data.start_date = start();
    settings.market_data.end_date = end();
    settings
}

fn pipeline(count: usize, settings: Settings) -> PortfolioPipeline {
    PortfolioPipeline::new(Arc::new(provider(count)), settings)
}

#[tokio::test]
async fn builds_a_bounded_fully_invested_portfolio() {
    let pipeline = pipeline(30, settings());
    let request = OptimizeRequest {
        tickers: tickers(30),
        num_stocks: Some(24),
        budget: Some(dec!(1000000)),
    };

    let report = pipeline.optimize_portfolio(&request).await.unwrap();

    assert_eq!(report.portfolio.len(), 24);
    for line in &report.portfolio {
        assert!(line.target_weight >= 2.1 - 1e-6, "{} below floor", line.ticker);
        assert!(line.target_weight <= 15.0 + 1e-6, "{} above cap", line.ticker);
        assert_eq!(line.currency, "CAD");
    }
    let target_sum: f64 = report.portfolio.iter().map(|l| l.target_weight).sum();
    assert_relative_eq!(target_sum, 100.0, epsilon = 0.01);
    assert_relative_eq!(report.summary.total_weight, 100.0, epsilon = 0.01);

    let summary = &report.summary;
    assert_eq!(summary.leftover_cash, summary.budget - summary.total_value - summary.total_fees);
    assert!(summary.leftover_cash >= Decimal::ZERO);
    assert_eq!(summary.final_value, summary.total_value + summary.total_fees);
    assert_eq!(report.filtering_results.total_filtered, 30);
    assert!(report.tracking.tracking_error.is_finite());
}

#[tokio::test]
async fn report_serializes_with_presentation_keys() {
    let pipeline = pipeline(30, settings());
    let request = OptimizeRequest {
        tickers: tickers(30),
        num_stocks: Some(24),
        budget: None,
    };

    let report = pipeline.optimize_portfolio(&request).await.unwrap();
    let json = serde_json::to_value(&report).unwrap();

    let line = &json["portfolio"][0];
    for key in ["Ticker", "Shares", "Price", "Value", "Fee", "Weight", "TargetWeight", "Currency", "Rating"] {
        assert!(line.get(key).is_some(), "missing {}", key);
    }
    assert!(json["summary"]["leftover_cash"].is_number());
    assert_eq!(json["summary"]["budget"].as_f64(), Some(1_000_000.0));
}

#[tokio::test]
async fn flat_series_gets_full_tracking_score() {
    let pipeline = pipeline(10, settings());
    let mut requested = tickers(10);
    requested.push("FLAT".to_string());

    let report = pipeline.rate_stocks(&requested).await.unwrap();

    assert_eq!(report.total_stocks, 11);
    let flat = report.ratings.iter().find(|c| c.ticker == "FLAT").unwrap();
    assert_eq!(flat.tracking_score, 1.0);
    for pair in report.ratings.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
}

#[tokio::test]
async fn too_few_survivors_is_insufficient_universe() {
    let pipeline = pipeline(20, settings());
    let request = OptimizeRequest {
        tickers: tickers(20),
        num_stocks: Some(24),
        budget: None,
    };

    let err = pipeline.optimize_portfolio(&request).await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::InsufficientUniverse {
            requested: 24,
            available: 20
        }
    ));
}

#[tokio::test]
async fn unknown_tickers_are_reported_as_unavailable() {
    let pipeline = pipeline(3, settings());
    let requested = vec!["S00".to_string(), " NOPE ".to_string(), "S00".to_string()];

    let report = pipeline.filter_stocks(&requested).await.unwrap();

    assert_eq!(report.accepted, vec!["S00".to_string()]);
    assert_eq!(report.total_removed, 1);
    assert_eq!(report.rejected[0].ticker, "NOPE");
    assert_eq!(report.rejected[0].code, "data-unavailable");
}

#[tokio::test]
async fn empty_request_is_rejected() {
    let pipeline = pipeline(3, settings());
    let err = pipeline.filter_stocks(&["  ".to_string()]).await.unwrap_err();
    assert!(matches!(err, PipelineError::EmptyRequest));
    assert_eq!(err.kind(), "empty-request");
}

#[tokio::test]
async fn exhausted_time_budget_is_a_timeout() {
    let mut settings = settings();
    settings.optimizer.timeout = Duration::ZERO;
    let pipeline = pipeline(30, settings);
    let request = OptimizeRequest {
        tickers: tickers(30),
        num_stocks: Some(24),
        budget: None,
    };

    let err = pipeline.optimize_portfolio(&request).await.unwrap_err();
    assert!(matches!(err, PipelineError::Timeout(_)));
}

#[tokio::test]
async fn market_data_reports_each_index() {
    let pipeline = pipeline(1, settings());

    let report = pipeline.market_data().await.unwrap();

    assert!(report.performance.per_index.contains_key("sp500_return"));
    assert!(report.performance.per_index.contains_key("tsx_return"));
    assert!(report.index_data.contains_key("sp500_data"));
    assert_eq!(report.combined_returns.len(), 17);

    let json = serde_json::to_value(&report).unwrap();
    assert!(json["performance"]["avg_return"].is_number());
    assert!(json["tsx_data"].is_object());
}

#[tokio::test]
async fn missing_benchmark_is_data_unavailable() {
    let mut settings = settings();
    settings.market_data.benchmarks[1].symbol = "MISSING".to_string();
    let pipeline = pipeline(1, settings);

    let err = pipeline.market_data().await.unwrap_err();
    assert!(matches!(err, PipelineError::DataUnavailable(_)));
}

#[tokio::test]
async fn unusable_market_cap_is_removed_not_fatal() {
    let mut bad = stock("BADCAP", 77, "CAD");
    bad.market_cap = f64::NAN;
    let pipeline = PortfolioPipeline::new(Arc::new(provider(30).with_instrument(bad)), settings());
    let mut requested = tickers(30);
    requested.push("BADCAP".to_string());

    let ratings = pipeline.rate_stocks(&requested).await.unwrap();
    assert_eq!(ratings.total_stocks, 30);
    assert!(ratings.ratings.iter().all(|c| c.ticker != "BADCAP"));

    let request = OptimizeRequest {
        tickers: requested,
        num_stocks: Some(24),
        budget: None,
    };
    let report = pipeline.optimize_portfolio(&request).await.unwrap();
    assert_eq!(report.portfolio.len(), 24);
    let removed = &report.filtering_results.removed_stocks;
    assert_eq!(removed.len(), 1);
    assert_eq!(removed[0].ticker, "BADCAP");
    assert_eq!(removed[0].code, "invalid-data");
}

#[tokio::test]
async fn zero_close_never_reaches_allocation() {
    let n = weekdays().len();
    let mut returns = lcg_returns(5, n, 0.0004, 0.03);
    if let Some(last) = returns.last_mut() {
        *last = -1.0;
    }
    let zero = Instrument {
        market_cap: 9.0e12,
        history: history_from(&returns, 80.0, 900_000.0),
        ..stock("ZERO", 5, "CAD")
    };
    let pipeline = PortfolioPipeline::new(Arc::new(provider(30).with_instrument(zero)), settings());
    let mut requested = tickers(30);
    requested.push("ZERO".to_string());

    let report = pipeline
        .optimize_portfolio(&OptimizeRequest {
            tickers: requested,
            num_stocks: Some(24),
            budget: None,
        })
        .await
        .unwrap();

    assert!(report.portfolio.iter().all(|line| line.ticker != "ZERO"));
    let removed = &report.filtering_results.removed_stocks;
    assert_eq!(removed[0].ticker, "ZERO");
    assert_eq!(removed[0].code, "invalid-data");
    assert!(report.portfolio.iter().all(|line| line.price > Decimal::ZERO));
}

#[tokio::test]
async fn missing_fx_quote_removes_only_that_currency() {
    let n = weekdays().len();
    let provider = InMemoryProvider::new()
        .with_index("^GSPC", history_from(&lcg_returns(9001, n, 0.0005, 0.02), 4000.0, 0.0))
        .with_index("XIU.TO", history_from(&lcg_returns(9002, n, 0.0003, 0.015), 30.0, 0.0))
        .with_instrument(stock("USD1", 1, "USD"))
        .with_instrument(stock("CAD1", 2, "CAD"));
    let pipeline = PortfolioPipeline::new(Arc::new(provider), settings());

    let report = pipeline
        .filter_stocks(&["USD1".to_string(), "CAD1".to_string()])
        .await
        .unwrap();

    assert_eq!(report.accepted, vec!["CAD1".to_string()]);
    assert_eq!(report.total_removed, 1);
    assert_eq!(report.rejected[0].ticker, "USD1");
    assert_eq!(report.rejected[0].code, "data-unavailable");
}

#[tokio::test]
async fn rating_nothing_is_an_error() {
    let pipeline = pipeline(3, settings());
    let err = pipeline.rate_stocks(&["NOPE".to_string()]).await.unwrap_err();
    assert!(matches!(err, PipelineError::NoValidStocks));
    assert_eq!(err.to_string(), "No valid stocks found for rating");
}
