use chrono::NaiveDate;
use rating::Candidate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use universe::RejectedTicker;

/// Body of an optimize request. Omitted fields fall back to configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct OptimizeRequest {
    #[serde(default)]
    pub tickers: Vec<String>,
    #[serde(default)]
    pub num_stocks: Option<usize>,
    #[serde(default)]
    pub budget: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FilterReport {
    pub accepted: Vec<String>,
    pub rejected: Vec<RejectedTicker>,
    pub total_filtered: usize,
    pub total_removed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RatingReport {
    /// Best first.
    pub ratings: Vec<Candidate>,
    pub total_stocks: usize,
}

/// One row of the portfolio table.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PortfolioLine {
    pub ticker: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub shares: Decimal,
    /// In the base currency.
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub value: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub fee: Decimal,
    /// Realized weight, in percent.
    pub weight: f64,
    /// Optimizer target weight, in percent.
    pub target_weight: f64,
    pub currency: String,
    pub rating: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PortfolioSummary {
    #[serde(with = "rust_decimal::serde::float")]
    pub budget: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_value: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_fees: Decimal,
    /// Value plus fees.
    #[serde(with = "rust_decimal::serde::float")]
    pub final_value: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub leftover_cash: Decimal,
    /// Compounded return of the realized-weight portfolio over the window, in percent.
    pub portfolio_return: f64,
    /// Sum of realized weights, in percent.
    pub total_weight: f64,
    pub num_stocks: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct FilteringResults {
    pub removed_stocks: Vec<RejectedTicker>,
    pub total_filtered: usize,
    pub total_removed: usize,
}

/// How well the allocated portfolio followed the benchmark over the window.
#[derive(Debug, Clone, Serialize)]
pub struct TrackingSummary {
    pub correlation: Option<f64>,
    /// Ex-post tracking error of the realized weights.
    pub tracking_error: f64,
    /// Tracking error of the optimizer's target weights.
    pub target_tracking_error: f64,
    /// Compounded combined-benchmark return over the window, in percent.
    pub benchmark_return: f64,
    pub iterations: usize,
    pub converged: bool,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PortfolioReport {
    pub portfolio: Vec<PortfolioLine>,
    pub summary: PortfolioSummary,
    pub filtering_results: FilteringResults,
    pub tracking: TrackingSummary,
}

/// Per-index and average price performance, keyed `<index>_return`.
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceReport {
    #[serde(flatten)]
    pub per_index: BTreeMap<String, f64>,
    pub avg_return: f64,
}

/// The benchmark as shown to the presentation layer.
#[derive(Debug, Clone, Serialize)]
pub struct MarketDataReport {
    pub performance: PerformanceReport,
    /// Sampled closes per index, keyed `<index>_data`.
    #[serde(flatten)]
    pub index_data: BTreeMap<String, BTreeMap<NaiveDate, f64>>,
    /// Combined benchmark return per period.
    pub combined_returns: BTreeMap<NaiveDate, f64>,
}
