use crate::error::BenchmarkError;
use crate::series::BenchmarkSeries;
use core_types::{stats, ReturnSeries};
use serde::Serialize;

/// Post-allocation validation of how closely a portfolio tracks the benchmark.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackingReport {
    /// Pearson correlation with the combined benchmark, `None` if undefined.
    pub correlation: Option<f64>,
    /// Sample standard deviation of the per-period active returns.
    pub tracking_error: f64,
    /// Compounded portfolio return over the window, in percent.
    pub portfolio_return_pct: f64,
    /// Compounded combined-benchmark return over the window, in percent.
    pub benchmark_return_pct: f64,
}

/// Correlation of two aligned return series, in [-1, 1].
pub fn correlation(portfolio: &ReturnSeries, benchmark: &ReturnSeries) -> Result<f64, BenchmarkError> {
    portfolio.ensure_aligned(benchmark)?;
    if portfolio.len() < 2 {
        return Err(BenchmarkError::NotEnoughData("correlation needs at least 2 periods".to_string()));
    }
    stats::correlation(portfolio.values(), benchmark.values())
        .ok_or_else(|| BenchmarkError::Degenerate("correlation".to_string()))
}

/// Standard deviation of `portfolio - benchmark` over the shared grid.
pub fn tracking_error(portfolio: &ReturnSeries, benchmark: &ReturnSeries) -> Result<f64, BenchmarkError> {
    let active = portfolio.active_against(benchmark)?;
    stats::sample_std(&active)
        .ok_or_else(|| BenchmarkError::NotEnoughData("tracking error needs at least 2 periods".to_string()))
}

/// Measures a realized portfolio return series against the combined benchmark.
pub fn compare(portfolio: &ReturnSeries, benchmark: &BenchmarkSeries) -> Result<TrackingReport, BenchmarkError> {
    let target = benchmark.combined();
    let tracking_error = tracking_error(portfolio, target)?;
    let correlation = match correlation(portfolio, target) {
        Ok(c) => Some(c),
        Err(BenchmarkError::Degenerate(_)) => None,
        Err(e) => return Err(e),
    };

    let report = TrackingReport {
        correlation,
        tracking_error,
        portfolio_return_pct: portfolio.cumulative_return() * 100.0,
        benchmark_return_pct: benchmark.combined_return_pct(),
    };
    tracing::info!(
        correlation = ?report.correlation,
        tracking_error = report.tracking_error,
        "Portfolio compared against benchmark."
    );
    Ok(report)
}
