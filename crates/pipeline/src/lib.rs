//! # MarketMatch Pipeline
//!
//! Orchestrates one portfolio construction request end to end:
//!
//! ```text
//! Provider -> Universe Filter -> Rating Engine -> Optimizer -> Allocator
//!                  ^                   ^             ^
//!                  └──── Benchmark ────┴─────────────┘
//! ```
//!
//! Every request works on its own copy of the fetched data. The only I/O is the
//! provider fetch; the solve runs on a blocking thread under the configured time
//! budget and is cancelled cooperatively when the budget runs out.

use allocator::{AllocationPolicy, allocate};
use benchmark::{BenchmarkSeries, NamedIndex, combine, compare};
use configuration::Settings;
use core_types::{DataWindow, Instrument, ReturnSeries};
use market_data::{FetchOutcome, MarketDataProvider, UnavailableTicker, fetch_universe};
use optimizer::{CancelToken, OptimizationResult, ProjectedGradientSolver, QuadraticSolver};
use rating::Candidate;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument as _;
use universe::{FilterOutcome, FilterRules, RejectedTicker, Rejection, RejectionReason};
use uuid::Uuid;

pub mod error;
pub mod report;

pub use error::PipelineError;
pub use report::{
    FilterReport, FilteringResults, MarketDataReport, OptimizeRequest, PerformanceReport,
    PortfolioLine, PortfolioReport, PortfolioSummary, RatingReport, TrackingSummary,
};

/// Decimal places kept for base-currency prices.
const PRICE_DECIMALS: u32 = 4;

/// Filter output plus the tickers the provider could not supply.
struct Screened {
    outcome: FilterOutcome,
    unavailable: Vec<UnavailableTicker>,
    /// Base-currency allocation price of every accepted instrument.
    prices: HashMap<String, Decimal>,
}

impl Screened {
    fn removed(&self) -> Vec<RejectedTicker> {
        let mut removed: Vec<RejectedTicker> = self
            .unavailable
            .iter()
            .map(|u| {
                RejectedTicker::new(
                    &u.ticker,
                    &RejectionReason::DataUnavailable {
                        detail: u.reason.clone(),
                    },
                )
            })
            .collect();
        removed.extend(self.outcome.rejected_tickers());
        removed
    }
}

/// Trimmed, de-duplicated tickers. An empty list is a caller error.
fn requested_tickers(tickers: &[String]) -> Result<Vec<String>, PipelineError> {
    let normalized = market_data::fetch::normalize_tickers(tickers);
    if normalized.is_empty() {
        return Err(PipelineError::EmptyRequest);
    }
    Ok(normalized)
}

/// The portfolio construction service. Cheap to clone and share across requests.
#[derive(Clone)]
pub struct PortfolioPipeline {
    provider: Arc<dyn MarketDataProvider>,
    settings: Arc<Settings>,
    solver: Arc<dyn QuadraticSolver>,
}

impl PortfolioPipeline {
    pub fn new(provider: Arc<dyn MarketDataProvider>, settings: Settings) -> Self {
        Self {
            provider,
            settings: Arc::new(settings),
            solver: Arc::new(ProjectedGradientSolver),
        }
    }

    /// Replaces the default projected-gradient solver.
    pub fn with_solver(mut self, solver: Arc<dyn QuadraticSolver>) -> Self {
        self.solver = solver;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The historical window every component works on.
    pub fn window(&self) -> Result<DataWindow, PipelineError> {
        let md = &self.settings.market_data;
        DataWindow::new(md.start_date, md.end_date)
            .map_err(|e| PipelineError::InvalidRequest(e.to_string()))
    }

    /// The combined benchmark and per-index performance.
    pub async fn market_data(&self) -> Result<MarketDataReport, PipelineError> {
        let span = tracing::info_span!("market_data", request_id = %Uuid::new_v4());
        async {
            let benchmark = self.load_benchmark(&self.window()?).await?;
            let performance = benchmark.performance();

            let per_index = performance
                .indices
                .iter()
                .map(|i| (format!("{}_return", i.name), i.return_pct))
                .collect();
            let index_data = benchmark
                .components()
                .iter()
                .map(|c| {
                    let closes = c.prices.points().iter().map(|p| (p.date, p.close)).collect();
                    (format!("{}_data", c.name), closes)
                })
                .collect();
            let combined = benchmark.combined();
            let combined_returns = combined
                .dates()
                .iter()
                .copied()
                .zip(combined.values().iter().copied())
                .collect();

            Ok(MarketDataReport {
                performance: PerformanceReport {
                    per_index,
                    avg_return: performance.average_return_pct,
                },
                index_data,
                combined_returns,
            })
        }
        .instrument(span)
        .await
    }

    /// Fetches and filters `tickers`.
    pub async fn filter_stocks(&self, tickers: &[String]) -> Result<FilterReport, PipelineError> {
        let span = tracing::info_span!("filter_stocks", request_id = %Uuid::new_v4());
        async {
            let window = self.window()?;
            let screened = self.screen(tickers, &window).await?;
            let accepted = screened.outcome.accepted_tickers();
            let rejected = screened.removed();
            Ok(FilterReport {
                total_filtered: accepted.len(),
                total_removed: rejected.len(),
                accepted,
                rejected,
            })
        }
        .instrument(span)
        .await
    }

    /// Fetches, filters and rates `tickers`, best first.
    pub async fn rate_stocks(&self, tickers: &[String]) -> Result<RatingReport, PipelineError> {
        let span = tracing::info_span!("rate_stocks", request_id = %Uuid::new_v4());
        async {
            requested_tickers(tickers)?;
            let window = self.window()?;
            let benchmark = self.load_benchmark(&window).await?;
            let screened = self.screen(tickers, &window).await?;
            let ratings = rating::rate(screened.outcome.accepted, &benchmark, &self.settings.rating)?;
            if ratings.is_empty() {
                return Err(PipelineError::NoValidStocks);
            }
            Ok(RatingReport {
                total_stocks: ratings.len(),
                ratings,
            })
        }
        .instrument(span)
        .await
    }

    /// Runs the whole pipeline and returns the allocated portfolio.
    pub async fn optimize_portfolio(
        &self,
        request: &OptimizeRequest,
    ) -> Result<PortfolioReport, PipelineError> {
        let span = tracing::info_span!("optimize_portfolio", request_id = %Uuid::new_v4());
        self.run_optimize(request).instrument(span).await
    }

    async fn run_optimize(&self, request: &OptimizeRequest) -> Result<PortfolioReport, PipelineError> {
        let started = Instant::now();
        let budget_limit = self.settings.optimizer.timeout;
        let deadline = started + budget_limit;

        requested_tickers(&request.tickers)?;
        let mut optimizer_settings = self.settings.optimizer.clone();
        if let Some(n) = request.num_stocks {
            if n == 0 {
                return Err(PipelineError::InvalidRequest("num_stocks must be at least 1".to_string()));
            }
            optimizer_settings.num_stocks = n;
        }
        let budget = request.budget.unwrap_or(self.settings.allocation.default_budget);
        if budget <= Decimal::ZERO {
            return Err(PipelineError::InvalidRequest(format!("budget must be positive, got {}", budget)));
        }

        // 1. Data, filter, rating.
        let window = self.window()?;
        let benchmark = self.load_benchmark(&window).await?;
        let screened = self.screen(&request.tickers, &window).await?;
        let candidates = rating::rate(screened.outcome.accepted.clone(), &benchmark, &self.settings.rating)?;

        if candidates.len() < optimizer_settings.num_stocks {
            tracing::warn!(
                requested = optimizer_settings.num_stocks,
                available = candidates.len(),
                "Not enough candidates passed filtering."
            );
            return Err(PipelineError::InsufficientUniverse {
                requested: optimizer_settings.num_stocks,
                available: candidates.len(),
            });
        }

        // 2. Optimize under the time budget.
        if Instant::now() >= deadline {
            return Err(PipelineError::Timeout(budget_limit));
        }
        let token = CancelToken::with_deadline(deadline);
        let solve = {
            let token = token.clone();
            let solver = Arc::clone(&self.solver);
            let candidates = candidates.clone();
            let benchmark = benchmark.clone();
            let settings = optimizer_settings.clone();
            tokio::task::spawn_blocking(move || {
                optimizer::optimize(&candidates, &benchmark, &settings, solver.as_ref(), &token)
            })
        };
        let remaining = deadline.saturating_duration_since(Instant::now());
        let optimized = match tokio::time::timeout(remaining, solve).await {
            Err(_) => {
                token.cancel();
                tracing::warn!(timeout = ?budget_limit, "Optimization timed out.");
                return Err(PipelineError::Timeout(budget_limit));
            }
            Ok(Err(join)) => return Err(PipelineError::Internal(join.to_string())),
            Ok(Ok(Err(optimizer::OptimizerError::Cancelled))) if Instant::now() >= deadline => {
                return Err(PipelineError::Timeout(budget_limit));
            }
            Ok(Ok(result)) => result?,
        };

        // 3. Allocate at base-currency prices.
        let selected: Vec<&Candidate> = optimized
            .weights
            .iter()
            .filter_map(|w| candidates.iter().find(|c| c.ticker == w.ticker))
            .collect();
        let policy = AllocationPolicy::from_settings(&self.settings.allocation);
        let allocation = allocate(&optimized.weights, &screened.prices, budget, &policy)?;

        // 4. Validate against the benchmark.
        let mut returns: Vec<&ReturnSeries> = Vec::with_capacity(allocation.positions.len());
        let mut realized: Vec<f64> = Vec::with_capacity(allocation.positions.len());
        for position in &allocation.positions {
            let candidate = selected
                .iter()
                .find(|c| c.ticker == position.ticker)
                .ok_or_else(|| PipelineError::Internal(format!("no candidate for {}", position.ticker)))?;
            returns.push(&candidate.returns);
            realized.push(position.realized_weight);
        }
        let portfolio_returns = ReturnSeries::weighted_sum(&returns, &realized)
            .map_err(|e| PipelineError::Internal(e.to_string()))?;
        let tracking = compare(&portfolio_returns, &benchmark)?;

        let report = self.build_report(&screened, &selected, &allocation, &optimized, tracking);
        tracing::info!(
            positions = report.summary.num_stocks,
            portfolio_return = report.summary.portfolio_return,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Portfolio request complete."
        );
        Ok(report)
    }

    fn build_report(
        &self,
        screened: &Screened,
        selected: &[&Candidate],
        allocation: &allocator::Allocation,
        optimized: &OptimizationResult,
        tracking: benchmark::TrackingReport,
    ) -> PortfolioReport {
        let base_currency = self.settings.allocation.base_currency.to_uppercase();
        let ratings: HashMap<&str, f64> = selected.iter().map(|c| (c.ticker.as_str(), c.score)).collect();

        let portfolio: Vec<PortfolioLine> = allocation
            .positions
            .iter()
            .map(|p| PortfolioLine {
                ticker: p.ticker.clone(),
                shares: p.shares,
                price: p.price,
                value: p.value,
                fee: p.fee,
                weight: p.realized_weight * 100.0,
                target_weight: p.target_weight * 100.0,
                currency: base_currency.clone(),
                rating: ratings.get(p.ticker.as_str()).copied().unwrap_or_default(),
            })
            .collect();

        let removed = screened.removed();
        PortfolioReport {
            summary: PortfolioSummary {
                budget: allocation.budget,
                total_value: allocation.total_invested,
                total_fees: allocation.total_fees,
                final_value: allocation.final_value(),
                leftover_cash: allocation.leftover_cash,
                portfolio_return: tracking.portfolio_return_pct,
                total_weight: portfolio.iter().map(|l| l.weight).sum(),
                num_stocks: portfolio.iter().filter(|l| !l.shares.is_zero()).count(),
            },
            portfolio,
            filtering_results: FilteringResults {
                total_filtered: screened.outcome.accepted.len(),
                total_removed: removed.len(),
                removed_stocks: removed,
            },
            tracking: TrackingSummary {
                correlation: tracking.correlation,
                tracking_error: tracking.tracking_error,
                target_tracking_error: optimized.tracking_error,
                benchmark_return: tracking.benchmark_return_pct,
                iterations: optimized.iterations,
                converged: optimized.converged,
                warnings: optimized.warnings.clone(),
            },
        }
    }

    /// Fetches every benchmark index and blends them on a shared calendar.
    async fn load_benchmark(&self, window: &DataWindow) -> Result<BenchmarkSeries, PipelineError> {
        let md = &self.settings.market_data;
        let mut indices = Vec::with_capacity(md.benchmarks.len());
        for index in &md.benchmarks {
            let history = self
                .provider
                .fetch_index(&index.symbol, window)
                .await
                .map_err(|e| {
                    tracing::error!(symbol = %index.symbol, error = %e, "Benchmark index unavailable.");
                    PipelineError::DataUnavailable(format!("benchmark {}: {}", index.symbol, e))
                })?;
            indices.push(NamedIndex {
                name: index.name.clone(),
                history: history.within(window.start, window.end),
            });
        }
        Ok(combine(&indices, md.frequency)?)
    }

    /// Fetches `tickers` and runs the universe filter over them.
    async fn screen(&self, tickers: &[String], window: &DataWindow) -> Result<Screened, PipelineError> {
        let normalized = requested_tickers(tickers)?;

        // Allocation prices may be taken after the market window.
        let fetch_window = match self.settings.allocation.price_date {
            Some(date) => window.extended_to(date),
            None => *window,
        };
        let FetchOutcome { instruments, unavailable } = fetch_universe(
            self.provider.as_ref(),
            &normalized,
            &fetch_window,
            &self.settings.market_data,
        )
        .await;

        let rules = FilterRules::from_settings(
            &self.settings.filter,
            *window,
            self.settings.market_data.frequency,
        );
        let mut outcome = universe::filter(instruments, &rules);
        let prices = self.price_accepted(&mut outcome, window).await;
        Ok(Screened {
            outcome,
            unavailable,
            prices,
        })
    }

    /// Prices every accepted instrument for allocation. Instruments that cannot
    /// be priced move to the rejected set.
    async fn price_accepted(
        &self,
        outcome: &mut FilterOutcome,
        window: &DataWindow,
    ) -> HashMap<String, Decimal> {
        let mut fx_cache: HashMap<String, Result<f64, String>> = HashMap::new();
        let mut prices = HashMap::with_capacity(outcome.accepted.len());
        let mut accepted = Vec::with_capacity(outcome.accepted.len());
        for instrument in std::mem::take(&mut outcome.accepted) {
            match self.allocation_price(&instrument, window, &mut fx_cache).await {
                Ok(price) => {
                    prices.insert(instrument.ticker.clone(), price);
                    accepted.push(instrument);
                }
                Err(reason) => {
                    tracing::warn!(
                        ticker = %instrument.ticker,
                        code = reason.code(),
                        reason = %reason,
                        "Instrument cannot be priced for allocation."
                    );
                    outcome.rejected.push(Rejection { instrument, reason });
                }
            }
        }
        outcome.accepted = accepted;
        prices
    }

    /// Close on or before the price date, converted into the base currency.
    async fn allocation_price(
        &self,
        instrument: &Instrument,
        window: &DataWindow,
        fx_cache: &mut HashMap<String, Result<f64, String>>,
    ) -> Result<Decimal, RejectionReason> {
        let base = self.settings.allocation.base_currency.to_uppercase();
        let price_date = self.settings.allocation.price_date.unwrap_or(window.end);

        let close = instrument
            .history
            .close_on_or_before(price_date)
            .ok_or_else(|| RejectionReason::DataUnavailable {
                detail: format!("no close on or before {}", price_date),
            })?;

        let currency = instrument.currency.to_uppercase();
        let rate = match fx_cache.get(&currency) {
            Some(rate) => rate.clone(),
            None => {
                let rate = self
                    .provider
                    .fetch_fx_rate(&currency, &base, price_date)
                    .await
                    .map_err(|e| e.to_string());
                fx_cache.insert(currency.clone(), rate.clone());
                rate
            }
        }
        .map_err(|detail| RejectionReason::DataUnavailable { detail })?;

        Decimal::from_f64(close * rate)
            .map(|p| p.round_dp(PRICE_DECIMALS))
            .filter(|p| *p > Decimal::ZERO)
            .ok_or_else(|| RejectionReason::InvalidData {
                detail: format!("price {} {} on {}", close * rate, base, price_date),
            })
    }
}
