use approx::assert_relative_eq;
use benchmark::{BenchmarkSeries, NamedIndex, combine};
use chrono::{Datelike, NaiveDate};
use configuration::{OptimizerSettings, RatingSettings};
use core_types::{Frequency, Instrument, ListingStatus, PriceHistory, PricePoint};
use optimizer::{
    CancelToken, OptimizerError, ProjectedGradientSolver, QuadraticProblem, QuadraticSolver,
    SolveOptions, SolveReport, optimize,
};
use rating::Candidate;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Deterministic pseudo-random numbers in [-0.5, 0.5).
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> f64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        ((self.0 >> 11) as f64 / (1u64 << 53) as f64) - 0.5
    }
}

fn month_ends(count: usize) -> Vec<NaiveDate> {
    let mut dates = Vec::new();
    let mut first = NaiveDate::from_ymd_opt(2021, 2, 1).unwrap();
    for _ in 0..count {
        dates.push(first.pred_opt().unwrap());
        first = if first.month() == 12 {
            NaiveDate::from_ymd_opt(first.year() + 1, 1, 1).unwrap()
        } else {
            NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1).unwrap()
        };
    }
    dates
}

fn history(returns: &[f64]) -> PriceHistory {
    let dates = month_ends(returns.len() + 1);
    let mut close = 100.0;
    let mut points = vec![PricePoint::new(dates[0], close, 1.0e6)];
    for (date, r) in dates[1..].iter().zip(returns) {
        close *= 1.0 + r;
        points.push(PricePoint::new(*date, close, 1.0e6));
    }
    PriceHistory::new(points).unwrap()
}

const PERIODS: usize = 46;

fn benchmark_returns() -> Vec<f64> {
    let mut rng = Lcg(7);
    (0..PERIODS).map(|_| 0.008 + 0.08 * rng.next()).collect()
}

fn benchmark() -> BenchmarkSeries {
    let index = NamedIndex {
        name: "blend".to_string(),
        history: history(&benchmark_returns()),
    };
    combine(&[index], Frequency::Monthly).unwrap()
}

fn universe(count: usize) -> Vec<Candidate> {
    let bench = benchmark_returns();
    let mut rng = Lcg(42);
    let instruments: Vec<Instrument> = (0..count)
        .map(|i| {
            let beta = 0.6 + 0.8 * (rng.next() + 0.5);
            let noise = 0.02 + 0.06 * (rng.next() + 0.5);
            let returns: Vec<f64> = bench.iter().map(|b| beta * b + noise * rng.next()).collect();
            Instrument {
                ticker: format!("T{:02}", i),
                currency: "USD".to_string(),
                exchange: "NYSE".to_string(),
                status: ListingStatus::Active,
                market_cap: 1.0e9 * (i + 1) as f64,
                history: history(&returns),
            }
        })
        .collect();
    rating::rate(instruments, &benchmark(), &RatingSettings::default()).unwrap()
}

/// Delegates to the default solver and counts invocations.
#[derive(Default)]
struct CountingSolver {
    calls: AtomicUsize,
}

impl QuadraticSolver for CountingSolver {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn solve(
        &self,
        problem: &QuadraticProblem,
        options: &SolveOptions,
        cancel: &CancelToken,
    ) -> Result<SolveReport, OptimizerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        ProjectedGradientSolver.solve(problem, options, cancel)
    }
}

#[test]
fn weights_are_fully_invested_and_bounded() {
    let settings = OptimizerSettings::default();
    let result = optimize(
        &universe(30),
        &benchmark(),
        &settings,
        &ProjectedGradientSolver,
        &CancelToken::new(),
    )
    .unwrap();

    assert_eq!(result.weights.len(), 24);
    assert_relative_eq!(result.total_weight(), 1.0, epsilon = 1e-6);
    for w in &result.weights {
        assert!(w.weight >= settings.min_weight - 1e-9, "{} below floor", w.ticker);
        assert!(w.weight <= settings.max_weight + 1e-9, "{} above cap", w.ticker);
    }
    assert!(result.tracking_error.is_finite());
}

#[test]
fn selects_the_top_rated_candidates() {
    let candidates = universe(30);
    let result = optimize(
        &candidates,
        &benchmark(),
        &OptimizerSettings::default(),
        &ProjectedGradientSolver,
        &CancelToken::new(),
    )
    .unwrap();
    let expected: Vec<&str> = candidates[..24].iter().map(|c| c.ticker.as_str()).collect();
    let actual: Vec<&str> = result.weights.iter().map(|w| w.ticker.as_str()).collect();
    assert_eq!(actual, expected);
}

#[test]
fn repeated_runs_are_identical() {
    let candidates = universe(30);
    let bench = benchmark();
    let settings = OptimizerSettings::default();
    let a = optimize(&candidates, &bench, &settings, &ProjectedGradientSolver, &CancelToken::new()).unwrap();
    let b = optimize(&candidates, &bench, &settings, &ProjectedGradientSolver, &CancelToken::new()).unwrap();
    for (x, y) in a.weights.iter().zip(&b.weights) {
        assert_eq!(x.ticker, y.ticker);
        assert!((x.weight - y.weight).abs() < 1e-6);
    }
}

#[test]
fn infeasible_floor_fails_without_solving() {
    let solver = CountingSolver::default();
    let settings = OptimizerSettings {
        min_weight: 0.05,
        ..OptimizerSettings::default()
    };
    let err = optimize(&universe(30), &benchmark(), &settings, &solver, &CancelToken::new()).unwrap_err();
    assert!(matches!(err, OptimizerError::InfeasibleConstraints { positions: 24, .. }));
    assert_eq!(solver.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn infeasible_cap_fails_without_solving() {
    let solver = CountingSolver::default();
    let settings = OptimizerSettings {
        num_stocks: 5,
        ..OptimizerSettings::default()
    };
    let err = optimize(&universe(30), &benchmark(), &settings, &solver, &CancelToken::new()).unwrap_err();
    assert!(matches!(err, OptimizerError::InfeasibleConstraints { positions: 5, .. }));
    assert_eq!(solver.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn small_universe_fails_without_solving() {
    let solver = CountingSolver::default();
    let err = optimize(
        &universe(20),
        &benchmark(),
        &OptimizerSettings::default(),
        &solver,
        &CancelToken::new(),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        OptimizerError::InsufficientUniverse { requested: 24, available: 20 }
    ));
    assert_eq!(solver.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn non_convergence_retries_once_then_warns() {
    let solver = CountingSolver::default();
    let settings = OptimizerSettings {
        tolerance: 0.0,
        max_iterations: 2,
        ..OptimizerSettings::default()
    };
    let result = optimize(&universe(30), &benchmark(), &settings, &solver, &CancelToken::new()).unwrap();
    assert_eq!(solver.calls.load(Ordering::SeqCst), 2);
    assert!(!result.converged);
    assert_eq!(result.warnings.len(), 1);
    assert_relative_eq!(result.total_weight(), 1.0, epsilon = 1e-6);
}

#[test]
fn replicating_candidate_takes_the_whole_book() {
    let mut candidates = universe(3);
    // Replace the top candidate's returns with the benchmark itself.
    candidates[0].returns = benchmark().combined().clone();
    let settings = OptimizerSettings {
        num_stocks: 3,
        min_weight: 0.0,
        max_weight: 1.0,
        ..OptimizerSettings::default()
    };
    let result = optimize(&candidates, &benchmark(), &settings, &ProjectedGradientSolver, &CancelToken::new()).unwrap();
    assert!(result.weights[0].weight > 0.99);
    assert!(result.tracking_error < 1e-3);
}

#[test]
fn cancelled_solve_surfaces_as_error() {
    let token = CancelToken::new();
    token.cancel();
    let err = optimize(
        &universe(30),
        &benchmark(),
        &OptimizerSettings::default(),
        &ProjectedGradientSolver,
        &token,
    )
    .unwrap_err();
    assert!(matches!(err, OptimizerError::Cancelled));
}
