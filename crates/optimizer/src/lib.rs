//! # MarketMatch Optimizer
//!
//! Chooses weights for the top-N rated candidates so that the portfolio's returns
//! track the combined benchmark as closely as possible.
//!
//! ## Public API
//!
//! - `optimize`: selection, feasibility checks, solve, retry and reporting.
//! - `QuadraticSolver`: the swappable numerical method. `ProjectedGradientSolver`
//!   is the default.
//! - `CancelToken`: cooperative cancellation polled by the solver.

use benchmark::BenchmarkSeries;
use configuration::OptimizerSettings;
use core_types::{ReturnSeries, stats};
use rating::Candidate;
use serde::Serialize;
use std::collections::HashSet;

pub mod cancel;
pub mod error;
pub mod problem;
pub mod projection;
pub mod solver;

pub use cancel::CancelToken;
pub use error::OptimizerError;
pub use problem::QuadraticProblem;
pub use projection::project_capped_simplex;
pub use solver::{ProjectedGradientSolver, QuadraticSolver, SolveOptions, SolveReport};

/// Factor applied to the tolerance for the single retry after non-convergence.
const RETRY_TOLERANCE_FACTOR: f64 = 100.0;

/// A single target weight.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioWeight {
    pub ticker: String,
    pub weight: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct OptimizationResult {
    /// One entry per selected candidate, in rating order.
    pub weights: Vec<PortfolioWeight>,
    /// Ex-post tracking error of the target weights over the window.
    pub tracking_error: f64,
    pub iterations: usize,
    pub converged: bool,
    pub solver: &'static str,
    /// Non-fatal problems, e.g. a best-effort result after non-convergence.
    pub warnings: Vec<String>,
}

impl OptimizationResult {
    pub fn total_weight(&self) -> f64 {
        self.weights.iter().map(|w| w.weight).sum()
    }

    pub fn weight_of(&self, ticker: &str) -> Option<f64> {
        self.weights.iter().find(|w| w.ticker == ticker).map(|w| w.weight)
    }
}

/// Checks that `positions` weights in `[min_weight, max_weight]` can sum to one.
pub fn check_feasibility(
    positions: usize,
    min_weight: f64,
    max_weight: f64,
) -> Result<(), OptimizerError> {
    let n = positions as f64;
    if positions == 0 || min_weight > max_weight || n * min_weight > 1.0 || n * max_weight < 1.0 {
        return Err(OptimizerError::InfeasibleConstraints {
            positions,
            min_weight,
            max_weight,
        });
    }
    Ok(())
}

/// Selects the top `settings.num_stocks` candidates and solves for their weights.
///
/// `candidates` must be in rating order, best first. Fails before any numerical
/// work if the universe is too small or the bounds are infeasible.
pub fn optimize(
    candidates: &[Candidate],
    benchmark: &BenchmarkSeries,
    settings: &OptimizerSettings,
    solver: &dyn QuadraticSolver,
    cancel: &CancelToken,
) -> Result<OptimizationResult, OptimizerError> {
    let n = settings.num_stocks;
    if candidates.len() < n {
        return Err(OptimizerError::InsufficientUniverse {
            requested: n,
            available: candidates.len(),
        });
    }
    check_feasibility(n, settings.min_weight, settings.max_weight)?;

    let selected = &candidates[..n];
    let mut seen = HashSet::new();
    if let Some(dup) = selected.iter().find(|c| !seen.insert(c.ticker.as_str())) {
        return Err(OptimizerError::InvalidInput(format!("duplicate ticker {}", dup.ticker)));
    }

    let returns: Vec<&ReturnSeries> = selected.iter().map(|c| &c.returns).collect();
    let problem = QuadraticProblem::tracking_error(
        &returns,
        benchmark.combined(),
        settings.min_weight,
        settings.max_weight,
    )?;

    let options = SolveOptions {
        tolerance: settings.tolerance,
        max_iterations: settings.max_iterations,
    };
    let mut warnings = Vec::new();
    let mut report = solver.solve(&problem, &options, cancel)?;
    let mut iterations = report.iterations;

    if !report.converged {
        let relaxed = SolveOptions {
            tolerance: settings.tolerance * RETRY_TOLERANCE_FACTOR,
            ..options
        };
        tracing::warn!(
            solver = solver.name(),
            iterations,
            relaxed_tolerance = relaxed.tolerance,
            "Solver did not converge; retrying with a relaxed tolerance."
        );
        report = solver.solve(&problem, &relaxed, cancel)?;
        iterations += report.iterations;
        if !report.converged {
            let message = format!(
                "solver did not converge within {} iterations at tolerance {:e}; returning best-effort weights",
                settings.max_iterations, relaxed.tolerance
            );
            tracing::warn!(solver = solver.name(), "{}", message);
            warnings.push(message);
        }
    }

    if report.weights.len() != n {
        return Err(OptimizerError::InvalidInput(format!(
            "solver returned {} weights for {} positions",
            report.weights.len(),
            n
        )));
    }

    let portfolio = ReturnSeries::weighted_sum(&returns, &report.weights)?;
    let active = portfolio.active_against(benchmark.combined())?;
    let tracking_error = stats::sample_std(&active).unwrap_or(0.0);

    let weights = selected
        .iter()
        .zip(&report.weights)
        .map(|(c, w)| PortfolioWeight {
            ticker: c.ticker.clone(),
            weight: *w,
        })
        .collect();

    tracing::info!(
        positions = n,
        iterations,
        converged = report.converged,
        tracking_error,
        "Portfolio weights optimized."
    );

    Ok(OptimizationResult {
        weights,
        tracking_error,
        iterations,
        converged: report.converged,
        solver: solver.name(),
        warnings,
    })
}
