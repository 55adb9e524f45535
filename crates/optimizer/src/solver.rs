use crate::cancel::CancelToken;
use crate::error::OptimizerError;
use crate::problem::QuadraticProblem;
use crate::projection::project_capped_simplex;

/// Stopping rule for an iterative solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolveOptions {
    /// Largest per-weight change between iterations that counts as converged.
    pub tolerance: f64,
    pub max_iterations: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolveReport {
    pub weights: Vec<f64>,
    pub iterations: usize,
    pub converged: bool,
}

/// The narrow seam between the optimizer and the numerical method.
///
/// Implementations must return weights inside the feasible set even when they
/// stop before converging.
pub trait QuadraticSolver: Send + Sync {
    fn name(&self) -> &'static str;

    fn solve(
        &self,
        problem: &QuadraticProblem,
        options: &SolveOptions,
        cancel: &CancelToken,
    ) -> Result<SolveReport, OptimizerError>;
}

/// Accelerated projected gradient (FISTA) with adaptive restart.
///
/// Starts from equal weights, steps by `1/L` with `L = 2‖Q‖_F`, and projects every
/// iterate back onto the capped simplex. Fully deterministic.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProjectedGradientSolver;

impl QuadraticSolver for ProjectedGradientSolver {
    fn name(&self) -> &'static str {
        "projected-gradient"
    }

    fn solve(
        &self,
        problem: &QuadraticProblem,
        options: &SolveOptions,
        cancel: &CancelToken,
    ) -> Result<SolveReport, OptimizerError> {
        let n = problem.dimension();
        if n == 0 {
            return Ok(SolveReport {
                weights: Vec::new(),
                iterations: 0,
                converged: true,
            });
        }
        let start = project_capped_simplex(&vec![1.0 / n as f64; n], problem.lower, problem.upper);

        let lipschitz = problem.lipschitz_bound();
        if lipschitz <= f64::MIN_POSITIVE {
            // Zero covariance: every feasible point is optimal.
            return Ok(SolveReport {
                weights: start,
                iterations: 0,
                converged: true,
            });
        }
        let step = 1.0 / lipschitz;

        let mut x = start.clone();
        let mut y = start;
        let mut t = 1.0_f64;

        for iteration in 1..=options.max_iterations {
            if cancel.is_cancelled() {
                return Err(OptimizerError::Cancelled);
            }

            let grad = problem.gradient(&y);
            let descent: Vec<f64> = y.iter().zip(&grad).map(|(yi, gi)| yi - step * gi).collect();
            let x_next = project_capped_simplex(&descent, problem.lower, problem.upper);

            let change = x_next
                .iter()
                .zip(&x)
                .map(|(a, b)| (a - b).abs())
                .fold(0.0_f64, f64::max);
            if change < options.tolerance {
                return Ok(SolveReport {
                    weights: x_next,
                    iterations: iteration,
                    converged: true,
                });
            }

            // Restart the momentum when it points uphill.
            let uphill: f64 = y
                .iter()
                .zip(&x_next)
                .zip(&x)
                .map(|((yi, xn), xo)| (yi - xn) * (xn - xo))
                .sum();
            if uphill > 0.0 {
                t = 1.0;
                y = x_next.clone();
            } else {
                let t_next = 0.5 * (1.0 + (1.0 + 4.0 * t * t).sqrt());
                let momentum = (t - 1.0) / t_next;
                y = x_next
                    .iter()
                    .zip(&x)
                    .map(|(xn, xo)| xn + momentum * (xn - xo))
                    .collect();
                t = t_next;
            }
            x = x_next;
        }

        Ok(SolveReport {
            weights: x,
            iterations: options.max_iterations,
            converged: false,
        })
    }
}
