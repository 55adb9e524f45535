use crate::error::OptimizerError;
use core_types::ReturnSeries;
use rayon::prelude::*;

/// `minimize wᵀ Q w - 2 cᵀ w` subject to `sum(w) = 1` and `lower <= w_i <= upper`.
///
/// With `Q` the sample covariance of the candidate returns and `c` their covariance
/// with the benchmark, the objective equals the tracking-error variance minus the
/// (constant) benchmark variance.
#[derive(Debug, Clone, PartialEq)]
pub struct QuadraticProblem {
    pub quadratic: Vec<Vec<f64>>,
    pub linear: Vec<f64>,
    pub lower: f64,
    pub upper: f64,
}

impl QuadraticProblem {
    /// Builds the tracking-error problem for the given candidate returns.
    pub fn tracking_error(
        candidates: &[&ReturnSeries],
        benchmark: &ReturnSeries,
        lower: f64,
        upper: f64,
    ) -> Result<Self, OptimizerError> {
        for series in candidates {
            series.ensure_aligned(benchmark)?;
        }
        let periods = benchmark.len();
        if periods < 2 {
            return Err(OptimizerError::InvalidInput(format!(
                "need at least 2 return periods, got {}",
                periods
            )));
        }

        let demeaned: Vec<Vec<f64>> = candidates.iter().map(|s| demean(s.values())).collect();
        let bench = demean(benchmark.values());
        let scale = 1.0 / (periods - 1) as f64;

        let quadratic: Vec<Vec<f64>> = demeaned
            .par_iter()
            .map(|row| demeaned.iter().map(|col| dot(row, col) * scale).collect())
            .collect();
        let linear: Vec<f64> = demeaned.par_iter().map(|row| dot(row, &bench) * scale).collect();

        Ok(Self {
            quadratic,
            linear,
            lower,
            upper,
        })
    }

    pub fn dimension(&self) -> usize {
        self.linear.len()
    }

    pub fn objective(&self, w: &[f64]) -> f64 {
        let qw = self.quadratic_times(w);
        dot(w, &qw) - 2.0 * dot(&self.linear, w)
    }

    /// Gradient `2 Q w - 2 c`.
    pub fn gradient(&self, w: &[f64]) -> Vec<f64> {
        self.quadratic_times(w)
            .into_iter()
            .zip(&self.linear)
            .map(|(qw, c)| 2.0 * (qw - c))
            .collect()
    }

    /// Upper bound on the gradient's Lipschitz constant: `2 ‖Q‖_F >= 2 λ_max(Q)`.
    pub fn lipschitz_bound(&self) -> f64 {
        2.0 * self
            .quadratic
            .iter()
            .flat_map(|row| row.iter())
            .map(|q| q * q)
            .sum::<f64>()
            .sqrt()
    }

    fn quadratic_times(&self, w: &[f64]) -> Vec<f64> {
        self.quadratic.iter().map(|row| dot(row, w)).collect()
    }
}

fn demean(values: &[f64]) -> Vec<f64> {
    let mean = values.iter().sum::<f64>() / values.len().max(1) as f64;
    values.iter().map(|v| v - mean).collect()
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
