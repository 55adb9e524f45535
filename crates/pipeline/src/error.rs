use allocator::AllocationError;
use benchmark::BenchmarkError;
use optimizer::OptimizerError;
use rating::RatingError;
use std::time::Duration;
use thiserror::Error;

/// Every failure a portfolio request can surface to its caller.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("No tickers provided")]
    EmptyRequest,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("No valid stocks found for rating")]
    NoValidStocks,

    #[error("Only {available} stocks passed filtering, {requested} are required")]
    InsufficientUniverse { requested: usize, available: usize },

    #[error(
        "Weight bounds [{min_weight}, {max_weight}] cannot be met by {positions} positions summing to 100%"
    )]
    InfeasibleConstraints {
        positions: usize,
        min_weight: f64,
        max_weight: f64,
    },

    #[error("Market data unavailable: {0}")]
    DataUnavailable(String),

    #[error("Optimization exceeded its time budget of {0:?}")]
    Timeout(Duration),

    #[error("Optimization was cancelled")]
    Cancelled,

    #[error("Benchmark error: {0}")]
    Benchmark(#[from] BenchmarkError),

    #[error("Rating error: {0}")]
    Rating(#[from] RatingError),

    #[error("Optimizer error: {0}")]
    Optimizer(OptimizerError),

    #[error("Allocation error: {0}")]
    Allocation(#[from] AllocationError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Stable machine-readable code for the error.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::EmptyRequest => "empty-request",
            PipelineError::InvalidRequest(_) => "invalid-request",
            PipelineError::NoValidStocks => "no-valid-stocks",
            PipelineError::InsufficientUniverse { .. } => "insufficient-universe",
            PipelineError::InfeasibleConstraints { .. } => "infeasible-constraints",
            PipelineError::DataUnavailable(_) => "data-unavailable",
            PipelineError::Timeout(_) => "timeout",
            PipelineError::Cancelled => "cancelled",
            PipelineError::Benchmark(_) => "benchmark",
            PipelineError::Rating(_) => "rating",
            PipelineError::Optimizer(_) => "optimizer",
            PipelineError::Allocation(_) => "allocation",
            PipelineError::Internal(_) => "internal",
        }
    }

    /// True for stage failures caused by the request's data or settings rather
    /// than by a fault in the service.
    pub fn is_unprocessable(&self) -> bool {
        matches!(
            self,
            PipelineError::Rating(RatingError::InvalidMetric { .. } | RatingError::NotEnoughPeriods(_))
                | PipelineError::Optimizer(OptimizerError::InvalidInput(_))
                | PipelineError::Benchmark(BenchmarkError::NotEnoughData(_))
                | PipelineError::Allocation(_)
        )
    }
}

impl From<OptimizerError> for PipelineError {
    fn from(error: OptimizerError) -> Self {
        match error {
            OptimizerError::InsufficientUniverse { requested, available } => {
                PipelineError::InsufficientUniverse { requested, available }
            }
            OptimizerError::InfeasibleConstraints {
                positions,
                min_weight,
                max_weight,
            } => PipelineError::InfeasibleConstraints {
                positions,
                min_weight,
                max_weight,
            },
            OptimizerError::Cancelled => PipelineError::Cancelled,
            other => PipelineError::Optimizer(other),
        }
    }
}
