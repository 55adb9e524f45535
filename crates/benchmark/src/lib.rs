//! # MarketMatch Benchmark Comparator
//!
//! Builds the blended benchmark that the rest of the pipeline tracks, and measures how
//! closely a finished portfolio follows it.
//!
//! The comparator is a validation step. The optimizer minimises tracking error on its
//! own; `compare` is run afterwards on the realized portfolio and reports the achieved
//! correlation independently of the solver's objective.
//!
//! ## Public API
//!
//! - `combine`: blends index price histories into a `BenchmarkSeries`.
//! - `correlation`, `tracking_error`: pairwise measures on aligned return series.
//! - `TrackingReport`: the post-allocation validation summary.

pub mod comparator;
pub mod error;
pub mod series;

// Re-export the key components to create a clean, public-facing API.
pub use comparator::{compare, correlation, tracking_error, TrackingReport};
pub use error::BenchmarkError;
pub use series::{combine, BenchmarkPerformance, BenchmarkSeries, IndexPerformance, IndexSeries, NamedIndex};
