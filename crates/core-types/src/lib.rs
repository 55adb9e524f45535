//! # MarketMatch Core Types
//!
//! Layer 0 of the workspace: the value types every pipeline stage consumes and
//! produces. Nothing in here performs I/O.
//!
//! - `Instrument` and `PriceHistory` hold what the market data provider returned.
//! - `ReturnSeries` is a price history projected onto a calendar grid.
//! - `stats` holds the small set of sample statistics shared by the rating engine,
//!   the optimizer and the benchmark comparator.

pub mod enums;
pub mod error;
pub mod instrument;
pub mod returns;
pub mod stats;
pub mod window;

// Re-export the core types to provide a clean public API.
pub use enums::{Frequency, ListingStatus};
pub use error::CoreError;
pub use instrument::{Instrument, PriceHistory, PricePoint};
pub use returns::ReturnSeries;
pub use window::DataWindow;
