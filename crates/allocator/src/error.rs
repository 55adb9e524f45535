use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AllocationError {
    #[error("Budget must be positive, got {0}")]
    InvalidBudget(Decimal),

    #[error("No price available for {0}")]
    MissingPrice(String),

    #[error("Price for {ticker} must be positive, got {price}")]
    InvalidPrice { ticker: String, price: Decimal },

    #[error("Weight for {ticker} is not a usable fraction: {weight}")]
    InvalidWeight { ticker: String, weight: f64 },
}
