use crate::error::ConfigError;
use chrono::NaiveDate;
use core_types::Frequency;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// The root configuration structure for the entire application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub market_data: MarketDataSettings,
    pub filter: FilterSettings,
    pub rating: RatingSettings,
    pub optimizer: OptimizerSettings,
    pub allocation: AllocationSettings,
    pub server: ServerSettings,
    pub logging: LoggingSettings,
}

/// Where historical data comes from and which calendar it is sampled on.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketDataSettings {
    /// First day of the historical window.
    pub start_date: NaiveDate,
    /// Last day of the historical window. Also the "as of" date for staleness checks.
    pub end_date: NaiveDate,
    /// Sampling frequency of the return calendar.
    pub frequency: Frequency,
    /// Root of the CSV data directory used by the file provider.
    pub data_dir: PathBuf,
    /// The indices that make up the blended benchmark.
    pub benchmarks: Vec<BenchmarkIndex>,
    /// Maximum number of instrument fetches in flight at once.
    pub fetch_concurrency: usize,
    /// Additional attempts after a failed instrument fetch.
    pub fetch_retries: u32,
    #[serde(with = "humantime_serde")]
    pub retry_backoff: Duration,
}

/// A single index in the blended benchmark.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchmarkIndex {
    /// Short name used in reports, e.g. "sp500".
    pub name: String,
    /// Symbol the provider knows the index by, e.g. "^GSPC".
    pub symbol: String,
}

/// Universe filter rules. Each rule can be switched off on its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    /// Minimum number of return periods inside the window.
    pub min_history_periods: usize,
    pub currency: CurrencyRule,
    pub listing: ListingRule,
    pub volume: VolumeRule,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CurrencyRule {
    pub enabled: bool,
    pub allowed: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingRule {
    pub enabled: bool,
    /// A last trade older than this many days before the window end counts as delisted.
    pub staleness_days: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeRule {
    pub enabled: bool,
    pub min_average_volume: f64,
    /// Length of the trailing window, in calendar months, ending at the window end.
    pub months: u32,
    /// Months with fewer observations than this are ignored.
    pub min_trading_days_per_month: usize,
}

/// Weights of the composite rating. Cap dominates; the other two fine-tune.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RatingSettings {
    pub cap_weight: f64,
    pub return_weight: f64,
    pub tracking_weight: f64,
    pub cap_scaling: CapScaling,
}

/// Monotonic transform applied to market capitalisation before normalisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CapScaling {
    Linear,
    #[default]
    Log,
    Rank,
}

/// Parameters for the tracking-error weight optimizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerSettings {
    /// Number of top-rated candidates that make up the portfolio.
    pub num_stocks: usize,
    pub min_weight: f64,
    pub max_weight: f64,
    /// Largest per-weight change between iterations that still counts as converged.
    pub tolerance: f64,
    pub max_iterations: usize,
    /// Wall-clock budget for a single solve.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

/// How target weights are turned into shares.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocationSettings {
    pub default_budget: Decimal,
    pub share_mode: ShareMode,
    /// Decimal places kept for fractional shares (truncated, never rounded up).
    pub share_decimals: u32,
    pub fee_model: FeeModel,
    pub fee_timing: FeeTiming,
    /// Currency every price is converted into before sizing positions.
    pub base_currency: String,
    /// Prices are taken from the last close on or before this date.
    /// Defaults to the last close in the data window.
    pub price_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum ShareMode {
    #[default]
    Fractional,
    Whole,
}

/// Transaction cost model applied per position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeeModel {
    None,
    Flat { per_trade: Decimal },
    BasisPoints { bps: Decimal },
    PerShare {
        rate: Decimal,
        #[serde(default)]
        max_per_trade: Option<Decimal>,
    },
}

/// When fees are taken out of the budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FeeTiming {
    /// Each position is sized so that its value plus its fee fits its target value.
    #[default]
    WithinPosition,
    /// Estimated fees are removed from the budget before targets are computed.
    BeforeAllocation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub body_limit_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter directive, overridden by `RUST_LOG` when set.
    pub level: String,
    /// When set, logs are also written to a daily rolling file in this directory.
    pub directory: Option<PathBuf>,
    pub file_prefix: String,
}

// --- Default Implementations ---
// These allow a user to omit any section (or the whole file) and still get
// the documented product defaults.

impl Default for MarketDataSettings {
    fn default() -> Self {
        Self {
            start_date: NaiveDate::from_ymd_opt(2021, 1, 1).unwrap_or_default(),
            end_date: NaiveDate::from_ymd_opt(2024, 11, 2).unwrap_or_default(),
            frequency: Frequency::Monthly,
            data_dir: PathBuf::from("data"),
            benchmarks: vec![
                BenchmarkIndex {
                    name: "sp500".to_string(),
                    symbol: "^GSPC".to_string(),
                },
                BenchmarkIndex {
                    name: "tsx".to_string(),
                    symbol: "XIU.TO".to_string(),
                },
            ],
            fetch_concurrency: 8,
            fetch_retries: 1,
            retry_backoff: Duration::from_millis(250),
        }
    }
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            min_history_periods: 12,
            currency: CurrencyRule::default(),
            listing: ListingRule::default(),
            volume: VolumeRule::default(),
        }
    }
}

impl Default for CurrencyRule {
    fn default() -> Self {
        Self {
            enabled: true,
            allowed: vec!["USD".to_string(), "CAD".to_string()],
        }
    }
}

impl Default for ListingRule {
    fn default() -> Self {
        Self {
            enabled: true,
            staleness_days: 14,
        }
    }
}

impl Default for VolumeRule {
    fn default() -> Self {
        Self {
            enabled: true,
            min_average_volume: 100_000.0,
            months: 12,
            min_trading_days_per_month: 18,
        }
    }
}

impl Default for RatingSettings {
    fn default() -> Self {
        Self {
            cap_weight: 1.0,
            return_weight: 0.001,
            tracking_weight: 0.1,
            cap_scaling: CapScaling::Log,
        }
    }
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        Self {
            num_stocks: 24,
            min_weight: 0.021,
            max_weight: 0.15,
            tolerance: 1e-10,
            max_iterations: 20_000,
            timeout: Duration::from_secs(30),
        }
    }
}

impl Default for AllocationSettings {
    fn default() -> Self {
        Self {
            default_budget: dec!(1000000),
            share_mode: ShareMode::Fractional,
            share_decimals: 4,
            fee_model: FeeModel::default(),
            fee_timing: FeeTiming::WithinPosition,
            base_currency: "CAD".to_string(),
            price_date: None,
        }
    }
}

impl Default for FeeModel {
    /// A tenth of a cent per share, capped at $3.95 per trade.
    fn default() -> Self {
        FeeModel::PerShare {
            rate: dec!(0.001),
            max_per_trade: Some(dec!(3.95)),
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5001,
            body_limit_bytes: 1024 * 1024 * 50,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
            file_prefix: "marketmatch.log".to_string(),
        }
    }
}

// --- Validation ---

impl Settings {
    /// Rejects settings that no pipeline run could satisfy.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.market_data.validate()?;
        self.filter.validate()?;
        self.rating.validate()?;
        self.optimizer.validate()?;
        self.allocation.validate()?;
        Ok(())
    }
}

impl MarketDataSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.start_date >= self.end_date {
            return Err(invalid(format!(
                "market_data.start_date ({}) must be before end_date ({})",
                self.start_date, self.end_date
            )));
        }
        if self.benchmarks.is_empty() {
            return Err(invalid("market_data.benchmarks must name at least one index"));
        }
        if self.fetch_concurrency == 0 {
            return Err(invalid("market_data.fetch_concurrency must be at least 1"));
        }
        Ok(())
    }
}

impl FilterSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.min_history_periods < 2 {
            return Err(invalid("filter.min_history_periods must be at least 2"));
        }
        if self.currency.enabled && self.currency.allowed.is_empty() {
            return Err(invalid("filter.currency.allowed is empty while the rule is enabled"));
        }
        if self.listing.staleness_days < 0 {
            return Err(invalid("filter.listing.staleness_days must not be negative"));
        }
        if self.volume.min_average_volume < 0.0 || self.volume.months == 0 {
            return Err(invalid("filter.volume needs a non-negative threshold and at least one month"));
        }
        Ok(())
    }
}

impl RatingSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        let weights = [self.cap_weight, self.return_weight, self.tracking_weight];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(invalid("rating weights must be finite and non-negative"));
        }
        Ok(())
    }
}

impl OptimizerSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.num_stocks == 0 {
            return Err(invalid("optimizer.num_stocks must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.min_weight) || !(0.0..=1.0).contains(&self.max_weight) {
            return Err(invalid("optimizer weights must lie in [0, 1]"));
        }
        if self.min_weight > self.max_weight {
            return Err(invalid(format!(
                "optimizer.min_weight ({}) exceeds max_weight ({})",
                self.min_weight, self.max_weight
            )));
        }
        if self.tolerance <= 0.0 || self.max_iterations == 0 {
            return Err(invalid("optimizer.tolerance and max_iterations must be positive"));
        }
        Ok(())
    }
}

impl AllocationSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.default_budget <= Decimal::ZERO {
            return Err(invalid("allocation.default_budget must be positive"));
        }
        let negative_fee = match &self.fee_model {
            FeeModel::None => false,
            FeeModel::Flat { per_trade } => per_trade.is_sign_negative(),
            FeeModel::BasisPoints { bps } => bps.is_sign_negative(),
            FeeModel::PerShare { rate, max_per_trade } => {
                rate.is_sign_negative() || max_per_trade.is_some_and(|m| m.is_sign_negative())
            }
        };
        if negative_fee {
            return Err(invalid("allocation.fee_model must not contain negative amounts"));
        }
        if self.share_decimals > 12 {
            return Err(invalid("allocation.share_decimals must be at most 12"));
        }
        if self.base_currency.trim().is_empty() {
            return Err(invalid("allocation.base_currency must not be empty"));
        }
        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid_and_match_product_choices() {
        let settings = Settings::default();
        settings.validate().unwrap();
        assert_eq!(settings.optimizer.num_stocks, 24);
        assert_eq!(settings.optimizer.min_weight, 0.021);
        assert_eq!(settings.optimizer.max_weight, 0.15);
        assert_eq!(settings.rating.cap_weight, 1.0);
        assert_eq!(settings.rating.return_weight, 0.001);
        assert_eq!(settings.rating.tracking_weight, 0.1);
        assert_eq!(settings.market_data.benchmarks.len(), 2);
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        let mut settings = Settings::default();
        settings.optimizer.min_weight = 0.2;
        settings.optimizer.max_weight = 0.1;
        assert!(matches!(settings.validate(), Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn empty_currency_list_only_matters_when_enabled() {
        let mut settings = Settings::default();
        settings.filter.currency.allowed.clear();
        assert!(settings.validate().is_err());
        settings.filter.currency.enabled = false;
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn negative_fees_are_rejected() {
        let mut settings = Settings::default();
        settings.allocation.fee_model = FeeModel::Flat { per_trade: dec!(-1) };
        assert!(settings.validate().is_err());
    }
}
