use crate::error::ConfigError;
use std::path::Path;

// Declare the modules that make up this crate.
pub mod error;
pub mod settings;
pub mod telemetry;

// Re-export the core types to provide a clean public API.
pub use settings::{
    AllocationSettings, BenchmarkIndex, CapScaling, CurrencyRule, FeeModel, FeeTiming,
    FilterSettings, ListingRule, LoggingSettings, MarketDataSettings, OptimizerSettings,
    RatingSettings, ServerSettings, Settings, ShareMode, VolumeRule,
};
pub use telemetry::init_tracing;

/// Prefix for environment overrides, e.g. `MARKETMATCH__OPTIMIZER__NUM_STOCKS=20`.
const ENV_PREFIX: &str = "MARKETMATCH";

/// Loads the application configuration from `config.toml` in the working directory.
///
/// The file is optional: every section falls back to its defaults. Environment
/// variables prefixed with `MARKETMATCH__` override file values.
pub fn load_config() -> Result<Settings, ConfigError> {
    load_config_from(Path::new("config.toml"))
}

/// Loads the application configuration from an explicit path.
pub fn load_config_from(path: &Path) -> Result<Settings, ConfigError> {
    let builder = config::Config::builder()
        .add_source(config::File::from(path).required(false))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    // Attempt to deserialize the entire configuration into our `Settings` struct
    let settings = builder.try_deserialize::<Settings>()?;
    settings.validate()?;

    Ok(settings)
}
