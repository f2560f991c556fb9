//! Configuration management.
//!
//! Precedence, lowest first: built-in defaults, the TOML file, then
//! environment variables such as `OI__STRATEGY__SENSITIVITY=0.02`.

mod settings;

pub use settings::{
    AppConfig, BacktestSettings, BrokerSettings, DataSettings, InstrumentSettings, LogFormat,
    LoggingConfig, RiskSettings, SelectionSettings, SessionSettings, StrategySettings,
    ThresholdModeName,
};

use config::{Config, ConfigError, Environment, File};
use std::path::Path;

/// File read when no explicit path is given. Missing is fine.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Load configuration from file and environment.
///
/// An explicit `path` must exist.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let file = match path {
        Some(path) => File::from(path).required(true),
        None => File::from(Path::new(DEFAULT_CONFIG_PATH)).required(false),
    };

    let config = Config::builder()
        .add_source(file)
        .add_source(
            Environment::with_prefix("OI")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    config.try_deserialize()
}

/// Render a configuration back to TOML.
pub fn to_toml(config: &AppConfig) -> Result<String, toml::ser::Error> {
    toml::to_string_pretty(config)
}
