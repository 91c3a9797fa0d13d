//! Agent configuration loading and validation.
//!
//! The top-level `Config` aggregates logging, session, sensor, indicator and
//! transport settings. It is loaded once at startup and never changes.
//! Every section has defaults, so a device without a configuration file
//! still boots.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::config::{
    indicator::IndicatorConfig, logger::LoggerConfig, sensors::SensorsConfig,
    session::SessionConfig,
};

pub mod indicator;
pub mod logger;
pub mod sensors;
pub mod session;

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/sensorbee/config.toml";

/// Environment variable overriding [`DEFAULT_CONFIG_PATH`].
pub const CONFIG_ENV: &str = "SENSORBEE_CONFIG";

/// Timestamped console output for use before the tracing subscriber exists.
#[macro_export]
macro_rules! print_info {
    ($($arg:tt)*) => {
        println!("{}  {} {}",
            console::style(
                time::OffsetDateTime::now_utc()
                    .format(&time::format_description::well_known::Rfc3339)
                    .unwrap_or_default()
            ).dim(),
            console::style("INFO").green(),
            format_args!($($arg)*)
        );
    };
}

#[macro_export]
macro_rules! print_warn {
    ($($arg:tt)*) => {
        println!("{}  {} {}",
            console::style(
                time::OffsetDateTime::now_utc()
                    .format(&time::format_description::well_known::Rfc3339)
                    .unwrap_or_default()
            ).dim(),
            console::style("WARN").yellow(),
            format_args!($($arg)*)
        );
    };
}

#[macro_export]
macro_rules! print_error {
    ($($arg:tt)*) => {
        eprintln!("{}  {} {}",
            console::style(
                time::OffsetDateTime::now_utc()
                    .format(&time::format_description::well_known::Rfc3339)
                    .unwrap_or_default()
            ).dim(),
            console::style("ERROR").red(),
            format_args!($($arg)*)
        );
    };
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error while reading configuration: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Parse error while reading configuration: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Top-level agent configuration.
#[derive(Serialize, Deserialize, Debug, Validate, Clone, Default)]
#[serde(default)]
pub struct Config {
    #[validate(nested)]
    pub logger: LoggerConfig,

    #[validate(nested)]
    pub session: SessionConfig,

    #[validate(nested)]
    pub sensors: SensorsConfig,

    #[validate(nested)]
    pub indicator: IndicatorConfig,

    /// Collector transport. Validated when the transport is built.
    pub transport: TransportConfig,
}

#[cfg(feature = "sensorbee-mqtt")]
pub type TransportConfig = sensorbee_mqtt::Config;

/// Without a transport the table is kept verbatim and ignored.
#[cfg(not(feature = "sensorbee-mqtt"))]
pub type TransportConfig = toml::Table;

impl Config {
    /// Locates and loads the configuration, falling back to defaults.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if a located file cannot be read, parsed,
    /// or validated. A missing file is not an error.
    pub fn new() -> Result<Self, ConfigError> {
        match Self::get_config_path() {
            Some(path) => Self::load(&path),
            None => {
                print_warn!(
                    "No configuration file found (set {} or create {}), using defaults",
                    CONFIG_ENV,
                    DEFAULT_CONFIG_PATH
                );
                Ok(Self::default())
            }
        }
    }

    /// Priority: `SENSORBEE_CONFIG`, then [`DEFAULT_CONFIG_PATH`].
    fn get_config_path() -> Option<PathBuf> {
        if let Ok(config_path) = std::env::var(CONFIG_ENV) {
            let path = PathBuf::from(config_path);
            print_info!("Using config from {}: {}", CONFIG_ENV, path.display());
            return Some(path);
        }

        let fallback = Path::new(DEFAULT_CONFIG_PATH);
        if fallback.exists() {
            print_info!("Using default config path: {}", fallback.display());
            return Some(fallback.to_path_buf());
        }

        None
    }

    /// Loads and validates configuration from `path`.
    ///
    /// # Errors
    ///
    /// Propagates IO, parsing, and validation errors as `ConfigError`.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        print_info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(ConfigError::Config(format!(
                "Configuration file does not exist: {}",
                path.display()
            )));
        }

        let config_str = fs::read_to_string(path)?;
        let config = Self::parse(&config_str)?;

        print_info!("Successfully loaded config from: {}", path.display());
        Ok(config)
    }

    /// Parses and validates a TOML document.
    pub fn parse(config_str: &str) -> Result<Config, ConfigError> {
        let config: Config =
            toml::from_str(config_str).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

        Ok(config)
    }
}
