//! Tracing setup
//!
//! Installs a `tracing-subscriber` fmt layer with an [`EnvFilter`]. The level
//! comes from [`LoggingConfig`]; `RUST_LOG`, when set, takes precedence.
//! Output goes to stderr so the interactive menu keeps stdout to itself.
//!
//! # Example
//! ```no_run
//! use eaf_focuser::{logging, EafConfig};
//!
//! let config = EafConfig::load()?;
//! logging::init(&config.logging)?;
//! tracing::info!("Focuser tool started");
//! # Ok::<(), eaf_focuser::ConfigError>(())
//! ```

use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::ConfigError;

/// Output format for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line, coloured (for development)
    Pretty,
    /// One line per event
    #[default]
    Compact,
    /// JSON objects for log aggregation
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Output format
    pub format: LogFormat,
    /// Include source file and line
    pub with_file_and_line: bool,
    /// ANSI colours (pretty format only)
    pub with_ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
            with_file_and_line: false,
            with_ansi: true,
        }
    }
}

impl LoggingConfig {
    /// Config with a given level and defaults otherwise.
    pub fn with_level(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            ..Default::default()
        }
    }

    /// Parsed log level.
    pub fn level(&self) -> Result<Level, ConfigError> {
        parse_log_level(&self.level)
    }
}

/// Parse a log level name, case-insensitively.
pub fn parse_log_level(level: &str) -> Result<Level, ConfigError> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" | "warning" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => Err(ConfigError::Invalid(format!(
            "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
            level
        ))),
    }
}

/// Initialize tracing.
///
/// Idempotent: if a global subscriber is already installed (tests, a host
/// application embedding the library) this returns `Ok(())`.
pub fn init(config: &LoggingConfig) -> Result<(), ConfigError> {
    let level = config.level()?;
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    let base = fmt::layer()
        .with_writer(std::io::stderr)
        .with_file(config.with_file_and_line)
        .with_line_number(config.with_file_and_line);

    let layer = match config.format {
        LogFormat::Pretty => base.pretty().with_ansi(config.with_ansi).boxed(),
        LogFormat::Compact => base.compact().with_ansi(false).boxed(),
        LogFormat::Json => base.json().with_ansi(false).boxed(),
    };

    tracing_subscriber::registry()
        .with(layer.with_filter(env_filter))
        .try_init()
        .or_else(|e| {
            if e.to_string().contains("already been set") {
                Ok(())
            } else {
                Err(ConfigError::Logging(e.to_string()))
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_level() {
        assert_eq!(parse_log_level("trace").unwrap(), Level::TRACE);
        assert_eq!(parse_log_level("DEBUG").unwrap(), Level::DEBUG);
        assert_eq!(parse_log_level("Warning").unwrap(), Level::WARN);
        assert!(parse_log_level("verbose").is_err());
    }

    #[test]
    fn test_init_is_idempotent() {
        let config = LoggingConfig::with_level("debug");
        assert!(init(&config).is_ok());
        assert!(init(&config).is_ok());
    }

    #[test]
    fn test_init_rejects_bad_level() {
        let config = LoggingConfig::with_level("chatty");
        assert!(matches!(init(&config), Err(ConfigError::Invalid(_))));
    }
}
