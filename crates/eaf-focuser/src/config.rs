//! Configuration using Figment
//!
//! Configuration is layered, later sources overriding earlier ones:
//! 1. Built-in defaults (device 0, 60000 steps, backlash 0, sound on)
//! 2. A TOML file (`eaf.toml` unless another path is given)
//! 3. Environment variables prefixed with `EAF_`, nested keys split on `__`
//!
//! ```toml
//! [focuser]
//! device_number = 0
//! max_steps = 60000
//! backlash = 20
//!
//! [module]
//! step_to_mm = 0.00242105263
//! move_timeout_secs = 300
//!
//! [logging]
//! level = "debug"
//! ```
//!
//! # Example
//! ```no_run
//! use eaf_focuser::EafConfig;
//!
//! // EAF_FOCUSER__BACKLASH=20 overrides the file
//! let config = EafConfig::load()?;
//! config.validate()?;
//! println!("Device {}", config.focuser.device_number);
//! # Ok::<(), eaf_focuser::ConfigError>(())
//! ```

use std::path::Path;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::logging::LoggingConfig;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "eaf.toml";

/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "EAF_";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// File or environment could not be parsed
    #[error("Failed to load configuration: {0}")]
    Load(#[from] figment::Error),

    /// A value is out of range
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// Configuration could not be rendered as TOML
    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Logging subscriber could not be installed
    #[error("Failed to initialize logging: {0}")]
    Logging(String),
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EafConfig {
    /// Device settings pushed on connect
    pub focuser: FocuserConfig,
    /// Focus control in physical units
    pub module: ModuleConfig,
    /// Log output
    pub logging: LoggingConfig,
}

/// Device selection and the settings pushed to it on connect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FocuserConfig {
    /// Enumeration index of the focuser to open
    pub device_number: i32,
    /// Maximum travel in steps
    pub max_steps: i32,
    /// Backlash compensation in steps
    pub backlash: i32,
    /// Reverse the motor direction
    pub direction: bool,
    /// Beep when a move starts
    pub sound: bool,
}

impl Default for FocuserConfig {
    fn default() -> Self {
        Self {
            device_number: 0,
            max_steps: 60_000,
            backlash: 0,
            direction: false,
            sound: true,
        }
    }
}

/// Settings of [`FocusModule`](crate::FocusModule).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleConfig {
    /// Millimetres of focus travel per motor step
    pub step_to_mm: f64,
    /// Give up on a move after this many seconds
    pub move_timeout_secs: f64,
    /// Interval between motion polls in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            step_to_mm: 0.002_421_052_63,
            move_timeout_secs: 300.0,
            poll_interval_ms: 500,
        }
    }
}

impl ModuleConfig {
    /// Move timeout as a [`Duration`].
    pub fn move_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.move_timeout_secs.max(0.0))
    }

    /// Poll interval as a [`Duration`].
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl EafConfig {
    /// Load from `eaf.toml` in the working directory and the environment.
    ///
    /// A missing file is not an error; defaults and environment still apply.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Load from a specific file path and the environment.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Ok(Self::figment(path.as_ref()).extract()?)
    }

    /// The provider stack, exposed so callers can merge further layers.
    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        let f = &self.focuser;
        if f.device_number < 0 {
            return Err(ConfigError::Invalid(format!(
                "device_number must not be negative, got {}",
                f.device_number
            )));
        }
        if f.max_steps < 0 {
            return Err(ConfigError::Invalid(format!(
                "max_steps must not be negative, got {}",
                f.max_steps
            )));
        }
        if f.backlash < 0 {
            return Err(ConfigError::Invalid(format!(
                "backlash must not be negative, got {}",
                f.backlash
            )));
        }

        let m = &self.module;
        if !(m.step_to_mm > 0.0 && m.step_to_mm.is_finite()) {
            return Err(ConfigError::Invalid(format!(
                "step_to_mm must be positive, got {}",
                m.step_to_mm
            )));
        }
        if !(m.move_timeout_secs > 0.0 && m.move_timeout_secs.is_finite()) {
            return Err(ConfigError::Invalid(format!(
                "move_timeout_secs must be positive, got {}",
                m.move_timeout_secs
            )));
        }
        if m.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "poll_interval_ms must be positive".to_string(),
            ));
        }

        self.logging.level()?;
        Ok(())
    }

    /// Render as TOML, e.g. to write a starter file.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogFormat;

    #[test]
    fn test_defaults() {
        let config = EafConfig::default();
        assert_eq!(config.focuser.device_number, 0);
        assert_eq!(config.focuser.max_steps, 60_000);
        assert_eq!(config.focuser.backlash, 0);
        assert!(!config.focuser.direction);
        assert!(config.focuser.sound);
        assert_eq!(config.module.move_timeout(), Duration::from_secs(300));
        assert_eq!(config.module.poll_interval(), Duration::from_millis(500));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "focuser.toml",
                r#"
[focuser]
device_number = 1
backlash = 25

[logging]
level = "debug"
format = "json"
"#,
            )?;

            let config = EafConfig::load_from("focuser.toml").map_err(|e| e.to_string())?;
            assert_eq!(config.focuser.device_number, 1);
            assert_eq!(config.focuser.backlash, 25);
            // Untouched keys keep their defaults
            assert_eq!(config.focuser.max_steps, 60_000);
            assert!(config.focuser.sound);
            assert_eq!(config.logging.level, "debug");
            assert_eq!(config.logging.format, LogFormat::Json);
            Ok(())
        });
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        figment::Jail::expect_with(|_jail| {
            let config = EafConfig::load_from("absent.toml").map_err(|e| e.to_string())?;
            assert_eq!(config, EafConfig::default());
            Ok(())
        });
    }

    #[test]
    fn test_malformed_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("eaf.toml", "[focuser]\nmax_steps = \"many\"")?;
            assert!(matches!(EafConfig::load(), Err(ConfigError::Load(_))));
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "eaf.toml",
                r#"
[focuser]
backlash = 10
max_steps = 40000
"#,
            )?;
            jail.set_env("EAF_FOCUSER__BACKLASH", 20);
            jail.set_env("EAF_MODULE__POLL_INTERVAL_MS", 100);

            let config = EafConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.focuser.backlash, 20);
            assert_eq!(config.focuser.max_steps, 40_000);
            assert_eq!(config.module.poll_interval_ms, 100);
            Ok(())
        });
    }

    #[test]
    fn test_validation_rejects_negative_values() {
        let mut config = EafConfig::default();
        config.focuser.backlash = -1;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = EafConfig::default();
        config.focuser.device_number = -2;
        assert!(config.validate().is_err());

        let mut config = EafConfig::default();
        config.module.step_to_mm = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_unknown_log_level() {
        let mut config = EafConfig::default();
        config.logging.level = "loud".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("loud"));
    }

    #[test]
    fn test_to_toml_reloads() {
        let mut config = EafConfig::default();
        config.focuser.backlash = 7;
        config.logging.format = LogFormat::Compact;
        let text = config.to_toml().unwrap();

        figment::Jail::expect_with(|jail| {
            jail.create_file("eaf.toml", &text)?;
            assert_eq!(EafConfig::load().map_err(|e| e.to_string())?, config);
            Ok(())
        });
    }
}
