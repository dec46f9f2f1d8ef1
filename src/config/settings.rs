//! Application settings and modem tuning

use crate::core::transport::SerialConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration loading/saving failure
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No platform config directory could be determined
    #[error("could not determine config directory")]
    NoConfigDir,

    /// Reading or writing the file failed
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid TOML for [`AppConfig`]
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be rendered
    #[error("could not serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Serial link to the module
    pub serial: SerialConfig,
    /// Buffer sizes and timeouts
    pub modem: ModemConfig,
    /// Logging settings
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Path of the default config file
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        super::config_dir()
            .map(|dir| dir.join("config.toml"))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Load config from the default location, falling back to defaults
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from an explicit file
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config = toml::from_str(&content)?;
        tracing::debug!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::default_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        self.save_to(&path)
    }

    /// Save config to an explicit file
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Driver tuning: buffer capacities and per-phase time budgets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModemConfig {
    /// Response frame capacity in bytes
    pub frame_capacity: usize,
    /// HTTP body buffer capacity in bytes
    pub payload_capacity: usize,
    /// Budget for ordinary commands
    pub default_timeout_ms: u64,
    /// Budget for each bearer profile command
    pub bearer_timeout_ms: u64,
    /// Budget for opening/closing the GPRS bearer
    pub gprs_timeout_ms: u64,
    /// Pause after streaming a POST body
    pub payload_settle_ms: u64,
    /// Pause between minimum and normal power on soft reset
    pub reset_delay_ms: u64,
    /// Lowest firmware release with a working SSL stack
    pub ssl_min_release: u32,
}

impl Default for ModemConfig {
    fn default() -> Self {
        Self {
            frame_capacity: 256,
            payload_capacity: 512,
            default_timeout_ms: 5000,
            bearer_timeout_ms: 20_000,
            // The module allows up to 85 s
            gprs_timeout_ms: 65_000,
            payload_settle_ms: 500,
            reset_delay_ms: 1000,
            ssl_min_release: 14,
        }
    }
}

impl ModemConfig {
    /// Budget for ordinary commands
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    /// Budget for bearer profile commands
    pub fn bearer_timeout(&self) -> Duration {
        Duration::from_millis(self.bearer_timeout_ms)
    }

    /// Budget for bearer open/close
    pub fn gprs_timeout(&self) -> Duration {
        Duration::from_millis(self.gprs_timeout_ms)
    }

    /// Pause after a POST body
    pub fn payload_settle(&self) -> Duration {
        Duration::from_millis(self.payload_settle_ms)
    }

    /// Pause inside a soft reset
    pub fn reset_delay(&self) -> Duration {
        Duration::from_millis(self.reset_delay_ms)
    }

    /// Same config with every budget and pause replaced, handy for simulation
    #[must_use]
    pub fn with_timeouts(mut self, timeout_ms: u64) -> Self {
        self.default_timeout_ms = timeout_ms;
        self.bearer_timeout_ms = timeout_ms;
        self.gprs_timeout_ms = timeout_ms;
        self.payload_settle_ms = 0;
        self.reset_delay_ms = 0;
        self
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
    /// Also write a daily rolling log file
    pub file: bool,
    /// Log file directory
    pub directory: Option<PathBuf>,
    /// Emit JSON lines instead of text
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            file: false,
            directory: super::log_dir(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transport::SerialParity;

    #[test]
    fn test_defaults_match_module_timings() {
        let modem = ModemConfig::default();
        assert_eq!(modem.frame_capacity, 256);
        assert_eq!(modem.payload_capacity, 512);
        assert_eq!(modem.default_timeout(), Duration::from_secs(5));
        assert_eq!(modem.bearer_timeout(), Duration::from_secs(20));
        assert_eq!(modem.gprs_timeout(), Duration::from_secs(65));
        assert_eq!(modem.ssl_min_release, 14);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = AppConfig::default();
        config.serial = SerialConfig::new("/dev/ttyAMA0", 115_200).parity(SerialParity::Even);
        config.modem.payload_capacity = 2048;
        config.logging.json = true;
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.toml");
        std::fs::write(&path, "[modem]\ndefault_timeout_ms = 1500\n").unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.modem.default_timeout_ms, 1500);
        assert_eq!(loaded.modem.bearer_timeout_ms, 20_000);
        assert_eq!(loaded.serial, SerialConfig::default());
    }

    #[test]
    fn test_invalid_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[modem\n").unwrap();
        assert!(matches!(AppConfig::load_from(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_with_timeouts_zeroes_pauses() {
        let modem = ModemConfig::default().with_timeouts(50);
        assert_eq!(modem.gprs_timeout_ms, 50);
        assert_eq!(modem.payload_settle_ms, 0);
        assert_eq!(modem.reset_delay_ms, 0);
    }
}
