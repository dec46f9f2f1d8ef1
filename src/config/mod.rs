//! Configuration module
//!
//! Handles application settings and modem tuning

mod settings;

pub use settings::{AppConfig, ConfigError, LoggingConfig, ModemConfig};

use directories::ProjectDirs;
use std::path::PathBuf;

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "sim808", "SIM808")
}

/// Get the application configuration directory
pub fn config_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the application data directory
pub fn data_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.data_dir().to_path_buf())
}

/// Get the log directory
pub fn log_dir() -> Option<PathBuf> {
    data_dir().map(|d| d.join("logs"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logs_live_under_data_dir() {
        if let (Some(data), Some(logs)) = (data_dir(), log_dir()) {
            assert_eq!(logs, data.join("logs"));
        }
        if let (Some(config), Ok(path)) = (config_dir(), AppConfig::default_path()) {
            assert_eq!(path, config.join("config.toml"));
        }
    }
}
