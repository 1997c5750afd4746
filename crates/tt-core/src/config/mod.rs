//! Configuration management for the TACK testbed

mod serde_utils;
mod testbed;

pub use serde_utils::duration_millis;
pub use testbed::TestbedConfig;

use crate::error::ConfigError;
use std::path::{Path, PathBuf};

/// Get the default configuration directory
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tack-testbed")
}

/// Get the default configuration file path
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.toml")
}

/// Load configuration from a file
pub fn load_config<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Invalid(format!("Failed to read config: {}", e)))?;

    let config: T = toml::from_str(&content)?;
    Ok(config)
}

/// Load the testbed configuration.
///
/// An explicitly given path must exist. Without one, the default path is
/// tried and defaults are used when it is absent or unreadable.
pub fn load_testbed_config(path: Option<&Path>) -> Result<TestbedConfig, ConfigError> {
    if let Some(path) = path {
        return load_config(path);
    }

    let default_path = default_config_path();
    if default_path.exists() {
        match load_config(&default_path) {
            Ok(config) => Ok(config),
            Err(e) => {
                tracing::warn!("Failed to load config from {:?}: {}", default_path, e);
                Ok(TestbedConfig::default())
            }
        }
    } else {
        tracing::debug!("Using default configuration");
        Ok(TestbedConfig::default())
    }
}
