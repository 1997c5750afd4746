//! Core error types for the TACK testbed

use std::path::PathBuf;
use thiserror::Error;

use tt_protocol::Fingerprint;

/// Pin-state errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PinError {
    /// Rotation requested for a fingerprint that was never initialized
    #[error("Unknown pin target: {0}")]
    UnknownTarget(Fingerprint),

    /// The assertion builder could not produce a payload
    #[error("Assertion construction failed for generation {generation}: {reason}")]
    Assertion { generation: u64, reason: String },

    /// Generation counter exhausted
    #[error("Generation counter exhausted for {0}")]
    GenerationOverflow(Fingerprint),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Missing required field
    #[error("Missing required field: {0}")]
    MissingField(String),
}
