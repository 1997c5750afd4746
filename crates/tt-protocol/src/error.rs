//! Protocol error types

use thiserror::Error;

/// Errors that can occur while decoding protocol data
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Assertion payload is shorter than the fixed record size
    #[error("Truncated assertion: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    /// Assertion payload does not start with the TACK magic
    #[error("Invalid assertion magic")]
    InvalidMagic,

    /// Assertion payload has a version this build cannot read
    #[error("Unsupported assertion version: {0}")]
    UnsupportedVersion(u8),

    /// Fingerprint text is not 64 hex characters
    #[error("Invalid fingerprint: {0}")]
    InvalidFingerprint(String),
}
