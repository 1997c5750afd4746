//! Testbed configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

/// Configuration for the TLS echo service and the control service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TestbedConfig {
    /// Address the TLS echo service binds to
    pub tls_bind: String,

    /// Address the control service binds to
    pub control_bind: String,

    /// PEM certificate chain (leaf first)
    pub cert_path: Option<PathBuf>,

    /// PEM private key matching the leaf certificate
    pub key_path: Option<PathBuf>,

    /// Maximum number of concurrently served TLS connections
    pub max_connections: u32,

    /// Pause after a failed accept before accepting again
    #[serde(with = "super::duration_millis")]
    pub accept_backoff: Duration,

    /// Time a client gets to finish the TLS handshake
    #[serde(with = "super::duration_millis")]
    pub handshake_timeout: Duration,
}

impl Default for TestbedConfig {
    fn default() -> Self {
        Self {
            tls_bind: "127.0.0.1:8443".to_string(),
            control_bind: "0.0.0.0:8080".to_string(),
            cert_path: None,
            key_path: None,
            max_connections: 1024,
            accept_backoff: Duration::from_millis(50),
            handshake_timeout: Duration::from_secs(10),
        }
    }
}

impl TestbedConfig {
    /// Apply command-line overrides for the certificate and key paths
    pub fn with_identity(mut self, cert: Option<PathBuf>, key: Option<PathBuf>) -> Self {
        if cert.is_some() {
            self.cert_path = cert;
        }
        if key.is_some() {
            self.key_path = key;
        }
        self
    }

    /// Certificate and key paths, both of which are required to serve
    pub fn identity_paths(&self) -> Result<(&Path, &Path), ConfigError> {
        let cert = self
            .cert_path
            .as_deref()
            .ok_or_else(|| ConfigError::MissingField("cert_path".to_string()))?;
        let key = self
            .key_path
            .as_deref()
            .ok_or_else(|| ConfigError::MissingField("key_path".to_string()))?;
        Ok((cert, key))
    }

    /// Check values that serde cannot
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "max_connections must be at least 1".to_string(),
            ));
        }
        if self.handshake_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "handshake_timeout must be non-zero".to_string(),
            ));
        }
        self.identity_paths()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ports() {
        let config = TestbedConfig::default();
        assert!(config.tls_bind.ends_with(":8443"));
        assert!(config.control_bind.ends_with(":8080"));
    }

    #[test]
    fn test_identity_required() {
        let config = TestbedConfig::default();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingField(field)) if field == "cert_path"
        ));

        let config = config.with_identity(Some("cert.pem".into()), None);
        assert!(matches!(
            config.identity_paths(),
            Err(ConfigError::MissingField(field)) if field == "key_path"
        ));
    }

    #[test]
    fn test_with_identity_keeps_existing_paths() {
        let config = TestbedConfig {
            cert_path: Some("from-file.pem".into()),
            ..Default::default()
        }
        .with_identity(None, Some("key.pem".into()));

        let (cert, key) = config.identity_paths().unwrap();
        assert_eq!(cert, Path::new("from-file.pem"));
        assert_eq!(key, Path::new("key.pem"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_connections_rejected() {
        let config = TestbedConfig {
            max_connections: 0,
            ..Default::default()
        }
        .with_identity(Some("c.pem".into()), Some("k.pem".into()));
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_toml_backoff_in_millis() {
        let config: TestbedConfig = toml::from_str("accept_backoff = 200").unwrap();
        assert_eq!(config.accept_backoff, Duration::from_millis(200));
        assert_eq!(config.handshake_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_toml_handshake_timeout() {
        let config: TestbedConfig = toml::from_str("handshake_timeout = 750").unwrap();
        assert_eq!(config.handshake_timeout, Duration::from_millis(750));
    }

    #[test]
    fn test_zero_handshake_timeout_rejected() {
        let config = TestbedConfig {
            handshake_timeout: Duration::ZERO,
            ..Default::default()
        }
        .with_identity(Some("c.pem".into()), Some("k.pem".into()));
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
