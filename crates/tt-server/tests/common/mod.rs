//! Shared fixtures for testbed integration tests

#![allow(dead_code)]

use std::path::PathBuf;

use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use tt_core::config::TestbedConfig;
use tt_core::PinState;
use tt_server::Testbed;

/// A running testbed on ephemeral ports, with its certificate files
pub struct Harness {
    pub testbed: Testbed,
    pub cancel: CancellationToken,
    _dir: TempDir,
}

impl Harness {
    pub fn tls_addr(&self) -> String {
        self.testbed.tls_addr().to_string()
    }

    pub fn control_url(&self, path: &str) -> String {
        format!("http://{}{}", self.testbed.control_addr(), path)
    }
}

/// Write a fresh self-signed certificate for `localhost`
pub fn write_identity(dir: &TempDir) -> (PathBuf, PathBuf) {
    let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    let cert_path = dir.path().join("cert.pem");
    let key_path = dir.path().join("key.pem");
    std::fs::write(&cert_path, cert.cert.pem()).unwrap();
    std::fs::write(&key_path, cert.key_pair.serialize_pem()).unwrap();
    (cert_path, key_path)
}

pub fn test_config(dir: &TempDir) -> TestbedConfig {
    let (cert, key) = write_identity(dir);
    TestbedConfig {
        tls_bind: "127.0.0.1:0".to_string(),
        control_bind: "127.0.0.1:0".to_string(),
        ..TestbedConfig::default()
    }
    .with_identity(Some(cert), Some(key))
}

pub async fn start() -> Harness {
    start_with_pins(PinState::new()).await
}

pub async fn start_with_pins(pins: PinState) -> Harness {
    start_with(pins, |_| {}).await
}

/// Start a testbed after letting `adjust` tweak the default test config
pub async fn start_with(pins: PinState, adjust: impl FnOnce(&mut TestbedConfig)) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(&dir);
    adjust(&mut config);
    let cancel = CancellationToken::new();
    let testbed = Testbed::start_with_pins(&config, pins, cancel.clone())
        .await
        .unwrap();

    Harness {
        testbed,
        cancel,
        _dir: dir,
    }
}

/// GET a control path, returning status and body
pub async fn control_get(harness: &Harness, path: &str) -> (u16, String) {
    let response = reqwest::get(harness.control_url(path)).await.unwrap();
    let status = response.status().as_u16();
    (status, response.text().await.unwrap())
}
