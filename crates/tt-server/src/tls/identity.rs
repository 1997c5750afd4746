//! Server certificate, key and per-pin listener configuration

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::ServerConfig;
use thiserror::Error;

use tt_core::PinRecord;
use tt_protocol::Fingerprint;

/// Errors loading the server identity or building a listener configuration
#[derive(Error, Debug)]
pub enum IdentityError {
    /// File could not be opened or read
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// PEM input held no certificate
    #[error("No certificate found in {0}")]
    NoCertificate(String),

    /// PEM input held no private key
    #[error("No private key found in {0}")]
    NoPrivateKey(String),

    /// Leaf certificate is not valid X.509
    #[error("Failed to parse certificate: {0}")]
    Parse(String),

    /// rustls rejected the certificate, key or assertion payload
    #[error("TLS configuration error: {0}")]
    Tls(#[from] rustls::Error),
}

/// The ring provider every config in this crate is built with
pub fn crypto_provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

/// Fingerprint of a certificate's SubjectPublicKeyInfo
pub fn spki_fingerprint(cert: &CertificateDer<'_>) -> Result<Fingerprint, IdentityError> {
    let (_, parsed) = x509_parser::parse_x509_certificate(cert.as_ref())
        .map_err(|e| IdentityError::Parse(e.to_string()))?;
    Ok(Fingerprint::from_spki(parsed.public_key().raw))
}

/// Certificate chain and key, fixed for the life of the process
pub struct ServerIdentity {
    cert_chain: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
    fingerprint: Fingerprint,
}

impl ServerIdentity {
    /// Load a PEM certificate chain and private key from disk
    pub fn load(cert_path: &Path, key_path: &Path) -> Result<Self, IdentityError> {
        tracing::info!("Loading certificate from {:?}", cert_path);
        let mut cert_reader = BufReader::new(open(cert_path)?);
        let cert_chain = rustls_pemfile::certs(&mut cert_reader)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| IdentityError::Read {
                path: cert_path.display().to_string(),
                source: e,
            })?;
        if cert_chain.is_empty() {
            return Err(IdentityError::NoCertificate(cert_path.display().to_string()));
        }

        tracing::info!("Loading private key from {:?}", key_path);
        let mut key_reader = BufReader::new(open(key_path)?);
        let key = rustls_pemfile::private_key(&mut key_reader)
            .map_err(|e| IdentityError::Read {
                path: key_path.display().to_string(),
                source: e,
            })?
            .ok_or_else(|| IdentityError::NoPrivateKey(key_path.display().to_string()))?;

        Self::from_der(cert_chain, key)
    }

    /// Build from an already decoded chain (leaf first) and key
    pub fn from_der(
        cert_chain: Vec<CertificateDer<'static>>,
        key: PrivateKeyDer<'static>,
    ) -> Result<Self, IdentityError> {
        let leaf = cert_chain
            .first()
            .ok_or_else(|| IdentityError::NoCertificate("certificate chain".to_string()))?;
        let fingerprint = spki_fingerprint(leaf)?;

        Ok(Self {
            cert_chain,
            key,
            fingerprint,
        })
    }

    /// Fingerprint of the leaf certificate's public key
    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    /// Build the listener configuration presenting `record`'s assertion.
    ///
    /// The assertion is stapled in the certificate-status slot of the
    /// handshake, so every client performing a full handshake receives it.
    pub fn server_config(&self, record: &PinRecord) -> Result<Arc<ServerConfig>, IdentityError> {
        let config = ServerConfig::builder_with_provider(crypto_provider())
            .with_safe_default_protocol_versions()?
            .with_no_client_auth()
            .with_single_cert_with_ocsp(
                self.cert_chain.clone(),
                self.key.clone_key(),
                record.payload.to_vec(),
            )?;

        Ok(Arc::new(config))
    }
}

fn open(path: &Path) -> Result<File, IdentityError> {
    File::open(path).map_err(|e| IdentityError::Read {
        path: path.display().to_string(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tt_core::PinState;

    fn self_signed() -> (String, String) {
        let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
        (cert.cert.pem(), cert.key_pair.serialize_pem())
    }

    fn write_pair(dir: &tempfile::TempDir, cert: &str, key: &str) -> (std::path::PathBuf, std::path::PathBuf) {
        let cert_path = dir.path().join("cert.pem");
        let key_path = dir.path().join("key.pem");
        std::fs::write(&cert_path, cert).unwrap();
        std::fs::write(&key_path, key).unwrap();
        (cert_path, key_path)
    }

    #[test]
    fn test_load_and_fingerprint() {
        let dir = tempfile::tempdir().unwrap();
        let (cert, key) = self_signed();
        let (cert_path, key_path) = write_pair(&dir, &cert, &key);

        let identity = ServerIdentity::load(&cert_path, &key_path).unwrap();

        // Same key, same fingerprint, regardless of the certificate wrapping it
        let der = rustls_pemfile::certs(&mut cert.as_bytes())
            .next()
            .unwrap()
            .unwrap();
        assert_eq!(identity.fingerprint(), spki_fingerprint(&der).unwrap());
    }

    #[test]
    fn test_server_config_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let (cert, key) = self_signed();
        let (cert_path, key_path) = write_pair(&dir, &cert, &key);
        let identity = ServerIdentity::load(&cert_path, &key_path).unwrap();

        let mut pins = PinState::new();
        let first = pins.initialize(identity.fingerprint()).unwrap();
        let second = pins.rotate(identity.fingerprint()).unwrap();

        let a = identity.server_config(&first).unwrap();
        let b = identity.server_config(&second).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_missing_file() {
        let result = ServerIdentity::load(Path::new("/nonexistent/cert.pem"), Path::new("/nonexistent/key.pem"));
        assert!(matches!(result, Err(IdentityError::Read { .. })));
    }

    #[test]
    fn test_key_file_without_key() {
        let dir = tempfile::tempdir().unwrap();
        let (cert, _) = self_signed();
        // Certificate PEM where the key should be
        let (cert_path, key_path) = write_pair(&dir, &cert, &cert);

        let result = ServerIdentity::load(&cert_path, &key_path);
        assert!(matches!(result, Err(IdentityError::NoPrivateKey(_))));
    }

    #[test]
    fn test_empty_certificate_file() {
        let dir = tempfile::tempdir().unwrap();
        let (_, key) = self_signed();
        let (cert_path, key_path) = write_pair(&dir, "", &key);

        let result = ServerIdentity::load(&cert_path, &key_path);
        assert!(matches!(result, Err(IdentityError::NoCertificate(_))));
    }

    #[test]
    fn test_garbage_certificate() {
        let result = ServerIdentity::from_der(
            vec![CertificateDer::from(vec![0x30, 0x03, 0x01, 0x02, 0x03])],
            PrivateKeyDer::Pkcs8(vec![0u8; 16].into()),
        );
        assert!(matches!(result, Err(IdentityError::Parse(_))));
    }
}
