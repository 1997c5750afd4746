//! Client-side handshake probe
//!
//! Dials a TLS echo service, completes a full handshake and reports the
//! trust assertion the server presented. The certificate chain is not
//! checked against any root store; the handshake signature still is, so the
//! peer must hold the key for the certificate it presents.

use std::sync::{Arc, Mutex};

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::Resumption;
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};
use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;

use tt_protocol::{Fingerprint, ProtocolError, TackAssertion};

use crate::tls::{crypto_provider, spki_fingerprint, IdentityError};

/// Errors from probing a TLS echo service
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid server name: {0}")]
    ServerName(String),

    #[error("TLS configuration error: {0}")]
    Tls(#[from] rustls::Error),

    #[error("TLS handshake failed: {0}")]
    Handshake(std::io::Error),

    #[error("Server presented no certificate")]
    NoCertificate,

    #[error("Bad server certificate: {0}")]
    Certificate(#[from] IdentityError),

    #[error("Malformed trust assertion: {0}")]
    Assertion(#[from] ProtocolError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// What a single handshake revealed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeReport {
    /// Fingerprint of the leaf certificate the server presented
    pub fingerprint: Fingerprint,
    /// Trust assertion carried in the handshake, if any
    pub assertion: Option<TackAssertion>,
    /// True when the assertion targets the presented certificate
    pub pinned: bool,
}

impl ProbeReport {
    /// Generation of the presented assertion
    pub fn generation(&self) -> Option<u64> {
        self.assertion.map(|a| a.generation)
    }
}

/// Accepts any chain and records what the server sent
#[derive(Debug)]
struct CapturingVerifier {
    provider: Arc<CryptoProvider>,
    end_entity: Mutex<Option<CertificateDer<'static>>>,
    staple: Mutex<Option<Vec<u8>>>,
}

impl CapturingVerifier {
    fn new() -> Self {
        Self {
            provider: crypto_provider(),
            end_entity: Mutex::new(None),
            staple: Mutex::new(None),
        }
    }

    fn take(&self) -> (Option<CertificateDer<'static>>, Option<Vec<u8>>) {
        let end_entity = self.end_entity.lock().ok().and_then(|mut c| c.take());
        let staple = self.staple.lock().ok().and_then(|mut s| s.take());
        (end_entity, staple)
    }
}

impl ServerCertVerifier for CapturingVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        if let Ok(mut slot) = self.end_entity.lock() {
            *slot = Some(end_entity.clone().into_owned());
        }
        if let Ok(mut slot) = self.staple.lock() {
            *slot = Some(ocsp_response.to_vec());
        }
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

async fn connect(
    addr: &str,
    server_name: &str,
    verifier: Arc<CapturingVerifier>,
) -> Result<TlsStream<TcpStream>, ProbeError> {
    let mut config = ClientConfig::builder_with_provider(crypto_provider())
        .with_safe_default_protocol_versions()?
        .dangerous()
        .with_custom_certificate_verifier(verifier)
        .with_no_client_auth();
    // Every probe must see the assertion of a fresh handshake
    config.resumption = Resumption::disabled();

    let domain = ServerName::try_from(server_name.to_string())
        .map_err(|_| ProbeError::ServerName(server_name.to_string()))?;

    let tcp = TcpStream::connect(addr)
        .await
        .map_err(|e| ProbeError::Connect {
            addr: addr.to_string(),
            source: e,
        })?;

    TlsConnector::from(Arc::new(config))
        .connect(domain, tcp)
        .await
        .map_err(ProbeError::Handshake)
}

/// Complete one handshake with `addr` and report the presented assertion
pub async fn probe(addr: &str, server_name: &str) -> Result<ProbeReport, ProbeError> {
    let verifier = Arc::new(CapturingVerifier::new());
    let mut stream = connect(addr, server_name, Arc::clone(&verifier)).await?;

    let (end_entity, staple) = verifier.take();
    let end_entity = end_entity.ok_or(ProbeError::NoCertificate)?;
    let fingerprint = spki_fingerprint(&end_entity)?;

    let assertion = match staple {
        Some(bytes) if !bytes.is_empty() => Some(TackAssertion::decode(&bytes)?),
        _ => None,
    };
    let pinned = assertion
        .map(|a| a.is_active() && a.target == fingerprint)
        .unwrap_or(false);

    tracing::debug!(
        "Probed {}: fingerprint {}, generation {:?}",
        addr,
        fingerprint.short(),
        assertion.map(|a| a.generation)
    );

    // Close our side so the server's echo worker sees EOF
    if let Err(e) = stream.shutdown().await {
        tracing::debug!("Probe shutdown for {} failed: {}", addr, e);
    }

    Ok(ProbeReport {
        fingerprint,
        assertion,
        pinned,
    })
}

/// Send `payload` over a fresh TLS session and return everything echoed back
pub async fn echo(addr: &str, server_name: &str, payload: &[u8]) -> Result<Vec<u8>, ProbeError> {
    let verifier = Arc::new(CapturingVerifier::new());
    let stream = connect(addr, server_name, verifier).await?;
    let (mut reader, mut writer) = tokio::io::split(stream);

    // Read while writing; the server echoes as it receives.
    let send = async {
        writer.write_all(payload).await?;
        writer.shutdown().await
    };
    let recv = async {
        let mut received = Vec::with_capacity(payload.len());
        reader.read_to_end(&mut received).await?;
        Ok::<_, std::io::Error>(received)
    };

    let ((), received) = tokio::try_join!(send, recv)?;
    Ok(received)
}
