//! Certificate public-key fingerprint

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::ProtocolError;

/// Size of a fingerprint in bytes (SHA-256 output)
pub const FINGERPRINT_SIZE: usize = 32;

/// SHA-256 hash of a certificate's SubjectPublicKeyInfo.
///
/// This is the pinning key: every pin record and every trust assertion is
/// bound to exactly one fingerprint.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Fingerprint([u8; FINGERPRINT_SIZE]);

impl Fingerprint {
    /// Wrap raw hash bytes
    pub fn new(bytes: [u8; FINGERPRINT_SIZE]) -> Self {
        Self(bytes)
    }

    /// Hash the DER-encoded SubjectPublicKeyInfo of a certificate
    pub fn from_spki(spki_der: &[u8]) -> Self {
        Self(Sha256::digest(spki_der).into())
    }

    /// Parse a fingerprint from 64 hex characters
    pub fn from_hex(s: &str) -> Result<Self, ProtocolError> {
        let mut bytes = [0u8; FINGERPRINT_SIZE];
        hex::decode_to_slice(s.trim(), &mut bytes)
            .map_err(|_| ProtocolError::InvalidFingerprint(s.to_string()))?;
        Ok(Self(bytes))
    }

    /// Raw hash bytes
    pub fn as_bytes(&self) -> &[u8; FINGERPRINT_SIZE] {
        &self.0
    }

    /// Lowercase hex encoding
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First 8 bytes in hex, for log lines
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.short())
    }
}

impl From<[u8; FINGERPRINT_SIZE]> for Fingerprint {
    fn from(bytes: [u8; FINGERPRINT_SIZE]) -> Self {
        Self(bytes)
    }
}

impl From<Fingerprint> for String {
    fn from(fp: Fingerprint) -> Self {
        fp.to_hex()
    }
}

impl TryFrom<String> for Fingerprint {
    type Error = ProtocolError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_hex(&s)
    }
}
