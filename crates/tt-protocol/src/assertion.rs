//! Trust-assertion payload encoding/decoding
//!
//! The testbed carries an unsigned TACK-style record in the TLS handshake.
//! Signing is owned by an external assertion library; this layout only binds
//! a generation number to a target fingerprint.
//!
//! Layout (46 bytes, big-endian):
//! - magic: 4 bytes ("TACK")
//! - version: 1 byte
//! - activation_flags: 1 byte
//! - generation: 8 bytes (u64)
//! - target_hash: 32 bytes (SHA-256 of the SubjectPublicKeyInfo)

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::fingerprint::{Fingerprint, FINGERPRINT_SIZE};

/// Record magic
pub const ASSERTION_MAGIC: &[u8; 4] = b"TACK";

/// Current record version
pub const ASSERTION_VERSION: u8 = 1;

/// Activation flag marking the assertion as active
pub const ACTIVATION_ENABLED: u8 = 0x01;

/// Encoded record size in bytes
pub const ASSERTION_SIZE: usize = 4 + 1 + 1 + 8 + FINGERPRINT_SIZE;

/// A single trust assertion binding a generation to a fingerprint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TackAssertion {
    /// Activation flags
    pub activation_flags: u8,
    /// Pin generation this assertion belongs to
    pub generation: u64,
    /// Fingerprint of the pinned public key
    pub target: Fingerprint,
}

impl TackAssertion {
    /// Create an active assertion
    pub fn new(target: Fingerprint, generation: u64) -> Self {
        Self {
            activation_flags: ACTIVATION_ENABLED,
            generation,
            target,
        }
    }

    /// Whether the active flag is set
    pub fn is_active(&self) -> bool {
        self.activation_flags & ACTIVATION_ENABLED != 0
    }

    /// Encode into a new buffer
    pub fn encode(&self) -> Bytes {
        let mut dst = BytesMut::with_capacity(ASSERTION_SIZE);
        dst.put_slice(ASSERTION_MAGIC);
        dst.put_u8(ASSERTION_VERSION);
        dst.put_u8(self.activation_flags);
        dst.put_u64(self.generation);
        dst.put_slice(self.target.as_bytes());
        dst.freeze()
    }

    /// Decode a record.
    ///
    /// Trailing bytes after the fixed-size record are ignored so a signature
    /// block appended by an external signer does not break readers.
    pub fn decode(src: &[u8]) -> Result<Self, ProtocolError> {
        if src.len() < ASSERTION_SIZE {
            return Err(ProtocolError::Truncated {
                expected: ASSERTION_SIZE,
                actual: src.len(),
            });
        }

        let mut buf = src;
        if buf[..4] != ASSERTION_MAGIC[..] {
            return Err(ProtocolError::InvalidMagic);
        }
        buf.advance(4);

        let version = buf.get_u8();
        if version != ASSERTION_VERSION {
            return Err(ProtocolError::UnsupportedVersion(version));
        }

        let activation_flags = buf.get_u8();
        let generation = buf.get_u64();
        let mut target = [0u8; FINGERPRINT_SIZE];
        buf.copy_to_slice(&mut target);

        Ok(Self {
            activation_flags,
            generation,
            target: Fingerprint::new(target),
        })
    }
}
