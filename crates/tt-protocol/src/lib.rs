//! tt-protocol: Wire-level types for the TACK rotation testbed
//!
//! This crate defines the pieces that cross a boundary: the certificate
//! fingerprint used as the pinning key, the trust-assertion payload carried
//! in the TLS handshake, and the messages exchanged between the control
//! service and the TLS echo service.

pub mod assertion;
pub mod control;
pub mod error;
pub mod fingerprint;

pub use assertion::{TackAssertion, ACTIVATION_ENABLED, ASSERTION_SIZE, ASSERTION_VERSION};
pub use control::{ControlCommand, ControlReply, ControlRequest, RotationAck, NEXT_OK, NEXT_PATH};
pub use error::ProtocolError;
pub use fingerprint::{Fingerprint, FINGERPRINT_SIZE};
