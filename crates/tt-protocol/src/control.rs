//! Control-plane messages
//!
//! Two layers live here:
//!
//! - [`ControlCommand`] is what an external caller asked for, parsed from the
//!   request path of the control endpoint.
//! - [`ControlRequest`] / [`ControlReply`] travel over the coordination
//!   channel between the control service and the TLS echo service. They are
//!   closed enums; there is no "unknown token" a receiver could see.

use serde::{Deserialize, Serialize};

use crate::fingerprint::Fingerprint;

/// Path segment that triggers a rotation
pub const NEXT_PATH: &str = "next";

/// Response body for a completed rotation
pub const NEXT_OK: &str = "OK next";

/// A command parsed from a control-endpoint path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    /// Advance to the next pin generation
    Next,
    /// Any other path, kept verbatim (without the leading slash)
    Unknown(String),
}

impl ControlCommand {
    /// Parse a request path such as `/next`
    pub fn from_path(path: &str) -> Self {
        let request = path.strip_prefix('/').unwrap_or(path);
        if request == NEXT_PATH {
            Self::Next
        } else {
            Self::Unknown(request.to_string())
        }
    }

    /// Fallback body for paths the control service does not know
    pub fn unknown_response(request: &str) -> String {
        format!("Hi there, I don't know \"{}\"!", request)
    }
}

/// Request sent from the control service to the TLS echo service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlRequest {
    /// Move to the next pin record and rebuild the listener configuration
    Rotate,
}

/// Details of an applied rotation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationAck {
    /// Fingerprint the new record is bound to
    pub fingerprint: Fingerprint,
    /// Generation now being served
    pub generation: u64,
}

/// Reply sent from the TLS echo service back to the control service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlReply {
    /// The rotation has been applied; new handshakes use the new record
    Acknowledged(RotationAck),
    /// The rotation could not be applied; the previous record is still active
    Failed {
        /// Generation still being served
        active_generation: u64,
        /// Why the new record could not be installed
        reason: String,
    },
}
