//! Rotation coordinator between the control service and the TLS echo service
//!
//! The coordinator is a single channel plus a two-step handshake:
//!
//! 1. The control side sends [`ControlRequest::Rotate`] and blocks.
//! 2. The TLS side applies the rotation and answers on the per-request reply
//!    slot with [`ControlReply::Acknowledged`] (or [`ControlReply::Failed`]).
//!
//! # Ordering Model
//!
//! [`RotationHandle`] holds the sender behind an async mutex, and the lock is
//! held from the send until the reply arrives. A second caller therefore
//! cannot get its request onto the channel until the first caller has seen
//! its acknowledgment, which gives:
//!
//! - at most one rotation in flight at any time
//! - rotations applied in the order callers acquired the lock
//! - no lost requests: every caller gets exactly one reply or an error
//!
//! The TLS side never blocks on the channel; it multiplexes `recv` with its
//! accept loop.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot, Mutex};

use tt_protocol::{ControlReply, ControlRequest, RotationAck};

/// Errors seen by the control side of the handshake
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoordinationError {
    /// The TLS echo service is no longer receiving requests
    #[error("TLS service is not running")]
    ServiceStopped,

    /// The request was taken but no reply was sent
    #[error("TLS service dropped the rotation request without replying")]
    NoReply,

    /// The TLS echo service could not install the next pin
    #[error("Rotation failed (generation {active_generation} still active): {reason}")]
    RotationFailed {
        active_generation: u64,
        reason: String,
    },
}

/// A request on its way to the TLS echo service, with its reply slot
#[derive(Debug)]
pub struct RotationEnvelope {
    /// What the control side asked for
    pub request: ControlRequest,
    reply: oneshot::Sender<ControlReply>,
}

impl RotationEnvelope {
    /// Send the reply back to the waiting caller.
    ///
    /// Returns false if the caller stopped waiting.
    pub fn respond(self, reply: ControlReply) -> bool {
        self.reply.send(reply).is_ok()
    }
}

/// Control-side end of the coordination channel
#[derive(Clone)]
pub struct RotationHandle {
    tx: Arc<Mutex<mpsc::Sender<RotationEnvelope>>>,
    // Unlocked clone, so liveness can be read while a rotation holds `tx`
    liveness: mpsc::Sender<RotationEnvelope>,
}

/// TLS-side end of the coordination channel
#[derive(Debug)]
pub struct RotationReceiver {
    rx: mpsc::Receiver<RotationEnvelope>,
}

/// Create a connected handle/receiver pair
pub fn rotation_channel() -> (RotationHandle, RotationReceiver) {
    // Capacity 1: the handle's lock already keeps at most one envelope queued.
    let (tx, rx) = mpsc::channel(1);
    (
        RotationHandle {
            liveness: tx.clone(),
            tx: Arc::new(Mutex::new(tx)),
        },
        RotationReceiver { rx },
    )
}

impl RotationHandle {
    /// Ask the TLS echo service to rotate and wait for the outcome.
    ///
    /// On `Ok`, new TLS handshakes already use the returned generation.
    pub async fn request_rotation(&self) -> Result<RotationAck, CoordinationError> {
        let tx = self.tx.lock().await;

        let (reply_tx, reply_rx) = oneshot::channel();
        let envelope = RotationEnvelope {
            request: ControlRequest::Rotate,
            reply: reply_tx,
        };

        tracing::debug!("Sending rotation request to TLS service");
        tx.send(envelope)
            .await
            .map_err(|_| CoordinationError::ServiceStopped)?;

        let reply = reply_rx.await.map_err(|_| CoordinationError::NoReply)?;
        tracing::debug!("TLS service replied: {:?}", reply);

        match reply {
            ControlReply::Acknowledged(ack) => Ok(ack),
            ControlReply::Failed {
                active_generation,
                reason,
            } => Err(CoordinationError::RotationFailed {
                active_generation,
                reason,
            }),
        }
    }

    /// Whether the TLS side has gone away
    pub fn is_closed(&self) -> bool {
        self.liveness.is_closed()
    }
}

impl RotationReceiver {
    /// Wait for the next request. `None` once every handle is dropped.
    pub async fn recv(&mut self) -> Option<RotationEnvelope> {
        self.rx.recv().await
    }

    /// Take a request if one is already waiting
    pub fn try_recv(&mut self) -> Option<RotationEnvelope> {
        self.rx.try_recv().ok()
    }
}
