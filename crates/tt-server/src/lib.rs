//! tt-server: TLS echo service with rotating TACK pins
//!
//! Two services run side by side. The TLS echo service serves connections
//! under the active pin record and echoes every byte back. The control
//! service exposes `/next`, which asks the TLS service to move to the next
//! pin generation and waits until the new listener configuration is live.
//! The two meet on a single coordination channel (see [`coordinator`]).

pub mod control;
pub mod coordinator;
pub mod launch;
pub mod probe;
pub mod state;
pub mod tls;

pub use coordinator::{rotation_channel, CoordinationError, RotationHandle, RotationReceiver};
pub use launch::Testbed;
pub use state::{ServiceState, ServiceStatus, StatusHandle};
pub use tls::{ServerIdentity, TlsEchoService};
