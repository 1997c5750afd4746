//! TLS echo service accept loop
//!
//! The accept loop owns the pin state and the active listener configuration.
//! It waits on three event sources at once:
//!
//! - a new TCP connection: spawn an echo worker under the current acceptor
//! - a rotation request: issue the next pin, install a new acceptor, reply
//! - cancellation: stop accepting
//!
//! Rotation happens between accepts on the same bound socket, so the listener
//! never goes away. Workers already running keep the acceptor they started
//! with; the superseded configuration is freed when the last of them exits.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, Semaphore};
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;

use tt_core::{PinRecord, PinState};
use tt_protocol::{ControlReply, ControlRequest, RotationAck};

use crate::coordinator::{RotationEnvelope, RotationReceiver};
use crate::state::{ServiceState, ServiceStatus, StatusHandle};
use crate::tls::echo::serve_connection;
use crate::tls::identity::{IdentityError, ServerIdentity};

/// Runtime limits for the accept loop
#[derive(Debug, Clone)]
pub struct ServiceOptions {
    /// Maximum number of concurrently served connections
    pub max_connections: usize,
    /// Pause after a failed accept
    pub accept_backoff: Duration,
    /// Deadline for a client to complete the TLS handshake
    pub handshake_timeout: Duration,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            max_connections: 1024,
            accept_backoff: Duration::from_millis(50),
            handshake_timeout: Duration::from_secs(10),
        }
    }
}

/// TLS echo service presenting a rotating trust assertion
pub struct TlsEchoService {
    /// Certificate and key, fixed for the process lifetime
    identity: ServerIdentity,
    /// Pin generator; only this service ever rotates it
    pins: PinState,
    /// Record new handshakes receive
    active: PinRecord,
    /// Listener configuration built from `active`
    acceptor: TlsAcceptor,
    /// Rotation requests from the control service
    requests: RotationReceiver,
    /// Connection cap
    limiter: Arc<Semaphore>,
    options: ServiceOptions,
    status_tx: watch::Sender<ServiceStatus>,
    status: StatusHandle,
    cancel: CancellationToken,
}

impl TlsEchoService {
    /// Issue the first pin record and build the initial configuration.
    ///
    /// Any failure here is a startup failure; the caller is expected to
    /// abort.
    pub fn new(
        identity: ServerIdentity,
        mut pins: PinState,
        requests: RotationReceiver,
        options: ServiceOptions,
        cancel: CancellationToken,
    ) -> anyhow::Result<Self> {
        let fingerprint = identity.fingerprint();
        let active = pins.initialize(fingerprint)?;
        let config = identity.server_config(&active)?;

        tracing::info!(
            "Serving certificate {} at pin generation {}",
            fingerprint,
            active.generation
        );

        let limiter = Arc::new(Semaphore::new(options.max_connections));
        let (status_tx, status_rx) =
            watch::channel(ServiceStatus::initial(fingerprint, active.generation));
        let status = StatusHandle::new(status_rx, Arc::clone(&limiter), options.max_connections);

        Ok(Self {
            identity,
            pins,
            active,
            acceptor: TlsAcceptor::from(config),
            requests,
            limiter,
            options,
            status_tx,
            status,
            cancel,
        })
    }

    /// Handle for observing this service once it runs
    pub fn status(&self) -> StatusHandle {
        self.status.clone()
    }

    /// Record new handshakes receive
    pub fn active_record(&self) -> &PinRecord {
        &self.active
    }

    /// Run the accept loop on `listener` until cancelled
    pub async fn run(mut self, listener: TcpListener) -> anyhow::Result<()> {
        let local_addr = listener.local_addr()?;
        tracing::info!("TLS echo service listening on {}", local_addr);

        let mut control_open = true;

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!("TLS echo service shutting down");
                    break;
                }

                request = self.requests.recv(), if control_open => {
                    match request {
                        Some(envelope) => self.handle_request(envelope),
                        None => {
                            tracing::warn!("Coordination channel closed; pin rotation disabled");
                            control_open = false;
                        }
                    }
                }

                result = listener.accept() => {
                    match result {
                        Ok((socket, peer_addr)) => self.handle_connection(socket, peer_addr),
                        Err(e) => {
                            tracing::error!("Failed to accept connection: {}", e);
                            if !self.accept_backoff().await {
                                tracing::info!("TLS echo service shutting down");
                                break;
                            }
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Sleep for the accept backoff. Returns false if cancelled meanwhile.
    async fn accept_backoff(&self) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(self.options.accept_backoff) => true,
        }
    }

    fn handle_request(&mut self, envelope: RotationEnvelope) {
        let reply = match envelope.request {
            ControlRequest::Rotate => self.rotate(),
        };

        if !envelope.respond(reply) {
            tracing::warn!("Rotation requester went away before the reply");
        }
    }

    /// Move to the next pin and swap the acceptor.
    ///
    /// On failure the current acceptor stays in place.
    fn rotate(&mut self) -> ControlReply {
        self.set_state(ServiceState::Rotating);

        let fingerprint = self.identity.fingerprint();
        let installed = self
            .pins
            .rotate(fingerprint)
            .map_err(|e| e.to_string())
            .and_then(|record| {
                self.identity
                    .server_config(&record)
                    .map(|config| (record, config))
                    .map_err(|e: IdentityError| e.to_string())
            });

        let reply = match installed {
            Ok((record, config)) => {
                let previous = self.active.generation;
                self.acceptor = TlsAcceptor::from(config);
                self.active = record;

                tracing::info!(
                    "Pin rotated: generation {} -> {}",
                    previous,
                    self.active.generation
                );

                let generation = self.active.generation;
                self.status_tx.send_modify(|s| {
                    s.generation = generation;
                    s.rotations += 1;
                });

                ControlReply::Acknowledged(RotationAck {
                    fingerprint,
                    generation,
                })
            }
            Err(reason) => {
                tracing::error!(
                    "Pin rotation failed, keeping generation {}: {}",
                    self.active.generation,
                    reason
                );
                self.status_tx.send_modify(|s| s.failed_rotations += 1);

                ControlReply::Failed {
                    active_generation: self.active.generation,
                    reason,
                }
            }
        };

        self.set_state(ServiceState::Listening);
        reply
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        let permit = match Arc::clone(&self.limiter).try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                tracing::warn!(
                    "Connection limit ({}) reached, dropping connection from {}",
                    self.options.max_connections,
                    peer_addr
                );
                return;
            }
        };

        tracing::info!("New connection from {}", peer_addr);

        tokio::spawn(serve_connection(
            self.acceptor.clone(),
            socket,
            peer_addr,
            self.active.generation,
            self.options.handshake_timeout,
            self.cancel.clone(),
            permit,
        ));
    }

    fn set_state(&self, state: ServiceState) {
        self.status_tx.send_modify(|s| s.state = state);
    }
}
