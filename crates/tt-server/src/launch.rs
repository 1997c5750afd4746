//! Testbed launch
//!
//! Wires both services together from a [`TestbedConfig`]: loads the server
//! identity, binds both endpoints, issues the first pin and spawns the two
//! service tasks. Anything failing here is a startup failure.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use tt_core::config::TestbedConfig;
use tt_core::PinState;

use crate::control::{self, ControlState};
use crate::coordinator::{rotation_channel, RotationHandle};
use crate::state::StatusHandle;
use crate::tls::{ServerIdentity, ServiceOptions, TlsEchoService};

/// Cancel `cancel` on Ctrl+C or SIGTERM
pub fn shutdown_on_signal(cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        let terminate = async {
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install signal handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                tracing::info!("Received Ctrl+C, initiating shutdown...");
            }
            _ = terminate => {
                tracing::info!("Received SIGTERM, initiating shutdown...");
            }
            _ = cancel.cancelled() => return,
        }

        cancel.cancel();
    })
}

/// A running testbed: the TLS echo service plus its control service
pub struct Testbed {
    tls_addr: SocketAddr,
    control_addr: SocketAddr,
    status: StatusHandle,
    rotations: RotationHandle,
    cancel: CancellationToken,
    tls_task: JoinHandle<Result<()>>,
    control_task: JoinHandle<Result<()>>,
}

impl Testbed {
    /// Start both services with the default unsigned assertion builder
    pub async fn start(config: &TestbedConfig, cancel: CancellationToken) -> Result<Self> {
        Self::start_with_pins(config, PinState::new(), cancel).await
    }

    /// Start both services issuing pins from `pins`
    pub async fn start_with_pins(
        config: &TestbedConfig,
        pins: PinState,
        cancel: CancellationToken,
    ) -> Result<Self> {
        config.validate().context("Invalid testbed configuration")?;
        let (cert_path, key_path) = config.identity_paths()?;

        let identity = ServerIdentity::load(cert_path, key_path)
            .context("Failed to load server certificate and key")?;

        let tls_listener = TcpListener::bind(&config.tls_bind)
            .await
            .with_context(|| format!("Failed to bind TLS listener to {}", config.tls_bind))?;
        let tls_addr = tls_listener.local_addr()?;

        let control_listener = TcpListener::bind(&config.control_bind)
            .await
            .with_context(|| format!("Failed to bind control listener to {}", config.control_bind))?;
        let control_addr = control_listener.local_addr()?;

        let (rotations, requests) = rotation_channel();
        let options = ServiceOptions {
            max_connections: config.max_connections as usize,
            accept_backoff: config.accept_backoff,
            handshake_timeout: config.handshake_timeout,
        };

        let service = TlsEchoService::new(identity, pins, requests, options, cancel.clone())
            .context("Failed to install initial pin")?;
        let status = service.status();

        tracing::info!("TLS server launched on {}", tls_addr);
        let tls_task = tokio::spawn(service.run(tls_listener));

        let router = control::create_router(ControlState {
            rotations: rotations.clone(),
        });
        tracing::info!("Control server launched on {}", control_addr);
        let control_task = tokio::spawn(control::serve(control_listener, router, cancel.clone()));

        Ok(Self {
            tls_addr,
            control_addr,
            status,
            rotations,
            cancel,
            tls_task,
            control_task,
        })
    }

    /// Bound address of the TLS echo service
    pub fn tls_addr(&self) -> SocketAddr {
        self.tls_addr
    }

    /// Bound address of the control service
    pub fn control_addr(&self) -> SocketAddr {
        self.control_addr
    }

    /// Status of the TLS echo service
    pub fn status(&self) -> StatusHandle {
        self.status.clone()
    }

    /// Trigger rotations in-process, without going through HTTP
    pub fn rotations(&self) -> RotationHandle {
        self.rotations.clone()
    }

    /// Ask both services to stop
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Run until either service stops, then stop the other one too
    pub async fn wait(self) -> Result<()> {
        let Self {
            cancel,
            mut tls_task,
            mut control_task,
            ..
        } = self;

        let (first, remaining) = tokio::select! {
            result = &mut tls_task => ((result, "TLS echo service"), (control_task, "control service")),
            result = &mut control_task => ((result, "control service"), (tls_task, "TLS echo service")),
        };

        if !cancel.is_cancelled() {
            tracing::warn!("{} stopped; shutting down the testbed", first.1);
            cancel.cancel();
        }

        let (task, name) = remaining;
        let second = (task.await, name);

        for (result, name) in [first, second] {
            result
                .with_context(|| format!("{} task panicked", name))?
                .with_context(|| format!("{} failed", name))?;
        }

        Ok(())
    }
}
