//! Observable state of the TLS echo service

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{watch, Semaphore};

use tt_protocol::Fingerprint;

/// Where the accept loop currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ServiceState {
    /// Accepting connections under the active pin
    Listening,
    /// Installing the next pin; accepts resume afterwards
    Rotating,
}

/// Snapshot published by the accept loop on every change
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceStatus {
    /// Accept-loop state
    pub state: ServiceState,
    /// Fingerprint of the served certificate
    pub fingerprint: Fingerprint,
    /// Generation of the pin new handshakes receive
    pub generation: u64,
    /// Rotations applied since start
    pub rotations: u64,
    /// Rotations that failed and left the previous pin active
    pub failed_rotations: u64,
}

impl ServiceStatus {
    pub(crate) fn initial(fingerprint: Fingerprint, generation: u64) -> Self {
        Self {
            state: ServiceState::Listening,
            fingerprint,
            generation,
            rotations: 0,
            failed_rotations: 0,
        }
    }
}

/// Read-only view of a running TLS echo service
#[derive(Clone)]
pub struct StatusHandle {
    rx: watch::Receiver<ServiceStatus>,
    limiter: Arc<Semaphore>,
    max_connections: usize,
}

impl StatusHandle {
    pub(crate) fn new(
        rx: watch::Receiver<ServiceStatus>,
        limiter: Arc<Semaphore>,
        max_connections: usize,
    ) -> Self {
        Self {
            rx,
            limiter,
            max_connections,
        }
    }

    /// Latest published status
    pub fn snapshot(&self) -> ServiceStatus {
        self.rx.borrow().clone()
    }

    /// Generation of the pin new handshakes receive
    pub fn generation(&self) -> u64 {
        self.rx.borrow().generation
    }

    /// Number of TLS connections currently being served
    pub fn active_connections(&self) -> usize {
        self.max_connections
            .saturating_sub(self.limiter.available_permits())
    }

    /// Connection cap
    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    /// Wait until the service publishes a status matching `pred`.
    ///
    /// Returns the matching status, or `None` if the service stopped first.
    pub async fn wait_for<F>(&mut self, mut pred: F) -> Option<ServiceStatus>
    where
        F: FnMut(&ServiceStatus) -> bool,
    {
        self.rx.wait_for(|s| pred(s)).await.ok().map(|s| s.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> (watch::Sender<ServiceStatus>, Arc<Semaphore>, StatusHandle) {
        let (tx, rx) = watch::channel(ServiceStatus::initial(
            Fingerprint::from_spki(b"leaf"),
            1,
        ));
        let limiter = Arc::new(Semaphore::new(4));
        let handle = StatusHandle::new(rx, Arc::clone(&limiter), 4);
        (tx, limiter, handle)
    }

    #[test]
    fn test_active_connections_from_permits() {
        let (_tx, limiter, handle) = handle();
        assert_eq!(handle.active_connections(), 0);

        let a = Arc::clone(&limiter).try_acquire_owned().unwrap();
        let _b = Arc::clone(&limiter).try_acquire_owned().unwrap();
        assert_eq!(handle.active_connections(), 2);

        drop(a);
        assert_eq!(handle.active_connections(), 1);
        assert_eq!(handle.max_connections(), 4);
    }

    #[tokio::test]
    async fn test_wait_for_generation() {
        let (tx, _limiter, mut handle) = handle();

        tokio::spawn(async move {
            tx.send_modify(|s| {
                s.generation = 2;
                s.rotations = 1;
            });
            // Keep the sender alive until the waiter has seen the update
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        });

        let status = handle.wait_for(|s| s.generation == 2).await.unwrap();
        assert_eq!(status.rotations, 1);
        assert_eq!(handle.generation(), 2);
    }

    #[tokio::test]
    async fn test_wait_for_stopped_service() {
        let (tx, _limiter, mut handle) = handle();
        drop(tx);

        assert!(handle.wait_for(|s| s.generation == 99).await.is_none());
        // Last value is still readable
        assert_eq!(handle.snapshot().generation, 1);
    }
}
