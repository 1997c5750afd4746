//! Per-connection echo worker

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::OwnedSemaphorePermit;
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;

/// Copy everything read from `stream` back into it until the peer closes,
/// then shut down the write side. Returns the number of bytes echoed.
pub async fn echo<S>(stream: S) -> std::io::Result<u64>
where
    S: AsyncRead + AsyncWrite,
{
    let (mut reader, mut writer) = tokio::io::split(stream);
    let copied = tokio::io::copy(&mut reader, &mut writer).await?;
    writer.shutdown().await?;
    Ok(copied)
}

/// Handshake under `acceptor` and echo until the peer closes.
///
/// `acceptor` is the configuration that was active when the connection was
/// accepted; a later rotation does not affect this connection. The permit is
/// held for the connection's lifetime, and a client that does not finish the
/// handshake within `handshake_timeout` is dropped.
pub(crate) async fn serve_connection(
    acceptor: TlsAcceptor,
    socket: TcpStream,
    peer_addr: SocketAddr,
    generation: u64,
    handshake_timeout: Duration,
    cancel: CancellationToken,
    _permit: OwnedSemaphorePermit,
) {
    let stream = tokio::select! {
        _ = cancel.cancelled() => {
            tracing::debug!("Handshake with {} cancelled", peer_addr);
            return;
        }
        result = tokio::time::timeout(handshake_timeout, acceptor.accept(socket)) => match result {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                tracing::warn!("TLS handshake with {} failed: {}", peer_addr, e);
                return;
            }
            Err(_) => {
                tracing::warn!(
                    "TLS handshake with {} timed out after {:?}",
                    peer_addr,
                    handshake_timeout
                );
                return;
            }
        }
    };

    tracing::debug!(
        "TLS session with {} established (generation {})",
        peer_addr,
        generation
    );

    let result = tokio::select! {
        _ = cancel.cancelled() => {
            tracing::debug!("Echo for {} cancelled", peer_addr);
            return;
        }
        result = echo(stream) => result,
    };

    match result {
        Ok(bytes) => {
            tracing::info!("Connection from {} closed normally ({} bytes echoed)", peer_addr, bytes);
        }
        Err(e) => {
            tracing::warn!("Connection from {} closed with error: {}", peer_addr, e);
        }
    }
}
