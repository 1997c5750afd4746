//! HTTP handler and serve loop for the control service

use std::borrow::Cow;

use axum::{
    extract::State,
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use percent_encoding::percent_decode_str;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use tt_protocol::{ControlCommand, NEXT_OK};

use crate::coordinator::RotationHandle;

/// Shared state for control handlers
#[derive(Clone)]
pub struct ControlState {
    /// Control-side end of the coordination channel
    pub rotations: RotationHandle,
}

/// Build the control router.
///
/// Every path and method lands in the same handler, which looks at the
/// percent-decoded request path.
pub fn create_router(state: ControlState) -> Router {
    Router::new().fallback(dispatch).with_state(state)
}

/// Serve `router` on `listener` until `cancel` fires
pub async fn serve(
    listener: TcpListener,
    router: Router,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    tracing::info!("Control service listening on {}", listener.local_addr()?);

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;

    tracing::info!("Control service stopped");
    Ok(())
}

/// Percent-decode a request path, keeping it raw if it does not decode to UTF-8
fn decode_path(path: &str) -> Cow<'_, str> {
    percent_decode_str(path)
        .decode_utf8()
        .unwrap_or(Cow::Borrowed(path))
}

async fn dispatch(State(state): State<ControlState>, uri: Uri) -> Response {
    match ControlCommand::from_path(&decode_path(uri.path())) {
        ControlCommand::Next => next(&state).await,
        ControlCommand::Unknown(request) => {
            tracing::debug!("Unknown control request {:?}", request);
            ControlCommand::unknown_response(&request).into_response()
        }
    }
}

/// Rotate and wait for the TLS echo service to confirm
async fn next(state: &ControlState) -> Response {
    match state.rotations.request_rotation().await {
        Ok(ack) => {
            tracing::info!("Rotation to generation {} acknowledged", ack.generation);
            NEXT_OK.into_response()
        }
        Err(e) => {
            tracing::error!("Rotation request failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::{rotation_channel, RotationReceiver};
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;
    use tt_protocol::{ControlReply, Fingerprint, RotationAck};

    fn router() -> (Router, RotationReceiver) {
        let (rotations, rx) = rotation_channel();
        (create_router(ControlState { rotations }), rx)
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_next_waits_for_acknowledgment() {
        let (app, mut rx) = router();
        tokio::spawn(async move {
            let envelope = rx.recv().await.unwrap();
            envelope.respond(ControlReply::Acknowledged(RotationAck {
                fingerprint: Fingerprint::from_spki(b"leaf"),
                generation: 2,
            }));
        });

        let (status, body) = get(app, "/next").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "OK next");
    }

    #[tokio::test]
    async fn test_next_reports_failed_rotation() {
        let (app, mut rx) = router();
        tokio::spawn(async move {
            let envelope = rx.recv().await.unwrap();
            envelope.respond(ControlReply::Failed {
                active_generation: 3,
                reason: "builder offline".to_string(),
            });
        });

        let (status, body) = get(app, "/next").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.contains("generation 3"));
        assert!(body.contains("builder offline"));
    }

    #[tokio::test]
    async fn test_next_without_tls_service() {
        let (app, rx) = router();
        drop(rx);

        let (status, body) = get(app, "/next").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "TLS service is not running");
    }

    #[tokio::test]
    async fn test_unknown_path_is_greeted() {
        let (app, _rx) = router();

        let (status, body) = get(app, "/bogus").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "Hi there, I don't know \"bogus\"!");
    }

    #[tokio::test]
    async fn test_root_path_is_greeted_with_empty_name() {
        let (app, _rx) = router();

        let (_, body) = get(app, "/").await;
        assert_eq!(body, "Hi there, I don't know \"\"!");
    }

    #[tokio::test]
    async fn test_unknown_path_is_decoded() {
        let (app, _rx) = router();

        let (_, body) = get(app, "/a%20b").await;
        assert_eq!(body, "Hi there, I don't know \"a b\"!");
    }

    #[tokio::test]
    async fn test_encoded_next_rotates() {
        let (app, mut rx) = router();
        let responder = tokio::spawn(async move {
            let envelope = rx.recv().await.unwrap();
            envelope.respond(ControlReply::Acknowledged(RotationAck {
                fingerprint: Fingerprint::from_spki(b"leaf"),
                generation: 2,
            }));
        });

        let (status, body) = get(app, "/%6Eext").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "OK next");
        responder.await.unwrap();
    }

    #[test]
    fn test_decode_path_keeps_invalid_utf8_raw() {
        assert_eq!(decode_path("/%6Eext"), "/next");
        assert_eq!(decode_path("/plain"), "/plain");
        assert_eq!(decode_path("/%FF%FE"), "/%FF%FE");
    }

    #[tokio::test]
    async fn test_next_with_suffix_is_unknown() {
        let (app, _rx) = router();

        let (_, body) = get(app, "/next/").await;
        assert_eq!(body, "Hi there, I don't know \"next/\"!");
    }
}
