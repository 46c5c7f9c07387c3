//! Request forwarding over a Unix domain socket.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::response::Response;
use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;
use tokio::net::UnixStream;
use tracing::debug;

use crate::error::ProxyError;

/// Transparent HTTP proxy whose only upstream is a Unix socket.
///
/// Method, URI, headers and body pass through unchanged in both directions.
/// Every request dials the socket anew; the connection is dropped once the
/// response body has been relayed.
#[derive(Debug, Clone)]
pub struct UnixSocketProxy {
    socket_path: Arc<PathBuf>,
}

impl UnixSocketProxy {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: Arc::new(socket_path.into()),
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Router that sends every request, whatever its method or path, to
    /// [`forward`](Self::forward).
    pub fn router(self) -> Router {
        Router::new().fallback(proxy_handler).with_state(self)
    }

    /// Send `req` to the backend over a fresh connection and return its
    /// response.
    pub async fn forward(&self, req: Request) -> Result<Response, ProxyError> {
        let stream = UnixStream::connect(self.socket_path.as_path())
            .await
            .map_err(|source| ProxyError::Dial {
                path: self.socket_path.to_path_buf(),
                source,
            })?;

        let (mut sender, conn) = http1::handshake(TokioIo::new(stream))
            .await
            .map_err(ProxyError::Handshake)?;
        // Runs until the response body is done, then closes the socket.
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                debug!(error = %e, "Backend connection ended with error");
            }
        });

        let method = req.method().clone();
        let uri = req.uri().clone();
        let response = sender
            .send_request(req)
            .await
            .map_err(ProxyError::Request)?;
        debug!(%method, %uri, status = %response.status(), "Forwarded request");

        Ok(response.map(Body::new))
    }
}

async fn proxy_handler(
    State(proxy): State<UnixSocketProxy>,
    req: Request,
) -> Result<Response, ProxyError> {
    proxy.forward(req).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::StatusCode;
    use tower::ServiceExt;

    use super::*;

    #[tokio::test]
    async fn missing_socket_is_bad_gateway() {
        let dir = tempfile::tempdir().unwrap();
        let proxy = UnixSocketProxy::new(dir.path().join("absent.sock"));
        assert_eq!(proxy.socket_path(), dir.path().join("absent.sock"));

        let resp = proxy
            .router()
            .oneshot(Request::builder().uri("/_ping").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn forward_reports_dial_error() {
        let dir = tempfile::tempdir().unwrap();
        let proxy = UnixSocketProxy::new(dir.path().join("absent.sock"));

        let err = proxy
            .forward(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::Dial { .. }), "{err}");
    }
}
