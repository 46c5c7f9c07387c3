//! Proxy error types.

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::warn;

/// Errors from the listener and from forwarding to the backend socket.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// The backend socket could not be dialed.
    #[error("Failed to connect to backend socket {}: {source}", .path.display())]
    Dial {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// HTTP/1.1 setup on the fresh backend connection failed.
    #[error("Backend handshake failed: {0}")]
    Handshake(#[source] hyper::Error),

    /// The backend did not produce a response.
    #[error("Backend request failed: {0}")]
    Request(#[source] hyper::Error),

    /// The TCP listener could not be bound.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
}

/// Backend failures become `502 Bad Gateway` for the original caller.
impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        warn!(error = %self, "Proxy request failed");
        (StatusCode::BAD_GATEWAY, self.to_string()).into_response()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn dial_failure_maps_to_bad_gateway() {
        let err = ProxyError::Dial {
            path: PathBuf::from("/var/run/docker.sock"),
            source: io::Error::from(io::ErrorKind::ConnectionRefused),
        };
        assert!(err.to_string().contains("/var/run/docker.sock"));
        assert_eq!(err.into_response().status(), StatusCode::BAD_GATEWAY);
    }
}
