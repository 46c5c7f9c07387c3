//! TLS listener serving HTTP/1.1.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;
use hyper_util::service::TowerToHyperService;
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsAcceptor;
use tracing::{debug, info, warn};

use crate::error::ProxyError;

/// Pause after a failed `accept` so persistent errors (EMFILE) do not spin.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// TCP listener that terminates TLS and hands each connection to a router.
///
/// Connections are served concurrently, one task each. A failed handshake or
/// broken connection is logged and does not affect the others.
pub struct TlsServer {
    listener: TcpListener,
    acceptor: TlsAcceptor,
}

impl TlsServer {
    /// Bind `addr` with the given TLS configuration. ALPN is set to
    /// `http/1.1`.
    pub async fn bind(addr: SocketAddr, mut tls: rustls::ServerConfig) -> Result<Self, ProxyError> {
        tls.alpn_protocols = vec![b"http/1.1".to_vec()];

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ProxyError::Bind { addr, source })?;
        if let Ok(local) = listener.local_addr() {
            info!(addr = %local, "TLS listener bound");
        }

        Ok(Self {
            listener,
            acceptor: TlsAcceptor::from(Arc::new(tls)),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve `app` until the process exits.
    pub async fn serve(self, app: Router) {
        self.serve_with_shutdown(app, std::future::pending()).await;
    }

    /// Serve `app` until `shutdown` resolves. In-flight connections are left
    /// to finish on their own tasks.
    pub async fn serve_with_shutdown<F>(self, app: Router, shutdown: F)
    where
        F: Future<Output = ()> + Send,
    {
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!("Listener shutting down");
                    return;
                }
                accepted = self.listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            backoff_after_accept_error(&e).await;
                            continue;
                        }
                    };
                    tokio::spawn(handle_connection(
                        stream,
                        peer,
                        self.acceptor.clone(),
                        app.clone(),
                    ));
                }
            }
        }
    }
}

async fn backoff_after_accept_error(error: &io::Error) {
    warn!(%error, retry_in = ?ACCEPT_ERROR_BACKOFF, "Failed to accept connection");
    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
}

async fn handle_connection(stream: TcpStream, peer: SocketAddr, acceptor: TlsAcceptor, app: Router) {
    let tls = match acceptor.accept(stream).await {
        Ok(tls) => tls,
        Err(e) => {
            debug!(%peer, error = %e, "TLS handshake failed");
            return;
        }
    };
    debug!(%peer, "Accepted TLS connection");

    let service = TowerToHyperService::new(app);
    if let Err(e) = http1::Builder::new()
        .serve_connection(TokioIo::new(tls), service)
        .await
    {
        debug!(%peer, error = %e, "Connection closed with error");
    }
}
