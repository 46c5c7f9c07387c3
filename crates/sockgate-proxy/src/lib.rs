//! `sockgate` reverse proxy.
//!
//! Terminates TLS on a TCP listener and forwards every HTTP request,
//! untouched, to a backend that only listens on a Unix domain socket
//! (typically `/var/run/docker.sock`). Each request gets its own backend
//! connection; nothing is pooled.

pub mod error;
pub mod forwarder;
pub mod server;

pub use error::ProxyError;
pub use forwarder::UnixSocketProxy;
pub use server::TlsServer;
