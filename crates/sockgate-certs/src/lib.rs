//! `sockgate` certificate lifecycle.
//!
//! Produces and caches the three kinds of material the proxy needs, all
//! rooted in one self-signed CA per storage directory:
//!
//! | Artifact | Files |
//! |---|---|
//! | CA | `ca.pem`, `ca-key.pem` |
//! | Server leaf | `server.pem`, `server-key.pem` |
//! | Client leaf | `cert.pem`, `key.pem` |
//!
//! Material is generated on first use and read back verbatim afterwards.
//! The file names match `$DOCKER_CERT_PATH` conventions so the directory can
//! be handed to clients as is.

pub mod authority;
pub mod bundle;
pub mod config;
pub mod error;
pub mod layout;
pub mod manager;
mod store;

pub use bundle::{ClientBundle, PemPair, ServerBundle};
pub use config::{CertConfig, KeyAlgorithm};
pub use error::{CertError, Result};
pub use layout::Artifact;
pub use manager::CertManager;
