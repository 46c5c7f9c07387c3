//! Certificate lifecycle errors.

use std::io;
use std::path::PathBuf;

/// Result type alias for certificate operations.
pub type Result<T> = std::result::Result<T, CertError>;

/// Errors from loading, generating, persisting or using certificate material.
///
/// Storage failures ([`Read`](Self::Read), [`Write`](Self::Write),
/// [`Lock`](Self::Lock)) carry the underlying I/O error untouched. Everything
/// else means the material itself is unusable.
#[derive(Debug, thiserror::Error)]
pub enum CertError {
    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to lock certificate directory via {}: {source}", .path.display())]
    Lock {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Certificate generation error: {0}")]
    Generation(#[from] rcgen::Error),

    #[error("Invalid PEM for {what}: {reason}")]
    Pem { what: &'static str, reason: String },

    #[error("{what} private key does not match its certificate")]
    KeyMismatch { what: &'static str },

    #[error("TLS configuration error: {0}")]
    Tls(#[from] rustls::Error),
}

impl CertError {
    pub(crate) fn pem(what: &'static str, reason: impl ToString) -> Self {
        Self::Pem {
            what,
            reason: reason.to_string(),
        }
    }

    /// Whether this is a storage problem rather than a material problem.
    pub const fn is_storage(&self) -> bool {
        matches!(
            self,
            Self::Read { .. } | Self::Write { .. } | Self::Lock { .. }
        )
    }

    /// The underlying I/O error, for storage failures.
    pub fn io_error(&self) -> Option<&io::Error> {
        match self {
            Self::Read { source, .. } | Self::Write { source, .. } | Self::Lock { source, .. } => {
                Some(source)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_errors_are_storage_errors() {
        let err = CertError::Read {
            path: PathBuf::from("/certs/ca.pem"),
            source: io::Error::from(io::ErrorKind::NotFound),
        };
        assert!(err.is_storage());
        assert_eq!(
            err.io_error().map(io::Error::kind),
            Some(io::ErrorKind::NotFound)
        );
        assert!(err.to_string().contains("/certs/ca.pem"));
    }

    #[test]
    fn material_errors_are_not_storage_errors() {
        let err = CertError::pem("CA certificate", "no certificates found");
        assert!(!err.is_storage());
        assert!(err.io_error().is_none());

        let err = CertError::KeyMismatch { what: "CA" };
        assert!(!err.is_storage());
    }
}
