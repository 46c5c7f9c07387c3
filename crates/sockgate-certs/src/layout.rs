//! On-disk layout of the certificate directory.

use std::path::{Path, PathBuf};

/// Advisory lock file taken while generating and persisting material.
pub const LOCK_FILENAME: &str = ".sockgate.lock";

/// The three kinds of material kept in a certificate directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Artifact {
    Ca,
    Server,
    Client,
}

impl Artifact {
    /// Certificate file name, relative to the storage directory.
    pub const fn cert_filename(self) -> &'static str {
        match self {
            Self::Ca => "ca.pem",
            Self::Server => "server.pem",
            Self::Client => "cert.pem",
        }
    }

    /// Private key file name, relative to the storage directory.
    pub const fn key_filename(self) -> &'static str {
        match self {
            Self::Ca => "ca-key.pem",
            Self::Server => "server-key.pem",
            Self::Client => "key.pem",
        }
    }

    /// Human-readable label used in logs and errors.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Ca => "CA",
            Self::Server => "server",
            Self::Client => "client",
        }
    }

    pub fn paths_in(self, dir: &Path) -> PairPaths {
        PairPaths {
            cert: dir.join(self.cert_filename()),
            key: dir.join(self.key_filename()),
        }
    }
}

/// Absolute paths of one certificate/key pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_are_distinct() {
        let mut names: Vec<&str> = [Artifact::Ca, Artifact::Server, Artifact::Client]
            .iter()
            .flat_map(|a| [a.cert_filename(), a.key_filename()])
            .collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), 6);
    }

    #[test]
    fn client_files_use_docker_names() {
        let paths = Artifact::Client.paths_in(Path::new("/certs"));
        assert_eq!(paths.cert, PathBuf::from("/certs/cert.pem"));
        assert_eq!(paths.key, PathBuf::from("/certs/key.pem"));
    }
}
