//! Certificate manager bound to one storage directory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tracing::info;

use crate::authority::{LeafProfile, generate_ca, issue_leaf};
use crate::bundle::{ClientBundle, PemPair, ServerBundle};
use crate::config::CertConfig;
use crate::error::Result;
use crate::layout::Artifact;
use crate::store;

/// Obtains CA, server and client material for a storage directory,
/// generating whatever is missing.
///
/// Every bundle produced by one directory is signed by that directory's CA.
/// In ephemeral mode generated material lives in this manager only, so
/// bundles from the same manager still share a CA.
#[derive(Debug)]
pub struct CertManager {
    dir: PathBuf,
    config: CertConfig,
    remembered: Mutex<HashMap<Artifact, PemPair>>,
}

impl CertManager {
    pub fn new(dir: impl Into<PathBuf>, config: CertConfig) -> Self {
        Self {
            dir: dir.into(),
            config,
            remembered: Mutex::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub const fn config(&self) -> &CertConfig {
        &self.config
    }

    /// Load the CA pair, or generate and store a new self-signed one.
    ///
    /// Cached files are returned byte for byte. If only one of `ca.pem` and
    /// `ca-key.pem` exists, the not-found error for the other is returned.
    pub fn obtain_ca(&self) -> Result<PemPair> {
        self.obtain(Artifact::Ca, || generate_ca(&self.config))
    }

    /// Obtain the CA, then load or issue the server leaf for `hosts`.
    ///
    /// A cached server certificate is returned as is, even when it was issued
    /// for a different host list than `hosts`. Remove `server.pem` and
    /// `server-key.pem` to reissue.
    pub fn obtain_server_bundle<S: AsRef<str>>(&self, hosts: &[S]) -> Result<ServerBundle> {
        let ca = self.obtain_ca()?;
        let hosts: Vec<String> = hosts.iter().map(|h| h.as_ref().to_owned()).collect();

        let leaf = self.obtain(Artifact::Server, || {
            let leaf = issue_leaf(&ca, LeafProfile::Server { hosts: &hosts }, &self.config)?;
            info!(?hosts, "Issued server certificate");
            Ok(leaf)
        })?;
        Ok(ServerBundle::new(ca.cert, leaf))
    }

    /// Obtain the CA, then load or issue the client leaf.
    pub fn obtain_client_bundle(&self) -> Result<ClientBundle> {
        let ca = self.obtain_ca()?;
        let leaf = self.obtain(Artifact::Client, || {
            issue_leaf(&ca, LeafProfile::Client, &self.config)
        })?;
        Ok(ClientBundle::new(ca.cert, leaf))
    }

    fn obtain<F>(&self, artifact: Artifact, generate: F) -> Result<PemPair>
    where
        F: FnOnce() -> Result<PemPair>,
    {
        if !self.config.ephemeral {
            return store::load_or_generate(&self.dir, artifact, true, generate);
        }

        store::load_or_generate(&self.dir, artifact, false, || {
            let mut remembered = self
                .remembered
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(pair) = remembered.get(&artifact) {
                return Ok(pair.clone());
            }
            let pair = generate()?;
            info!(kind = artifact.label(), "Generated ephemeral certificate");
            remembered.insert(artifact, pair.clone());
            Ok(pair)
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::fs;
    use std::io;

    use super::*;
    use crate::config::KeyAlgorithm;
    use crate::error::CertError;

    fn manager(dir: &Path) -> CertManager {
        CertManager::new(dir, CertConfig::default())
    }

    #[test]
    fn obtain_ca_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let m = manager(dir.path());

        let first = m.obtain_ca().unwrap();
        let second = m.obtain_ca().unwrap();
        assert_eq!(first, second);

        let fresh = manager(dir.path()).obtain_ca().unwrap();
        assert_eq!(first, fresh);
    }

    #[test]
    fn obtain_ca_returns_cached_bytes_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("ca.pem"), b"opaque cert").unwrap();
        fs::write(dir.path().join("ca-key.pem"), b"opaque key").unwrap();

        let ca = manager(dir.path()).obtain_ca().unwrap();
        assert_eq!(ca.cert, b"opaque cert");
        assert_eq!(ca.key, b"opaque key");
    }

    #[test]
    fn lone_ca_key_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("ca-key.pem"), b"key").unwrap();

        let err = manager(dir.path()).obtain_ca().unwrap_err();
        assert_eq!(err.io_error().unwrap().kind(), io::ErrorKind::NotFound);
        // nothing regenerated
        assert!(!dir.path().join("ca.pem").exists());
        assert_eq!(fs::read(dir.path().join("ca-key.pem")).unwrap(), b"key");
    }

    #[test]
    fn server_bundle_is_stable_across_host_changes() {
        let dir = tempfile::tempdir().unwrap();
        let m = manager(dir.path());

        let first = m.obtain_server_bundle(&["127.0.0.1"]).unwrap();
        let second = m.obtain_server_bundle(&["10.9.9.9", "other.example"]).unwrap();
        assert_eq!(first, second);
        first.tls_config().unwrap();
    }

    #[test]
    fn client_bundle_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let m = manager(dir.path());

        let first = m.obtain_client_bundle().unwrap();
        let second = m.obtain_client_bundle().unwrap();
        assert_eq!(first, second);
        first.tls_config().unwrap();
    }

    #[test]
    fn bundles_share_the_directory_ca() {
        let dir = tempfile::tempdir().unwrap();
        let m = manager(dir.path());

        let server = m.obtain_server_bundle(&["localhost"]).unwrap();
        let client = m.obtain_client_bundle().unwrap();
        let ca = m.obtain_ca().unwrap();
        assert_eq!(server.ca_cert, client.ca_cert);
        assert_eq!(server.ca_cert, ca.cert);
    }

    #[test]
    fn all_six_files_are_written() {
        let dir = tempfile::tempdir().unwrap();
        let m = manager(dir.path());
        m.obtain_server_bundle(&["localhost"]).unwrap();
        m.obtain_client_bundle().unwrap();

        for name in [
            "ca.pem",
            "ca-key.pem",
            "server.pem",
            "server-key.pem",
            "cert.pem",
            "key.pem",
        ] {
            assert!(dir.path().join(name).exists(), "{name} missing");
        }
    }

    #[test]
    fn ephemeral_mode_writes_nothing_and_shares_ca() {
        let dir = tempfile::tempdir().unwrap();
        let m = CertManager::new(
            dir.path(),
            CertConfig::ephemeral().with_key_algorithm(KeyAlgorithm::Ed25519),
        );

        let server = m.obtain_server_bundle(&["localhost"]).unwrap();
        let client = m.obtain_client_bundle().unwrap();
        assert_eq!(server.ca_cert, client.ca_cert);
        assert_eq!(m.obtain_ca().unwrap().cert, server.ca_cert);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn ephemeral_managers_are_independent() {
        let dir = tempfile::tempdir().unwrap();
        let a = CertManager::new(dir.path(), CertConfig::ephemeral());
        let b = CertManager::new(dir.path(), CertConfig::ephemeral());
        assert_ne!(a.obtain_ca().unwrap(), b.obtain_ca().unwrap());
    }

    #[test]
    fn ephemeral_mode_still_reads_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let persisted = manager(dir.path()).obtain_ca().unwrap();

        let m = CertManager::new(dir.path(), CertConfig::ephemeral());
        assert_eq!(m.obtain_ca().unwrap(), persisted);
    }

    #[test]
    fn corrupt_cached_leaf_fails_tls_config() {
        let dir = tempfile::tempdir().unwrap();
        let m = manager(dir.path());
        m.obtain_client_bundle().unwrap();
        fs::write(dir.path().join("cert.pem"), b"garbage").unwrap();

        let bundle = m.obtain_client_bundle().unwrap();
        let err = bundle.tls_config().unwrap_err();
        assert!(matches!(err, CertError::Pem { .. }), "{err}");
    }

    #[test]
    fn corrupt_cached_ca_fails_leaf_issue() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("ca.pem"), b"garbage").unwrap();
        fs::write(dir.path().join("ca-key.pem"), b"garbage").unwrap();

        let err = manager(dir.path()).obtain_client_bundle().unwrap_err();
        assert!(!err.is_storage(), "{err}");
        assert!(!dir.path().join("cert.pem").exists());
    }
}
