//! Certificate bundles and the rustls configurations built from them.

use std::fmt;
use std::sync::Arc;

use rustls::crypto::CryptoProvider;
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::WebPkiClientVerifier;
use rustls::{ClientConfig, RootCertStore, ServerConfig};

use crate::error::{CertError, Result};

/// A PEM-encoded certificate and its private key, kept as raw bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct PemPair {
    pub cert: Vec<u8>,
    pub key: Vec<u8>,
}

impl fmt::Debug for PemPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PemPair")
            .field("cert_len", &self.cert.len())
            .field("key", &"<redacted>")
            .finish()
    }
}

/// CA certificate plus the server leaf pair.
#[derive(Clone, PartialEq, Eq)]
pub struct ServerBundle {
    pub ca_cert: Vec<u8>,
    pub cert: Vec<u8>,
    pub key: Vec<u8>,
}

/// CA certificate plus the client leaf pair.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientBundle {
    pub ca_cert: Vec<u8>,
    pub cert: Vec<u8>,
    pub key: Vec<u8>,
}

impl fmt::Debug for ServerBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerBundle")
            .field("ca_cert_len", &self.ca_cert.len())
            .field("cert_len", &self.cert.len())
            .field("key", &"<redacted>")
            .finish()
    }
}

impl fmt::Debug for ClientBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientBundle")
            .field("ca_cert_len", &self.ca_cert.len())
            .field("cert_len", &self.cert.len())
            .field("key", &"<redacted>")
            .finish()
    }
}

impl ServerBundle {
    pub(crate) fn new(ca_cert: Vec<u8>, leaf: PemPair) -> Self {
        Self {
            ca_cert,
            cert: leaf.cert,
            key: leaf.key,
        }
    }

    /// Listener configuration presenting the server certificate.
    ///
    /// Client certificates are not requested.
    pub fn tls_config(&self) -> Result<ServerConfig> {
        let certs = parse_certs(&self.cert, "server certificate")?;
        let key = parse_key(&self.key, "server key")?;

        let config = ServerConfig::builder_with_provider(provider())
            .with_safe_default_protocol_versions()?
            .with_no_client_auth()
            .with_single_cert(certs, key)?;
        Ok(config)
    }

    /// Listener configuration that requires every client to present a
    /// certificate signed by this bundle's CA.
    pub fn mutual_tls_config(&self) -> Result<ServerConfig> {
        let certs = parse_certs(&self.cert, "server certificate")?;
        let key = parse_key(&self.key, "server key")?;
        let roots = Arc::new(root_store(&self.ca_cert)?);

        let verifier = WebPkiClientVerifier::builder_with_provider(roots, provider())
            .build()
            .map_err(|e| CertError::pem("CA certificate", e))?;

        let config = ServerConfig::builder_with_provider(provider())
            .with_safe_default_protocol_versions()?
            .with_client_cert_verifier(verifier)
            .with_single_cert(certs, key)?;
        Ok(config)
    }
}

impl ClientBundle {
    pub(crate) fn new(ca_cert: Vec<u8>, leaf: PemPair) -> Self {
        Self {
            ca_cert,
            cert: leaf.cert,
            key: leaf.key,
        }
    }

    /// Dialer configuration presenting the client certificate and trusting
    /// only this bundle's CA.
    pub fn tls_config(&self) -> Result<ClientConfig> {
        let roots = root_store(&self.ca_cert)?;
        let certs = parse_certs(&self.cert, "client certificate")?;
        let key = parse_key(&self.key, "client key")?;

        let config = ClientConfig::builder_with_provider(provider())
            .with_safe_default_protocol_versions()?
            .with_root_certificates(roots)
            .with_client_auth_cert(certs, key)?;
        Ok(config)
    }
}

fn provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

fn parse_certs(pem: &[u8], what: &'static str) -> Result<Vec<CertificateDer<'static>>> {
    let certs = CertificateDer::pem_slice_iter(pem)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| CertError::pem(what, e))?;
    if certs.is_empty() {
        return Err(CertError::pem(what, "no certificates found"));
    }
    Ok(certs)
}

fn parse_key(pem: &[u8], what: &'static str) -> Result<PrivateKeyDer<'static>> {
    PrivateKeyDer::from_pem_slice(pem).map_err(|e| CertError::pem(what, e))
}

fn root_store(ca_pem: &[u8]) -> Result<RootCertStore> {
    let mut roots = RootCertStore::empty();
    for cert in parse_certs(ca_pem, "CA certificate")? {
        roots.add(cert)?;
    }
    Ok(roots)
}
