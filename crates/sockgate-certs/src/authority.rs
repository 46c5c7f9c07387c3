//! CA generation and leaf signing using rcgen.

use rcgen::{
    BasicConstraints, CertificateParams, DnType, ExtendedKeyUsagePurpose, IsCa, Issuer, KeyPair,
    KeyUsagePurpose,
};
use x509_parser::pem::parse_x509_pem;
use x509_parser::prelude::parse_x509_certificate;

use crate::bundle::PemPair;
use crate::config::CertConfig;
use crate::error::{CertError, Result};

/// What a leaf certificate is issued for.
#[derive(Debug, Clone, Copy)]
pub enum LeafProfile<'a> {
    /// Server identity; each host becomes a subject alternative name.
    /// IP literals become IP SANs, everything else a DNS SAN.
    Server { hosts: &'a [String] },
    /// Client identity with no host restriction.
    Client,
}

/// Generate a self-signed CA.
pub fn generate_ca(config: &CertConfig) -> Result<PemPair> {
    let mut params = CertificateParams::default();
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params
        .distinguished_name
        .push(DnType::CommonName, format!("{} CA", config.organization));
    params
        .distinguished_name
        .push(DnType::OrganizationName, config.organization.as_str());
    params.key_usages = vec![
        KeyUsagePurpose::KeyCertSign,
        KeyUsagePurpose::CrlSign,
        KeyUsagePurpose::DigitalSignature,
    ];

    let key_pair = KeyPair::generate_for(config.key_algorithm.signature_algorithm())?;
    let cert = params.self_signed(&key_pair)?;

    Ok(PemPair {
        cert: cert.pem().into_bytes(),
        key: key_pair.serialize_pem().into_bytes(),
    })
}

/// Issue a leaf certificate signed by `ca`.
///
/// Fails with [`CertError::KeyMismatch`] if the CA key does not belong to
/// the CA certificate.
pub fn issue_leaf(ca: &PemPair, profile: LeafProfile<'_>, config: &CertConfig) -> Result<PemPair> {
    let issuer = load_issuer(ca)?;

    let mut params = match profile {
        LeafProfile::Server { hosts } => {
            let mut params = CertificateParams::new(hosts.to_vec())?;
            let cn = hosts.first().map_or("sockgate server", String::as_str);
            params.distinguished_name.push(DnType::CommonName, cn);
            params
                .extended_key_usages
                .push(ExtendedKeyUsagePurpose::ServerAuth);
            params
        }
        LeafProfile::Client => {
            let mut params = CertificateParams::default();
            params
                .distinguished_name
                .push(DnType::CommonName, "sockgate client");
            params
                .extended_key_usages
                .push(ExtendedKeyUsagePurpose::ClientAuth);
            params
        }
    };
    params
        .distinguished_name
        .push(DnType::OrganizationName, config.organization.as_str());
    params.key_usages = vec![KeyUsagePurpose::DigitalSignature];
    params.use_authority_key_identifier_extension = true;

    let leaf_key = KeyPair::generate_for(config.key_algorithm.signature_algorithm())?;
    let leaf = params.signed_by(&leaf_key, &issuer)?;

    Ok(PemPair {
        cert: leaf.pem().into_bytes(),
        key: leaf_key.serialize_pem().into_bytes(),
    })
}

fn load_issuer(ca: &PemPair) -> Result<Issuer<'static, KeyPair>> {
    let cert_pem = std::str::from_utf8(&ca.cert).map_err(|e| CertError::pem("CA certificate", e))?;
    let key_pem = std::str::from_utf8(&ca.key).map_err(|e| CertError::pem("CA key", e))?;

    let key_pair = KeyPair::from_pem(key_pem).map_err(|e| CertError::pem("CA key", e))?;
    ensure_keys_match(&ca.cert, &key_pair, "CA")?;

    Issuer::from_ca_cert_pem(cert_pem, key_pair).map_err(|e| CertError::pem("CA certificate", e))
}

/// Check that `key` is the private half of the public key in `cert_pem`.
fn ensure_keys_match(cert_pem: &[u8], key: &KeyPair, what: &'static str) -> Result<()> {
    let (_, pem) = parse_x509_pem(cert_pem).map_err(|e| CertError::pem("CA certificate", e))?;
    if pem.label != "CERTIFICATE" {
        return Err(CertError::pem(
            "CA certificate",
            format!("expected CERTIFICATE block, got {}", pem.label),
        ));
    }
    let (_, cert) =
        parse_x509_certificate(&pem.contents).map_err(|e| CertError::pem("CA certificate", e))?;

    let cert_public_key = cert
        .tbs_certificate
        .subject_pki
        .subject_public_key
        .data
        .as_ref();
    if cert_public_key != key.public_key_raw() {
        return Err(CertError::KeyMismatch { what });
    }
    Ok(())
}
