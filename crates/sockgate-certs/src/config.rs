//! Certificate generation settings.

use rcgen::SignatureAlgorithm;

/// Key type used for every generated key pair (CA and leaves).
///
/// Replaces the usual RSA key-size setting (2048 bits): rcgen on the ring
/// backend cannot generate RSA keys, so strength is picked by curve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KeyAlgorithm {
    /// ECDSA on NIST P-256 with SHA-256.
    #[default]
    EcdsaP256,
    /// ECDSA on NIST P-384 with SHA-384.
    EcdsaP384,
    /// Ed25519.
    Ed25519,
}

impl KeyAlgorithm {
    pub(crate) fn signature_algorithm(self) -> &'static SignatureAlgorithm {
        match self {
            Self::EcdsaP256 => &rcgen::PKCS_ECDSA_P256_SHA256,
            Self::EcdsaP384 => &rcgen::PKCS_ECDSA_P384_SHA384,
            Self::Ed25519 => &rcgen::PKCS_ED25519,
        }
    }
}

/// Configuration for a [`crate::CertManager`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertConfig {
    /// Organization name written into every generated certificate subject.
    pub organization: String,
    /// Key type for generated key pairs.
    pub key_algorithm: KeyAlgorithm,
    /// Keep generated material in memory only; nothing is written to disk.
    ///
    /// Existing files in the storage directory are still read.
    pub ephemeral: bool,
}

impl Default for CertConfig {
    fn default() -> Self {
        Self {
            organization: "unknown".to_string(),
            key_algorithm: KeyAlgorithm::default(),
            ephemeral: false,
        }
    }
}

impl CertConfig {
    /// Default settings with ephemeral mode switched on.
    pub fn ephemeral() -> Self {
        Self {
            ephemeral: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = organization.into();
        self
    }

    #[must_use]
    pub const fn with_key_algorithm(mut self, key_algorithm: KeyAlgorithm) -> Self {
        self.key_algorithm = key_algorithm;
        self
    }
}
