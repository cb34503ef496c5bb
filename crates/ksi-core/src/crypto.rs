//! Signing keys and certificates for calendar authentication records.
//!
//! Calendar authentication records are signed with Ed25519. Certificates are
//! looked up by a short id and filtered by subject; chain validation is left to
//! whoever populates the trust store.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, Result};
use crate::hash::HashAlgorithm;

/// A 32-byte Ed25519 public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ed25519PublicKey(pub [u8; 32]);

impl Ed25519PublicKey {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Verify a detached signature over a message.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<()> {
        let verifying_key =
            VerifyingKey::from_bytes(&self.0).map_err(|_| CoreError::InvalidPublicKey)?;
        let sig = Signature::from_slice(signature).map_err(|_| CoreError::InvalidSignature)?;
        verifying_key
            .verify(message, &sig)
            .map_err(|_| CoreError::InvalidSignature)
    }
}

impl fmt::Debug for Ed25519PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ed25519Pub({})", &self.to_hex()[..16])
    }
}

impl From<[u8; 32]> for Ed25519PublicKey {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

/// A keypair for signing calendar authentication records.
#[derive(Clone)]
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    /// Generate a new random keypair.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        Self {
            signing_key: SigningKey::generate(&mut rng),
        }
    }

    /// Create from a 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Get the public key.
    pub fn public_key(&self) -> Ed25519PublicKey {
        Ed25519PublicKey(self.signing_key.verifying_key().to_bytes())
    }

    /// Sign a message, returning the 64-byte signature.
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Keypair({:?})", self.public_key())
    }
}

/// Short identifier naming the certificate that signed a record.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CertificateId(pub [u8; 4]);

impl CertificateId {
    pub const fn from_bytes(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    /// Derive an id from a public key: the first four bytes of its SHA-256.
    pub fn derive(public_key: &Ed25519PublicKey) -> Self {
        let mut id = [0u8; 4];
        if let Ok(hash) = HashAlgorithm::Sha2_256.digest(public_key.as_bytes()) {
            id.copy_from_slice(&hash.value()[..4]);
        }
        Self(id)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for CertificateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CertificateId({})", self.to_hex())
    }
}

impl fmt::Display for CertificateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// A calendar signing certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    pub id: CertificateId,
    /// Subject distinguished name, e.g. `E=publications@guardtime.com, O=Guardtime`.
    pub subject: String,
    pub public_key: Ed25519PublicKey,
    /// Validity window in Unix seconds, inclusive.
    pub valid_from: u64,
    pub valid_until: u64,
}

impl Certificate {
    /// Certificate with an id derived from its key.
    pub fn new(
        subject: impl Into<String>,
        public_key: Ed25519PublicKey,
        valid_from: u64,
        valid_until: u64,
    ) -> Self {
        Self {
            id: CertificateId::derive(&public_key),
            subject: subject.into(),
            public_key,
            valid_from,
            valid_until,
        }
    }

    /// Whether `time` falls inside the validity window.
    pub fn is_valid_at(&self, time: u64) -> bool {
        self.valid_from <= time && time <= self.valid_until
    }

    /// Subject attributes as `(type, value)` pairs, types upper-cased.
    pub fn subject_rdns(&self) -> Vec<(String, String)> {
        parse_rdns(&self.subject)
    }
}

/// Parse `TYPE=value, TYPE=value` into trimmed pairs. Entries without `=` are skipped.
pub fn parse_rdns(s: &str) -> Vec<(String, String)> {
    s.split(',')
        .filter_map(|part| {
            let (k, v) = part.split_once('=')?;
            Some((k.trim().to_ascii_uppercase(), v.trim().to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypair_sign_verify() {
        let keypair = Keypair::from_seed(&[0x42; 32]);
        let signature = keypair.sign(b"publication");

        keypair
            .public_key()
            .verify(b"publication", &signature)
            .expect("valid signature should verify");
        assert!(keypair.public_key().verify(b"publicatioN", &signature).is_err());
        assert!(matches!(
            keypair.public_key().verify(b"publication", &signature[..10]),
            Err(CoreError::InvalidSignature)
        ));
    }

    #[test]
    fn test_certificate_id_is_stable() {
        let pk = Keypair::from_seed(&[0x01; 32]).public_key();
        assert_eq!(CertificateId::derive(&pk), CertificateId::derive(&pk));
        let other = Keypair::from_seed(&[0x02; 32]).public_key();
        assert_ne!(CertificateId::derive(&pk), CertificateId::derive(&other));
    }

    #[test]
    fn test_certificate_validity_and_rdns() {
        let pk = Keypair::from_seed(&[0x01; 32]).public_key();
        let cert = Certificate::new("E=publications@guardtime.com, o=Guardtime", pk, 100, 200);
        assert!(cert.is_valid_at(100));
        assert!(cert.is_valid_at(200));
        assert!(!cert.is_valid_at(201));
        assert_eq!(
            cert.subject_rdns(),
            vec![
                ("E".to_string(), "publications@guardtime.com".to_string()),
                ("O".to_string(), "Guardtime".to_string()),
            ]
        );
    }
}
