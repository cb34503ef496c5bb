//! Certificate selection and an in-memory trust store.

use std::collections::HashMap;

use ksi_core::crypto::parse_rdns;
use ksi_core::{Certificate, CertificateId};
use parking_lot::RwLock;

use crate::traits::TrustStore;

/// Decides whether a found certificate may be used.
pub trait CertificateSelector: Send + Sync {
    fn matches(&self, certificate: &Certificate) -> bool;
}

impl<F> CertificateSelector for F
where
    F: Fn(&Certificate) -> bool + Send + Sync,
{
    fn matches(&self, certificate: &Certificate) -> bool {
        self(certificate)
    }
}

/// Accepts certificates whose subject carries every required attribute.
///
/// Built from a constraint string such as `E=publications@guardtime.com`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectRdnSelector {
    required: Vec<(String, String)>,
}

impl SubjectRdnSelector {
    pub fn new(constraint: &str) -> Self {
        Self {
            required: parse_rdns(constraint),
        }
    }

    pub fn required(&self) -> &[(String, String)] {
        &self.required
    }
}

impl CertificateSelector for SubjectRdnSelector {
    fn matches(&self, certificate: &Certificate) -> bool {
        let subject = certificate.subject_rdns();
        self.required.iter().all(|req| subject.contains(req))
    }
}

/// A trust store backed by a map.
#[derive(Debug, Default)]
pub struct MemoryTrustStore {
    certificates: RwLock<HashMap<CertificateId, Certificate>>,
}

impl MemoryTrustStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_certificates(certificates: impl IntoIterator<Item = Certificate>) -> Self {
        let store = Self::new();
        for cert in certificates {
            store.add(cert);
        }
        store
    }

    /// Add or replace a certificate.
    pub fn add(&self, certificate: Certificate) {
        self.certificates.write().insert(certificate.id, certificate);
    }

    pub fn remove(&self, id: &CertificateId) -> Option<Certificate> {
        self.certificates.write().remove(id)
    }

    pub fn len(&self) -> usize {
        self.certificates.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.certificates.read().is_empty()
    }
}

impl TrustStore for MemoryTrustStore {
    fn find_certificate(&self, id: &CertificateId) -> Option<Certificate> {
        self.certificates.read().get(id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ksi_core::{Keypair, PublicationsFile};

    fn cert(seed: u8, subject: &str) -> Certificate {
        Certificate::new(subject, Keypair::from_seed(&[seed; 32]).public_key(), 0, u64::MAX)
    }

    #[test]
    fn test_subject_selector() {
        let selector = SubjectRdnSelector::new("E=publications@guardtime.com");
        assert!(selector.matches(&cert(1, "E=publications@guardtime.com, O=Guardtime")));
        assert!(!selector.matches(&cert(1, "E=someone@example.com")));
        assert!(!selector.matches(&cert(1, "O=Guardtime")));
    }

    #[test]
    fn test_memory_store_select() {
        let good = cert(1, "E=publications@guardtime.com");
        let other = cert(2, "E=attacker@example.com");
        let store = MemoryTrustStore::with_certificates([good.clone(), other.clone()]);
        let selector = SubjectRdnSelector::new("E=publications@guardtime.com");

        assert_eq!(store.select(&good.id, &selector), Some(good.clone()));
        assert_eq!(store.select(&other.id, &selector), None);
        assert!(store.find_certificate(&other.id).is_some());

        store.remove(&good.id);
        assert_eq!(store.len(), 1);
        assert_eq!(store.select(&good.id, &selector), None);
    }

    #[test]
    fn test_closure_selector_and_publications_file_store() {
        let c = cert(3, "CN=calendar");
        let file = PublicationsFile::new(vec![], vec![c.clone()], 0);
        let any = |_: &Certificate| true;
        assert_eq!(file.select(&c.id, &any), Some(c));
    }
}
