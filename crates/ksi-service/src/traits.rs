//! Collaborator contracts consumed by the signing and verification engine.
//!
//! All calls are blocking request/response operations. Implementations own
//! their transport, codec and timeouts; the engine only sees decoded values
//! or a [`ServiceError`](crate::ServiceError).

use ksi_core::{
    AggregationHashChain, CalendarAuthenticationRecord, CalendarHashChain, Certificate,
    CertificateId, DataHash, PublicationsFile,
};

use crate::error::Result;
use crate::trust::CertificateSelector;

/// What an aggregator returns for one signing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationResponse {
    /// Chains from the submitted hash up to the calendar leaf, innermost first.
    pub aggregation_chains: Vec<AggregationHashChain>,
    /// Calendar chain to the root the authentication record signs.
    pub calendar_hash_chain: Option<CalendarHashChain>,
    pub calendar_authentication_record: Option<CalendarAuthenticationRecord>,
}

/// Signing gateway.
pub trait AggregationService: Send + Sync {
    /// Submit `hash` for aggregation.
    ///
    /// `level` is the height of the tree `hash` already roots; the first
    /// returned chain starts counting from it.
    fn sign(&self, hash: &DataHash, level: u8) -> Result<AggregationResponse>;
}

/// Calendar extender.
pub trait ExtendingService: Send + Sync {
    /// Calendar chain from the leaf at `aggregation_time` to the root at
    /// `publication_time`, or to the current calendar head when `None`.
    fn extend(
        &self,
        aggregation_time: u64,
        publication_time: Option<u64>,
    ) -> Result<CalendarHashChain>;
}

/// Publications file downloader.
///
/// A returned file is trusted: checking its own signature is the source's job.
pub trait PublicationSource: Send + Sync {
    fn fetch(&self) -> Result<PublicationsFile>;
}

/// Certificate lookup for key-based verification.
pub trait TrustStore: Send + Sync {
    fn find_certificate(&self, id: &CertificateId) -> Option<Certificate>;

    /// Look up `id` and keep it only if `selector` accepts it.
    fn select(&self, id: &CertificateId, selector: &dyn CertificateSelector) -> Option<Certificate> {
        self.find_certificate(id).filter(|cert| selector.matches(cert))
    }
}

impl TrustStore for PublicationsFile {
    fn find_certificate(&self, id: &CertificateId) -> Option<Certificate> {
        self.certificate(id).cloned()
    }
}
