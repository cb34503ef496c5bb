//! Test fixtures and helpers.
//!
//! A complete in-memory KSI deployment: calendar, aggregator, extender,
//! publication source and trust store, wired together.

use std::sync::{Arc, Once};

use ksi::{Ksi, KsiConfig};
use ksi_core::{Certificate, DataHash, HashAlgorithm, Keypair, PublicationRecord, PublicationsFile};
use ksi_service::memory::{
    MemoryAggregator, MemoryCalendar, MemoryExtender, MemoryPublicationSource,
};
use ksi_service::MemoryTrustStore;

/// 2016-02-15, the time of the first real publication used in vectors.
pub const START_TIME: u64 = 1_455_494_400;

static TRACING: Once = Once::new();

/// Install a `tracing` subscriber that writes through the test harness.
///
/// Safe to call from every test; only the first call installs it.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing_subscriber::filter::LevelFilter::DEBUG)
            .try_init();
    });
}

/// A simulated KSI deployment.
pub struct TestInfrastructure {
    pub calendar: Arc<MemoryCalendar>,
    pub aggregator: Arc<MemoryAggregator>,
    pub extender: Arc<MemoryExtender>,
    pub publications: Arc<MemoryPublicationSource>,
    pub trust_store: Arc<MemoryTrustStore>,
}

impl TestInfrastructure {
    /// A deployment with a deterministic signing key.
    pub fn new() -> Self {
        Self::with_seed([0x42; 32])
    }

    pub fn with_seed(seed: [u8; 32]) -> Self {
        Self::from_aggregator(|calendar| MemoryAggregator::new(calendar, Keypair::from_seed(&seed)))
    }

    /// A deployment whose aggregator is built by `make`, e.g. to set a
    /// client id or certificate window.
    pub fn from_aggregator(make: impl FnOnce(Arc<MemoryCalendar>) -> MemoryAggregator) -> Self {
        let calendar = MemoryCalendar::new(START_TIME);
        let aggregator = Arc::new(make(Arc::clone(&calendar)));
        let extender = Arc::new(MemoryExtender::new(Arc::clone(&calendar)));
        let certificates = vec![aggregator.certificate().clone()];
        let publications = Arc::new(MemoryPublicationSource::new(
            calendar.publications_file(certificates.clone()),
        ));
        let trust_store = Arc::new(MemoryTrustStore::with_certificates(certificates));

        Self {
            calendar,
            aggregator,
            extender,
            publications,
            trust_store,
        }
    }

    /// The certificate the aggregator signs authentication records with.
    pub fn certificate(&self) -> Certificate {
        self.aggregator.certificate().clone()
    }

    /// A client over the whole deployment.
    pub fn ksi(&self) -> Ksi {
        self.ksi_with(KsiConfig::default())
    }

    pub fn ksi_with(&self, config: KsiConfig) -> Ksi {
        Ksi::builder(config)
            .aggregator(self.aggregator.clone())
            .extender(self.extender.clone())
            .publication_source(self.publications.clone())
            .trust_store(self.trust_store.clone())
            .build()
            .expect("test client config")
    }

    /// Advance the calendar by `seconds`, publish the new head and serve a
    /// publications file that includes it.
    pub fn publish_after(&self, seconds: u64) -> PublicationRecord {
        self.calendar.advance(seconds);
        let record = self.calendar.publish_head().expect("head is publishable");
        self.publications.set(self.publications_file());
        record
    }

    /// Everything published so far, with the aggregator's certificate.
    pub fn publications_file(&self) -> PublicationsFile {
        self.calendar.publications_file(vec![self.certificate()])
    }
}

impl Default for TestInfrastructure {
    fn default() -> Self {
        Self::new()
    }
}

/// Deterministic document hashes.
pub fn document_hashes(count: usize) -> Vec<DataHash> {
    (0..count)
        .map(|i| {
            HashAlgorithm::Sha2_256
                .digest(format!("document-{i}").as_bytes())
                .expect("SHA-256 is implemented")
        })
        .collect()
}
