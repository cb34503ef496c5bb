//! The `Ksi` client: signing, extension and verification behind one handle.

use std::sync::Arc;

use ksi_core::{DataHash, KsiSignature, PublicationData, PublicationRecord, PublicationsFile};
use ksi_service::{
    AggregationService, CertificateSelector, Connector, ExtendingService, MemoryTrustStore,
    PublicationSource, PublicationsHandler, ServiceError, SubjectRdnSelector, TrustStore,
};
use ksi_verify::{default_policy, Policy, VerificationContext, VerificationResult};
use tracing::{debug, info, warn};

use crate::block_signer::BlockSigner;
use crate::config::KsiConfig;
use crate::error::{KsiError, Result};

/// Builder for [`Ksi`].
///
/// Collaborators handed over directly win. Any that are missing are built by
/// the [`Connector`], if one is set, from the configured endpoints.
///
/// Only the aggregator is required. Without an extender, extension fails and
/// verification that needs a fresh calendar chain ends in `Na`. Without a
/// publication source, publication-based verification ends in `Na`.
pub struct KsiBuilder {
    config: KsiConfig,
    connector: Option<Arc<dyn Connector>>,
    aggregator: Option<Arc<dyn AggregationService>>,
    extender: Option<Arc<dyn ExtendingService>>,
    publication_source: Option<Arc<dyn PublicationSource>>,
    trust_store: Option<Arc<dyn TrustStore>>,
}

impl KsiBuilder {
    /// Build missing collaborators from the config's URLs, login and
    /// request timeout.
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    pub fn aggregator(mut self, service: Arc<dyn AggregationService>) -> Self {
        self.aggregator = Some(service);
        self
    }

    pub fn extender(mut self, service: Arc<dyn ExtendingService>) -> Self {
        self.extender = Some(service);
        self
    }

    pub fn publication_source(mut self, source: Arc<dyn PublicationSource>) -> Self {
        self.publication_source = Some(source);
        self
    }

    /// Certificates for key-based verification. Defaults to the certificates
    /// of the publications file.
    pub fn trust_store(mut self, store: Arc<dyn TrustStore>) -> Self {
        self.trust_store = Some(store);
        self
    }

    pub fn build(self) -> Result<Ksi> {
        self.config.validate()?;
        let connector = self.connector.as_deref();
        let config = &self.config;

        let aggregator = match (self.aggregator, connector) {
            (Some(service), _) => service,
            (None, Some(connector)) => connector.aggregator(&config.aggregator_endpoint())?,
            (None, None) => {
                return Err(KsiError::Configuration(
                    "an aggregation service or a connector is required".into(),
                ))
            }
        };
        let extender = match (self.extender, connector) {
            (Some(service), _) => Some(service),
            (None, Some(connector)) => Some(connector.extender(&config.extender_endpoint())?),
            (None, None) => None,
        };
        let publication_source = match (self.publication_source, connector) {
            (Some(source), _) => Some(source),
            (None, Some(connector)) => {
                Some(connector.publication_source(&config.publications_file_endpoint())?)
            }
            (None, None) => None,
        };

        let publications = publication_source
            .map(|source| PublicationsHandler::new(source, config.publications_file_max_age));
        let selector = Arc::new(SubjectRdnSelector::new(
            &config.publications_file_certificate_constraint,
        ));
        debug!(
            aggregator_url = %config.aggregator_url,
            extender = extender.is_some(),
            publications = publications.is_some(),
            "ksi client built"
        );

        Ok(Ksi {
            config: self.config,
            aggregator,
            extender,
            publications,
            trust_store: self.trust_store,
            selector,
        })
    }
}

/// Client handle for a KSI deployment.
///
/// Holds explicit handles to every collaborator; there is no global state.
/// A `Ksi` is `Send + Sync` and can be shared behind an `Arc`.
pub struct Ksi {
    config: KsiConfig,
    aggregator: Arc<dyn AggregationService>,
    extender: Option<Arc<dyn ExtendingService>>,
    publications: Option<PublicationsHandler>,
    trust_store: Option<Arc<dyn TrustStore>>,
    selector: Arc<SubjectRdnSelector>,
}

impl Ksi {
    pub fn builder(config: KsiConfig) -> KsiBuilder {
        KsiBuilder {
            config,
            connector: None,
            aggregator: None,
            extender: None,
            publication_source: None,
            trust_store: None,
        }
    }

    pub fn config(&self) -> &KsiConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Signing
    // ─────────────────────────────────────────────────────────────────────────

    /// Sign a single document hash.
    pub fn sign(&self, hash: &DataHash) -> Result<KsiSignature> {
        let signer = self.block_signer();
        signer.add(hash.clone(), None)?;
        signer
            .sign()?
            .pop()
            .ok_or_else(|| KsiError::InvalidState("block signer returned no signature".into()))
    }

    /// Hash `data` with the configured algorithm and sign the result.
    pub fn sign_bytes(&self, data: &[u8]) -> Result<KsiSignature> {
        let hash = self.config.hash_algorithm.digest(data)?;
        self.sign(&hash)
    }

    /// A fresh single-use block signer over this client's aggregator.
    pub fn block_signer(&self) -> BlockSigner {
        BlockSigner::new(Arc::clone(&self.aggregator), self.config.hash_algorithm)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Extension
    // ─────────────────────────────────────────────────────────────────────────

    /// Extend to the first publication in the publications file at or after
    /// the signature's aggregation time.
    pub fn extend(&self, signature: &KsiSignature) -> Result<KsiSignature> {
        let file = self.publications_file()?;
        let record = file
            .nearest_after(signature.aggregation_time())
            .ok_or(KsiError::NoSuitablePublication(signature.aggregation_time()))?;
        self.extend_to(signature, record)
    }

    /// Extend to a specific publication.
    pub fn extend_to(
        &self,
        signature: &KsiSignature,
        record: &PublicationRecord,
    ) -> Result<KsiSignature> {
        let extender = self.extender.as_ref().ok_or_else(|| {
            KsiError::Service(ServiceError::NotAvailable(
                "no extending service configured".into(),
            ))
        })?;

        let aggregation_time = signature.aggregation_time();
        let publication_time = record.publication_time();
        if publication_time < aggregation_time {
            return Err(KsiError::NoSuitablePublication(aggregation_time));
        }

        debug!(aggregation_time, publication_time, "extending signature");
        let chain = match extender.extend(aggregation_time, Some(publication_time)) {
            Ok(chain) => chain,
            Err(e) => {
                warn!(error = %e, aggregation_time, publication_time, "extension failed");
                return Err(e.into());
            }
        };

        if chain.publication_data()? != record.publication_data {
            warn!(publication_time, "extender chain does not reach the publication");
            return Err(KsiError::PublicationMismatch(publication_time));
        }

        let extended = signature.extend(chain, record.clone())?;
        info!(aggregation_time, publication_time, "signature extended");
        Ok(extended)
    }

    /// Extend to a publication known only by its data, e.g. a parsed code.
    pub fn extend_to_publication_data(
        &self,
        signature: &KsiSignature,
        publication: &PublicationData,
    ) -> Result<KsiSignature> {
        self.extend_to(signature, &PublicationRecord::new(publication.clone()))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Verification
    // ─────────────────────────────────────────────────────────────────────────

    /// A context wired to this client's extender, publications file and
    /// extending setting.
    ///
    /// A publications file that cannot be fetched is left out; policies that
    /// need it then end in `Na`.
    pub fn verification_context(&self, signature: KsiSignature) -> VerificationContext {
        self.context_with(signature, self.available_publications_file())
    }

    /// Verify with the default policy: the publications file, falling back to
    /// the calendar authentication record.
    ///
    /// Key-based verification trusts the configured trust store, or else the
    /// certificates of the publications file.
    pub fn verify(
        &self,
        signature: &KsiSignature,
        document_hash: Option<&DataHash>,
    ) -> Result<VerificationResult> {
        let file = self.available_publications_file();
        let mut ctx = self.context_with(signature.clone(), file.clone());
        if let Some(hash) = document_hash {
            ctx = ctx.with_document_hash(hash.clone());
        }

        let trust_store: Arc<dyn TrustStore> = match (&self.trust_store, file) {
            (Some(store), _) => Arc::clone(store),
            (None, Some(file)) => file,
            (None, None) => Arc::new(MemoryTrustStore::new()),
        };
        let selector: Arc<dyn CertificateSelector> = self.selector.clone();

        Ok(self.verify_with(&default_policy(trust_store, selector), &ctx))
    }

    fn context_with(
        &self,
        signature: KsiSignature,
        file: Option<Arc<PublicationsFile>>,
    ) -> VerificationContext {
        let mut ctx = VerificationContext::new(signature)
            .with_extending_allowed(self.config.extending_allowed);
        if let Some(extender) = &self.extender {
            ctx = ctx.with_extending_service(Arc::clone(extender));
        }
        if let Some(file) = file {
            ctx = ctx.with_publications_file(file);
        }
        ctx
    }

    /// Verify under an explicit policy and context.
    pub fn verify_with(&self, policy: &Policy, ctx: &VerificationContext) -> VerificationResult {
        policy.verify(ctx)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Publications
    // ─────────────────────────────────────────────────────────────────────────

    /// The current publications file snapshot, refreshed when stale.
    pub fn publications_file(&self) -> Result<Arc<PublicationsFile>> {
        Ok(self.publications_handler()?.get()?)
    }

    /// Fetch the publications file now, regardless of the snapshot's age.
    pub fn refresh_publications_file(&self) -> Result<Arc<PublicationsFile>> {
        Ok(self.publications_handler()?.refresh()?)
    }

    fn publications_handler(&self) -> Result<&PublicationsHandler> {
        self.publications.as_ref().ok_or_else(|| {
            KsiError::Service(ServiceError::NotAvailable(
                "no publication source configured".into(),
            ))
        })
    }

    fn available_publications_file(&self) -> Option<Arc<PublicationsFile>> {
        match self.publications_file() {
            Ok(file) => Some(file),
            Err(e) => {
                if self.publications.is_some() {
                    warn!(error = %e, "publications file unavailable");
                }
                None
            }
        }
    }
}

impl std::fmt::Debug for Ksi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ksi")
            .field("config", &self.config)
            .field("extender", &self.extender.is_some())
            .field("publications", &self.publications.is_some())
            .field("trust_store", &self.trust_store.is_some())
            .finish()
    }
}
