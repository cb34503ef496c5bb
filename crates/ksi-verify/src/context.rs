//! Inputs to a verification.

use std::cell::RefCell;
use std::collections::HashMap;
use std::ops::Deref;
use std::sync::Arc;

use ksi_core::{CalendarHashChain, ChainResult, CoreError, DataHash, KsiSignature, PublicationData, PublicationsFile};
use ksi_service::{ExtendingService, ServiceError};
use tracing::debug;

/// Everything a policy may consult while verifying one signature.
///
/// Configure it before calling [`Policy::verify`](crate::Policy::verify).
/// Evaluation only reads it, so one context can be verified repeatedly.
pub struct VerificationContext {
    signature: KsiSignature,
    document_hash: Option<DataHash>,
    publications_file: Option<Arc<PublicationsFile>>,
    user_publication: Option<PublicationData>,
    extending_allowed: bool,
    extending_service: Option<Arc<dyn ExtendingService>>,
}

impl VerificationContext {
    pub fn new(signature: KsiSignature) -> Self {
        Self {
            signature,
            document_hash: None,
            publications_file: None,
            user_publication: None,
            extending_allowed: false,
            extending_service: None,
        }
    }

    /// The hash of the document the signature is claimed to cover.
    pub fn with_document_hash(mut self, hash: DataHash) -> Self {
        self.document_hash = Some(hash);
        self
    }

    pub fn with_publications_file(mut self, file: Arc<PublicationsFile>) -> Self {
        self.publications_file = Some(file);
        self
    }

    /// A publication the user trusts, typically parsed from a printed code.
    pub fn with_user_publication(mut self, publication: PublicationData) -> Self {
        self.user_publication = Some(publication);
        self
    }

    /// Allow publication-based policies to extend unextended signatures.
    pub fn with_extending_allowed(mut self, allowed: bool) -> Self {
        self.extending_allowed = allowed;
        self
    }

    pub fn with_extending_service(mut self, service: Arc<dyn ExtendingService>) -> Self {
        self.extending_service = Some(service);
        self
    }

    pub fn signature(&self) -> &KsiSignature {
        &self.signature
    }

    pub fn document_hash(&self) -> Option<&DataHash> {
        self.document_hash.as_ref()
    }

    pub fn publications_file(&self) -> Option<&PublicationsFile> {
        self.publications_file.as_deref()
    }

    pub fn user_publication(&self) -> Option<&PublicationData> {
        self.user_publication.as_ref()
    }

    pub fn is_extending_allowed(&self) -> bool {
        self.extending_allowed
    }

    pub fn has_extending_service(&self) -> bool {
        self.extending_service.is_some()
    }

    pub fn extending_service(&self) -> Option<&Arc<dyn ExtendingService>> {
        self.extending_service.as_ref()
    }

    /// Output of the signature's aggregation chains.
    pub fn aggregation_output(&self) -> Result<ChainResult, CoreError> {
        self.signature.aggregation_output()
    }
}

/// A single [`Policy::verify`](crate::Policy::verify) call over a context.
///
/// Rules read the context through it. Calendar chains fetched from the
/// extender are kept for the rest of the call and dropped with it.
pub struct Evaluation<'a> {
    ctx: &'a VerificationContext,
    extended: RefCell<HashMap<Option<u64>, CalendarHashChain>>,
}

impl<'a> Evaluation<'a> {
    pub fn new(ctx: &'a VerificationContext) -> Self {
        Self {
            ctx,
            extended: RefCell::new(HashMap::new()),
        }
    }

    pub fn context(&self) -> &'a VerificationContext {
        self.ctx
    }

    /// Calendar chain from the signature's round to the root at
    /// `publication_time` (the calendar head when `None`).
    ///
    /// Each target is requested from the extender at most once per call.
    /// Without an extender this fails with [`ServiceError::NotAvailable`].
    pub fn extended_calendar_chain(
        &self,
        publication_time: Option<u64>,
    ) -> Result<CalendarHashChain, ServiceError> {
        if let Some(chain) = self.extended.borrow().get(&publication_time) {
            return Ok(chain.clone());
        }

        let service = self
            .ctx
            .extending_service()
            .ok_or_else(|| ServiceError::NotAvailable("no extending service configured".into()))?;

        let aggregation_time = self.ctx.signature().aggregation_time();
        debug!(aggregation_time, ?publication_time, "requesting calendar chain");
        let chain = service.extend(aggregation_time, publication_time)?;

        self.extended
            .borrow_mut()
            .insert(publication_time, chain.clone());
        Ok(chain)
    }
}

impl Deref for Evaluation<'_> {
    type Target = VerificationContext;

    fn deref(&self) -> &VerificationContext {
        self.ctx
    }
}

impl std::fmt::Debug for Evaluation<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Evaluation")
            .field("context", self.ctx)
            .field("extended", &self.extended.borrow().len())
            .finish()
    }
}

impl std::fmt::Debug for VerificationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerificationContext")
            .field("input_hash", self.signature.input_hash())
            .field("document_hash", &self.document_hash)
            .field("publications_file", &self.publications_file.is_some())
            .field("user_publication", &self.user_publication)
            .field("extending_allowed", &self.extending_allowed)
            .field("extending_service", &self.extending_service.is_some())
            .finish()
    }
}
