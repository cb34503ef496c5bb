//! The KSI signature aggregate.
//!
//! A signature is immutable once built. Extension produces a new signature;
//! the original is never touched.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::chain::{AggregationHashChain, CalendarHashChain, ChainResult};
use crate::crypto::{CertificateId, Ed25519PublicKey, Keypair};
use crate::error::{CoreError, Result};
use crate::hash::DataHash;
use crate::metadata::IdentityMetadata;
use crate::publication::{PublicationData, PublicationRecord};

/// Signature type of Ed25519 calendar authentication records (its OID).
pub const ED25519_SIGNATURE_TYPE: &str = "1.3.101.112";

/// Separator used by [`KsiSignature::identity_string`].
pub const IDENTITY_SEPARATOR: &str = " :: ";

/// A detached signature and the certificate that made it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureData {
    pub signature_type: String,
    pub signature_value: Bytes,
    pub certificate_id: CertificateId,
}

/// A calendar root signed by the calendar operator's key.
///
/// Carried by signatures that have not been extended to a publication yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarAuthenticationRecord {
    pub publication_data: PublicationData,
    pub signature_data: SignatureData,
}

impl CalendarAuthenticationRecord {
    /// Sign `publication_data` with an Ed25519 key.
    pub fn sign(
        publication_data: PublicationData,
        keypair: &Keypair,
        certificate_id: CertificateId,
    ) -> Self {
        let signature = keypair.sign(&publication_data.to_bytes());
        Self {
            publication_data,
            signature_data: SignatureData {
                signature_type: ED25519_SIGNATURE_TYPE.to_string(),
                signature_value: Bytes::copy_from_slice(&signature),
                certificate_id,
            },
        }
    }

    pub fn publication_time(&self) -> u64 {
        self.publication_data.publication_time
    }

    pub fn certificate_id(&self) -> &CertificateId {
        &self.signature_data.certificate_id
    }

    /// Check the signature value against `public_key`.
    pub fn verify(&self, public_key: &Ed25519PublicKey) -> Result<()> {
        if self.signature_data.signature_type != ED25519_SIGNATURE_TYPE {
            return Err(CoreError::InvalidSignature);
        }
        public_key.verify(
            &self.publication_data.to_bytes(),
            &self.signature_data.signature_value,
        )
    }
}

/// A keyless signature.
///
/// Aggregation chains are stored innermost first: `aggregation_chains()[0]`
/// starts at the signed document hash and the last chain ends at the calendar
/// leaf. At most one of the authentication record and the publication record
/// is present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawSignature", into = "RawSignature")]
pub struct KsiSignature {
    aggregation_chains: Vec<AggregationHashChain>,
    calendar_chain: Option<CalendarHashChain>,
    calendar_authentication_record: Option<CalendarAuthenticationRecord>,
    publication_record: Option<PublicationRecord>,
}

impl KsiSignature {
    pub fn builder() -> KsiSignatureBuilder {
        KsiSignatureBuilder::default()
    }

    pub fn aggregation_chains(&self) -> &[AggregationHashChain] {
        &self.aggregation_chains
    }

    pub fn calendar_chain(&self) -> Option<&CalendarHashChain> {
        self.calendar_chain.as_ref()
    }

    pub fn calendar_authentication_record(&self) -> Option<&CalendarAuthenticationRecord> {
        self.calendar_authentication_record.as_ref()
    }

    pub fn publication_record(&self) -> Option<&PublicationRecord> {
        self.publication_record.as_ref()
    }

    /// Whether the signature has been extended to a publication.
    pub fn is_extended(&self) -> bool {
        self.publication_record.is_some()
    }

    /// The signed document hash.
    pub fn input_hash(&self) -> &DataHash {
        // Non-emptiness is checked on construction.
        &self.innermost().input_hash
    }

    /// Aggregation round time in Unix seconds.
    pub fn aggregation_time(&self) -> u64 {
        self.outermost().aggregation_time
    }

    /// Reduce all aggregation chains, innermost first, carrying the level.
    ///
    /// Fails with [`CoreError::ChainInconsistent`] when a chain's input is not
    /// the previous chain's output.
    pub fn aggregation_output(&self) -> Result<ChainResult> {
        let mut result = self.innermost().output(0)?;
        for (i, chain) in self.aggregation_chains.iter().enumerate().skip(1) {
            if chain.input_hash != result.hash {
                return Err(CoreError::ChainInconsistent(format!(
                    "aggregation chain {i} does not start at the output of chain {}",
                    i - 1
                )));
            }
            result = chain.output(result.level)?;
        }
        Ok(result)
    }

    /// Time of the calendar root this signature is anchored to, if any.
    pub fn publication_time(&self) -> Option<u64> {
        self.calendar_chain.as_ref().map(|c| c.publication_time)
    }

    /// Identity records along the aggregation path, outermost first.
    pub fn identity(&self) -> Vec<IdentityMetadata> {
        self.aggregation_chains
            .iter()
            .rev()
            .flat_map(|chain| chain.identity())
            .collect()
    }

    /// Client ids joined with `" :: "`, e.g. `GT :: testA :: alice`.
    pub fn identity_string(&self) -> String {
        self.identity()
            .iter()
            .map(|m| m.client_id.as_str())
            .collect::<Vec<_>>()
            .join(IDENTITY_SEPARATOR)
    }

    /// Attach a calendar chain and publication record, dropping the
    /// authentication record.
    ///
    /// The chain must start at this signature's aggregation output and time,
    /// and end at the publication's hash and time.
    pub fn extend(
        &self,
        calendar_chain: CalendarHashChain,
        publication_record: PublicationRecord,
    ) -> Result<Self> {
        let aggregation = self.aggregation_output()?;
        if calendar_chain.input_hash != aggregation.hash {
            return Err(CoreError::ChainInconsistent(
                "calendar chain input does not match aggregation output".into(),
            ));
        }
        if calendar_chain.aggregation_time != self.aggregation_time() {
            return Err(CoreError::ChainInconsistent(format!(
                "calendar chain aggregation time {} differs from signature time {}",
                calendar_chain.aggregation_time,
                self.aggregation_time()
            )));
        }
        if calendar_chain.publication_data()? != publication_record.publication_data {
            return Err(CoreError::ChainInconsistent(
                "calendar chain does not reach the publication".into(),
            ));
        }

        KsiSignatureBuilder {
            aggregation_chains: self.aggregation_chains.clone(),
            calendar_chain: Some(calendar_chain),
            calendar_authentication_record: None,
            publication_record: Some(publication_record.to_signature_record()),
        }
        .build()
    }

    /// Serialize the data model as CBOR.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::ser::into_writer(self, &mut buf)
            .map_err(|e| CoreError::EncodingError(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize from [`KsiSignature::to_bytes`] output, re-checking invariants.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ciborium::de::from_reader(bytes).map_err(|e| CoreError::DecodingError(e.to_string()))
    }

    fn innermost(&self) -> &AggregationHashChain {
        &self.aggregation_chains[0]
    }

    fn outermost(&self) -> &AggregationHashChain {
        &self.aggregation_chains[self.aggregation_chains.len() - 1]
    }
}

/// Assembles a [`KsiSignature`], checking its structure on [`build`](Self::build).
#[derive(Debug, Clone, Default)]
pub struct KsiSignatureBuilder {
    aggregation_chains: Vec<AggregationHashChain>,
    calendar_chain: Option<CalendarHashChain>,
    calendar_authentication_record: Option<CalendarAuthenticationRecord>,
    publication_record: Option<PublicationRecord>,
}

impl KsiSignatureBuilder {
    /// Append the next chain outward.
    pub fn aggregation_chain(mut self, chain: AggregationHashChain) -> Self {
        self.aggregation_chains.push(chain);
        self
    }

    pub fn aggregation_chains(mut self, chains: impl IntoIterator<Item = AggregationHashChain>) -> Self {
        self.aggregation_chains.extend(chains);
        self
    }

    pub fn calendar_chain(mut self, chain: CalendarHashChain) -> Self {
        self.calendar_chain = Some(chain);
        self
    }

    pub fn calendar_authentication_record(mut self, record: CalendarAuthenticationRecord) -> Self {
        self.calendar_authentication_record = Some(record);
        self
    }

    pub fn publication_record(mut self, record: PublicationRecord) -> Self {
        self.publication_record = Some(record);
        self
    }

    /// Check structural invariants and build.
    ///
    /// Hash consistency between the parts is a verification concern and is
    /// not checked here.
    pub fn build(self) -> Result<KsiSignature> {
        if self.aggregation_chains.is_empty() {
            return Err(CoreError::MalformedInput(
                "signature has no aggregation chains".into(),
            ));
        }
        if self.calendar_authentication_record.is_some() && self.publication_record.is_some() {
            return Err(CoreError::MalformedInput(
                "signature carries both an authentication record and a publication record".into(),
            ));
        }
        if self.publication_record.is_some() && self.calendar_chain.is_none() {
            return Err(CoreError::MalformedInput(
                "publication record without a calendar chain".into(),
            ));
        }

        Ok(KsiSignature {
            aggregation_chains: self.aggregation_chains,
            calendar_chain: self.calendar_chain,
            calendar_authentication_record: self.calendar_authentication_record,
            publication_record: self.publication_record,
        })
    }
}

/// Unchecked serde shape of [`KsiSignature`].
#[derive(Serialize, Deserialize)]
struct RawSignature {
    aggregation_chains: Vec<AggregationHashChain>,
    calendar_chain: Option<CalendarHashChain>,
    calendar_authentication_record: Option<CalendarAuthenticationRecord>,
    publication_record: Option<PublicationRecord>,
}

impl TryFrom<RawSignature> for KsiSignature {
    type Error = CoreError;

    fn try_from(raw: RawSignature) -> Result<Self> {
        KsiSignatureBuilder {
            aggregation_chains: raw.aggregation_chains,
            calendar_chain: raw.calendar_chain,
            calendar_authentication_record: raw.calendar_authentication_record,
            publication_record: raw.publication_record,
        }
        .build()
    }
}

impl From<KsiSignature> for RawSignature {
    fn from(sig: KsiSignature) -> Self {
        Self {
            aggregation_chains: sig.aggregation_chains,
            calendar_chain: sig.calendar_chain,
            calendar_authentication_record: sig.calendar_authentication_record,
            publication_record: sig.publication_record,
        }
    }
}
