//! # KSI Core
//!
//! Pure primitives for KSI keyless signatures: hashes, hash chains,
//! publications and the signature aggregate.
//!
//! This crate contains no I/O and no networking. Everything here is
//! computation over immutable values.
//!
//! ## Key Types
//!
//! - [`DataHash`] - An algorithm-tagged digest
//! - [`AggregationHashChain`] / [`CalendarHashChain`] - Hash chains and their [`reduce`]
//! - [`PublicationData`] - A published calendar root, parseable from a publication code
//! - [`PublicationsFile`] - Time-ordered trust anchors
//! - [`KsiSignature`] - The signature aggregate
//!
//! ## Encoding
//!
//! Identity metadata enters hash chains in deterministic CBOR. See [`canonical`].

pub mod base32;
pub mod canonical;
pub mod chain;
pub mod crypto;
pub mod error;
pub mod hash;
pub mod metadata;
pub mod publication;
pub mod signature;

pub use chain::{
    combine, reduce, shape_of, AggregationHashChain, CalendarHashChain, ChainKind, ChainLink,
    ChainResult, Direction, LinkSibling, CALENDAR_LEVEL,
};
pub use crypto::{Certificate, CertificateId, Ed25519PublicKey, Keypair};
pub use error::{CoreError, Result};
pub use hash::{DataHash, DataHasher, HashAlgorithm};
pub use metadata::IdentityMetadata;
pub use publication::{PublicationData, PublicationRecord, PublicationsFile};
pub use signature::{
    CalendarAuthenticationRecord, KsiSignature, KsiSignatureBuilder, SignatureData,
    ED25519_SIGNATURE_TYPE,
};
