//! # KSI
//!
//! Keyless signatures over a hash-calendar: sign document hashes, extend
//! signatures to publications and verify them under trust policies.
//!
//! ## Overview
//!
//! A KSI signature proves that a hash existed at a point in time. It is a
//! chain of hash steps from the document hash up to a calendar root, plus
//! one trust anchor for that root:
//!
//! - **Calendar authentication record**: the calendar's Ed25519 signature
//!   over the root, checked against a trusted certificate
//! - **Publication record**: a widely witnessed publication of a later root,
//!   reached by extending the signature's calendar chain
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use ksi::{Ksi, KsiConfig};
//! use ksi::core::Keypair;
//! use ksi::service::memory::{MemoryAggregator, MemoryCalendar};
//!
//! let calendar = MemoryCalendar::new(1_455_494_400);
//! let aggregator = Arc::new(MemoryAggregator::new(calendar, Keypair::generate()));
//!
//! let ksi = Ksi::builder(KsiConfig::default())
//!     .aggregator(aggregator)
//!     .build()
//!     .unwrap();
//!
//! let signature = ksi.sign_bytes(b"hello world").unwrap();
//! let result = ksi.verify(&signature, None).unwrap();
//! println!("{result}");
//! ```
//!
//! ## Re-exports
//!
//! - `ksi::core` - Hashes, chains, publications and the signature model
//! - `ksi::service` - Collaborator traits and the in-memory infrastructure
//! - `ksi::verify` - Verification context, rules and policies

pub mod block_signer;
pub mod client;
pub mod config;
pub mod error;

pub use ksi_core as core;
pub use ksi_service as service;
pub use ksi_verify as verify;

pub use block_signer::{BlockSigner, LeafHandle};
pub use client::{Ksi, KsiBuilder};
pub use config::{KsiConfig, ServiceCredentials};
pub use error::{KsiError, Result};

pub use ksi_core::{
    DataHash, HashAlgorithm, IdentityMetadata, KsiSignature, PublicationData, PublicationRecord,
    PublicationsFile,
};
pub use ksi_verify::{Policy, VerificationContext, VerificationResult, VerificationResultCode};
