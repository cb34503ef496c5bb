//! # KSI Service
//!
//! Contracts for the remote collaborators a KSI client talks to, and an
//! in-memory infrastructure implementing them.
//!
//! ## Contracts
//!
//! - [`AggregationService`] - Signs a hash, returning aggregation chains
//! - [`ExtendingService`] - Returns calendar chains to a later root
//! - [`PublicationSource`] - Fetches the publications file
//! - [`TrustStore`] - Looks up calendar signing certificates
//! - [`Connector`] - Builds the remote collaborators for configured endpoints
//!
//! Every contract is blocking and `Send + Sync`; callers run them on their
//! own worker threads.
//!
//! ## Testing
//!
//! The [`memory`] module provides a simulated calendar, aggregator, extender
//! and publication source that produce verifiable data.

pub mod connect;
pub mod error;
pub mod memory;
pub mod publications;
pub mod traits;
pub mod trust;

pub use connect::{Connector, Endpoint, ServiceCredentials};
pub use error::{Result, ServiceError};
pub use publications::PublicationsHandler;
pub use traits::{
    AggregationResponse, AggregationService, ExtendingService, PublicationSource, TrustStore,
};
pub use trust::{CertificateSelector, MemoryTrustStore, SubjectRdnSelector};
