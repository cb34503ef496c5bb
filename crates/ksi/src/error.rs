//! Error types for the KSI client.

use ksi_core::CoreError;
use ksi_service::ServiceError;
use thiserror::Error;

/// Errors raised by [`Ksi`](crate::Ksi) and [`BlockSigner`](crate::BlockSigner).
///
/// Verification failures are not errors; they come back inside a
/// [`VerificationResult`](ksi_verify::VerificationResult).
#[derive(Debug, Error)]
pub enum KsiError {
    /// Malformed data or an inconsistent chain.
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// A collaborator call failed.
    #[error("service error: {0}")]
    Service(#[from] ServiceError),

    /// Operation not allowed in the current state, e.g. `add` after `sign`.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The block signer was already used.
    #[error("block signer already closed")]
    AlreadyClosed,

    /// Nothing has been published after the signature's aggregation time.
    #[error("no publication after aggregation time {0}")]
    NoSuitablePublication(u64),

    /// The extended calendar chain does not reach the requested publication.
    #[error("calendar chain does not match publication at {0}")]
    PublicationMismatch(u64),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, KsiError>;
