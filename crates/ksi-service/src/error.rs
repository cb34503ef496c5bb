//! Error types for collaborator calls.

use thiserror::Error;

/// A failed call to a remote collaborator.
///
/// Every variant is a transport-class failure. The engine never retries;
/// callers decide whether to resubmit the whole operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// The service could not be reached or the exchange broke off.
    #[error("transport error: {0}")]
    Transport(String),

    /// No response within the configured timeout.
    #[error("timeout: {0}")]
    Timeout(String),

    /// The service answered with an error status.
    #[error("request rejected (status 0x{status:04x}): {message}")]
    Rejected { status: u32, message: String },

    /// No service of this kind is configured.
    #[error("service not available: {0}")]
    NotAvailable(String),
}

/// Result type for collaborator calls.
pub type Result<T> = std::result::Result<T, ServiceError>;
