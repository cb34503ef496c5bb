//! Error types for KSI core primitives.

use thiserror::Error;

use crate::hash::HashAlgorithm;

/// Errors raised while building or reducing KSI data structures.
///
/// These are model errors: they propagate straight to the caller and are
/// never retried.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("invalid {algorithm} digest length: expected {expected}, got {actual}")]
    InvalidHashLength {
        algorithm: HashAlgorithm,
        expected: usize,
        actual: usize,
    },

    #[error("unknown hash algorithm id: 0x{0:02x}")]
    UnknownAlgorithm(u8),

    #[error("hash algorithm {0} is not implemented")]
    UnsupportedAlgorithm(HashAlgorithm),

    #[error("hash chain inconsistent: {0}")]
    ChainInconsistent(String),

    #[error("publication code checksum mismatch")]
    InvalidChecksum,

    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("decoding error: {0}")]
    DecodingError(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
