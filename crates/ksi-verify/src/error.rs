//! Verification error codes.

use thiserror::Error;

/// Why a rule did not return `Ok`.
///
/// These are recorded in verification results, never raised. Each variant has
/// a stable code (`GEN-01`, `INT-03`, ...) for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum VerificationError {
    #[error("document hash does not match the signature input hash")]
    WrongDocument,
    #[error("verification inconclusive")]
    Inconclusive,
    #[error("extender or publications source unavailable")]
    ExtenderUnavailable,

    #[error("aggregation hash chains are not consistent")]
    InconsistentAggregationChains,
    #[error("aggregation hash chain times differ")]
    InconsistentAggregationTimes,
    #[error("calendar chain input does not match the aggregation output")]
    CalendarInputMismatch,
    #[error("calendar chain aggregation time does not match the signature")]
    CalendarAggregationTimeMismatch,
    #[error("calendar chain shape does not match its aggregation time")]
    CalendarShapeMismatch,
    #[error("authentication record time does not match the calendar chain")]
    AuthRecordTimeMismatch,
    #[error("publication record time does not match the calendar chain")]
    PublicationTimeMismatch,
    #[error("authentication record hash does not match the calendar chain output")]
    AuthRecordHashMismatch,
    #[error("publication record hash does not match the calendar chain output")]
    PublicationHashMismatch,
    #[error("aggregation chain index does not match the chain shape")]
    ChainIndexMismatch,

    #[error("extended calendar chain output does not match the publication")]
    ExtendedChainOutputMismatch,
    #[error("extended calendar chain input does not match the aggregation output")]
    ExtendedChainInputMismatch,
    #[error("signature does not match the user publication")]
    UserPublicationMismatch,
    #[error("signature does not match the publications file")]
    PublicationsFileMismatch,

    #[error("no suitable certificate found")]
    CertificateNotFound,
    #[error("authentication record signature is invalid")]
    SignatureInvalid,
    #[error("certificate was not valid at the publication time")]
    CertificateExpired,

    #[error("calendar chain output differs from the extender's")]
    CalendarOutputMismatch,
    #[error("extender's calendar chain input does not match the aggregation output")]
    CalendarInputMismatchExtended,
    #[error("extender's calendar chain aggregation time differs")]
    CalendarTimeMismatch,
}

impl VerificationError {
    /// Every variant, in code order.
    pub const ALL: [VerificationError; 23] = [
        Self::WrongDocument,
        Self::Inconclusive,
        Self::ExtenderUnavailable,
        Self::InconsistentAggregationChains,
        Self::InconsistentAggregationTimes,
        Self::CalendarInputMismatch,
        Self::CalendarAggregationTimeMismatch,
        Self::CalendarShapeMismatch,
        Self::AuthRecordTimeMismatch,
        Self::PublicationTimeMismatch,
        Self::AuthRecordHashMismatch,
        Self::PublicationHashMismatch,
        Self::ChainIndexMismatch,
        Self::ExtendedChainOutputMismatch,
        Self::ExtendedChainInputMismatch,
        Self::UserPublicationMismatch,
        Self::PublicationsFileMismatch,
        Self::CertificateNotFound,
        Self::SignatureInvalid,
        Self::CertificateExpired,
        Self::CalendarOutputMismatch,
        Self::CalendarInputMismatchExtended,
        Self::CalendarTimeMismatch,
    ];

    /// Stable diagnostic code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::WrongDocument => "GEN-01",
            Self::Inconclusive => "GEN-02",
            Self::ExtenderUnavailable => "GEN-03",
            Self::InconsistentAggregationChains => "INT-01",
            Self::InconsistentAggregationTimes => "INT-02",
            Self::CalendarInputMismatch => "INT-03",
            Self::CalendarAggregationTimeMismatch => "INT-04",
            Self::CalendarShapeMismatch => "INT-05",
            Self::AuthRecordTimeMismatch => "INT-06",
            Self::PublicationTimeMismatch => "INT-07",
            Self::AuthRecordHashMismatch => "INT-08",
            Self::PublicationHashMismatch => "INT-09",
            Self::ChainIndexMismatch => "INT-10",
            Self::ExtendedChainOutputMismatch => "PUB-01",
            Self::ExtendedChainInputMismatch => "PUB-03",
            Self::UserPublicationMismatch => "PUB-04",
            Self::PublicationsFileMismatch => "PUB-05",
            Self::CertificateNotFound => "KEY-01",
            Self::SignatureInvalid => "KEY-02",
            Self::CertificateExpired => "KEY-03",
            Self::CalendarOutputMismatch => "CAL-01",
            Self::CalendarInputMismatchExtended => "CAL-02",
            Self::CalendarTimeMismatch => "CAL-03",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(VerificationError::WrongDocument.code(), "GEN-01");
        assert_eq!(VerificationError::ChainIndexMismatch.code(), "INT-10");
        assert_eq!(VerificationError::PublicationsFileMismatch.code(), "PUB-05");
        assert_eq!(VerificationError::CertificateNotFound.code(), "KEY-01");
        assert_eq!(VerificationError::CalendarTimeMismatch.code(), "CAL-03");
    }

    #[test]
    fn test_codes_unique() {
        let codes: std::collections::HashSet<_> =
            VerificationError::ALL.iter().map(|e| e.code()).collect();
        assert_eq!(codes.len(), VerificationError::ALL.len());
    }
}
