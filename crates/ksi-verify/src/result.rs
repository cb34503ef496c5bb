//! Verification outcomes.

use std::fmt;

use crate::error::VerificationError;

/// Three-valued outcome of a rule or a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VerificationResultCode {
    Ok,
    /// Not applicable, or not enough information to decide.
    Na,
    Fail,
}

impl fmt::Display for VerificationResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ok => "OK",
            Self::Na => "NA",
            Self::Fail => "FAIL",
        })
    }
}

/// What one rule returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Ok,
    Na(VerificationError),
    Fail(VerificationError),
}

impl Outcome {
    pub fn code(&self) -> VerificationResultCode {
        match self {
            Self::Ok => VerificationResultCode::Ok,
            Self::Na(_) => VerificationResultCode::Na,
            Self::Fail(_) => VerificationResultCode::Fail,
        }
    }

    pub fn error(&self) -> Option<VerificationError> {
        match self {
            Self::Ok => None,
            Self::Na(e) | Self::Fail(e) => Some(*e),
        }
    }
}

/// One entry of a verification trail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleResult {
    pub rule: &'static str,
    pub code: VerificationResultCode,
    pub error: Option<VerificationError>,
}

/// Outcome of a single policy, fallbacks excluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyResult {
    pub policy: &'static str,
    pub code: VerificationResultCode,
    pub error: Option<VerificationError>,
    pub rule_results: Vec<RuleResult>,
}

/// Outcome of a verification.
///
/// Holds the trail of every policy that ran, in order; the overall code is
/// that of the last one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationResult {
    pub code: VerificationResultCode,
    pub error: Option<VerificationError>,
    pub policy_results: Vec<PolicyResult>,
}

impl VerificationResult {
    pub(crate) fn from_policies(policy_results: Vec<PolicyResult>) -> Self {
        let (code, error) = policy_results
            .last()
            .map(|p| (p.code, p.error))
            .unwrap_or((VerificationResultCode::Na, Some(VerificationError::Inconclusive)));
        Self {
            code,
            error,
            policy_results,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == VerificationResultCode::Ok
    }

    /// Every rule outcome across all policies that ran.
    pub fn rule_results(&self) -> impl Iterator<Item = &RuleResult> {
        self.policy_results.iter().flat_map(|p| p.rule_results.iter())
    }

    /// Name of the policy that produced the overall code.
    pub fn deciding_policy(&self) -> Option<&'static str> {
        self.policy_results.last().map(|p| p.policy)
    }
}

impl fmt::Display for VerificationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code)?;
        if let Some(error) = &self.error {
            write!(f, " [{}] {}", error.code(), error)?;
        }
        Ok(())
    }
}
