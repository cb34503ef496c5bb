//! # KSI Verify
//!
//! Policy-based verification of KSI signatures.
//!
//! A [`Policy`] is a decision list of rules evaluated against a
//! [`VerificationContext`]. The result is three-valued (`Ok`, `Na`, `Fail`)
//! and carries the trail of every rule that ran.
//!
//! ## Policies
//!
//! - [`policy::internal`] - Consistency of the signature's own parts
//! - [`policy::publication_based`] - User publication, then publications file
//! - [`policy::key_based`] - Calendar authentication record and certificate
//! - [`policy::calendar_based`] - Cross-check against the extender
//! - [`policy::default_policy`] - Publications file, falling back to key-based

pub mod context;
pub mod error;
pub mod policy;
pub mod result;
pub mod rules;

pub use context::{Evaluation, VerificationContext};
pub use error::VerificationError;
pub use policy::{
    calendar_based, default_policy, internal, key_based, publication_based,
    publications_file_based, user_publication_based, Policy, Rule, StepKind,
};
pub use result::{Outcome, PolicyResult, RuleResult, VerificationResult, VerificationResultCode};
