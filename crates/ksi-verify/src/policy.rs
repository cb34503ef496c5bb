//! Verification policies as decision lists.
//!
//! A policy runs its rules in order:
//!
//! - a **check** that fails stops the policy with `Fail`; `Ok` and `Na` move on
//! - a **terminal** rule that returns `Ok` stops the policy with `Ok`, `Fail`
//!   stops it with `Fail`, and `Na` moves on
//!
//! Running out of rules gives `Na` ([`VerificationError::Inconclusive`]). A
//! policy may name a fallback that runs only when it ends in `Na`.

use std::sync::Arc;

use ksi_service::{CertificateSelector, TrustStore};
use tracing::{debug, info};

use crate::context::{Evaluation, VerificationContext};
use crate::error::VerificationError;
use crate::result::{Outcome, PolicyResult, RuleResult, VerificationResult, VerificationResultCode};
use crate::rules;

/// How a rule's outcome steers the decision list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Check,
    Terminal,
}

type RuleFn = dyn Fn(&Evaluation<'_>) -> Outcome + Send + Sync;

/// A named rule and its role in a policy.
#[derive(Clone)]
pub struct Rule {
    name: &'static str,
    kind: StepKind,
    eval: Arc<RuleFn>,
}

impl Rule {
    pub fn check<F>(name: &'static str, eval: F) -> Self
    where
        F: Fn(&Evaluation<'_>) -> Outcome + Send + Sync + 'static,
    {
        Self {
            name,
            kind: StepKind::Check,
            eval: Arc::new(eval),
        }
    }

    pub fn terminal<F>(name: &'static str, eval: F) -> Self
    where
        F: Fn(&Evaluation<'_>) -> Outcome + Send + Sync + 'static,
    {
        Self {
            name,
            kind: StepKind::Terminal,
            eval: Arc::new(eval),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> StepKind {
        self.kind
    }

    pub fn evaluate(&self, evaluation: &Evaluation<'_>) -> Outcome {
        (self.eval)(evaluation)
    }
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}

/// An ordered list of rules, with an optional fallback.
///
/// Policies are immutable and can be shared between threads; all per-call
/// state lives in the [`Evaluation`] each `verify` call creates.
#[derive(Debug, Clone)]
pub struct Policy {
    name: &'static str,
    rules: Vec<Rule>,
    fallback: Option<Box<Policy>>,
}

impl Policy {
    pub fn new(name: &'static str, rules: Vec<Rule>) -> Self {
        Self {
            name,
            rules,
            fallback: None,
        }
    }

    /// Run `fallback` when this policy ends in `Na`.
    pub fn with_fallback(mut self, fallback: Policy) -> Self {
        self.fallback = Some(Box::new(fallback));
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn fallback(&self) -> Option<&Policy> {
        self.fallback.as_deref()
    }

    /// Verify the context's signature.
    ///
    /// Fallback policies share the call's [`Evaluation`], so a calendar chain
    /// is fetched at most once per target.
    pub fn verify(&self, ctx: &VerificationContext) -> VerificationResult {
        let evaluation = Evaluation::new(ctx);
        let mut results = Vec::new();
        let mut policy = Some(self);

        while let Some(current) = policy {
            let result = current.run(&evaluation);
            let na = result.code == VerificationResultCode::Na;
            results.push(result);

            policy = match current.fallback() {
                Some(fallback) if na => {
                    info!(from = current.name, to = fallback.name, "falling back");
                    Some(fallback)
                }
                _ => None,
            };
        }

        let result = VerificationResult::from_policies(results);
        info!(
            policy = result.deciding_policy().unwrap_or(self.name),
            code = %result.code,
            error = result.error.map(|e| e.code()),
            "verification finished"
        );
        result
    }

    /// Run this policy's rules only.
    fn run(&self, evaluation: &Evaluation<'_>) -> PolicyResult {
        let mut rule_results = Vec::with_capacity(self.rules.len());

        for rule in &self.rules {
            let outcome = rule.evaluate(evaluation);
            debug!(policy = self.name, rule = rule.name, code = %outcome.code(), "rule evaluated");
            rule_results.push(RuleResult {
                rule: rule.name,
                code: outcome.code(),
                error: outcome.error(),
            });

            match (rule.kind, &outcome) {
                (_, Outcome::Fail(e)) => {
                    return finish(self.name, VerificationResultCode::Fail, Some(*e), rule_results);
                }
                (StepKind::Terminal, Outcome::Ok) => {
                    return finish(self.name, VerificationResultCode::Ok, None, rule_results);
                }
                _ => {}
            }
        }

        finish(
            self.name,
            VerificationResultCode::Na,
            Some(VerificationError::Inconclusive),
            rule_results,
        )
    }
}

fn finish(
    policy: &'static str,
    code: VerificationResultCode,
    error: Option<VerificationError>,
    rule_results: Vec<RuleResult>,
) -> PolicyResult {
    PolicyResult {
        policy,
        code,
        error,
        rule_results,
    }
}

/// Consistency checks shared by every policy.
fn internal_rules() -> Vec<Rule> {
    vec![
        Rule::check("document_hash", rules::document_hash),
        Rule::check("aggregation_chains_consistent", rules::aggregation_chains_consistent),
        Rule::check("aggregation_times_consistent", rules::aggregation_times_consistent),
        Rule::check("chain_index_consistent", rules::chain_index_consistent),
        Rule::check("calendar_chain_input", rules::calendar_chain_input),
        Rule::check("calendar_chain_aggregation_time", rules::calendar_chain_aggregation_time),
        Rule::check("calendar_chain_shape", rules::calendar_chain_shape),
        Rule::check("auth_record_time", rules::auth_record_time),
        Rule::check("auth_record_hash", rules::auth_record_hash),
        Rule::check("publication_record_time", rules::publication_record_time),
        Rule::check("publication_record_hash", rules::publication_record_hash),
    ]
}

/// Internal consistency only. Proves nothing about time or origin.
pub fn internal() -> Policy {
    let mut steps = internal_rules();
    steps.push(Rule::terminal("internal_checks_passed", rules::internal_checks_passed));
    Policy::new("internal", steps)
}

/// Anchor on a publication the user supplies.
pub fn user_publication_based() -> Policy {
    let mut steps = internal_rules();
    steps.push(Rule::terminal("user_publication", rules::user_publication));
    Policy::new("user_publication_based", steps)
}

/// Anchor on the publications file.
pub fn publications_file_based() -> Policy {
    let mut steps = internal_rules();
    steps.push(Rule::terminal("publications_file", rules::publications_file));
    Policy::new("publications_file_based", steps)
}

/// The user's publication if given, then the publications file.
pub fn publication_based() -> Policy {
    let mut steps = internal_rules();
    steps.push(Rule::terminal("user_publication", rules::user_publication));
    steps.push(Rule::terminal("publications_file", rules::publications_file));
    Policy::new("publication_based", steps)
}

/// Anchor on the calendar authentication record and a trusted certificate.
pub fn key_based(
    trust_store: Arc<dyn TrustStore>,
    selector: Arc<dyn CertificateSelector>,
) -> Policy {
    let mut steps = internal_rules();

    let (store, sel) = (Arc::clone(&trust_store), Arc::clone(&selector));
    steps.push(Rule::check("certificate_exists", move |ctx| {
        rules::certificate_exists(ctx, store.as_ref(), sel.as_ref())
    }));

    let (store, sel) = (Arc::clone(&trust_store), Arc::clone(&selector));
    steps.push(Rule::check("certificate_validity", move |ctx| {
        rules::certificate_validity(ctx, store.as_ref(), sel.as_ref())
    }));

    steps.push(Rule::terminal("auth_record_signature", move |ctx| {
        rules::auth_record_signature(ctx, trust_store.as_ref(), selector.as_ref())
    }));
    Policy::new("key_based", steps)
}

/// Cross-check against the extender's view of the calendar.
pub fn calendar_based() -> Policy {
    let mut steps = internal_rules();
    steps.push(Rule::terminal(
        "calendar_chain_matches_extender",
        rules::calendar_chain_matches_extender,
    ));
    Policy::new("calendar_based", steps)
}

/// The publications file, falling back to key-based verification while no
/// publication covers the signature yet.
pub fn default_policy(
    trust_store: Arc<dyn TrustStore>,
    selector: Arc<dyn CertificateSelector>,
) -> Policy {
    publications_file_based().with_fallback(key_based(trust_store, selector))
}
