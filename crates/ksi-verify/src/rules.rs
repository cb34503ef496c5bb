//! Verification rules.
//!
//! Each rule is a function of the context seen through an [`Evaluation`],
//! which only adds the call's extender cache. Internal
//! consistency rules pass when the part they check is absent; anchor rules
//! return `Na` when their anchor does not apply.

use ksi_core::{CalendarHashChain, ChainResult, CoreError, DataHash, PublicationData};
use ksi_service::{CertificateSelector, ServiceError, TrustStore};

use crate::context::Evaluation;
use crate::error::VerificationError as E;
use crate::result::Outcome;

// ─────────────────────────────────────────────────────────────────────────────
// Internal consistency
// ─────────────────────────────────────────────────────────────────────────────

/// GEN-01: the signed hash is the document's hash.
pub fn document_hash(ctx: &Evaluation<'_>) -> Outcome {
    match ctx.document_hash() {
        Some(hash) if hash != ctx.signature().input_hash() => Outcome::Fail(E::WrongDocument),
        _ => Outcome::Ok,
    }
}

/// INT-01: every aggregation chain starts at the previous chain's output.
pub fn aggregation_chains_consistent(ctx: &Evaluation<'_>) -> Outcome {
    match ctx.aggregation_output() {
        Ok(_) => Outcome::Ok,
        Err(_) => Outcome::Fail(E::InconsistentAggregationChains),
    }
}

/// INT-02: all aggregation chains belong to the same round.
pub fn aggregation_times_consistent(ctx: &Evaluation<'_>) -> Outcome {
    let time = ctx.signature().aggregation_time();
    if ctx
        .signature()
        .aggregation_chains()
        .iter()
        .all(|c| c.aggregation_time == time)
    {
        Outcome::Ok
    } else {
        Outcome::Fail(E::InconsistentAggregationTimes)
    }
}

/// INT-10: each chain index is the next outer chain's index followed by this
/// chain's own shape.
pub fn chain_index_consistent(ctx: &Evaluation<'_>) -> Outcome {
    let chains = ctx.signature().aggregation_chains();
    for (i, chain) in chains.iter().enumerate() {
        let Some((own, prefix)) = chain.chain_index.split_last() else {
            return Outcome::Fail(E::ChainIndexMismatch);
        };
        if chain.shape() != Some(*own) {
            return Outcome::Fail(E::ChainIndexMismatch);
        }
        if let Some(outer) = chains.get(i + 1) {
            if prefix != outer.chain_index.as_slice() {
                return Outcome::Fail(E::ChainIndexMismatch);
            }
        }
    }
    Outcome::Ok
}

/// INT-03: the calendar chain starts at the aggregation output.
pub fn calendar_chain_input(ctx: &Evaluation<'_>) -> Outcome {
    let Some(calendar) = ctx.signature().calendar_chain() else {
        return Outcome::Ok;
    };
    match ctx.aggregation_output() {
        Ok(out) if out.hash == calendar.input_hash => Outcome::Ok,
        _ => Outcome::Fail(E::CalendarInputMismatch),
    }
}

/// INT-04: the calendar chain starts at the signature's round.
pub fn calendar_chain_aggregation_time(ctx: &Evaluation<'_>) -> Outcome {
    match ctx.signature().calendar_chain() {
        Some(c) if c.aggregation_time != ctx.signature().aggregation_time() => {
            Outcome::Fail(E::CalendarAggregationTimeMismatch)
        }
        _ => Outcome::Ok,
    }
}

/// INT-05: the calendar chain's shape encodes its aggregation time.
pub fn calendar_chain_shape(ctx: &Evaluation<'_>) -> Outcome {
    let Some(calendar) = ctx.signature().calendar_chain() else {
        return Outcome::Ok;
    };
    match calendar.registration_time() {
        Ok(time) if time == calendar.aggregation_time => Outcome::Ok,
        _ => Outcome::Fail(E::CalendarShapeMismatch),
    }
}

/// INT-06: the authentication record signs the root the signature reaches.
pub fn auth_record_time(ctx: &Evaluation<'_>) -> Outcome {
    let sig = ctx.signature();
    let Some(record) = sig.calendar_authentication_record() else {
        return Outcome::Ok;
    };
    let expected = sig.publication_time().unwrap_or_else(|| sig.aggregation_time());
    if record.publication_time() == expected {
        Outcome::Ok
    } else {
        Outcome::Fail(E::AuthRecordTimeMismatch)
    }
}

/// INT-08: the authentication record's hash is the calendar root (or the
/// aggregation output when there is no calendar chain).
pub fn auth_record_hash(ctx: &Evaluation<'_>) -> Outcome {
    let Some(record) = ctx.signature().calendar_authentication_record() else {
        return Outcome::Ok;
    };
    match anchored_hash(ctx) {
        Ok(hash) if hash == record.publication_data.publication_hash => Outcome::Ok,
        _ => Outcome::Fail(E::AuthRecordHashMismatch),
    }
}

/// INT-07: the publication record is for the calendar chain's root time.
pub fn publication_record_time(ctx: &Evaluation<'_>) -> Outcome {
    let sig = ctx.signature();
    match (sig.publication_record(), sig.calendar_chain()) {
        (Some(record), Some(calendar)) if record.publication_time() != calendar.publication_time => {
            Outcome::Fail(E::PublicationTimeMismatch)
        }
        _ => Outcome::Ok,
    }
}

/// INT-09: the publication record's hash is the calendar chain's output.
pub fn publication_record_hash(ctx: &Evaluation<'_>) -> Outcome {
    let sig = ctx.signature();
    let (Some(record), Some(calendar)) = (sig.publication_record(), sig.calendar_chain()) else {
        return Outcome::Ok;
    };
    match calendar.output_hash() {
        Ok(hash) if &hash == record.publication_hash() => Outcome::Ok,
        _ => Outcome::Fail(E::PublicationHashMismatch),
    }
}

/// Always `Ok`; ends the internal policy.
pub fn internal_checks_passed(_ctx: &Evaluation<'_>) -> Outcome {
    Outcome::Ok
}

/// The hash the signature itself commits to: calendar root if it carries a
/// calendar chain, aggregation output otherwise.
fn anchored_hash(ctx: &Evaluation<'_>) -> Result<DataHash, CoreError> {
    match ctx.signature().calendar_chain() {
        Some(calendar) => calendar.output_hash(),
        None => Ok(ctx.aggregation_output()?.hash),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Publications
// ─────────────────────────────────────────────────────────────────────────────

/// Match the signature against the user's trusted publication.
///
/// An extended signature for the same time is compared directly; otherwise
/// the signature is extended to the user's publication if allowed.
pub fn user_publication(ctx: &Evaluation<'_>) -> Outcome {
    let Some(publication) = ctx.user_publication() else {
        return Outcome::Na(E::Inconclusive);
    };
    let sig = ctx.signature();

    if let Some(record) = sig.publication_record() {
        if record.publication_time() == publication.publication_time {
            return if &record.publication_data == publication {
                Outcome::Ok
            } else {
                Outcome::Fail(E::UserPublicationMismatch)
            };
        }
    }

    if publication.publication_time < sig.aggregation_time() || !ctx.is_extending_allowed() {
        return Outcome::Na(E::Inconclusive);
    }
    verify_extended_to(ctx, publication)
}

/// Match the signature against the publications file.
///
/// An extended signature whose publication is in the file is compared
/// directly. Otherwise the signature is extended to the first publication
/// after its round, if allowed.
pub fn publications_file(ctx: &Evaluation<'_>) -> Outcome {
    let Some(file) = ctx.publications_file() else {
        return Outcome::Na(E::Inconclusive);
    };
    let sig = ctx.signature();

    if let Some(record) = sig.publication_record() {
        if let Some(trusted) = file.find(record.publication_time()) {
            return if trusted.publication_data == record.publication_data {
                Outcome::Ok
            } else {
                Outcome::Fail(E::PublicationsFileMismatch)
            };
        }
    }

    let Some(target) = file.nearest_after(sig.aggregation_time()) else {
        return Outcome::Na(E::Inconclusive);
    };
    if !ctx.is_extending_allowed() {
        return Outcome::Na(E::Inconclusive);
    }
    verify_extended_to(ctx, &target.publication_data)
}

/// Extend to `publication` and check the fresh chain against both ends.
fn verify_extended_to(ctx: &Evaluation<'_>, publication: &PublicationData) -> Outcome {
    let chain = match extend(ctx, Some(publication.publication_time)) {
        Ok(chain) => chain,
        Err(outcome) => return outcome,
    };
    let aggregation = match ctx.aggregation_output() {
        Ok(out) => out,
        Err(_) => return Outcome::Fail(E::InconsistentAggregationChains),
    };

    if chain.input_hash != aggregation.hash {
        return Outcome::Fail(E::ExtendedChainInputMismatch);
    }
    match chain.output_hash() {
        Ok(hash) if hash == publication.publication_hash => Outcome::Ok,
        _ => Outcome::Fail(E::ExtendedChainOutputMismatch),
    }
}

/// Fetch an extended chain, mapping a missing extender to `Na` and any other
/// collaborator failure to `Fail`.
fn extend(ctx: &Evaluation<'_>, publication_time: Option<u64>) -> Result<CalendarHashChain, Outcome> {
    match ctx.extended_calendar_chain(publication_time) {
        Ok(chain) => Ok(chain),
        Err(ServiceError::NotAvailable(_)) => Err(Outcome::Na(E::Inconclusive)),
        Err(e) => {
            tracing::warn!(error = %e, "calendar extension failed");
            Err(Outcome::Fail(E::ExtenderUnavailable))
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Key-based
// ─────────────────────────────────────────────────────────────────────────────

/// KEY-01: the record's certificate is in the trust store and accepted by the selector.
pub fn certificate_exists(
    ctx: &Evaluation<'_>,
    store: &dyn TrustStore,
    selector: &dyn CertificateSelector,
) -> Outcome {
    let Some(record) = ctx.signature().calendar_authentication_record() else {
        return Outcome::Na(E::Inconclusive);
    };
    match store.select(record.certificate_id(), selector) {
        Some(_) => Outcome::Ok,
        None => Outcome::Fail(E::CertificateNotFound),
    }
}

/// KEY-03: the certificate was valid when the record was made.
pub fn certificate_validity(
    ctx: &Evaluation<'_>,
    store: &dyn TrustStore,
    selector: &dyn CertificateSelector,
) -> Outcome {
    let Some(record) = ctx.signature().calendar_authentication_record() else {
        return Outcome::Na(E::Inconclusive);
    };
    match store.select(record.certificate_id(), selector) {
        Some(cert) if cert.is_valid_at(record.publication_time()) => Outcome::Ok,
        Some(_) => Outcome::Fail(E::CertificateExpired),
        None => Outcome::Fail(E::CertificateNotFound),
    }
}

/// KEY-02: the record's signature verifies under the certificate's key.
pub fn auth_record_signature(
    ctx: &Evaluation<'_>,
    store: &dyn TrustStore,
    selector: &dyn CertificateSelector,
) -> Outcome {
    let Some(record) = ctx.signature().calendar_authentication_record() else {
        return Outcome::Na(E::Inconclusive);
    };
    let Some(cert) = store.select(record.certificate_id(), selector) else {
        return Outcome::Fail(E::CertificateNotFound);
    };
    match record.verify(&cert.public_key) {
        Ok(()) => Outcome::Ok,
        Err(_) => Outcome::Fail(E::SignatureInvalid),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Calendar-based
// ─────────────────────────────────────────────────────────────────────────────

/// Cross-check the signature against a calendar chain freshly fetched for
/// its own round.
///
/// Targets the signature's own calendar root when it has one, the calendar
/// head otherwise.
pub fn calendar_chain_matches_extender(ctx: &Evaluation<'_>) -> Outcome {
    let sig = ctx.signature();
    let extended = match extend(ctx, sig.publication_time()) {
        Ok(chain) => chain,
        Err(outcome) => return outcome,
    };
    let aggregation: ChainResult = match ctx.aggregation_output() {
        Ok(out) => out,
        Err(_) => return Outcome::Fail(E::InconsistentAggregationChains),
    };

    if extended.input_hash != aggregation.hash {
        return Outcome::Fail(E::CalendarInputMismatchExtended);
    }
    if extended.aggregation_time != sig.aggregation_time() {
        return Outcome::Fail(E::CalendarTimeMismatch);
    }
    if let Some(own) = sig.calendar_chain() {
        match (own.output_hash(), extended.output_hash()) {
            (Ok(a), Ok(b)) if a == b => {}
            _ => return Outcome::Fail(E::CalendarOutputMismatch),
        }
    }
    Outcome::Ok
}
