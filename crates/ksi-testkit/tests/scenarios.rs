//! End-to-end scenarios over the in-memory deployment.

use std::sync::Arc;

use ksi::core::{combine, ChainLink, PublicationRecord, PublicationsFile};
use ksi::verify::{
    internal, key_based, publication_based, publications_file_based, user_publication_based,
    Evaluation, Policy, Rule, VerificationError,
};
use ksi::{IdentityMetadata, KsiConfig, PublicationData, VerificationContext, VerificationResultCode};
use ksi_service::{MemoryTrustStore, SubjectRdnSelector};
use ksi_testkit::generators::{
    aggregation_chain, data_hash, outcome, publication_data, sha256_hash, timestamp,
};
use ksi_testkit::{document_hashes, init_tracing, TestInfrastructure, START_TIME};
use proptest::prelude::*;

// =============================================================================
// BLOCK SIGNING
// =============================================================================

#[test]
fn test_block_of_fifty_shares_one_root() {
    init_tracing();
    let infra = TestInfrastructure::new();
    let ksi = infra.ksi();
    let hashes = document_hashes(50);

    let signer = ksi.block_signer();
    let handles: Vec<_> = hashes
        .iter()
        .map(|h| signer.add(h.clone(), None).unwrap())
        .collect();
    let signatures = signer.sign().unwrap();

    assert_eq!(signatures.len(), 50);
    assert_eq!(infra.aggregator.request_count(), 1);

    let root = signatures[0].calendar_chain().unwrap().input_hash.clone();
    for (handle, hash) in handles.iter().zip(&hashes) {
        let sig = &signatures[handle.index()];
        assert_eq!(sig.input_hash(), hash);
        assert_eq!(sig.aggregation_output().unwrap().hash, root);

        let result = ksi.verify(sig, Some(hash)).unwrap();
        assert_eq!(result.code, VerificationResultCode::Ok, "leaf {}", handle.index());
    }
}

#[test]
fn test_block_with_identities_verifies() {
    let infra = TestInfrastructure::from_aggregator(|calendar| {
        ksi_service::memory::MemoryAggregator::new(calendar, ksi::core::Keypair::from_seed(&[7; 32]))
            .with_client_id("gateway-user")
    });
    let ksi = infra.ksi();
    let hashes = document_hashes(5);

    let signer = ksi.block_signer();
    for (i, hash) in hashes.iter().enumerate() {
        let metadata = IdentityMetadata::new(format!("user-{i}")).sequence_number(i as u64);
        signer.add(hash.clone(), Some(metadata)).unwrap();
    }
    let signatures = signer.sign().unwrap();

    for (i, sig) in signatures.iter().enumerate() {
        assert_eq!(sig.identity_string(), format!("GT :: gateway-user :: user-{i}"));
        let ctx = VerificationContext::new(sig.clone()).with_document_hash(hashes[i].clone());
        assert!(internal().verify(&ctx).is_ok());
    }
}

#[test]
fn test_signatures_survive_serialization() {
    let infra = TestInfrastructure::new();
    let ksi = infra.ksi();
    let hash = &document_hashes(1)[0];
    let signature = ksi.sign(hash).unwrap();

    let bytes = signature.to_bytes().unwrap();
    let decoded = ksi::KsiSignature::from_bytes(&bytes).unwrap();
    assert_eq!(decoded, signature);
    assert!(ksi.verify(&decoded, Some(hash)).unwrap().is_ok());
}

// =============================================================================
// EXTENSION AND PUBLICATIONS
// =============================================================================

#[test]
fn test_unextended_signature_without_extending() {
    let infra = TestInfrastructure::new();
    let ksi = infra.ksi();
    let signature = ksi.sign_bytes(b"contract").unwrap();
    let record = infra.publish_after(3600);

    let file = Arc::new(infra.publications_file());
    let ctx = VerificationContext::new(signature.clone())
        .with_publications_file(Arc::clone(&file))
        .with_extending_service(infra.extender.clone())
        .with_extending_allowed(false);
    let result = publications_file_based().verify(&ctx);
    assert_eq!(result.code, VerificationResultCode::Na);
    assert_eq!(result.error, Some(VerificationError::Inconclusive));

    // Allowed to extend, the same file anchors it.
    let ctx = VerificationContext::new(signature)
        .with_publications_file(file)
        .with_extending_service(infra.extender.clone())
        .with_extending_allowed(true);
    let result = publications_file_based().verify(&ctx);
    assert_eq!(result.code, VerificationResultCode::Ok);
    assert_eq!(infra.extender.request_count(), 1);
    assert_eq!(record.publication_time(), START_TIME + 1 + 3600);
}

#[test]
fn test_extended_signature_matches_user_code() {
    let infra = TestInfrastructure::new();
    let ksi = infra.ksi();
    let signature = ksi.sign_bytes(b"invoice").unwrap();
    let record = infra.publish_after(86_400);

    let extended = ksi.extend(&signature).unwrap();
    assert_eq!(extended.publication_time(), Some(record.publication_time()));

    // The user reads the code off a newspaper.
    let code = record.publication_data.format();
    let user_publication = PublicationData::parse(&code).unwrap();

    let ctx = VerificationContext::new(extended.clone()).with_user_publication(user_publication);
    let result = user_publication_based().verify(&ctx);
    assert_eq!(result.code, VerificationResultCode::Ok);

    // A different, later publication is not a match without extending.
    let later = infra.publish_after(60);
    let ctx = VerificationContext::new(extended)
        .with_user_publication(later.publication_data.clone())
        .with_extending_allowed(false);
    let result = user_publication_based().verify(&ctx);
    assert_ne!(result.code, VerificationResultCode::Ok);
}

#[test]
fn test_publication_based_prefers_user_publication() {
    let infra = TestInfrastructure::new();
    let ksi = infra.ksi();
    let signature = ksi.sign_bytes(b"report").unwrap();
    let record = infra.publish_after(120);
    let extended = ksi.extend(&signature).unwrap();

    let ctx = VerificationContext::new(extended)
        .with_user_publication(record.publication_data.clone())
        .with_publications_file(Arc::new(PublicationsFile::new(vec![], vec![], START_TIME)));
    let result = publication_based().verify(&ctx);
    assert_eq!(result.code, VerificationResultCode::Ok);
    let trail: Vec<_> = result.rule_results().map(|r| r.rule).collect();
    assert_eq!(trail.last(), Some(&"user_publication"));
}

#[test]
fn test_extend_to_each_publication() {
    let infra = TestInfrastructure::new();
    let ksi = infra.ksi();
    let signature = ksi.sign_bytes(b"log entry").unwrap();

    let records: Vec<PublicationRecord> = (0..4).map(|_| infra.publish_after(1000)).collect();
    for record in &records {
        let extended = ksi.extend_to(&signature, record).unwrap();
        assert_eq!(
            extended.calendar_chain().unwrap().output_hash().unwrap(),
            record.publication_data.publication_hash
        );
    }
}

#[test]
fn test_publications_file_outage_falls_back_to_key() {
    let infra = TestInfrastructure::new();
    infra.publications.set_unavailable(true);
    let ksi = infra.ksi();

    let hash = &document_hashes(1)[0];
    let signature = ksi.sign(hash).unwrap();
    let result = ksi.verify(&signature, Some(hash)).unwrap();
    assert_eq!(result.code, VerificationResultCode::Ok);
    assert_eq!(result.deciding_policy(), Some("key_based"));
    assert_eq!(result.policy_results.len(), 2);
}

// =============================================================================
// KEY-BASED TRUST
// =============================================================================

#[test]
fn test_selector_constraint_rejects_certificate() {
    let infra = TestInfrastructure::new();
    let config = KsiConfig {
        publications_file_certificate_constraint: "E=someone@example.com".into(),
        ..KsiConfig::default()
    };
    let ksi = infra.ksi_with(config);
    let signature = ksi.sign_bytes(b"memo").unwrap();

    let result = ksi.verify(&signature, None).unwrap();
    assert_eq!(result.code, VerificationResultCode::Fail);
    assert_eq!(result.error, Some(VerificationError::CertificateNotFound));
}

#[test]
fn test_empty_trust_store() {
    let infra = TestInfrastructure::new();
    let signature = infra.ksi().sign_bytes(b"memo").unwrap();

    let policy = key_based(
        Arc::new(MemoryTrustStore::new()),
        Arc::new(SubjectRdnSelector::new("E=publications@guardtime.com")),
    );
    let result = policy.verify(&VerificationContext::new(signature));
    assert_eq!(result.error, Some(VerificationError::CertificateNotFound));
}

// =============================================================================
// PROPERTIES
// =============================================================================

fn records_at(times: &[u64]) -> PublicationsFile {
    let records = times
        .iter()
        .map(|&t| {
            let hash = ksi::HashAlgorithm::Sha2_256.digest(&t.to_be_bytes()).unwrap();
            PublicationRecord::new(PublicationData::new(t, hash))
        })
        .collect();
    PublicationsFile::new(records, vec![], 0)
}

proptest! {
    #[test]
    fn nearest_after_is_first_at_or_after(
        times in prop::collection::btree_set(timestamp(), 0..20),
        query in timestamp(),
    ) {
        let times: Vec<u64> = times.into_iter().collect();
        let file = records_at(&times);
        let expected = times.iter().copied().find(|&t| t >= query);
        prop_assert_eq!(file.nearest_after(query).map(|r| r.publication_time()), expected);
    }

    #[test]
    fn publications_file_sorted(times in prop::collection::vec(timestamp(), 0..20)) {
        let mut reversed = times.clone();
        reversed.sort_unstable_by(|a, b| b.cmp(a));
        let file = records_at(&reversed);
        let got: Vec<u64> = file.records().iter().map(|r| r.publication_time()).collect();
        prop_assert!(got.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn code_format_parse_idempotent(data in publication_data()) {
        let code = data.format();
        let parsed = PublicationData::parse(&code).unwrap();
        prop_assert_eq!(parsed.format(), code);
        prop_assert_eq!(parsed, data);
    }

    #[test]
    fn code_with_flipped_character_rejected(data in publication_data(), pos in any::<prop::sample::Index>()) {
        let code: Vec<char> = data.format().chars().filter(|c| *c != '-').collect();
        let i = pos.index(code.len());
        let mut tampered = code.clone();
        tampered[i] = if code[i] == 'A' { 'B' } else { 'A' };
        let tampered: String = tampered.into_iter().collect();
        // Any single-character change breaks the checksum, the structure or
        // the zero padding of the last character.
        prop_assert!(PublicationData::parse(&tampered).is_err());
    }

    #[test]
    fn generated_chains_pass_internal_policy(chain in aggregation_chain(8)) {
        let sig = ksi::KsiSignature::builder().aggregation_chain(chain.clone()).build().unwrap();
        let ctx = VerificationContext::new(sig).with_document_hash(chain.input_hash.clone());
        prop_assert!(internal().verify(&ctx).is_ok());
    }

    #[test]
    fn chain_output_matches_stepwise_combine(chain in aggregation_chain(8)) {
        let mut current = chain.input_hash.clone();
        let mut level = 0u8;
        for link in &chain.links {
            level = level + link.level_correction + 1;
            let operand = match (link.sibling_hash(), link.identity()) {
                (Some(hash), _) => hash.imprint(),
                (None, Some(m)) => m.to_bytes().unwrap(),
                (None, None) => unreachable!(),
            };
            current = combine(chain.aggregation_algorithm, &current, &operand, link.direction, level).unwrap();
        }
        let out = chain.output(0).unwrap();
        prop_assert_eq!(out.hash, current);
        prop_assert_eq!(out.level, level);
    }

    #[test]
    fn any_hash_signs_and_verifies(hash in data_hash()) {
        let infra = TestInfrastructure::new();
        let ksi = infra.ksi();
        let sig = ksi.sign(&hash).unwrap();
        prop_assert!(ksi.verify(&sig, Some(&hash)).unwrap().is_ok());
    }

    /// Fail is reached only through a failing rule, never from Na.
    #[test]
    fn na_never_becomes_fail(
        outcomes in prop::collection::vec((outcome(), any::<bool>()), 1..8),
        sibling in sha256_hash(),
    ) {
        let steps: Vec<Rule> = outcomes
            .iter()
            .cloned()
            .map(|(out, terminal)| {
                let eval = move |_: &Evaluation<'_>| out.clone();
                if terminal { Rule::terminal("generated", eval) } else { Rule::check("generated", eval) }
            })
            .collect();
        let policy = Policy::new("generated", steps);

        let sig = ksi::KsiSignature::builder()
            .aggregation_chain(ksi::core::AggregationHashChain {
                aggregation_time: START_TIME,
                chain_index: vec![],
                input_hash: sibling.clone(),
                aggregation_algorithm: ksi::HashAlgorithm::Sha2_256,
                links: vec![ChainLink::left(sibling)],
            })
            .build()
            .unwrap();
        let result = policy.verify(&VerificationContext::new(sig));

        let any_fail = outcomes.iter().any(|(o, _)| o.code() == VerificationResultCode::Fail);
        if result.code == VerificationResultCode::Fail {
            prop_assert!(any_fail);
        }
        if !any_fail {
            prop_assert_ne!(result.code, VerificationResultCode::Fail);
        }
    }
}
