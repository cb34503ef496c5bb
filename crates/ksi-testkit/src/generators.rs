//! Proptest generators for property-based testing.

use proptest::prelude::*;

use ksi_core::{
    AggregationHashChain, ChainLink, DataHash, Direction, HashAlgorithm, IdentityMetadata,
    PublicationData,
};
use ksi_verify::{Outcome, VerificationError};

/// An implemented, non-deprecated hash algorithm.
pub fn hash_algorithm() -> impl Strategy<Value = HashAlgorithm> {
    prop_oneof![
        Just(HashAlgorithm::Sha2_256),
        Just(HashAlgorithm::Sha2_384),
        Just(HashAlgorithm::Sha2_512),
        Just(HashAlgorithm::Sha3_224),
        Just(HashAlgorithm::Sha3_256),
        Just(HashAlgorithm::Sha3_384),
        Just(HashAlgorithm::Sha3_512),
    ]
}

/// A hash of random bytes under a random algorithm.
pub fn data_hash() -> impl Strategy<Value = DataHash> {
    (hash_algorithm(), payload(64)).prop_map(|(alg, data)| {
        alg.digest(&data).expect("generated algorithms are implemented")
    })
}

/// A SHA-256 hash of random bytes.
pub fn sha256_hash() -> impl Strategy<Value = DataHash> {
    any::<[u8; 32]>().prop_map(|bytes| {
        DataHash::new(HashAlgorithm::Sha2_256, bytes.to_vec()).expect("32 bytes is SHA-256 sized")
    })
}

/// Generate payload bytes of specified max length.
pub fn payload(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

/// A plausible Unix time between 2007 and 2100.
pub fn timestamp() -> impl Strategy<Value = u64> {
    1_167_609_600u64..4_102_444_800u64
}

pub fn direction() -> impl Strategy<Value = Direction> {
    prop_oneof![Just(Direction::Left), Just(Direction::Right)]
}

/// Identity metadata with optional fields filled at random.
pub fn metadata() -> impl Strategy<Value = IdentityMetadata> {
    (
        "[A-Za-z][A-Za-z0-9.@-]{0,15}",
        proptest::option::of("[a-z0-9-]{1,12}"),
        proptest::option::of(any::<u64>()),
        proptest::option::of(timestamp()),
    )
        .prop_map(|(client, machine, seq, time)| {
            let mut m = IdentityMetadata::new(client);
            if let Some(machine) = machine {
                m = m.machine_id(machine);
            }
            if let Some(seq) = seq {
                m = m.sequence_number(seq);
            }
            if let Some(time) = time {
                m = m.request_time(time);
            }
            m
        })
}

/// An aggregation link: a sibling hash or, less often, an identity record.
pub fn chain_link() -> impl Strategy<Value = ChainLink> {
    prop_oneof![
        4 => (direction(), sha256_hash(), 0u8..3).prop_map(|(dir, hash, corr)| {
            let link = match dir {
                Direction::Left => ChainLink::left(hash),
                Direction::Right => ChainLink::right(hash),
            };
            link.with_level_correction(corr)
        }),
        1 => (direction(), metadata()).prop_map(|(dir, m)| ChainLink::metadata(dir, m)),
    ]
}

/// A SHA-256 aggregation chain of up to `max_links` links with a
/// consistent chain index.
pub fn aggregation_chain(max_links: usize) -> impl Strategy<Value = AggregationHashChain> {
    (
        timestamp(),
        sha256_hash(),
        prop::collection::vec(chain_link(), 1..=max_links),
    )
        .prop_map(|(time, input, links)| {
            let mut chain = AggregationHashChain {
                aggregation_time: time,
                chain_index: Vec::new(),
                input_hash: input,
                aggregation_algorithm: HashAlgorithm::Sha2_256,
                links,
            };
            chain.chain_index = chain.shape().into_iter().collect();
            chain
        })
}

pub fn publication_data() -> impl Strategy<Value = PublicationData> {
    (any::<u64>(), data_hash()).prop_map(|(time, hash)| PublicationData::new(time, hash))
}

/// Any rule error.
pub fn verification_error() -> impl Strategy<Value = VerificationError> {
    prop::sample::select(VerificationError::ALL.to_vec())
}

/// A rule outcome.
pub fn outcome() -> impl Strategy<Value = Outcome> {
    prop_oneof![
        Just(Outcome::Ok),
        verification_error().prop_map(Outcome::Na),
        verification_error().prop_map(Outcome::Fail),
    ]
}
