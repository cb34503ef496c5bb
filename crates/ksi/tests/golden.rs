//! Golden vectors for publication codes and hash chain steps.
//!
//! Every KSI implementation must produce identical:
//! - publication codes (time, imprint, CRC-32, base32, grouping)
//! - aggregation step hashes (operand order, level byte)
//! - calendar step hashes (0xFF level byte)

use ksi::core::{
    combine, AggregationHashChain, CalendarHashChain, ChainLink, CoreError, Direction,
};
use ksi::{DataHash, HashAlgorithm, PublicationData};
use serde::{Deserialize, Serialize};

/// A single publication code vector.
#[derive(Debug, Serialize, Deserialize)]
pub struct GoldenVector {
    pub name: String,
    pub description: String,

    // Inputs
    pub publication_time: u64,
    pub algorithm: String,
    pub data: String, // hex, hashed with `algorithm`

    // Derived outputs
    pub publication_hash: String, // digest hex
    pub code: String,
}

fn generate_vector(
    name: &str,
    description: &str,
    publication_time: u64,
    algorithm: HashAlgorithm,
    data: &[u8],
) -> GoldenVector {
    let hash = algorithm.digest(data).unwrap();
    let publication = PublicationData::new(publication_time, hash.clone());

    GoldenVector {
        name: name.to_string(),
        description: description.to_string(),
        publication_time,
        algorithm: algorithm.name().to_string(),
        data: hex::encode(data),
        publication_hash: hash.to_hex(),
        code: publication.format(),
    }
}

pub fn generate_all_vectors() -> Vec<GoldenVector> {
    vec![
        generate_vector(
            "epoch_empty",
            "Time zero, SHA-256 of the empty string",
            0,
            HashAlgorithm::Sha2_256,
            b"",
        ),
        generate_vector(
            "hello_world",
            "SHA-256 of 'hello world' at 2016-02-15",
            1_455_494_400,
            HashAlgorithm::Sha2_256,
            b"hello world",
        ),
        generate_vector(
            "sha256_2023",
            "SHA-256 at 2023-11-14",
            1_700_000_000,
            HashAlgorithm::Sha2_256,
            b"ksi",
        ),
        generate_vector(
            "sha512_2023",
            "SHA-512 imprint, code ends in a partial group",
            1_700_000_000,
            HashAlgorithm::Sha2_512,
            b"ksi",
        ),
        generate_vector(
            "sha3_256",
            "SHA3-256 imprint",
            1_234_567_890,
            HashAlgorithm::Sha3_256,
            b"ksi",
        ),
    ]
}

const EXPECTED_CODES: [(&str, &str); 5] = [
    (
        "epoch_empty",
        "AAAAAA-AAAAAA-AAPDWD-CEFGH4-DQKJV6-7UZCMW-7OJEE6-XEDZDE-TOJUZJ-EVTENX-QUVYKX-XH3MEU",
    ),
    (
        "hello_world",
        "AAAAAA-CWYEKQ-AANZJU-T3TE2N-HYEKKL-SS27NH-3K72YS-CO7Y32-KOAO5E-EI66WO-F36N5F-32LBS5",
    ),
    (
        "sha256_2023",
        "AAAAAA-DFKPYQ-AAPT5Y-YR6WGX-H7CNWS-DIK4GF-2ADMR2-B742NY-RNYXXS-XRGNXO-PM54EU-ODQOPI",
    ),
    (
        "sha512_2023",
        "AAAAAA-DFKPYQ-ABIG2L-RLMMZN-2KZCQD-4MNZP5-ED53Z3-6734BY-GSL4KJ-IZX2DX-QL3X3R-LILQSZ-PRJ2EU-ON2NZZ-FRGWUD-MJEFQT-CWJWVS-SW7P7U-USXMBU-NDTFT7-C2DA",
    ),
    (
        "sha3_256",
        "AAAAAA-CJSYBN-ECGDNN-HCBGWI-QZUG4A-CIMCXM-4PQFE6-WW4GZH-HZXSOD-YTVICO-MCPOVA-MVNVTB",
    ),
];

/// Published by Guardtime on 2016-02-15.
const REAL_CODE: &str =
    "AAAAAA-CWYEKQ-AAIYPA-UJ4GRT-HXMFBE-OTB4AB-XH3PT3-KNIKGV-PYCJXU-HL2TN4-RG6SCC-3ZGSBM";
const REAL_TIME: u64 = 1_455_494_400;
const REAL_HASH: &str = "1878289e1a333dd85091d30f001b9f6f9ed4d428d57e049bd0ebd4dbc89bd210";

fn sha256(data: &[u8]) -> DataHash {
    HashAlgorithm::Sha2_256.digest(data).unwrap()
}

#[test]
fn test_generate_vectors() {
    let vectors = generate_all_vectors();
    assert_eq!(vectors.len(), EXPECTED_CODES.len());

    for (v, (name, code)) in vectors.iter().zip(EXPECTED_CODES) {
        assert_eq!(v.name, name);
        assert_eq!(v.code, code, "code mismatch for {}", v.name);
    }
}

#[test]
fn test_vectors_deterministic() {
    let v1 = generate_all_vectors();
    let v2 = generate_all_vectors();

    for (a, b) in v1.iter().zip(v2.iter()) {
        assert_eq!(a.publication_hash, b.publication_hash, "hash mismatch for {}", a.name);
        assert_eq!(a.code, b.code, "code mismatch for {}", a.name);
    }
}

#[test]
fn test_vectors_parse_back() {
    for v in generate_all_vectors() {
        let parsed = PublicationData::parse(&v.code).unwrap();
        assert_eq!(parsed.publication_time, v.publication_time, "time mismatch for {}", v.name);
        assert_eq!(parsed.publication_hash.to_hex(), v.publication_hash);
        assert_eq!(parsed.publication_hash.algorithm().name(), v.algorithm);
    }
}

#[test]
fn test_real_publication_code() {
    let publication = PublicationData::parse(REAL_CODE).unwrap();
    assert_eq!(publication.publication_time, REAL_TIME);
    assert_eq!(publication.publication_hash.algorithm(), HashAlgorithm::Sha2_256);
    assert_eq!(publication.publication_hash.to_hex(), REAL_HASH);
    assert_eq!(publication.format(), REAL_CODE);

    // Lower case and no dashes.
    let compact = REAL_CODE.replace('-', "").to_lowercase();
    assert_eq!(PublicationData::parse(&compact).unwrap(), publication);
}

#[test]
fn print_golden_vectors_json() {
    #[derive(Serialize)]
    struct VectorFile {
        version: String,
        description: String,
        vectors: Vec<GoldenVector>,
    }

    let file = VectorFile {
        version: "0.1.0".to_string(),
        description: "Golden publication codes. Every implementation must produce identical outputs."
            .to_string(),
        vectors: generate_all_vectors(),
    };

    let json = serde_json::to_string_pretty(&file).unwrap();
    println!("{}", json);
}

// =============================================================================
// HASH CHAIN STEP VECTORS
// =============================================================================

#[test]
fn test_aggregation_step_operand_order() {
    let left = sha256(b"left");
    let right = sha256(b"right");

    let step = combine(HashAlgorithm::Sha2_256, &left, &right.imprint(), Direction::Left, 1).unwrap();
    assert_eq!(
        step.to_hex(),
        "f66895a2f3d1024fa41943df13bbd01045545b72f4ed07a0c754447a835be10b"
    );

    // Running hash on the right.
    let step = combine(HashAlgorithm::Sha2_256, &left, &right.imprint(), Direction::Right, 1).unwrap();
    assert_eq!(
        step.to_hex(),
        "3a2800d60e10789c3eecd8456b73213062461ff44a412a7ae8edcad1d16dd702"
    );

    let step = combine(HashAlgorithm::Sha2_256, &left, &right.imprint(), Direction::Left, 3).unwrap();
    assert_eq!(
        step.to_hex(),
        "d48115d7ed8421c96a83a286c8f1a0392de3bb265f6a9327f1666d898f5b8c47"
    );
}

#[test]
fn test_aggregation_chain_levels() {
    let chain = AggregationHashChain {
        aggregation_time: REAL_TIME,
        chain_index: vec![],
        input_hash: sha256(b"left"),
        aggregation_algorithm: HashAlgorithm::Sha2_256,
        links: vec![
            ChainLink::left(sha256(b"right")),
            ChainLink::right(sha256(b"c")).with_level_correction(1),
        ],
    };

    let out = chain.output(0).unwrap();
    assert_eq!(out.level, 3);
    assert_eq!(
        out.hash.to_hex(),
        "e2ea0bd14d7aa17b00d8ac901ae4ab5a1e5c1d5cf29293bb10e4fe684428d347"
    );
}

#[test]
fn test_calendar_step() {
    let chain = CalendarHashChain {
        publication_time: 1,
        aggregation_time: 0,
        input_hash: sha256(b"left"),
        links: vec![ChainLink::left(sha256(b"right"))],
    };
    assert_eq!(
        chain.output_hash().unwrap().to_hex(),
        "98a908b3783c954b6442948e72b14c0a53706e535f808ef82f32cb8ebcf8a99e"
    );
}

// =============================================================================
// REJECTION VECTORS
// =============================================================================

#[test]
fn test_reject_bad_checksum() {
    // Last character altered.
    let tampered = format!("{}A", &REAL_CODE[..REAL_CODE.len() - 1]);
    assert!(matches!(
        PublicationData::parse(&tampered),
        Err(CoreError::InvalidChecksum)
    ));
}

#[test]
fn test_reject_short_code() {
    assert!(PublicationData::parse("AAAAAA-AAAAAA").is_err());
    assert!(PublicationData::parse("").is_err());
}

#[test]
fn test_reject_level_overflow() {
    let chain = AggregationHashChain {
        aggregation_time: REAL_TIME,
        chain_index: vec![],
        input_hash: sha256(b"left"),
        aggregation_algorithm: HashAlgorithm::Sha2_256,
        links: vec![ChainLink::left(sha256(b"right")).with_level_correction(10)],
    };
    assert!(matches!(chain.output(250), Err(CoreError::ChainInconsistent(_))));
}
