//! Golden publication codes.
//!
//! Each vector pins the code for a publication time and hash, so that any
//! change to the code layout (checksum, byte order, base32 alphabet or
//! grouping) is caught.

use ksi_core::{DataHash, HashAlgorithm, PublicationData};

/// A golden publication code.
#[derive(Debug, Clone)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    pub publication_time: u64,
    pub algorithm: HashAlgorithm,
    /// Publication hash digest (hex).
    pub hash: &'static str,
    /// Expected publication code.
    pub code: &'static str,
}

impl GoldenVector {
    pub fn publication_data(&self) -> PublicationData {
        let value = hex::decode(self.hash).expect("vector hash is hex");
        let hash = DataHash::new(self.algorithm, value).expect("vector hash has digest length");
        PublicationData::new(self.publication_time, hash)
    }
}

/// Get all golden vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "Guardtime publication of 2016-02-15",
            publication_time: 1_455_494_400,
            algorithm: HashAlgorithm::Sha2_256,
            hash: "1878289e1a333dd85091d30f001b9f6f9ed4d428d57e049bd0ebd4dbc89bd210",
            code: "AAAAAA-CWYEKQ-AAIYPA-UJ4GRT-HXMFBE-OTB4AB-XH3PT3-KNIKGV-PYCJXU-HL2TN4-RG6SCC-3ZGSBM",
        },
        GoldenVector {
            name: "Time zero, SHA-256 of empty input",
            publication_time: 0,
            algorithm: HashAlgorithm::Sha2_256,
            hash: "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855",
            code: "AAAAAA-AAAAAA-AAPDWD-CEFGH4-DQKJV6-7UZCMW-7OJEE6-XEDZDE-TOJUZJ-EVTENX-QUVYKX-XH3MEU",
        },
        GoldenVector {
            name: "SHA-256 of hello world",
            publication_time: 1_455_494_400,
            algorithm: HashAlgorithm::Sha2_256,
            hash: "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9",
            code: "AAAAAA-CWYEKQ-AANZJU-T3TE2N-HYEKKL-SS27NH-3K72YS-CO7Y32-KOAO5E-EI66WO-F36N5F-32LBS5",
        },
        GoldenVector {
            name: "SHA3-256 imprint",
            publication_time: 1_234_567_890,
            algorithm: HashAlgorithm::Sha3_256,
            hash: "c36b4e209ac886686e004860aece3e0527ad6e1b273e6f270f13aa04e609eea8",
            code: "AAAAAA-CJSYBN-ECGDNN-HCBGWI-QZUG4A-CIMCXM-4PQFE6-WW4GZH-HZXSOD-YTVICO-MCPOVA-MVNVTB",
        },
    ]
}

/// Check every vector both ways. Returns the names of failing vectors.
pub fn verify_all_vectors() -> Vec<&'static str> {
    all_vectors()
        .into_iter()
        .filter(|v| {
            let data = v.publication_data();
            let formatted = data.format() == v.code;
            let parsed = PublicationData::parse(v.code).ok().as_ref() == Some(&data);
            !(formatted && parsed)
        })
        .map(|v| v.name)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_vectors_hold() {
        assert_eq!(verify_all_vectors(), Vec::<&str>::new());
    }

    #[test]
    fn test_vector_names_unique() {
        let vectors = all_vectors();
        for (i, a) in vectors.iter().enumerate() {
            for b in &vectors[i + 1..] {
                assert_ne!(a.name, b.name);
            }
        }
    }
}
