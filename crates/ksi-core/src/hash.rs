//! Hash primitives: algorithm identifiers, imprints and incremental hashing.
//!
//! Every hash in KSI travels as an *imprint*: one algorithm id byte followed by
//! the digest. Chain steps hash imprints, never bare digests, so the algorithm
//! is always part of what gets committed to.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha384, Sha512};
use sha3::{Sha3_224, Sha3_256, Sha3_384, Sha3_512};
use std::fmt;

use crate::error::{CoreError, Result};

/// Hash algorithms registered for KSI, tagged with their imprint id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum HashAlgorithm {
    /// SHA-1, deprecated and kept for reading old signatures.
    Sha1 = 0x00,
    Sha2_256 = 0x01,
    Ripemd160 = 0x02,
    Sha2_384 = 0x04,
    Sha2_512 = 0x05,
    Sha3_224 = 0x07,
    Sha3_256 = 0x08,
    Sha3_384 = 0x09,
    Sha3_512 = 0x0A,
    Sm3 = 0x0B,
}

impl HashAlgorithm {
    /// The algorithm used when none is specified.
    pub const DEFAULT: Self = Self::Sha2_256;

    /// All registered algorithms, in id order.
    pub const ALL: [Self; 10] = [
        Self::Sha1,
        Self::Sha2_256,
        Self::Ripemd160,
        Self::Sha2_384,
        Self::Sha2_512,
        Self::Sha3_224,
        Self::Sha3_256,
        Self::Sha3_384,
        Self::Sha3_512,
        Self::Sm3,
    ];

    /// The imprint id byte.
    pub const fn id(self) -> u8 {
        self as u8
    }

    /// Look up an algorithm by imprint id.
    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|alg| alg.id() == id)
    }

    /// Look up an algorithm by name, ignoring case, dashes and underscores.
    ///
    /// Accepts both `SHA-256` and `SHA2-256` spellings.
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized: String = name
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();

        match normalized.as_str() {
            "sha1" => Some(Self::Sha1),
            "sha256" | "sha2256" | "default" => Some(Self::Sha2_256),
            "ripemd160" => Some(Self::Ripemd160),
            "sha384" | "sha2384" => Some(Self::Sha2_384),
            "sha512" | "sha2512" => Some(Self::Sha2_512),
            "sha3224" => Some(Self::Sha3_224),
            "sha3256" => Some(Self::Sha3_256),
            "sha3384" => Some(Self::Sha3_384),
            "sha3512" => Some(Self::Sha3_512),
            "sm3" => Some(Self::Sm3),
            _ => None,
        }
    }

    /// Canonical display name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Sha1 => "SHA-1",
            Self::Sha2_256 => "SHA-256",
            Self::Ripemd160 => "RIPEMD-160",
            Self::Sha2_384 => "SHA-384",
            Self::Sha2_512 => "SHA-512",
            Self::Sha3_224 => "SHA3-224",
            Self::Sha3_256 => "SHA3-256",
            Self::Sha3_384 => "SHA3-384",
            Self::Sha3_512 => "SHA3-512",
            Self::Sm3 => "SM3",
        }
    }

    /// Digest length in bytes.
    pub const fn digest_len(self) -> usize {
        match self {
            Self::Sha1 | Self::Ripemd160 => 20,
            Self::Sha3_224 => 28,
            Self::Sha2_256 | Self::Sha3_256 | Self::Sm3 => 32,
            Self::Sha2_384 | Self::Sha3_384 => 48,
            Self::Sha2_512 | Self::Sha3_512 => 64,
        }
    }

    /// Whether this build can compute digests with the algorithm.
    pub const fn is_implemented(self) -> bool {
        matches!(
            self,
            Self::Sha2_256
                | Self::Sha2_384
                | Self::Sha2_512
                | Self::Sha3_224
                | Self::Sha3_256
                | Self::Sha3_384
                | Self::Sha3_512
        )
    }

    /// Whether the algorithm is deprecated for new signatures.
    pub const fn is_deprecated(self) -> bool {
        matches!(self, Self::Sha1)
    }

    /// Hash `data` in one shot.
    pub fn digest(self, data: &[u8]) -> Result<DataHash> {
        let mut hasher = DataHasher::new(self)?;
        hasher.add_data(data);
        Ok(hasher.hash())
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An algorithm-tagged digest.
///
/// The digest length always matches the algorithm. Equality compares both the
/// algorithm and the bytes, so equal digests under different algorithms are
/// different hashes.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<u8>", into = "Vec<u8>")]
pub struct DataHash {
    algorithm: HashAlgorithm,
    value: Vec<u8>,
}

impl DataHash {
    /// Create from an algorithm and a digest of matching length.
    pub fn new(algorithm: HashAlgorithm, value: impl Into<Vec<u8>>) -> Result<Self> {
        let value = value.into();
        if value.len() != algorithm.digest_len() {
            return Err(CoreError::InvalidHashLength {
                algorithm,
                expected: algorithm.digest_len(),
                actual: value.len(),
            });
        }
        Ok(Self { algorithm, value })
    }

    /// Parse an imprint (algorithm id byte followed by the digest).
    pub fn from_imprint(imprint: &[u8]) -> Result<Self> {
        let (&id, digest) = imprint
            .split_first()
            .ok_or_else(|| CoreError::MalformedInput("empty imprint".into()))?;
        let algorithm = HashAlgorithm::from_id(id).ok_or(CoreError::UnknownAlgorithm(id))?;
        Self::new(algorithm, digest)
    }

    /// Parse a hex-encoded digest for the given algorithm.
    pub fn from_hex(algorithm: HashAlgorithm, s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|e| CoreError::MalformedInput(e.to_string()))?;
        Self::new(algorithm, bytes)
    }

    /// The all-zero digest for an algorithm.
    pub fn zero(algorithm: HashAlgorithm) -> Self {
        Self {
            algorithm,
            value: vec![0u8; algorithm.digest_len()],
        }
    }

    /// The algorithm that produced this digest.
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// The raw digest bytes.
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Algorithm id byte followed by the digest.
    pub fn imprint(&self) -> Vec<u8> {
        let mut imprint = Vec::with_capacity(self.value.len() + 1);
        imprint.push(self.algorithm.id());
        imprint.extend_from_slice(&self.value);
        imprint
    }

    /// Hex encoding of the digest.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.value)
    }
}

impl fmt::Debug for DataHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DataHash({}:{}...)", self.algorithm, &self.to_hex()[..16])
    }
}

impl fmt::Display for DataHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.to_hex())
    }
}

impl AsRef<[u8]> for DataHash {
    fn as_ref(&self) -> &[u8] {
        &self.value
    }
}

impl TryFrom<Vec<u8>> for DataHash {
    type Error = CoreError;

    fn try_from(imprint: Vec<u8>) -> Result<Self> {
        Self::from_imprint(&imprint)
    }
}

impl From<DataHash> for Vec<u8> {
    fn from(hash: DataHash) -> Self {
        hash.imprint()
    }
}

/// Incremental hasher producing [`DataHash`] values.
#[derive(Clone)]
pub struct DataHasher {
    algorithm: HashAlgorithm,
    state: HasherState,
}

#[derive(Clone)]
enum HasherState {
    Sha2_256(Sha256),
    Sha2_384(Sha384),
    Sha2_512(Sha512),
    Sha3_224(Sha3_224),
    Sha3_256(Sha3_256),
    Sha3_384(Sha3_384),
    Sha3_512(Sha3_512),
}

impl HasherState {
    fn new(algorithm: HashAlgorithm) -> Result<Self> {
        Ok(match algorithm {
            HashAlgorithm::Sha2_256 => Self::Sha2_256(Sha256::new()),
            HashAlgorithm::Sha2_384 => Self::Sha2_384(Sha384::new()),
            HashAlgorithm::Sha2_512 => Self::Sha2_512(Sha512::new()),
            HashAlgorithm::Sha3_224 => Self::Sha3_224(Sha3_224::new()),
            HashAlgorithm::Sha3_256 => Self::Sha3_256(Sha3_256::new()),
            HashAlgorithm::Sha3_384 => Self::Sha3_384(Sha3_384::new()),
            HashAlgorithm::Sha3_512 => Self::Sha3_512(Sha3_512::new()),
            other => return Err(CoreError::UnsupportedAlgorithm(other)),
        })
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Self::Sha2_256(h) => h.update(data),
            Self::Sha2_384(h) => h.update(data),
            Self::Sha2_512(h) => h.update(data),
            Self::Sha3_224(h) => h.update(data),
            Self::Sha3_256(h) => h.update(data),
            Self::Sha3_384(h) => h.update(data),
            Self::Sha3_512(h) => h.update(data),
        }
    }

    fn finalize(self) -> Vec<u8> {
        match self {
            Self::Sha2_256(h) => h.finalize().to_vec(),
            Self::Sha2_384(h) => h.finalize().to_vec(),
            Self::Sha2_512(h) => h.finalize().to_vec(),
            Self::Sha3_224(h) => h.finalize().to_vec(),
            Self::Sha3_256(h) => h.finalize().to_vec(),
            Self::Sha3_384(h) => h.finalize().to_vec(),
            Self::Sha3_512(h) => h.finalize().to_vec(),
        }
    }
}

impl DataHasher {
    /// Create a hasher, failing for algorithms without an implementation.
    pub fn new(algorithm: HashAlgorithm) -> Result<Self> {
        Ok(Self {
            algorithm,
            state: HasherState::new(algorithm)?,
        })
    }

    /// The algorithm this hasher computes.
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Feed more data.
    pub fn add_data(&mut self, data: &[u8]) -> &mut Self {
        self.state.update(data);
        self
    }

    /// Feed the imprint of another hash.
    pub fn add_hash(&mut self, hash: &DataHash) -> &mut Self {
        self.state.update(&hash.imprint());
        self
    }

    /// Digest of everything fed so far. The hasher stays usable.
    pub fn hash(&self) -> DataHash {
        DataHash {
            algorithm: self.algorithm,
            value: self.state.clone().finalize(),
        }
    }

    /// Discard all fed data.
    pub fn reset(&mut self) {
        if let Ok(state) = HasherState::new(self.algorithm) {
            self.state = state;
        }
    }
}

impl fmt::Debug for DataHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DataHasher({})", self.algorithm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_digest() {
        let hash = HashAlgorithm::Sha2_256.digest(b"abc").unwrap();
        assert_eq!(
            hash.to_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(hash.imprint()[0], 0x01);
        assert_eq!(hash.imprint().len(), 33);
    }

    #[test]
    fn test_equality_requires_same_algorithm() {
        let a = DataHash::new(HashAlgorithm::Sha2_256, vec![0x11; 32]).unwrap();
        let b = DataHash::new(HashAlgorithm::Sha3_256, vec![0x11; 32]).unwrap();
        assert_ne!(a, b);
        assert_eq!(a.value(), b.value());
    }

    #[test]
    fn test_length_is_checked() {
        let err = DataHash::new(HashAlgorithm::Sha2_512, vec![0u8; 32]).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidHashLength {
                expected: 64,
                actual: 32,
                ..
            }
        ));
    }

    #[test]
    fn test_imprint_roundtrip() {
        let hash = HashAlgorithm::Sha3_384.digest(b"imprint").unwrap();
        let parsed = DataHash::from_imprint(&hash.imprint()).unwrap();
        assert_eq!(hash, parsed);
    }

    #[test]
    fn test_unknown_imprint_id() {
        let mut imprint = vec![0x03];
        imprint.extend_from_slice(&[0u8; 32]);
        assert!(matches!(
            DataHash::from_imprint(&imprint),
            Err(CoreError::UnknownAlgorithm(0x03))
        ));
        assert!(DataHash::from_imprint(&[]).is_err());
    }

    #[test]
    fn test_unimplemented_algorithm_rejected_by_hasher() {
        assert!(matches!(
            DataHasher::new(HashAlgorithm::Sm3),
            Err(CoreError::UnsupportedAlgorithm(HashAlgorithm::Sm3))
        ));
        // Still representable, e.g. when read from an old signature.
        assert!(DataHash::new(HashAlgorithm::Sha1, vec![0u8; 20]).is_ok());
    }

    #[test]
    fn test_hasher_incremental_and_reset() {
        let mut hasher = DataHasher::new(HashAlgorithm::Sha2_256).unwrap();
        hasher.add_data(b"a").add_data(b"bc");
        assert_eq!(hasher.hash(), HashAlgorithm::Sha2_256.digest(b"abc").unwrap());

        hasher.reset();
        hasher.add_data(b"1");
        assert_eq!(hasher.hash(), HashAlgorithm::Sha2_256.digest(b"1").unwrap());
    }

    #[test]
    fn test_algorithm_names() {
        assert_eq!(HashAlgorithm::from_name("SHA-256"), Some(HashAlgorithm::Sha2_256));
        assert_eq!(HashAlgorithm::from_name("sha2-512"), Some(HashAlgorithm::Sha2_512));
        assert_eq!(HashAlgorithm::from_name("SHA3_256"), Some(HashAlgorithm::Sha3_256));
        assert_eq!(HashAlgorithm::from_name("md5"), None);
        for alg in HashAlgorithm::ALL {
            assert_eq!(HashAlgorithm::from_id(alg.id()), Some(alg));
            assert_eq!(HashAlgorithm::from_name(alg.name()), Some(alg));
        }
    }

    #[test]
    fn test_serde_uses_imprint() {
        let hash = HashAlgorithm::Sha2_256.digest(b"serde").unwrap();
        let json = serde_json::to_string(&hash).unwrap();
        let back: DataHash = serde_json::from_str(&json).unwrap();
        assert_eq!(hash, back);

        let bad = serde_json::to_string(&vec![0x01u8, 0x02]).unwrap();
        assert!(serde_json::from_str::<DataHash>(&bad).is_err());
    }
}
