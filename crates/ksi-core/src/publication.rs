//! Publications: the long-term trust anchors of KSI.
//!
//! A publication is a `(time, calendar root hash)` pair printed in newspapers
//! and distributed in a signed publications file. The human-transcribable
//! *publication code* is base32 of `time || imprint || CRC32`, grouped by six
//! characters with dashes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::base32;
use crate::crypto::{Certificate, CertificateId};
use crate::error::{CoreError, Result};
use crate::hash::DataHash;

/// Characters per dash-separated group in a publication code.
const CODE_GROUP_LEN: usize = 6;

/// Length of the trailing CRC32 block.
const CHECKSUM_LEN: usize = 4;

/// A published calendar root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicationData {
    /// Unix seconds.
    pub publication_time: u64,
    pub publication_hash: DataHash,
}

impl PublicationData {
    pub fn new(publication_time: u64, publication_hash: DataHash) -> Self {
        Self {
            publication_time,
            publication_hash,
        }
    }

    /// `time (u64 big-endian) || imprint`. Also the message signed by calendar
    /// authentication records.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = self.publication_time.to_be_bytes().to_vec();
        bytes.extend(self.publication_hash.imprint());
        bytes
    }

    /// Parse a publication code.
    ///
    /// Dashes and surrounding whitespace are ignored and letters may be in any
    /// case. The checksum is verified before anything else is interpreted.
    pub fn parse(code: &str) -> Result<Self> {
        let compact: String = code.trim().chars().filter(|c| *c != '-').collect();
        let bytes = base32::decode(&compact)?;

        if bytes.len() < 8 + 1 + CHECKSUM_LEN {
            return Err(CoreError::MalformedInput(format!(
                "publication code too short: {} bytes",
                bytes.len()
            )));
        }

        let (body, checksum) = bytes.split_at(bytes.len() - CHECKSUM_LEN);
        if crc32fast::hash(body).to_be_bytes() != checksum {
            return Err(CoreError::InvalidChecksum);
        }

        let (time, imprint) = body.split_at(8);
        let mut time_bytes = [0u8; 8];
        time_bytes.copy_from_slice(time);

        Ok(Self {
            publication_time: u64::from_be_bytes(time_bytes),
            publication_hash: DataHash::from_imprint(imprint)?,
        })
    }

    /// Render as a publication code.
    pub fn format(&self) -> String {
        let mut bytes = self.to_bytes();
        let checksum = crc32fast::hash(&bytes);
        bytes.extend_from_slice(&checksum.to_be_bytes());

        let encoded = base32::encode(&bytes);
        let mut code = String::with_capacity(encoded.len() + encoded.len() / CODE_GROUP_LEN);
        for (i, c) in encoded.chars().enumerate() {
            if i > 0 && i % CODE_GROUP_LEN == 0 {
                code.push('-');
            }
            code.push(c);
        }
        code
    }
}

impl fmt::Display for PublicationData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format())
    }
}

impl FromStr for PublicationData {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// A publication plus where it was printed.
///
/// Records embedded in a signature leave `repository_uris` empty; records read
/// from a publications file also name where the file's records are mirrored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationRecord {
    pub publication_data: PublicationData,
    /// Human-readable pointers to printed copies, e.g. a newspaper issue.
    pub references: Vec<String>,
    pub repository_uris: Vec<String>,
}

impl PublicationRecord {
    pub fn new(publication_data: PublicationData) -> Self {
        Self {
            publication_data,
            references: Vec::new(),
            repository_uris: Vec::new(),
        }
    }

    pub fn reference(mut self, reference: impl Into<String>) -> Self {
        self.references.push(reference.into());
        self
    }

    pub fn repository_uri(mut self, uri: impl Into<String>) -> Self {
        self.repository_uris.push(uri.into());
        self
    }

    pub fn publication_time(&self) -> u64 {
        self.publication_data.publication_time
    }

    pub fn publication_hash(&self) -> &DataHash {
        &self.publication_data.publication_hash
    }

    /// The flavor embedded in signatures: references kept, repository URIs dropped.
    pub fn to_signature_record(&self) -> Self {
        Self {
            publication_data: self.publication_data.clone(),
            references: self.references.clone(),
            repository_uris: Vec::new(),
        }
    }
}

/// A time-ordered snapshot of published calendar roots.
///
/// The file's own signature is checked by whoever fetched it; once built, a
/// `PublicationsFile` is a trusted, immutable value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationsFile {
    records: Vec<PublicationRecord>,
    certificates: Vec<Certificate>,
    /// Unix seconds when the file was issued.
    created_at: u64,
}

impl PublicationsFile {
    /// Build a snapshot, ordering records by publication time.
    pub fn new(
        mut records: Vec<PublicationRecord>,
        certificates: Vec<Certificate>,
        created_at: u64,
    ) -> Self {
        records.sort_by_key(|r| r.publication_time());
        Self {
            records,
            certificates,
            created_at,
        }
    }

    /// All records, oldest first.
    pub fn records(&self) -> &[PublicationRecord] {
        &self.records
    }

    /// Calendar signing certificates carried by the file.
    pub fn certificates(&self) -> &[Certificate] {
        &self.certificates
    }

    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    /// First record published at or after `time`.
    ///
    /// `None` means nothing has been published that far forward yet.
    pub fn nearest_after(&self, time: u64) -> Option<&PublicationRecord> {
        let idx = self.records.partition_point(|r| r.publication_time() < time);
        self.records.get(idx)
    }

    /// The most recent record.
    pub fn latest(&self) -> Option<&PublicationRecord> {
        self.records.last()
    }

    /// The record published exactly at `time`.
    pub fn find(&self, time: u64) -> Option<&PublicationRecord> {
        self.nearest_after(time)
            .filter(|r| r.publication_time() == time)
    }

    /// Look up a carried certificate by id.
    pub fn certificate(&self, id: &CertificateId) -> Option<&Certificate> {
        self.certificates.iter().find(|c| &c.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::HashAlgorithm;

    const CODE: &str =
        "AAAAAA-CWYEKQ-AAIYPA-UJ4GRT-HXMFBE-OTB4AB-XH3PT3-KNIKGV-PYCJXU-HL2TN4-RG6SCC-3ZGSBM";

    fn record(time: u64) -> PublicationRecord {
        let hash = HashAlgorithm::Sha2_256.digest(&time.to_be_bytes()).unwrap();
        PublicationRecord::new(PublicationData::new(time, hash))
    }

    #[test]
    fn test_parse_known_code() {
        let data = PublicationData::parse(CODE).unwrap();
        assert_eq!(data.publication_time, 1_455_494_400);
        assert_eq!(data.publication_hash.algorithm(), HashAlgorithm::Sha2_256);
        assert_eq!(
            data.publication_hash.to_hex(),
            "1878289e1a333dd85091d30f001b9f6f9ed4d428d57e049bd0ebd4dbc89bd210"
        );
        assert_eq!(data.format(), CODE);
    }

    #[test]
    fn test_parse_ignores_case_and_dashes() {
        let compact = CODE.replace('-', "").to_lowercase();
        assert_eq!(
            PublicationData::parse(&compact).unwrap(),
            PublicationData::parse(CODE).unwrap()
        );
    }

    #[test]
    fn test_altered_code_fails_checksum() {
        // Flip one character in the hash part.
        let altered = CODE.replacen("UJ4GRT", "UJ4GRS", 1);
        assert!(matches!(
            PublicationData::parse(&altered),
            Err(CoreError::InvalidChecksum)
        ));
    }

    #[test]
    fn test_only_canonical_padding_accepted() {
        // A SHA-512 code carries four pad bits in its last character.
        let hash = HashAlgorithm::Sha2_512.digest(b"padding").unwrap();
        let code = PublicationData::new(1_455_494_400, hash).format();
        let last = code.chars().last().unwrap();
        let value = "ABCDEFGHIJKLMNOPQRSTUVWXYZ234567".find(last).unwrap();
        assert_eq!(value & 0xf, 0);

        let mut altered = code.clone();
        altered.pop();
        altered.push("ABCDEFGHIJKLMNOPQRSTUVWXYZ234567".as_bytes()[value | 1] as char);
        assert!(matches!(
            PublicationData::parse(&altered),
            Err(CoreError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_malformed_codes() {
        assert!(matches!(
            PublicationData::parse("AAAA-BBBB"),
            Err(CoreError::MalformedInput(_))
        ));
        assert!(matches!(
            PublicationData::parse("AAAAAA-CWYEK0"),
            Err(CoreError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_format_parse_sha512() {
        let data = PublicationData::new(
            1_700_000_000,
            HashAlgorithm::Sha2_512.digest(b"calendar").unwrap(),
        );
        let code = data.format();
        assert!(code.split('-').all(|g| g.len() <= CODE_GROUP_LEN));
        assert_eq!(code.parse::<PublicationData>().unwrap(), data);
    }

    #[test]
    fn test_nearest_after() {
        let file = PublicationsFile::new(vec![record(300), record(100), record(200)], vec![], 400);
        assert_eq!(file.records()[0].publication_time(), 100);

        assert_eq!(file.nearest_after(0).unwrap().publication_time(), 100);
        assert_eq!(file.nearest_after(100).unwrap().publication_time(), 100);
        assert_eq!(file.nearest_after(101).unwrap().publication_time(), 200);
        assert_eq!(file.nearest_after(300).unwrap().publication_time(), 300);
        assert!(file.nearest_after(301).is_none());

        assert_eq!(file.latest().unwrap().publication_time(), 300);
        assert!(file.find(200).is_some());
        assert!(file.find(250).is_none());
    }

    #[test]
    fn test_empty_file() {
        let file = PublicationsFile::new(vec![], vec![], 0);
        assert!(file.latest().is_none());
        assert!(file.nearest_after(0).is_none());
    }

    #[test]
    fn test_signature_record_drops_uris() {
        let rec = record(100)
            .reference("Financial Times, ISSN: 0307-1766, 2016-02-17")
            .repository_uri("https://verify.guardtime.com/ksi-publications.bin");
        let embedded = rec.to_signature_record();
        assert!(embedded.repository_uris.is_empty());
        assert_eq!(embedded.references, rec.references);
    }
}
