//! Identity metadata carried by aggregation chain links.
//!
//! A metadata link replaces the sibling subtree of an ordinary link with a
//! record naming the client (or aggregator) that submitted the request. The
//! record is hashed in its canonical CBOR form.

use ciborium::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::canonical::{as_u64, from_canonical_bytes, key, map_get, to_canonical_bytes};
use crate::error::{CoreError, Result};

/// Field keys (integer keys for compact encoding).
mod keys {
    pub const CLIENT_ID: u64 = 0;
    pub const MACHINE_ID: u64 = 1;
    pub const SEQUENCE_NUMBER: u64 = 2;
    pub const REQUEST_TIME: u64 = 3;
}

/// Identity of a party that took part in aggregating a hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdentityMetadata {
    /// Human-readable client identifier, e.g. a login name.
    pub client_id: String,
    pub machine_id: Option<String>,
    pub sequence_number: Option<u64>,
    /// Request time in Unix seconds.
    pub request_time: Option<u64>,
}

impl IdentityMetadata {
    /// Metadata naming only a client.
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            machine_id: None,
            sequence_number: None,
            request_time: None,
        }
    }

    pub fn machine_id(mut self, machine_id: impl Into<String>) -> Self {
        self.machine_id = Some(machine_id.into());
        self
    }

    pub fn sequence_number(mut self, sequence_number: u64) -> Self {
        self.sequence_number = Some(sequence_number);
        self
    }

    pub fn request_time(mut self, request_time: u64) -> Self {
        self.request_time = Some(request_time);
        self
    }

    /// Canonical CBOR bytes, as hashed into a chain.
    ///
    /// The encoding starts with a CBOR map header (0xa1..=0xa4), which never
    /// collides with a hash imprint's algorithm byte.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut entries = vec![(key(keys::CLIENT_ID), Value::Text(self.client_id.clone()))];
        if let Some(machine_id) = &self.machine_id {
            entries.push((key(keys::MACHINE_ID), Value::Text(machine_id.clone())));
        }
        if let Some(seq) = self.sequence_number {
            entries.push((key(keys::SEQUENCE_NUMBER), Value::Integer(seq.into())));
        }
        if let Some(time) = self.request_time {
            entries.push((key(keys::REQUEST_TIME), Value::Integer(time.into())));
        }
        to_canonical_bytes(&Value::Map(entries))
    }

    /// Decode canonical bytes produced by [`IdentityMetadata::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let value = from_canonical_bytes(bytes)?;
        let map = match &value {
            Value::Map(m) => m,
            _ => return Err(CoreError::MalformedInput("metadata must be a map".into())),
        };

        let client_id = match map_get(map, keys::CLIENT_ID) {
            Some(Value::Text(s)) => s.clone(),
            _ => return Err(CoreError::MalformedInput("metadata missing client id".into())),
        };
        let machine_id = match map_get(map, keys::MACHINE_ID) {
            Some(Value::Text(s)) => Some(s.clone()),
            None => None,
            _ => return Err(CoreError::MalformedInput("invalid machine id".into())),
        };
        let sequence_number = optional_u64(map, keys::SEQUENCE_NUMBER, "sequence number")?;
        let request_time = optional_u64(map, keys::REQUEST_TIME, "request time")?;

        Ok(Self {
            client_id,
            machine_id,
            sequence_number,
            request_time,
        })
    }
}

fn optional_u64(map: &[(Value, Value)], k: u64, what: &str) -> Result<Option<u64>> {
    match map_get(map, k) {
        None => Ok(None),
        Some(v) => as_u64(v)
            .map(Some)
            .ok_or_else(|| CoreError::MalformedInput(format!("invalid {what}"))),
    }
}

impl fmt::Display for IdentityMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.client_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::HashAlgorithm;

    #[test]
    fn test_metadata_bytes_roundtrip() {
        let metadata = IdentityMetadata::new("john.smith")
            .machine_id("ws-17")
            .sequence_number(42)
            .request_time(1_455_494_400);

        let bytes = metadata.to_bytes().unwrap();
        assert_eq!(IdentityMetadata::from_bytes(&bytes).unwrap(), metadata);
    }

    #[test]
    fn test_minimal_metadata_encoding() {
        let bytes = IdentityMetadata::new("ab").to_bytes().unwrap();
        assert_eq!(bytes, vec![0xa1, 0x00, 0x62, b'a', b'b']);
    }

    #[test]
    fn test_encoding_never_looks_like_imprint() {
        let bytes = IdentityMetadata::new("x").to_bytes().unwrap();
        assert!(HashAlgorithm::from_id(bytes[0]).is_none());
    }

    #[test]
    fn test_missing_client_id_rejected() {
        // {1: "m"}
        let bytes = [0xa1, 0x01, 0x61, b'm'];
        assert!(IdentityMetadata::from_bytes(&bytes).is_err());
    }
}
