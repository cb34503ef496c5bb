//! RFC 4648 base32 (upper case, no padding) for publication codes.

use crate::error::{CoreError, Result};

const ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// Encode bytes, dropping padding.
pub fn encode(data: &[u8]) -> String {
    let mut result = String::with_capacity((data.len() * 8 + 4) / 5);
    let mut buffer: u64 = 0;
    let mut bits_in_buffer = 0;

    for &byte in data {
        buffer = (buffer << 8) | u64::from(byte);
        bits_in_buffer += 8;

        while bits_in_buffer >= 5 {
            bits_in_buffer -= 5;
            let index = ((buffer >> bits_in_buffer) & 0x1f) as usize;
            result.push(ALPHABET[index] as char);
        }
    }

    if bits_in_buffer > 0 {
        let index = ((buffer << (5 - bits_in_buffer)) & 0x1f) as usize;
        result.push(ALPHABET[index] as char);
    }

    result
}

/// Decode case-insensitively. Trailing `=` padding is accepted.
///
/// Only canonical input decodes: the bits left over after the last full byte
/// must be fewer than five and all zero.
pub fn decode(s: &str) -> Result<Vec<u8>> {
    let mut result = Vec::with_capacity(s.len() * 5 / 8);
    let mut buffer: u64 = 0;
    let mut bits_in_buffer = 0;

    for c in s.trim_end_matches('=').chars() {
        let value = match c.to_ascii_uppercase() {
            c @ 'A'..='Z' => c as u64 - 'A' as u64,
            c @ '2'..='7' => c as u64 - '2' as u64 + 26,
            other => {
                return Err(CoreError::MalformedInput(format!(
                    "invalid base32 character {other:?}"
                )))
            }
        };
        buffer = (buffer << 5) | value;
        bits_in_buffer += 5;

        if bits_in_buffer >= 8 {
            bits_in_buffer -= 8;
            result.push(((buffer >> bits_in_buffer) & 0xff) as u8);
        }
    }

    if bits_in_buffer >= 5 {
        return Err(CoreError::MalformedInput(
            "base32 input ends with a dangling character".into(),
        ));
    }
    if buffer & ((1 << bits_in_buffer) - 1) != 0 {
        return Err(CoreError::MalformedInput(
            "base32 input has non-zero trailing bits".into(),
        ));
    }

    Ok(result)
}
