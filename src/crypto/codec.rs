//! Canonical codec
//!
//! Fixed, order-sensitive byte serialization used as hashing and signing
//! input. Any width or byte-order deviation here invalidates every
//! signature this client produces.
//!
//! ## Encoding Format
//! ```text
//! encode_num(n):     ┌──────────────────┐
//!                    │ n as u64 LE (8)  │
//!                    └──────────────────┘
//! encode_string(s):  ┌──────────────────┬─────────────────┐
//!                    │ byte len, LE (8) │ raw UTF-8 bytes │
//!                    └──────────────────┴─────────────────┘
//! ```

/// Encode a non-negative integer as 8 little-endian bytes
///
/// Covers revision numbers and length prefixes.
pub fn encode_num(num: u64) -> [u8; 8] {
    num.to_le_bytes()
}

/// Encode a string as its length prefix followed by its UTF-8 bytes
///
/// The length prefix removes ambiguity when several encoded strings are
/// hashed back to back.
pub fn encode_string(text: &str) -> Vec<u8> {
    let bytes = text.as_bytes();
    let mut encoded = Vec::with_capacity(8 + bytes.len());
    encoded.extend_from_slice(&encode_num(bytes.len() as u64));
    encoded.extend_from_slice(bytes);
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_num_is_little_endian() {
        assert_eq!(encode_num(0), [0; 8]);
        assert_eq!(encode_num(1), [1, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(encode_num(256), [0, 1, 0, 0, 0, 0, 0, 0]);
        assert_eq!(encode_num(u64::MAX), [0xFF; 8]);
    }

    #[test]
    fn encode_string_prefixes_byte_length() {
        // Pinned against the reference implementation
        assert_eq!(
            encode_string("My Data"),
            vec![7, 0, 0, 0, 0, 0, 0, 0, 77, 121, 32, 68, 97, 116, 97]
        );
    }

    #[test]
    fn encode_string_empty() {
        assert_eq!(encode_string(""), vec![0; 8]);
    }

    #[test]
    fn encode_string_counts_bytes_not_chars() {
        // 'é' is two bytes in UTF-8
        let encoded = encode_string("é");
        assert_eq!(encoded[0], 2);
        assert_eq!(encoded.len(), 10);
    }
}
