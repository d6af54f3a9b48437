//! On-disk record format.
//!
//! ```text
//! <expiration unix seconds, 0 = never>\n
//! <32 lowercase hex chars: xxh3-128 of the ciphertext>\n
//! <IV><ciphertext>\n
//! ```

use std::io::BufRead;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use xxhash_rust::xxh3::xxh3_128;

use crate::error::{CacheError, Result};

static EXPIRATION_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{1,19}$").expect("expiration pattern is valid"));

static HASH_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9a-f]{32}$").expect("hash pattern is valid"));

// == Content Hash ==
/// Hex content hash of `ciphertext`.
pub fn content_hash(ciphertext: &[u8]) -> String {
    format!("{:032x}", xxh3_128(ciphertext))
}

/// Compares without short-circuiting on the first differing byte.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

// == Record ==
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub expiration: i64,
    pub hash: String,
    pub iv: Vec<u8>,
    pub ciphertext: Vec<u8>,
}

impl Record {
    /// Builds a record, hashing `ciphertext`.
    pub fn seal(expiration: i64, iv: Vec<u8>, ciphertext: Vec<u8>) -> Self {
        Self {
            expiration,
            hash: content_hash(&ciphertext),
            iv,
            ciphertext,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let header = format!("{}\n{}\n", self.expiration, self.hash);
        let mut out =
            Vec::with_capacity(header.len() + self.iv.len() + self.ciphertext.len() + 1);
        out.extend_from_slice(header.as_bytes());
        out.extend_from_slice(&self.iv);
        out.extend_from_slice(&self.ciphertext);
        out.push(b'\n');
        out
    }

    /// Reads the hash line and body that follow an already-consumed
    /// expiration line, then checks the content hash.
    pub fn read_rest<R: BufRead>(reader: &mut R, expiration: i64, iv_length: usize) -> Result<Self> {
        let hash = read_line(reader, "hash")?;
        if !HASH_PATTERN.is_match(&hash) {
            return Err(CacheError::Integrity("malformed hash line".to_string()));
        }

        let mut body = Vec::new();
        reader.read_to_end(&mut body)?;
        if body.last() == Some(&b'\n') {
            body.pop();
        }
        if body.len() <= iv_length {
            return Err(CacheError::Integrity("record body too short".to_string()));
        }

        let ciphertext = body.split_off(iv_length);
        let record = Self {
            expiration,
            hash,
            iv: body,
            ciphertext,
        };
        record.verify()?;
        Ok(record)
    }

    /// Checks the stored hash against the ciphertext.
    pub fn verify(&self) -> Result<()> {
        let actual = content_hash(&self.ciphertext);
        if constant_time_eq(actual.as_bytes(), self.hash.as_bytes()) {
            Ok(())
        } else {
            Err(CacheError::Integrity("content hash mismatch".to_string()))
        }
    }
}

/// Reads and validates the leading expiration line.
pub fn read_expiration<R: BufRead>(reader: &mut R) -> Result<i64> {
    let line = read_line(reader, "expiration")?;
    if !EXPIRATION_PATTERN.is_match(&line) {
        return Err(CacheError::Integrity(format!(
            "malformed expiration line '{}'",
            line
        )));
    }
    line.parse()
        .map_err(|_| CacheError::Integrity(format!("expiration '{}' out of range", line)))
}

fn read_line<R: BufRead>(reader: &mut R, what: &str) -> Result<String> {
    let mut buf = Vec::new();
    reader.read_until(b'\n', &mut buf)?;
    if buf.pop() != Some(b'\n') {
        return Err(CacheError::Integrity(format!("unterminated {} line", what)));
    }
    String::from_utf8(buf)
        .map_err(|_| CacheError::Integrity(format!("{} line is not text", what)))
}

// == Payload ==
/// Plaintext carried inside a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    pub value: Value,
    pub is_hit: bool,
    pub key: String,
}

impl Payload {
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parses `plaintext` as generic JSON first, then checks the shape.
    pub fn decode(plaintext: &[u8]) -> Result<Self> {
        let parsed: Value = serde_json::from_slice(plaintext)
            .map_err(|e| CacheError::Integrity(format!("plaintext is not JSON: {}", e)))?;

        let fields = parsed
            .as_object()
            .ok_or_else(|| CacheError::Integrity("payload is not an object".to_string()))?;
        for field in ["value", "is_hit", "key"] {
            if !fields.contains_key(field) {
                return Err(CacheError::Integrity(format!("payload lacks '{}'", field)));
            }
        }

        serde_json::from_value(parsed)
            .map_err(|e| CacheError::Integrity(format!("payload has wrong types: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Cursor;

    fn parse(bytes: &[u8], iv_length: usize) -> Result<Record> {
        let mut reader = Cursor::new(bytes);
        let expiration = read_expiration(&mut reader)?;
        Record::read_rest(&mut reader, expiration, iv_length)
    }

    #[test]
    fn test_layout() {
        let record = Record::seal(1_700_000_000, vec![1, 2, 3], vec![9, 9, 9, 9]);
        let bytes = record.to_bytes();

        let text_end = 11 + 33;
        let header = std::str::from_utf8(&bytes[..text_end]).unwrap();
        assert!(header.starts_with("1700000000\n"));
        assert!(header.ends_with('\n'));
        assert_eq!(&bytes[text_end..text_end + 3], &[1, 2, 3]);
        assert_eq!(bytes.last(), Some(&b'\n'));
    }

    #[test]
    fn test_parse_written_record() {
        let record = Record::seal(0, vec![7; 4], b"ciphertext ending in space ".to_vec());
        let parsed = parse(&record.to_bytes(), 4).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_ciphertext_may_contain_newlines() {
        let record = Record::seal(0, vec![1; 4], b"a\nb\n\n".to_vec());
        assert_eq!(parse(&record.to_bytes(), 4).unwrap(), record);
    }

    #[test]
    fn test_flipped_byte_fails_verification() {
        let record = Record::seal(0, vec![1; 4], b"abcdef".to_vec());
        let mut bytes = record.to_bytes();
        let idx = bytes.len() - 2;
        bytes[idx] ^= 0x01;

        assert!(matches!(parse(&bytes, 4), Err(CacheError::Integrity(_))));
    }

    #[test]
    fn test_malformed_expiration() {
        assert!(matches!(
            parse(b"12.5\n", 4),
            Err(CacheError::Integrity(_))
        ));
        assert!(matches!(parse(b"-3\n", 4), Err(CacheError::Integrity(_))));
        assert!(matches!(parse(b"123", 4), Err(CacheError::Integrity(_))));
    }

    #[test]
    fn test_malformed_hash() {
        let bytes = b"0\nNOTHEX\nxxxxxxxxxx\n";
        assert!(matches!(parse(bytes, 4), Err(CacheError::Integrity(_))));
    }

    #[test]
    fn test_truncated_body() {
        let record = Record::seal(0, vec![1; 4], b"abc".to_vec());
        let bytes = record.to_bytes();
        let truncated = &bytes[..bytes.len() - 5];
        assert!(parse(truncated, 4).is_err());
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"ab"));
    }

    #[test]
    fn test_payload_decode() {
        let payload = Payload {
            value: json!({"n": 1}),
            is_hit: false,
            key: "k".to_string(),
        };
        assert_eq!(Payload::decode(&payload.encode().unwrap()).unwrap(), payload);
    }

    #[test]
    fn test_payload_rejects_bad_shapes() {
        assert!(Payload::decode(b"not json").is_err());
        assert!(Payload::decode(b"[1,2]").is_err());
        assert!(Payload::decode(br#"{"value":1,"key":"k"}"#).is_err());
        assert!(Payload::decode(br#"{"value":1,"is_hit":"yes","key":"k"}"#).is_err());
    }
}
