//! Record path derivation.
//!
//! Every key maps to `X/Y/<name>` below the namespace directory, where `X`
//! and `Y` come from a 38-symbol alphabet (`+`, `-`, `A-Z`, `0-9`).

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use xxhash_rust::xxh3::xxh3_128;

/// Prefix mixed into the path hash so file records never collide with
/// hashes used elsewhere for the same key.
const BACKEND_TAG: &str = "file:";

/// Length of a record file name.
pub const FILE_NAME_LENGTH: usize = 20;

// == Shard Path ==
/// Location of one record relative to its namespace directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardPath {
    shard: [char; 2],
    file_name: String,
}

impl ShardPath {
    /// Derives the location for `key`.
    pub fn for_key(key: &str) -> Self {
        let digest = xxh3_128(format!("{}{}", BACKEND_TAG, key).as_bytes());
        let encoded = STANDARD.encode(digest.to_be_bytes()).replace('/', "-");

        // 16 bytes encode to 22 symbols plus "==" padding, so both slices
        // below stay clear of the padding.
        let mut chars = encoded.chars();
        let first = chars.next().unwrap_or('+').to_ascii_uppercase();
        let second = chars.next().unwrap_or('+').to_ascii_uppercase();
        let file_name: String = chars.take(FILE_NAME_LENGTH).collect();

        Self {
            shard: [first, second],
            file_name,
        }
    }

    /// Two-level shard directory under `base`.
    pub fn dir(&self, base: &Path) -> PathBuf {
        base.join(self.shard[0].to_string())
            .join(self.shard[1].to_string())
    }

    /// Full record file path under `base`.
    pub fn file(&self, base: &Path) -> PathBuf {
        self.dir(base).join(&self.file_name)
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }
}

/// True if `c` can name a shard directory.
pub fn is_shard_symbol(c: char) -> bool {
    c == '+' || c == '-' || c.is_ascii_uppercase() || c.is_ascii_digit()
}

/// True if `name` is a single shard symbol.
pub fn is_shard_dir_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!((chars.next(), chars.next()), (Some(c), None) if is_shard_symbol(c))
}
