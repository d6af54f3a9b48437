//! Key and Namespace Validation
//!
//! Static checks applied by every backend before a lookup, insert or delete.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{CacheError, Result};

// == Constants ==
/// Characters that may never appear in a cache key.
pub const RESERVED_KEY_CHARS: &[char] = &['{', '}', '(', ')', '/', '\\', '@', ':'];

/// Namespaces must be strictly shorter than this.
pub const MAX_NAMESPACE_LENGTH: usize = 128;

/// Namespace used when none is given.
pub const DEFAULT_NAMESPACE: &str = "default";

static NAMESPACE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_]+$").expect("namespace pattern is valid"));

// == Key Validation ==
/// Checks that `key` is non-empty and free of reserved characters.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(CacheError::InvalidKey("key cannot be empty".to_string()));
    }
    if let Some(c) = key.chars().find(|c| RESERVED_KEY_CHARS.contains(c)) {
        return Err(CacheError::InvalidKey(format!(
            "key '{}' contains reserved character '{}'",
            key, c
        )));
    }
    Ok(())
}

/// Validates every key in `keys`, failing on the first bad one.
pub fn validate_keys<S: AsRef<str>>(keys: &[S]) -> Result<()> {
    keys.iter().try_for_each(|k| validate_key(k.as_ref()))
}

// == Namespace ==
/// A validated partition identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace(String);

impl Namespace {
    /// Validates `name`. An empty name selects [`DEFAULT_NAMESPACE`].
    pub fn new(name: &str) -> Result<Self> {
        if name.is_empty() {
            return Ok(Self(DEFAULT_NAMESPACE.to_string()));
        }
        if name.len() >= MAX_NAMESPACE_LENGTH {
            return Err(CacheError::InvalidNamespace(format!(
                "namespace must be shorter than {} characters",
                MAX_NAMESPACE_LENGTH
            )));
        }
        if !NAMESPACE_PATTERN.is_match(name) {
            return Err(CacheError::InvalidNamespace(format!(
                "'{}' must match [a-zA-Z0-9_]+",
                name
            )));
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Namespace {
    fn default() -> Self {
        Self(DEFAULT_NAMESPACE.to_string())
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_keys() {
        assert!(validate_key("user_42").is_ok());
        assert!(validate_key("a.b-c").is_ok());
        assert!(validate_key("with space").is_ok());
    }

    #[test]
    fn test_empty_key_rejected() {
        assert!(matches!(validate_key(""), Err(CacheError::InvalidKey(_))));
    }

    #[test]
    fn test_reserved_characters_rejected() {
        for c in RESERVED_KEY_CHARS {
            let key = format!("pre{}post", c);
            assert!(
                matches!(validate_key(&key), Err(CacheError::InvalidKey(_))),
                "'{}' should be rejected",
                key
            );
        }
    }

    #[test]
    fn test_validate_keys_stops_on_bad_key() {
        assert!(validate_keys(&["a", "b"]).is_ok());
        assert!(validate_keys(&["a", "b:c"]).is_err());
    }

    #[test]
    fn test_namespace_default_when_empty() {
        let ns = Namespace::new("").unwrap();
        assert_eq!(ns.as_str(), DEFAULT_NAMESPACE);
        assert_eq!(ns, Namespace::default());
    }

    #[test]
    fn test_namespace_pattern() {
        assert!(Namespace::new("app_1").is_ok());
        assert!(matches!(
            Namespace::new("app-1"),
            Err(CacheError::InvalidNamespace(_))
        ));
        assert!(matches!(
            Namespace::new("app:1"),
            Err(CacheError::InvalidNamespace(_))
        ));
    }

    #[test]
    fn test_namespace_length_limit() {
        assert!(Namespace::new(&"a".repeat(MAX_NAMESPACE_LENGTH - 1)).is_ok());
        assert!(matches!(
            Namespace::new(&"a".repeat(MAX_NAMESPACE_LENGTH)),
            Err(CacheError::InvalidNamespace(_))
        ));
    }
}
