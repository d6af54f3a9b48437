//! Request DTOs for the cache pool API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;
use serde_json::Value;

use crate::cache::{validate_key, CacheItem};
use crate::error::Result;

/// Request body for PUT /set and PUT /defer
///
/// # Fields
/// - `key`: The cache key to store the value under
/// - `value`: Any JSON value
/// - `ttl`: Optional lifetime in seconds; omitted means no expiration
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    /// The cache key
    pub key: String,
    /// The value to store
    pub value: Value,
    /// Optional TTL in seconds
    #[serde(default)]
    pub ttl: Option<u64>,
}

impl SetRequest {
    /// Validates the request key against the pool's key rules.
    pub fn validate(&self) -> Result<()> {
        validate_key(&self.key)
    }

    /// Builds the item this request describes.
    pub fn into_item(self) -> Result<CacheItem> {
        self.validate()?;

        let mut item = CacheItem::new(self.key);
        item.set(self.value)?;
        if let Some(ttl) = self.ttl {
            item.expires_at(std::time::Duration::from_secs(ttl));
        }
        Ok(item)
    }
}
