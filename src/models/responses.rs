//! Response DTOs for the cache pool API
//!
//! Defines the structure of outgoing HTTP response bodies.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::cache::{CacheItem, CacheStats};

/// Response body for GET /get/:key
#[derive(Debug, Clone, Serialize)]
pub struct GetResponse {
    /// The requested key
    pub key: String,
    /// The stored value
    pub value: Value,
    /// Expiration instant, if any
    pub expiration: Option<DateTime<Utc>>,
}

impl From<CacheItem> for GetResponse {
    fn from(item: CacheItem) -> Self {
        Self {
            key: item.key().to_string(),
            value: item.get().clone(),
            expiration: item.expiration(),
        }
    }
}

/// Response body for PUT /set and PUT /defer
#[derive(Debug, Clone, Serialize)]
pub struct SetResponse {
    /// Success message
    pub message: String,
    /// The key that was written or queued
    pub key: String,
}

impl SetResponse {
    pub fn saved(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' saved successfully", key),
            key,
        }
    }

    pub fn deferred(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' queued for commit", key),
            key,
        }
    }
}

/// Response body for DELETE /del/:key
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    /// Success message
    pub message: String,
    /// The key that was deleted
    pub key: String,
}

impl DeleteResponse {
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' deleted successfully", key),
            key,
        }
    }
}

/// Response body for GET /has/:key
#[derive(Debug, Clone, Serialize)]
pub struct HasResponse {
    pub key: String,
    pub exists: bool,
}

/// Response body for POST /commit, DELETE /clear and POST /prune
#[derive(Debug, Clone, Serialize)]
pub struct OutcomeResponse {
    /// Whether the backend reported success
    pub success: bool,
    /// Entries affected, when the operation counts them
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affected: Option<usize>,
}

impl OutcomeResponse {
    pub fn new(success: bool) -> Self {
        Self {
            success,
            affected: None,
        }
    }

    pub fn with_affected(affected: usize) -> Self {
        Self {
            success: true,
            affected: Some(affected),
        }
    }
}

/// Response body for GET /stats
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Pool namespace
    pub namespace: String,
    /// Number of lookups that hit
    pub hits: u64,
    /// Number of lookups that missed
    pub misses: u64,
    /// Successful writes
    pub writes: u64,
    /// Writes the backend rejected
    pub write_failures: u64,
    /// Items waiting for commit
    pub deferred: usize,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl StatsResponse {
    pub fn new(namespace: impl Into<String>, stats: &CacheStats) -> Self {
        Self {
            namespace: namespace.into(),
            hits: stats.hits,
            misses: stats.misses,
            writes: stats.writes,
            write_failures: stats.write_failures,
            deferred: stats.deferred,
            hit_rate: stats.hit_rate(),
        }
    }
}

/// Response body for GET /health
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
