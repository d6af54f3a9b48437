//! Cache Item Module
//!
//! Defines the value holder handed between callers and the pool.

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::Result;

// == Expiry ==
/// Argument accepted by [`CacheItem::expires_at`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// Expire at an absolute instant
    At(DateTime<Utc>),
    /// Expire this long from now
    After(Duration),
    /// Never expire
    Never,
}

impl From<DateTime<Utc>> for Expiry {
    fn from(at: DateTime<Utc>) -> Self {
        Expiry::At(at)
    }
}

impl From<Duration> for Expiry {
    fn from(after: Duration) -> Self {
        Expiry::After(after)
    }
}

impl From<std::time::Duration> for Expiry {
    fn from(after: std::time::Duration) -> Self {
        match Duration::from_std(after) {
            Ok(after) => Expiry::After(after),
            // Out of chrono's range; saturates so expires_at ignores it.
            Err(_) => Expiry::After(Duration::MAX),
        }
    }
}

// == Cache Item ==
/// A single cache item: key, value, hit flag and optional expiration.
///
/// Items returned for a miss carry `Value::Null` and `is_hit() == false`.
/// Backends never hand out their stored copy; every read is a fresh clone.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheItem {
    key: String,
    value: Value,
    is_hit: bool,
    expiration: Option<DateTime<Utc>>,
}

impl CacheItem {
    // == Constructors ==
    /// Creates an empty item for `key`, as returned for a miss.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: Value::Null,
            is_hit: false,
            expiration: None,
        }
    }

    /// Rebuilds an item from stored data. Backend use only.
    pub(crate) fn restore(
        key: impl Into<String>,
        value: Value,
        is_hit: bool,
        expiration: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            key: key.into(),
            value,
            is_hit,
            expiration,
        }
    }

    // == Accessors ==
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the raw stored value (`Value::Null` on a miss).
    pub fn get(&self) -> &Value {
        &self.value
    }

    /// Deserializes the stored value into `T`.
    pub fn get_as<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.value.clone())?)
    }

    pub fn is_hit(&self) -> bool {
        self.is_hit
    }

    pub fn expiration(&self) -> Option<DateTime<Utc>> {
        self.expiration
    }

    // == Mutators ==
    /// Replaces the value. Fails only if `value` cannot be represented as JSON.
    pub fn set<T: Serialize>(&mut self, value: T) -> Result<&mut Self> {
        self.value = serde_json::to_value(value)?;
        Ok(self)
    }

    /// Sets the expiration. Unrepresentable instants leave it unchanged.
    pub fn expires_at(&mut self, expiry: impl Into<Expiry>) -> &mut Self {
        match expiry.into() {
            Expiry::At(at) => self.expiration = Some(at),
            Expiry::After(after) => return self.expires_after(Some(after)),
            Expiry::Never => self.expiration = None,
        }
        self
    }

    /// Expires `after` from now; `None` clears the expiration.
    pub fn expires_after(&mut self, after: Option<Duration>) -> &mut Self {
        match after {
            None => self.expiration = None,
            Some(after) => {
                if let Some(at) = Utc::now().checked_add_signed(after) {
                    self.expiration = Some(at);
                }
            }
        }
        self
    }

    // == Expiration ==
    /// True once `now >= expiration`. Items without expiration never expire.
    pub fn is_expired(&self) -> bool {
        is_past(self.expiration)
    }

    /// Returns a copy flagged as a hit.
    pub(crate) fn into_hit(mut self) -> Self {
        self.is_hit = true;
        self
    }
}

// == Utility Functions ==
/// True if `expiration` is set and not in the future.
pub(crate) fn is_past(expiration: Option<DateTime<Utc>>) -> bool {
    match expiration {
        Some(at) => Utc::now() >= at,
        None => false,
    }
}

/// Converts whole unix seconds back to an expiration; `0` means never.
pub(crate) fn expiration_from_timestamp(secs: i64) -> Option<DateTime<Utc>> {
    if secs == 0 {
        None
    } else {
        DateTime::from_timestamp(secs, 0)
    }
}

/// Unix seconds at or after `at`, so a stored expiration never fires early.
pub(crate) fn ceil_timestamp(at: DateTime<Utc>) -> i64 {
    if at.timestamp_subsec_nanos() > 0 {
        at.timestamp() + 1
    } else {
        at.timestamp()
    }
}

/// Whole unix seconds for an expiration, rounded up; `0` means never.
pub(crate) fn expiration_to_timestamp(expiration: Option<DateTime<Utc>>) -> i64 {
    expiration.map(ceil_timestamp).unwrap_or(0)
}
