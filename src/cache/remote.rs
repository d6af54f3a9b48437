//! Remote Backend Module
//!
//! Mirrors the pool contract onto an external key-value store, using
//! `<namespace>:<key>` as the store key. Keeps the same bounded local mirror
//! and hit-promotion batching as the file backend.

use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::bounded::BoundedMap;
use crate::cache::entry::{ceil_timestamp, expiration_from_timestamp, is_past};
use crate::cache::key::Namespace;
use crate::cache::pool::{Backend, CachePool};
use crate::cache::promotion::{Promotion, PromotionQueue};
use crate::cache::{CacheItem, MIRROR_CAPACITY};
use crate::error::{CacheError, Result};

/// Keys requested per `SCAN` round trip.
const SCAN_BATCH: usize = 100;

// == Store Trait ==
/// The handful of key-value operations the remote backend needs.
pub trait KvStore {
    fn get(&mut self, key: &str) -> Result<Option<String>>;

    /// Stores `value`, expiring it at unix second `expire_at` when given.
    fn set(&mut self, key: &str, value: &str, expire_at: Option<i64>) -> Result<()>;

    /// Deletes all `keys` in one request.
    fn delete(&mut self, keys: &[String]) -> Result<()>;

    /// Enumerates keys matching a glob `pattern`.
    fn scan(&mut self, pattern: &str) -> Result<Vec<String>>;
}

// == Redis Store ==
/// [`KvStore`] over a synchronous Redis connection.
pub struct RedisStore {
    conn: redis::Connection,
}

impl RedisStore {
    pub fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        Ok(Self {
            conn: client.get_connection()?,
        })
    }
}

impl fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStore").finish_non_exhaustive()
    }
}

impl KvStore for RedisStore {
    fn get(&mut self, key: &str) -> Result<Option<String>> {
        Ok(redis::cmd("GET").arg(key).query(&mut self.conn)?)
    }

    /// One `SET` round trip; `EXAT` needs Redis 6.2 or later.
    fn set(&mut self, key: &str, value: &str, expire_at: Option<i64>) -> Result<()> {
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(at) = expire_at {
            cmd.arg("EXAT").arg(at);
        }
        cmd.query::<()>(&mut self.conn)?;
        Ok(())
    }

    fn delete(&mut self, keys: &[String]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        redis::cmd("DEL").arg(keys).query::<()>(&mut self.conn)?;
        Ok(())
    }

    fn scan(&mut self, pattern: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query(&mut self.conn)?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }
        keys.sort();
        keys.dedup();
        Ok(keys)
    }
}

// == Payload ==
/// JSON document stored under each remote key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct RemotePayload {
    key: String,
    value: Value,
    is_hit: bool,
    /// Unix seconds rounded up, `None` for never
    expiration: Option<i64>,
}

// == Remote Backend ==
#[derive(Debug)]
pub struct RemoteBackend<S: KvStore> {
    store: S,
    namespace: Namespace,
    mirror: BoundedMap<CacheItem>,
    promotions: PromotionQueue,
}

impl<S: KvStore> RemoteBackend<S> {
    pub fn new(store: S, namespace: &str) -> Result<Self> {
        Ok(Self {
            store,
            namespace: Namespace::new(namespace)?,
            mirror: BoundedMap::new(MIRROR_CAPACITY),
            promotions: PromotionQueue::new(),
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// `<namespace>:<key>`
    pub fn store_key(&self, key: &str) -> String {
        format!("{}:{}", self.namespace, key)
    }

    pub fn pending_promotions(&self) -> usize {
        self.promotions.len()
    }

    // == Read ==
    fn read(&mut self, key: &str) -> Result<Option<CacheItem>> {
        let store_key = self.store_key(key);
        let Some(raw) = self.store.get(&store_key)? else {
            return Ok(None);
        };

        let payload: RemotePayload = serde_json::from_str(&raw)
            .map_err(|e| CacheError::Integrity(format!("malformed payload: {}", e)))?;
        if payload.key != key {
            return Err(CacheError::Integrity(format!(
                "payload holds key '{}'",
                payload.key
            )));
        }

        let expiration = payload.expiration.and_then(expiration_from_timestamp);
        if is_past(expiration) {
            return Err(CacheError::NotFound(format!("{} expired", key)));
        }

        Ok(Some(CacheItem::restore(
            key,
            payload.value,
            payload.is_hit,
            expiration,
        )))
    }

    fn load(&mut self, key: &str) -> Option<CacheItem> {
        match self.read(key) {
            Ok(item) => item,
            Err(e @ (CacheError::Store(_) | CacheError::Io(_))) => {
                warn!(namespace = %self.namespace, key, error = %e, "Remote read failed");
                None
            }
            Err(e) => {
                debug!(namespace = %self.namespace, key, error = %e, "Discarding unreadable payload");
                self.remove(key);
                None
            }
        }
    }

    // == Write ==
    fn write(&mut self, item: &CacheItem) -> Result<()> {
        let payload = RemotePayload {
            key: item.key().to_string(),
            value: item.get().clone(),
            is_hit: item.is_hit(),
            expiration: item.expiration().map(ceil_timestamp),
        };
        let store_key = self.store_key(item.key());

        self.store
            .set(&store_key, &serde_json::to_string(&payload)?, payload.expiration)
    }

    fn remove(&mut self, key: &str) -> bool {
        self.mirror.remove(key);
        self.promotions.cancel(key);
        let store_key = self.store_key(key);
        match self.store.delete(&[store_key]) {
            Ok(()) => true,
            Err(e) => {
                warn!(namespace = %self.namespace, key, error = %e, "Remote delete failed");
                false
            }
        }
    }

    // == Promotions ==
    /// Writes back every pending hit promotion. Failures are only logged.
    pub fn flush_promotions(&mut self) {
        for promotion in self.promotions.drain(Utc::now()) {
            match promotion {
                Promotion::Expired(key) => {
                    self.remove(&key);
                }
                Promotion::Promote(key) => {
                    let item = match self.mirror.get(&key) {
                        Some(item) => item.clone(),
                        None => match self.read(&key) {
                            Ok(Some(item)) => item,
                            _ => continue,
                        },
                    };
                    if item.is_hit() {
                        continue;
                    }

                    let promoted = item.into_hit();
                    match self.write(&promoted) {
                        Ok(()) => {
                            if let Some(slot) = self.mirror.get_mut(&key) {
                                *slot = promoted;
                            }
                        }
                        Err(e) => {
                            warn!(namespace = %self.namespace, key = %key, error = %e, "Hit promotion failed");
                        }
                    }
                }
            }
        }
    }

    fn remember(&mut self, item: CacheItem) {
        let key = item.key().to_string();
        if let Some((evicted, _)) = self.mirror.insert(&key, item) {
            debug!(namespace = %self.namespace, key = %evicted, "Evicted mirror entry");
        }
    }
}

impl<S: KvStore> Backend for RemoteBackend<S> {
    fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    fn fetch(&mut self, key: &str) -> Option<CacheItem> {
        if let Some(item) = self.mirror.get(key) {
            if item.is_expired() {
                self.remove(key);
                return None;
            }
            if item.is_hit() {
                let item = item.clone();
                self.promotions.cancel(key);
                return Some(item);
            }

            self.flush_promotions();
            let item = self.mirror.get(key)?.clone();
            if !item.is_hit() {
                self.promotions.schedule(key, item.expiration());
            }
            return Some(item.into_hit());
        }

        self.flush_promotions();

        let item = self.load(key)?;
        if !item.is_hit() {
            self.promotions.schedule(key, item.expiration());
        }
        self.remember(item.clone());
        Some(item)
    }

    fn clear(&mut self, keys: &[String]) -> bool {
        let store_keys = if keys.is_empty() {
            self.mirror.clear();
            self.promotions.clear();
            match self.store.scan(&format!("{}:*", self.namespace)) {
                Ok(found) => found,
                Err(e) => {
                    warn!(namespace = %self.namespace, error = %e, "Remote scan failed");
                    return false;
                }
            }
        } else {
            for key in keys {
                self.mirror.remove(key);
                self.promotions.cancel(key);
            }
            keys.iter().map(|k| self.store_key(k)).collect()
        };

        match self.store.delete(&store_keys) {
            Ok(()) => true,
            Err(e) => {
                warn!(namespace = %self.namespace, error = %e, "Remote delete failed");
                false
            }
        }
    }

    fn persist(&mut self, item: &CacheItem) -> Result<bool> {
        self.flush_promotions();

        if item.is_expired() {
            return Ok(self.remove(item.key()));
        }

        match self.write(item) {
            Ok(()) => {
                self.promotions.cancel(item.key());
                self.remember(item.clone());
                Ok(true)
            }
            Err(e) => {
                warn!(namespace = %self.namespace, key = item.key(), error = %e, "Could not persist remote entry");
                Ok(false)
            }
        }
    }
}

impl<S: KvStore> Drop for RemoteBackend<S> {
    fn drop(&mut self) {
        self.flush_promotions();
    }
}

impl CachePool<RemoteBackend<RedisStore>> {
    /// Pool over the Redis server at `url`.
    pub fn redis(url: &str, namespace: &str) -> Result<Self> {
        Ok(Self::new(RemoteBackend::new(RedisStore::connect(url)?, namespace)?))
    }
}
