//! Cache Pool Module
//!
//! The uniform pool contract, implemented once on top of three backend
//! primitives: `fetch`, `clear` and `persist`.

use tracing::{debug, warn};

use crate::cache::key::{validate_key, validate_keys, Namespace};
use crate::cache::{CacheItem, CacheStats};
use crate::error::Result;

// == Backend ==
/// Storage engine primitives behind a [`CachePool`].
///
/// Keys handed to a backend have already been validated by the pool.
pub trait Backend {
    /// Partition every key of this backend lives in.
    fn namespace(&self) -> &Namespace;

    /// Looks up `key`, returning `None` for absent or expired entries.
    fn fetch(&mut self, key: &str) -> Option<CacheItem>;

    /// Removes `keys`, or everything in the namespace when `keys` is empty.
    fn clear(&mut self, keys: &[String]) -> bool;

    /// Durably writes `item`.
    ///
    /// I/O and network failures are reported as `Ok(false)`. Only failures
    /// the caller must see, such as a failed encryption, are raised.
    fn persist(&mut self, item: &CacheItem) -> Result<bool>;

    /// Whether `save_deferred` should queue at all.
    fn defers_saves(&self) -> bool {
        true
    }

    /// Removes expired entries, returning how many were dropped.
    fn prune(&mut self) -> usize {
        0
    }
}

impl<B: Backend + ?Sized> Backend for Box<B> {
    fn namespace(&self) -> &Namespace {
        (**self).namespace()
    }

    fn fetch(&mut self, key: &str) -> Option<CacheItem> {
        (**self).fetch(key)
    }

    fn clear(&mut self, keys: &[String]) -> bool {
        (**self).clear(keys)
    }

    fn persist(&mut self, item: &CacheItem) -> Result<bool> {
        (**self).persist(item)
    }

    fn defers_saves(&self) -> bool {
        (**self).defers_saves()
    }

    fn prune(&mut self) -> usize {
        (**self).prune()
    }
}

/// A pool whose backend is chosen at runtime.
pub type DynPool = CachePool<Box<dyn Backend + Send>>;

impl DynPool {
    pub fn boxed<B: Backend + Send + 'static>(backend: B) -> Self {
        CachePool::new(Box::new(backend))
    }
}

// == Cache Pool ==
/// Caller-facing cache pool over any [`Backend`].
#[derive(Debug)]
pub struct CachePool<B: Backend> {
    backend: B,
    /// Items waiting for `commit`, in the order they were first queued
    deferred: Vec<CacheItem>,
    stats: CacheStats,
}

impl<B: Backend> CachePool<B> {
    // == Constructor ==
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            deferred: Vec::new(),
            stats: CacheStats::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn namespace(&self) -> &Namespace {
        self.backend.namespace()
    }

    // == Get ==
    /// Returns the stored item as a hit, or an empty miss item.
    pub fn get_item(&mut self, key: &str) -> Result<CacheItem> {
        validate_key(key)?;

        match self.backend.fetch(key) {
            Some(item) => {
                self.stats.record_hit();
                Ok(Self::set_hit(item))
            }
            None => {
                self.stats.record_miss();
                Ok(CacheItem::new(key))
            }
        }
    }

    /// `get_item` for each key, in input order.
    pub fn get_items<S: AsRef<str>>(&mut self, keys: &[S]) -> Result<Vec<CacheItem>> {
        validate_keys(keys)?;
        keys.iter().map(|k| self.get_item(k.as_ref())).collect()
    }

    /// True if a non-expired entry exists for `key`.
    pub fn has_item(&mut self, key: &str) -> Result<bool> {
        validate_key(key)?;
        Ok(self.backend.fetch(key).is_some())
    }

    // == Clear / Delete ==
    /// Removes every entry in the namespace, queued ones included.
    pub fn clear(&mut self) -> bool {
        self.deferred.clear();
        self.stats.set_deferred(0);
        self.backend.clear(&[])
    }

    pub fn delete_item(&mut self, key: &str) -> Result<bool> {
        self.delete_items(&[key])
    }

    /// Deletes `keys`, also discarding any queued saves for them.
    pub fn delete_items<S: AsRef<str>>(&mut self, keys: &[S]) -> Result<bool> {
        validate_keys(keys)?;

        let keys: Vec<String> = keys.iter().map(|k| k.as_ref().to_string()).collect();
        self.deferred.retain(|item| !keys.iter().any(|k| k == item.key()));
        self.stats.set_deferred(self.deferred.len());
        Ok(self.backend.clear(&keys))
    }

    // == Save ==
    /// Persists `item` immediately.
    pub fn save(&mut self, item: CacheItem) -> Result<bool> {
        validate_key(item.key())?;

        let persisted = self.backend.persist(&item);
        self.stats.record_write(matches!(persisted, Ok(true)));
        persisted
    }

    /// Queues `item` until the next `commit`. Queuing itself cannot fail.
    pub fn save_deferred(&mut self, item: CacheItem) -> Result<bool> {
        validate_key(item.key())?;

        if !self.backend.defers_saves() {
            return Ok(true);
        }

        match self.deferred.iter_mut().find(|queued| queued.key() == item.key()) {
            Some(queued) => *queued = item,
            None => self.deferred.push(item),
        }
        self.stats.set_deferred(self.deferred.len());
        Ok(true)
    }

    // == Commit ==
    /// Persists every queued item, returning true only if all succeeded.
    ///
    /// Each item leaves the queue before its write is attempted, and every
    /// item is attempted. A raised backend error is returned once the queue
    /// is empty; the first one wins.
    pub fn commit(&mut self) -> Result<bool> {
        let mut all_ok = true;
        let mut raised = None;

        while !self.deferred.is_empty() {
            let item = self.deferred.remove(0);
            self.stats.set_deferred(self.deferred.len());

            match self.backend.persist(&item) {
                Ok(ok) => {
                    self.stats.record_write(ok);
                    if !ok {
                        debug!(key = item.key(), "Deferred save failed during commit");
                    }
                    all_ok &= ok;
                }
                Err(e) => {
                    self.stats.record_write(false);
                    warn!(key = item.key(), error = %e, "Deferred save raised during commit");
                    all_ok = false;
                    raised.get_or_insert(e);
                }
            }
        }

        match raised {
            Some(e) => Err(e),
            None => Ok(all_ok),
        }
    }

    // == Set Hit ==
    /// Returns `item` with its hit flag set.
    pub fn set_hit(item: CacheItem) -> CacheItem {
        if item.is_hit() {
            item
        } else {
            item.into_hit()
        }
    }

    // == Prune ==
    pub fn prune(&mut self) -> usize {
        self.backend.prune()
    }

    // == Stats ==
    pub fn stats(&self) -> CacheStats {
        self.stats.clone()
    }

    pub fn deferred_len(&self) -> usize {
        self.deferred.len()
    }
}
