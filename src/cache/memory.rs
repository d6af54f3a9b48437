//! Memory Backend Module
//!
//! Process-lifetime store partitioned by namespace, with FIFO capacity
//! eviction per namespace.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use once_cell::sync::Lazy;
use tracing::debug;

use crate::cache::bounded::BoundedMap;
use crate::cache::key::Namespace;
use crate::cache::pool::{Backend, CachePool};
use crate::cache::{CacheItem, MEMORY_CAPACITY};
use crate::error::Result;

static GLOBAL_STORE: Lazy<Arc<MemoryStore>> = Lazy::new(|| Arc::new(MemoryStore::new()));

// == Memory Store ==
/// Namespace-partitioned item maps shared by every backend built on it.
///
/// [`MemoryStore::global`] is the single store that lives for the whole
/// process. Separate stores can be created for isolation, mostly in tests.
/// Access is serialized by a mutex but callers sharing a namespace still see
/// ordinary last-writer-wins races between their own operations.
#[derive(Debug)]
pub struct MemoryStore {
    namespaces: Mutex<HashMap<String, BoundedMap<CacheItem>>>,
    capacity: usize,
}

impl MemoryStore {
    // == Constructors ==
    pub fn new() -> Self {
        Self::with_capacity(MEMORY_CAPACITY)
    }

    /// Creates a store holding at most `capacity` items per namespace.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            namespaces: Mutex::new(HashMap::new()),
            capacity,
        }
    }

    /// The process-wide store.
    pub fn global() -> Arc<MemoryStore> {
        Arc::clone(&GLOBAL_STORE)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, BoundedMap<CacheItem>>> {
        self.namespaces.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of items held for `namespace`, expired ones included.
    pub fn len(&self, namespace: &Namespace) -> usize {
        self.lock()
            .get(namespace.as_str())
            .map(BoundedMap::len)
            .unwrap_or(0)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

// == Memory Backend ==
/// Backend over a shared [`MemoryStore`].
///
/// Reads return hit-flagged copies but never write the flag back; only an
/// explicit save changes what is stored.
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    store: Arc<MemoryStore>,
    namespace: Namespace,
}

impl MemoryBackend {
    /// Creates a backend on the process-wide store.
    pub fn new(namespace: &str) -> Result<Self> {
        Self::with_store(MemoryStore::global(), namespace)
    }

    /// Creates a backend on an injected store.
    pub fn with_store(store: Arc<MemoryStore>, namespace: &str) -> Result<Self> {
        Ok(Self {
            store,
            namespace: Namespace::new(namespace)?,
        })
    }
}

impl Backend for MemoryBackend {
    fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    fn fetch(&mut self, key: &str) -> Option<CacheItem> {
        let mut namespaces = self.store.lock();
        let items = namespaces.get_mut(self.namespace.as_str())?;

        let stored = items.get(key)?;
        if stored.is_expired() {
            items.remove(key);
            return None;
        }

        let copy = stored.clone();
        Some(if copy.is_hit() { copy } else { copy.into_hit() })
    }

    fn clear(&mut self, keys: &[String]) -> bool {
        let mut namespaces = self.store.lock();

        if keys.is_empty() {
            namespaces.remove(self.namespace.as_str());
            return true;
        }

        if let Some(items) = namespaces.get_mut(self.namespace.as_str()) {
            for key in keys {
                items.remove(key);
            }
        }
        true
    }

    fn persist(&mut self, item: &CacheItem) -> Result<bool> {
        let mut namespaces = self.store.lock();
        let capacity = self.store.capacity;
        let items = namespaces
            .entry(self.namespace.as_str().to_string())
            .or_insert_with(|| BoundedMap::new(capacity));

        if let Some((evicted, _)) = items.insert(item.key(), item.clone()) {
            debug!(namespace = %self.namespace, key = %evicted, "Evicted oldest memory entry");
        }
        Ok(true)
    }

    fn prune(&mut self) -> usize {
        let mut namespaces = self.store.lock();
        namespaces
            .get_mut(self.namespace.as_str())
            .map(|items| items.remove_where(CacheItem::is_expired))
            .unwrap_or(0)
    }
}

impl CachePool<MemoryBackend> {
    /// Pool over the process-wide memory store.
    pub fn memory(namespace: &str) -> Result<Self> {
        Ok(Self::new(MemoryBackend::new(namespace)?))
    }
}
