//! Null Backend Module
//!
//! Always misses, always succeeds. Disables caching without touching
//! call sites.

use crate::cache::key::Namespace;
use crate::cache::pool::{Backend, CachePool};
use crate::cache::CacheItem;
use crate::error::Result;

#[derive(Debug, Clone, Default)]
pub struct NullBackend {
    namespace: Namespace,
}

impl NullBackend {
    pub fn new(namespace: &str) -> Result<Self> {
        Ok(Self {
            namespace: Namespace::new(namespace)?,
        })
    }
}

impl Backend for NullBackend {
    fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    fn fetch(&mut self, _key: &str) -> Option<CacheItem> {
        None
    }

    fn clear(&mut self, _keys: &[String]) -> bool {
        true
    }

    fn persist(&mut self, _item: &CacheItem) -> Result<bool> {
        Ok(true)
    }

    fn defers_saves(&self) -> bool {
        false
    }
}

impl CachePool<NullBackend> {
    pub fn null() -> Self {
        Self::new(NullBackend::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_everything_misses_and_succeeds() {
        let mut pool = CachePool::null();
        let mut item = CacheItem::new("k");
        item.set("v").unwrap();

        assert!(pool.save(item.clone()).unwrap());
        assert!(!pool.get_item("k").unwrap().is_hit());
        assert!(!pool.has_item("k").unwrap());
        assert!(pool.delete_item("k").unwrap());
        assert!(pool.clear());
    }

    #[test]
    fn test_deferred_saves_are_not_queued() {
        let mut pool = CachePool::null();
        assert!(pool.save_deferred(CacheItem::new("k")).unwrap());
        assert_eq!(pool.deferred_len(), 0);
        assert!(pool.commit().unwrap());
    }

    #[test]
    fn test_still_validates() {
        let mut pool = CachePool::null();
        assert!(pool.get_item("bad:key").is_err());
        assert!(NullBackend::new("bad ns").is_err());
    }
}
