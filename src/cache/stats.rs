//! Pool Statistics Module
//!
//! Tracks lookup and write outcomes observed by a cache pool.

use serde::Serialize;

// == Cache Stats ==
/// Counters for one pool instance.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Lookups that returned a stored entry
    pub hits: u64,
    /// Lookups that returned an empty miss entry
    pub misses: u64,
    /// Successful persists (immediate or committed)
    pub writes: u64,
    /// Persists the backend reported as failed
    pub write_failures: u64,
    /// Entries currently waiting for commit
    pub deferred: usize,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if no lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    /// Records the outcome of a single persist.
    pub fn record_write(&mut self, ok: bool) {
        if ok {
            self.writes += 1;
        } else {
            self.write_failures += 1;
        }
    }

    pub fn set_deferred(&mut self, count: usize) {
        self.deferred = count;
    }
}
