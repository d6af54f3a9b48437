//! Cache Module
//!
//! Cache item pool with interchangeable storage backends: process memory,
//! encrypted files, a remote key-value store, and a no-op null store.

mod bounded;
mod entry;
mod key;
mod memory;
mod null;
mod pool;
mod promotion;
mod remote;
mod stats;

pub mod file;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use bounded::BoundedMap;
pub use entry::{CacheItem, Expiry};
pub use file::{CipherKind, FileBackend, FileOptions};
pub use key::{validate_key, Namespace, DEFAULT_NAMESPACE, RESERVED_KEY_CHARS};
pub use memory::{MemoryBackend, MemoryStore};
pub use null::NullBackend;
pub use pool::{Backend, CachePool, DynPool};
pub use promotion::{Promotion, PromotionQueue};
pub use remote::{KvStore, RedisStore, RemoteBackend};
pub use stats::CacheStats;

// == Public Constants ==
/// Items kept per namespace by the memory backend
pub const MEMORY_CAPACITY: usize = 1000;

/// Items kept in the local mirror of the file and remote backends
pub const MIRROR_CAPACITY: usize = 100;
