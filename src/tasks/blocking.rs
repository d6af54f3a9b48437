//! Blocking Pool Access
//!
//! Pool operations may block on disk or network I/O, so async callers hand
//! them to tokio's blocking thread pool instead of running them on a worker.

use std::sync::{Arc, Mutex, PoisonError};

use crate::cache::DynPool;
use crate::error::{CacheError, Result};

/// Pool shared between handlers and background tasks.
pub type SharedPool = Arc<Mutex<DynPool>>;

/// Wraps `pool` for sharing.
pub fn share(pool: DynPool) -> SharedPool {
    Arc::new(Mutex::new(pool))
}

/// Runs `op` with exclusive access to the pool on the blocking thread pool.
/// A lock poisoned by an earlier panic is recovered.
pub async fn with_pool<T, F>(pool: &SharedPool, op: F) -> Result<T>
where
    F: FnOnce(&mut DynPool) -> T + Send + 'static,
    T: Send + 'static,
{
    let pool = Arc::clone(pool);
    tokio::task::spawn_blocking(move || {
        let mut guard = pool.lock().unwrap_or_else(PoisonError::into_inner);
        op(&mut *guard)
    })
    .await
    .map_err(|e| CacheError::Internal(format!("pool task failed: {}", e)))
}
