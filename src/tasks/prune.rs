//! Prune Task
//!
//! Background task that periodically drops expired entries from the pool.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::blocking::{with_pool, SharedPool};

/// Spawns a background task that calls `prune` on `pool` every
/// `interval_secs` seconds.
///
/// The returned handle is aborted during graceful shutdown.
pub fn spawn_prune_task(pool: SharedPool, interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting prune task with interval of {} seconds",
            interval.as_secs()
        );

        loop {
            tokio::time::sleep(interval).await;

            let removed = match with_pool(&pool, |pool| pool.prune()).await {
                Ok(removed) => removed,
                Err(e) => {
                    warn!(error = %e, "Prune pass failed");
                    continue;
                }
            };

            if removed > 0 {
                info!("Prune: removed {} expired entries", removed);
            } else {
                debug!("Prune: no expired entries found");
            }
        }
    })
}
