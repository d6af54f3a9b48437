//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation,
//! and the helper every async caller uses to reach the pool.
//!
//! # Tasks
//! - Prune: Removes expired pool entries at configured intervals

mod blocking;
mod prune;

pub use blocking::{share, with_pool, SharedPool};
pub use prune::spawn_prune_task;
