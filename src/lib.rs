//! Cache Pool - Pluggable cache item pool
//!
//! A uniform get/save/delete/commit contract over interchangeable backends:
//! process memory, encrypted files, Redis, and a null store. The pool can be
//! embedded directly or served over HTTP.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod tasks;

pub use api::AppState;
pub use cache::{CacheItem, CachePool, DynPool};
pub use config::Config;
pub use error::{CacheError, Result};
pub use tasks::{spawn_prune_task, with_pool, SharedPool};
