//! Configuration Module
//!
//! Handles loading and managing server configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::cache::{
    CipherKind, DynPool, FileBackend, FileOptions, MemoryBackend, NullBackend, RedisStore,
    RemoteBackend,
};
use crate::error::Result;

// == Backend Kind ==
/// Which storage engine the server's pool uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    #[default]
    Memory,
    File,
    Redis,
    Null,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(BackendKind::Memory),
            "file" => Ok(BackendKind::File),
            "redis" => Ok(BackendKind::Redis),
            "null" | "none" => Ok(BackendKind::Null),
            other => Err(format!("unknown cache backend '{}'", other)),
        }
    }
}

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Storage engine behind the pool
    pub backend: BackendKind,
    /// Pool namespace; empty selects the default namespace
    pub namespace: String,
    /// Root directory of the file backend
    pub cache_dir: PathBuf,
    /// File backend encryption secret
    pub secret: Option<String>,
    /// File backend cipher
    pub cipher: CipherKind,
    /// Redis connection URL
    pub redis_url: String,
    /// HTTP server port
    pub server_port: u16,
    /// Background prune task interval in seconds
    pub prune_interval: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_BACKEND` - `memory`, `file`, `redis` or `null` (default: memory)
    /// - `CACHE_NAMESPACE` - Pool namespace (default: empty)
    /// - `CACHE_DIR` - File backend root (default: ./cache)
    /// - `CACHE_SECRET` - File backend secret (default: derived from CACHE_DIR)
    /// - `CACHE_CIPHER` - `aes128cbc`, `aes128gcm` or `aes256gcm` (default: aes128cbc)
    /// - `REDIS_URL` - Redis URL (default: redis://127.0.0.1/)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `PRUNE_INTERVAL` - Prune frequency in seconds (default: 60)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            backend: parsed("CACHE_BACKEND").unwrap_or(defaults.backend),
            namespace: env::var("CACHE_NAMESPACE").unwrap_or(defaults.namespace),
            cache_dir: env::var("CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.cache_dir),
            secret: env::var("CACHE_SECRET").ok().filter(|s| !s.is_empty()),
            cipher: parsed("CACHE_CIPHER").unwrap_or(defaults.cipher),
            redis_url: env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            server_port: parsed("SERVER_PORT").unwrap_or(defaults.server_port),
            prune_interval: parsed("PRUNE_INTERVAL").unwrap_or(defaults.prune_interval),
        }
    }

    /// Builds the pool this configuration describes.
    pub fn build_pool(&self) -> Result<DynPool> {
        let pool = match self.backend {
            BackendKind::Memory => DynPool::boxed(MemoryBackend::new(&self.namespace)?),
            BackendKind::File => {
                let options = FileOptions {
                    secret: self.secret.clone(),
                    cipher: self.cipher,
                };
                DynPool::boxed(FileBackend::with_options(
                    &self.cache_dir,
                    &self.namespace,
                    options,
                )?)
            }
            BackendKind::Redis => DynPool::boxed(RemoteBackend::new(
                RedisStore::connect(&self.redis_url)?,
                &self.namespace,
            )?),
            BackendKind::Null => DynPool::boxed(NullBackend::new(&self.namespace)?),
        };
        Ok(pool)
    }
}

fn parsed<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendKind::Memory,
            namespace: String::new(),
            cache_dir: PathBuf::from("./cache"),
            secret: None,
            cipher: CipherKind::Aes128Cbc,
            redis_url: "redis://127.0.0.1/".to_string(),
            server_port: 3000,
            prune_interval: 60,
        }
    }
}
