//! API Handlers
//!
//! HTTP request handlers for each cache pool endpoint.

use axum::{
    extract::{Path, State},
    Json,
};
use tracing::warn;

use crate::cache::DynPool;
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{
    DeleteResponse, GetResponse, HasResponse, HealthResponse, OutcomeResponse, SetRequest,
    SetResponse, StatsResponse,
};
use crate::tasks::{share, with_pool, SharedPool};

/// Application state shared across all handlers.
///
/// Lookups update statistics, so every pool call needs exclusive access.
/// Calls go through [`with_pool`] so disk and network I/O never runs on an
/// async worker thread.
#[derive(Clone)]
pub struct AppState {
    /// Shared cache pool
    pub pool: SharedPool,
}

impl AppState {
    /// Creates a new AppState around an already built pool.
    pub fn new(pool: DynPool) -> Self {
        Self { pool: share(pool) }
    }

    /// Creates a new AppState from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(config.build_pool()?))
    }
}

/// Handler for PUT /set
///
/// Validates and persists a value immediately.
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    let item = req.into_item()?;
    let key = item.key().to_string();

    let saved = with_pool(&state.pool, move |pool| pool.save(item)).await??;
    if !saved {
        warn!(key = %key, "Backend rejected write");
        return Err(CacheError::Persist(format!("could not persist '{}'", key)));
    }

    Ok(Json(SetResponse::saved(key)))
}

/// Handler for PUT /defer
///
/// Queues a value until the next POST /commit.
pub async fn defer_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    let item = req.into_item()?;
    let key = item.key().to_string();

    with_pool(&state.pool, move |pool| pool.save_deferred(item)).await??;

    Ok(Json(SetResponse::deferred(key)))
}

/// Handler for POST /commit
pub async fn commit_handler(State(state): State<AppState>) -> Result<Json<OutcomeResponse>> {
    let ok = with_pool(&state.pool, |pool| pool.commit()).await??;
    if !ok {
        warn!("Commit finished with failed writes");
    }
    Ok(Json(OutcomeResponse::new(ok)))
}

/// Handler for GET /get/:key
///
/// Misses are reported as 404.
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    let lookup = key.clone();
    let item = with_pool(&state.pool, move |pool| pool.get_item(&lookup)).await??;
    if !item.is_hit() {
        return Err(CacheError::NotFound(key));
    }

    Ok(Json(GetResponse::from(item)))
}

/// Handler for GET /has/:key
pub async fn has_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<HasResponse>> {
    let lookup = key.clone();
    let exists = with_pool(&state.pool, move |pool| pool.has_item(&lookup)).await??;
    Ok(Json(HasResponse { key, exists }))
}

/// Handler for DELETE /del/:key
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>> {
    let target = key.clone();
    let deleted = with_pool(&state.pool, move |pool| pool.delete_item(&target)).await??;
    if !deleted {
        return Err(CacheError::Persist(format!("could not delete '{}'", key)));
    }

    Ok(Json(DeleteResponse::new(key)))
}

/// Handler for DELETE /clear
pub async fn clear_handler(State(state): State<AppState>) -> Result<Json<OutcomeResponse>> {
    let ok = with_pool(&state.pool, |pool| pool.clear()).await?;
    Ok(Json(OutcomeResponse::new(ok)))
}

/// Handler for POST /prune
pub async fn prune_handler(State(state): State<AppState>) -> Result<Json<OutcomeResponse>> {
    let removed = with_pool(&state.pool, |pool| pool.prune()).await?;
    Ok(Json(OutcomeResponse::with_affected(removed)))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Result<Json<StatsResponse>> {
    let (namespace, stats) = with_pool(&state.pool, |pool| {
        (pool.namespace().as_str().to_string(), pool.stats())
    })
    .await?;
    Ok(Json(StatsResponse::new(namespace, &stats)))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
