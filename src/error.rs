//! Error types for the cache pool
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Cache Error Enum ==
/// Unified error type for the cache pool and its backends.
///
/// Only `InvalidNamespace`, `InvalidKey` and `Cipher` (raised by `save` and
/// `commit` when encryption fails) ever reach pool callers. The remaining
/// backend kinds are degraded to a miss or a `false` persist result before
/// leaving the backend.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Namespace failed validation
    #[error("Invalid namespace: {0}")]
    InvalidNamespace(String),

    /// Key is empty or contains a reserved character
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Stored record is malformed or its content hash does not match
    #[error("Integrity failure: {0}")]
    Integrity(String),

    /// Encryption or decryption failed
    #[error("Cipher failure: {0}")]
    Cipher(String),

    /// A record could not be written
    #[error("Persist failure: {0}")]
    Persist(String),

    /// Requested key is not present
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Remote key-value store error
    #[error("Store error: {0}")]
    Store(#[from] redis::RedisError),

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Value (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A pool task panicked or was cancelled
    #[error("Internal error: {0}")]
    Internal(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::InvalidNamespace(_) | CacheError::InvalidKey(_) => StatusCode::BAD_REQUEST,
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::Persist(_) | CacheError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache pool.
pub type Result<T> = std::result::Result<T, CacheError>;
