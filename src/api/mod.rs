//! API Module
//!
//! HTTP handlers and routing for the cache pool REST API.
//!
//! # Endpoints
//! - `PUT /set` - Save an item immediately
//! - `PUT /defer` - Queue an item for the next commit
//! - `POST /commit` - Persist queued items
//! - `GET /get/:key` - Retrieve an item by key
//! - `GET /has/:key` - Check whether a key is stored
//! - `DELETE /del/:key` - Delete a key
//! - `DELETE /clear` - Clear the namespace
//! - `POST /prune` - Drop expired entries
//! - `GET /stats` - Get pool statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
