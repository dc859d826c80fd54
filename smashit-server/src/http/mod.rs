//! HTTP layer
//!
//! Axum server with:
//! - Shared-secret `x-api-key` check on every route except `GET /`
//! - CORS (localhost only by default)
//! - Request tracing
//! - Graceful shutdown
//! - JSON error bodies of the form `{ "error": "<message>" }`

pub mod auth;
pub mod dto;
pub mod error;
pub mod extractors;
pub mod routes;
pub mod server;

pub use auth::ApiKey;
pub use error::ApiError;
pub use server::{build_router, run_server, serve_on, AppState, ServerConfig, ServerError};
