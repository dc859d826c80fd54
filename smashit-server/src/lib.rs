//! smashit-server: multi-tenant booking API
//!
//! Organizations own spaces and users; users book spaces. The `db` module
//! holds the repository traits with PostgreSQL and in-memory backends, the
//! `http` module wires them to axum routes behind a shared-secret header.

pub mod db;
pub mod http;

pub use db::{create_pool, create_pool_with_options, Repositories};
pub use http::{build_router, run_server, serve_on, ApiKey, AppState, ServerConfig, ServerError};
