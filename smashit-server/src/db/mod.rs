//! Database layer - connection pool, migrations and repositories
//!
//! # Design Principles
//!
//! - Connection pool (max 5 connections by default)
//! - Relations derived from child foreign keys, never stored twice
//! - Populate by batch loading (`= ANY($1)`), no N+1 queries
//! - Rely on DB constraints for uniqueness, map violations to conflicts
//! - Transactions for check-then-write sequences (parent exists, capacity)

pub mod memory;
pub mod migrations;
pub mod pool;
pub mod repos;

pub use memory::MemoryStore;
pub use pool::{create_pool, create_pool_with_options, DEFAULT_MAX_CONNECTIONS};
pub use sqlx::PgPool;
pub use repos::*;
