//! Command implementations for the smashit CLI

pub mod migrate;
pub mod serve;
pub mod smoke;

pub use migrate::run_migrate;
pub use serve::run_serve;
pub use smoke::run_smoke;

use anyhow::{Context, Result};
use clap::Args;
use smashit_server::db::{create_pool_with_options, migrations, PgPool, DEFAULT_MAX_CONNECTIONS};

/// PostgreSQL connection options shared by `serve` and `migrate`
#[derive(Args, Debug)]
pub struct DatabaseArgs {
    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Maximum connections in the pool
    #[arg(long, env = "DATABASE_MAX_CONNECTIONS", default_value_t = DEFAULT_MAX_CONNECTIONS)]
    pub max_connections: u32,
}

impl DatabaseArgs {
    /// Connect and bring the schema up to date.
    pub async fn connect_and_migrate(&self) -> Result<PgPool> {
        let database_url = self
            .database_url
            .as_deref()
            .context("DATABASE_URL not set. Set via --database-url, DATABASE_URL env, or .env")?;

        let pool = create_pool_with_options(database_url, self.max_connections)
            .await
            .context("Failed to create database pool")?;

        migrations::run(&pool)
            .await
            .context("Failed to run migrations")?;

        Ok(pool)
    }
}
