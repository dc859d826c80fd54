//! HTTP server command

use std::net::{IpAddr, SocketAddr};

use anyhow::{Context, Result};
use clap::Parser;
use smashit_server::{run_server, ApiKey, Repositories, ServerConfig};

use super::DatabaseArgs;

/// Arguments for the serve command
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Interface to bind to
    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    pub host: IpAddr,

    /// Port to listen on
    #[arg(long, env = "PORT")]
    pub port: u16,

    /// Secret every request must send in the `x-api-key` header
    #[arg(long, env = "API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Allow permissive CORS (all origins) - use with caution
    #[arg(long)]
    pub cors_permissive: bool,

    /// Keep all data in process memory instead of PostgreSQL
    #[arg(long)]
    pub in_memory: bool,

    #[command(flatten)]
    pub database: DatabaseArgs,
}

/// Run the HTTP server
pub async fn run_serve(args: ServeArgs) -> Result<()> {
    let api_key = ApiKey::new(&args.api_key).context("API_KEY must not be empty")?;
    let bind_addr = SocketAddr::new(args.host, args.port);

    let repos = if args.in_memory {
        tracing::warn!("Using in-memory storage; data is lost on shutdown");
        Repositories::in_memory()
    } else {
        Repositories::postgres(args.database.connect_and_migrate().await?)
    };

    tracing::info!("Starting smashit server on {}", bind_addr);

    let mut config = ServerConfig::new(bind_addr, api_key);
    config.cors_permissive = args.cors_permissive;

    // Run server (blocks until shutdown)
    run_server(repos, config).await.context("Server error")?;

    Ok(())
}
