//! smashit CLI - multi-tenant booking API
//!
//! - `serve`: run the HTTP API (PostgreSQL or in-memory)
//! - `migrate`: create the PostgreSQL schema and exit
//! - `smoke`: boot an in-memory server on an ephemeral port and check it

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod tracing_setup;

use tracing_setup::TracingConfig;

#[derive(Parser, Debug)]
#[command(
    name = "smashit",
    author,
    version,
    about = "Booking API for organizations, spaces, users and bookings"
)]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP API server
    Serve(commands::serve::ServeArgs),
    /// Create database tables and indexes, then exit
    Migrate(commands::migrate::MigrateArgs),
    /// Start an in-memory server and check it answers over HTTP
    Smoke(commands::smoke::SmokeArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env first so clap's env fallbacks can see it
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    tracing_setup::init(&TracingConfig { debug: cli.debug }).ok();

    match cli.command {
        Commands::Serve(args) => commands::run_serve(args).await?,
        Commands::Migrate(args) => commands::run_migrate(args).await?,
        Commands::Smoke(args) => commands::run_smoke(args).await?,
    }
    Ok(())
}
