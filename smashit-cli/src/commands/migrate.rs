//! Schema migration command

use anyhow::Result;
use clap::Parser;

use super::DatabaseArgs;

/// Arguments for the migrate command
#[derive(Parser, Debug)]
pub struct MigrateArgs {
    #[command(flatten)]
    pub database: DatabaseArgs,
}

/// Create tables and indexes; safe to repeat.
pub async fn run_migrate(args: MigrateArgs) -> Result<()> {
    let pool = args.database.connect_and_migrate().await?;
    pool.close().await;

    println!("Migrations applied");
    Ok(())
}
