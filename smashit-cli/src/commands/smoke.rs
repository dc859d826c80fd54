//! End-to-end smoke check
//!
//! Boots the full router on an ephemeral localhost port with in-memory
//! storage and talks to it over real HTTP.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{bail, ensure, Context, Result};
use clap::Parser;
use reqwest::StatusCode;
use smashit_server::http::auth::API_KEY_HEADER;
use smashit_server::http::routes::root::GREETING;
use smashit_server::{serve_on, ApiKey, Repositories, ServerConfig};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

const SMOKE_KEY: &str = "smoke-test-key";

/// Arguments for the smoke command
#[derive(Parser, Debug)]
pub struct SmokeArgs {
    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 5)]
    pub timeout: u64,
}

pub async fn run_smoke(args: SmokeArgs) -> Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .context("Failed to bind an ephemeral port")?;
    let addr = listener.local_addr()?;
    let config = ServerConfig::new(addr, ApiKey::new(SMOKE_KEY)?);

    let (stop, stopped) = oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        serve_on(listener, Repositories::in_memory(), &config, async {
            let _ = stopped.await;
        })
        .await
    });

    let outcome = check_endpoints(addr, Duration::from_secs(args.timeout)).await;

    let _ = stop.send(());
    server.await.context("Server task panicked")??;

    outcome?;
    println!("Smoke test passed on http://{addr}");
    Ok(())
}

async fn check_endpoints(addr: SocketAddr, timeout: Duration) -> Result<()> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;
    let base = format!("http://{addr}");

    let greeting = client
        .get(&base)
        .send()
        .await
        .context("GET / failed")?
        .error_for_status()?
        .text()
        .await?;
    if greeting != GREETING {
        bail!("unexpected greeting: {greeting:?}");
    }

    let status = client
        .get(format!("{base}/organizations"))
        .send()
        .await?
        .status();
    ensure!(
        status == StatusCode::UNAUTHORIZED,
        "request without api key got {status}"
    );

    let status = client
        .get(format!("{base}/organizations"))
        .header(API_KEY_HEADER, SMOKE_KEY)
        .send()
        .await?
        .status();
    ensure!(status.is_success(), "authorized request got {status}");

    tracing::info!("smoke check against {} succeeded", base);
    Ok(())
}
