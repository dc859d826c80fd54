//! Axum server setup
//!
//! Server skeleton with:
//! - Localhost-only CORS by default
//! - Tracing middleware
//! - Graceful shutdown on SIGTERM/Ctrl+C

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::HeaderValue;
use axum::{middleware, Router};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::auth::{self, ApiKey};
use super::routes;
use crate::db::Repositories;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Allow permissive CORS (default: false = localhost only)
    ///
    /// WARNING: Setting this to true allows any origin.
    pub cors_permissive: bool,

    /// Secret expected in the `x-api-key` header
    pub api_key: ApiKey,
}

impl ServerConfig {
    pub fn new(bind_addr: SocketAddr, api_key: ApiKey) -> Self {
        Self {
            bind_addr,
            cors_permissive: false,
            api_key,
        }
    }

    fn cors(&self) -> CorsLayer {
        if self.cors_permissive {
            tracing::warn!("CORS: Permissive mode enabled - all origins allowed");
            return CorsLayer::permissive();
        }

        // Localhost only: a dev frontend on :3000 and the server's own port
        let mut ports = vec![3000, self.bind_addr.port()];
        ports.dedup();

        let origins: Vec<HeaderValue> = ports
            .into_iter()
            .flat_map(|port| {
                [
                    format!("http://localhost:{port}"),
                    format!("http://127.0.0.1:{port}"),
                ]
            })
            .filter_map(|origin| HeaderValue::from_str(&origin).ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub repos: Repositories,
    pub api_key: ApiKey,
}

/// Build the application router: `GET /` open, everything else behind the
/// api key.
pub fn build_router(state: AppState) -> Router {
    let state = Arc::new(state);

    let protected = Router::new()
        .merge(routes::organizations::router())
        .merge(routes::spaces::router())
        .merge(routes::users::router())
        .merge(routes::bookings::router())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_api_key,
        ));

    Router::new()
        .merge(routes::root::router())
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the HTTP server until Ctrl+C or SIGTERM.
///
/// # Example
///
/// ```ignore
/// let repos = Repositories::postgres(create_pool(&database_url).await?);
/// let config = ServerConfig::new("127.0.0.1:3000".parse()?, ApiKey::new(key)?);
/// run_server(repos, config).await?;
/// ```
pub async fn run_server(repos: Repositories, config: ServerConfig) -> Result<(), ServerError> {
    let listener = TcpListener::bind(config.bind_addr).await?;
    serve_on(listener, repos, &config, shutdown_signal()).await
}

/// Serve on an already bound listener until `shutdown` resolves.
pub async fn serve_on<F>(
    listener: TcpListener,
    repos: Repositories,
    config: &ServerConfig,
    shutdown: F,
) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let state = AppState {
        repos,
        api_key: config.api_key.clone(),
    };
    let app = build_router(state).layer(config.cors());

    tracing::info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
///
/// A handler that cannot be installed never fires; the other one still can.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting shutdown");
        }
    }
}

/// Server error type
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("an API key is required to start the server")]
    MissingApiKey,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(port: u16) -> ServerConfig {
        ServerConfig::new(
            SocketAddr::from(([127, 0, 0, 1], port)),
            ApiKey::new("test-key").unwrap(),
        )
    }

    #[test]
    fn new_config_is_localhost_only() {
        let config = config(3030);
        assert_eq!(config.bind_addr.port(), 3030);
        assert!(!config.cors_permissive);
    }

    #[tokio::test]
    async fn serve_on_stops_when_shutdown_resolves() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();

        let server = tokio::spawn(async move {
            serve_on(listener, Repositories::in_memory(), &config(0), async {
                let _ = rx.await;
            })
            .await
        });

        tx.send(()).unwrap();
        server.await.unwrap().unwrap();
    }
}
