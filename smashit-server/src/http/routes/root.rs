//! Unauthenticated greeting at `/`

use std::sync::Arc;

use axum::{routing::get, Router};

use crate::http::server::AppState;

pub const GREETING: &str = "Hello from smashit-core!";

async fn hello() -> &'static str {
    GREETING
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/", get(hello))
}
