//! Health check endpoints.

use crate::state::AppState;
use axum::{routing::get, Router};

/// Registers health check routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

/// Answers while the process is up, whatever the auth state.
async fn health_check() -> &'static str {
    "OK"
}
