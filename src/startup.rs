//! Application startup and server initialization.
//!
//! Builds the registry of per-client auth stores, then serves the router.

use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use crate::auth::SessionRegistry;
use crate::config::ConfigV1;
use crate::routes;
use crate::state::AppState;

/// Builds the shared state for `config`. Client stores are created lazily,
/// on each client's first request.
pub fn build_state(config: Arc<ConfigV1>) -> AppState {
    let sessions = Arc::new(SessionRegistry::from_config(&config));
    AppState { config, sessions }
}

/// Initializes and runs the application server.
///
/// # Errors
///
/// Returns an error if the server fails to bind to the configured address
/// or encounters a runtime error while serving.
pub async fn run(config: Arc<ConfigV1>) -> Result<(), Box<dyn std::error::Error>> {
    let state = build_state(config.clone());
    let app = routes::create_router(state);

    info!("Starting server on {}", config.bind_address);
    let listener = TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
