//! HTTP route definitions and handlers.
//!
//! Routes fall into three groups: the auth API over the caller's store, the
//! pages (public ones and the ones behind the guard), and health checks.
//! Everything but health checks runs with the caller's `ClientSession`.

mod auth_routes;
mod health_routes;
mod page_routes;
pub mod paths;

use crate::auth::sessions::attach_client_session;
use crate::state::AppState;
use axum::middleware::from_fn_with_state;
use axum::Router;

/// Creates the application router with all configured routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(auth_routes::routes())
        .merge(page_routes::routes())
        .layer(from_fn_with_state(state.clone(), attach_client_session))
        .merge(health_routes::routes())
        .with_state(state)
}
