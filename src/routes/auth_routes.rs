//! Authentication endpoints over the auth store.
//!
//! Every operation goes through the calling client's `AuthHook`. A successful
//! call only starts the transition; the response waits for the store to
//! settle so the client sees the state the observer delivered.

use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tracing::{info, warn};

use super::paths;
use crate::auth::forms::{LoginForm, RegisterForm};
use crate::auth::{AuthHook, AuthView, ClientSession};
use crate::state::AppState;
use crate::utils::http_helpers::HTTPError;

/// Registers authentication routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/session", get(session))
        .route("/api/auth/sign-in", post(sign_in))
        .route("/api/auth/sign-up", post(sign_up))
        .route("/api/auth/google", post(sign_in_with_google))
        .route("/api/auth/logout", post(logout))
}

#[derive(Serialize, Debug)]
struct SessionResponse {
    #[serde(flatten)]
    view: AuthView,
    redirect_to: String,
}

async fn session(hook: AuthHook) -> Json<AuthView> {
    Json(hook.view())
}

async fn sign_in(
    State(state): State<AppState>,
    mut hook: AuthHook,
    Json(form): Json<LoginForm>,
) -> Result<Json<SessionResponse>, HTTPError> {
    form.validate().map_err(HTTPError::validation)?;

    hook.sign_in(&form.email, &form.password).await?;
    info!("Sign-in accepted for {}", form.email);

    let redirect_to = form
        .from
        .filter(|from| is_local_path(from))
        .unwrap_or_else(|| paths::HOME.to_string());
    settle(&mut hook, &state, redirect_to).await
}

async fn sign_up(
    State(state): State<AppState>,
    mut hook: AuthHook,
    Json(form): Json<RegisterForm>,
) -> Result<Json<SessionResponse>, HTTPError> {
    form.validate().map_err(HTTPError::validation)?;

    hook.sign_up(&form.email, &form.password).await?;
    info!("Account created for {}", form.email);

    settle(&mut hook, &state, paths::HOME.to_string()).await
}

async fn sign_in_with_google(
    State(state): State<AppState>,
    mut hook: AuthHook,
) -> Result<Json<SessionResponse>, HTTPError> {
    hook.sign_in_with_google().await?;
    settle(&mut hook, &state, paths::HOME.to_string()).await
}

/// Signing out also drops the client's store; its next request starts fresh.
async fn logout(
    State(state): State<AppState>,
    session: ClientSession,
) -> Result<Json<SessionResponse>, HTTPError> {
    let mut hook = AuthHook::new(session.store.clone());
    hook.logout().await?;
    let response = settle(&mut hook, &state, paths::LOGIN.to_string()).await;
    state.sessions.evict(&session.id);
    response
}

async fn settle(
    hook: &mut AuthHook,
    state: &AppState,
    redirect_to: String,
) -> Result<Json<SessionResponse>, HTTPError> {
    let timeout = Duration::from_millis(state.config.auth.settle_timeout_ms);
    match hook.settled(timeout).await {
        Some(view) => Ok(Json(SessionResponse { view, redirect_to })),
        None => {
            warn!("Auth store did not settle within {:?}", timeout);
            Err(HTTPError::new(
                StatusCode::GATEWAY_TIMEOUT,
                "Timed out waiting for the identity provider",
            ))
        }
    }
}

/// Only same-origin absolute paths are followed after sign-in.
fn is_local_path(location: &str) -> bool {
    location.starts_with('/') && !location.starts_with("//") && !location.contains('\\')
}
