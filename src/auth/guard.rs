//! Route protection for pages that need a signed-in user.

use axum::extract::Request;
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use serde_json::json;
use tracing::debug;

use super::hook::AuthHook;
use super::sessions::ClientSession;
use super::state::AuthView;
use crate::routes::paths;
use crate::utils::http_helpers::HTTPError;

/// What a protected route should do for the current auth state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// The store has not settled; show a loading indicator, render nothing else.
    Loading,
    /// Nobody is signed in; send the user to `to`, remembering `from`.
    Redirect { to: String, from: String },
    /// Render the protected content.
    Render,
}

/// Recomputed on every request from the current view; nothing is cached.
pub fn decide(view: &AuthView, location: &str) -> GuardDecision {
    if view.is_loading {
        GuardDecision::Loading
    } else if !view.is_authenticated {
        GuardDecision::Redirect {
            to: paths::LOGIN.to_string(),
            from: location.to_string(),
        }
    } else {
        GuardDecision::Render
    }
}

/// The login URL carrying the location to return to after sign-in.
pub fn login_redirect_target(to: &str, from: &str) -> String {
    format!("{}?from={}", to, urlencoding::encode(from))
}

/// Middleware guarding every route it wraps, against the calling client's
/// own store.
pub async fn require_auth(request: Request, next: Next) -> Response {
    let location = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    let Some(session) = request.extensions().get::<ClientSession>() else {
        return HTTPError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Client session is not attached",
        )
        .into_response();
    };
    let hook = AuthHook::new(session.store.clone());

    match decide(&hook.view(), &location) {
        GuardDecision::Loading => {
            debug!("Guarded route '{}' requested while auth is loading", location);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [(header::RETRY_AFTER, "1")],
                Json(json!({ "status": "loading" })),
            )
                .into_response()
        }
        GuardDecision::Redirect { to, from } => {
            debug!("Redirecting unauthenticated request for '{}' to '{}'", from, to);
            Redirect::temporary(&login_redirect_target(&to, &from)).into_response()
        }
        GuardDecision::Render => next.run(request).await,
    }
}
