//! Page documents. Login and registration are public; everything in
//! `paths::PROTECTED` sits behind `require_auth`.

use axum::http::Uri;
use axum::middleware::from_fn;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

use super::paths;
use crate::auth::guard::require_auth;
use crate::auth::AuthHook;
use crate::state::AppState;

/// Registers page routes.
pub fn routes() -> Router<AppState> {
    let protected = paths::PROTECTED
        .iter()
        .fold(Router::new(), |router, path| router.route(path, get(page)))
        .route_layer(from_fn(require_auth));

    Router::new()
        .route(paths::LOGIN, get(login_page))
        .route(paths::REGISTER, get(register_page))
        .merge(protected)
}

async fn login_page(hook: AuthHook) -> Json<Value> {
    public_page("login", &hook)
}

async fn register_page(hook: AuthHook) -> Json<Value> {
    public_page("register", &hook)
}

fn public_page(name: &str, hook: &AuthHook) -> Json<Value> {
    let view = hook.view();
    Json(json!({
        "page": name,
        "isLoading": view.is_loading,
        "isAuthenticated": view.is_authenticated,
        "error": view.error,
    }))
}

/// Only reached once the guard has decided to render.
async fn page(uri: Uri, hook: AuthHook) -> Json<Value> {
    let view = hook.view();
    let name = match uri.path() {
        paths::HOME => "home",
        other => other.trim_start_matches('/'),
    };
    Json(json!({
        "page": name,
        "user": view.user,
    }))
}
