#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, Response};
use axum::Router;
use figment::providers::{Format, Yaml};
use figment::Figment;
use finpal::auth::sessions::SESSION_COOKIE;
use finpal::auth::{AuthHook, AuthStore, AuthView};
use finpal::config::{extract_config, ConfigV1};
use finpal::routes::create_router;
use finpal::startup::build_state;
use finpal::state::AppState;
use serde_json::Value;
use tower::ServiceExt;

pub const PLAIN_CONFIG: &str = r#"
version: "1.0.0"
bind_address: 127.0.0.1:0
logging:
  level: debug
  format: json
auth:
  settle_timeout_ms: 2000
provider:
  type: plain
  name: "Plain provider"
  id_token:
    iss: finpal-test
    exp: 3600
    secret: test-secret
  users:
    - uid: u1
      email: adam@finpal.app
      password: secret1
      display_name: Adam
"#;

pub fn parse_config(yaml: &str) -> ConfigV1 {
    extract_config(&Figment::new().merge(Yaml::string(yaml))).expect("config should parse")
}

/// Builds the router and its state. Client stores start observing on first
/// contact, so requests must be served from within a Tokio runtime.
pub fn build_app(config: ConfigV1) -> (Router, AppState) {
    let state = build_state(Arc::new(config));
    (create_router(state.clone()), state)
}

/// The `name=value` pair of the session cookie a response set, ready to send
/// back in a `Cookie` header.
pub fn session_cookie(response: &Response<Body>) -> String {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| value.split(';').next())
        .find(|pair| pair.starts_with(&format!("{}=", SESSION_COOKIE)))
        .map(str::to_string)
        .expect("response should set the session cookie")
}

pub fn session_id(cookie: &str) -> &str {
    cookie
        .split_once('=')
        .map(|(_, id)| id)
        .expect("cookie should be a name=value pair")
}

/// The store the registry holds for the client behind `cookie`.
pub fn client_store(state: &AppState, cookie: &str) -> Arc<AuthStore> {
    state
        .sessions
        .get(session_id(cookie))
        .expect("client should have a store")
}

/// Waits for the client's initial observation (or any in-flight operation)
/// to finish.
pub async fn settle(state: &AppState, cookie: &str) -> AuthView {
    AuthHook::new(client_store(state, cookie))
        .settled(Duration::from_secs(2))
        .await
        .expect("auth store should settle")
}

/// First contact from a new client: returns its session cookie once its
/// store has settled.
pub async fn open_client(app: &Router, state: &AppState) -> String {
    let response = app
        .clone()
        .oneshot(get("/api/auth/session"))
        .await
        .expect("request should be served");
    let cookie = session_cookie(&response);
    settle(state, &cookie).await;
    cookie
}

pub fn get(path: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(path)
        .body(Body::empty())
        .expect("failed to build request")
}

pub fn get_as(path: &str, cookie: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(path)
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .expect("failed to build request")
}

pub fn post_json(path: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("failed to build request")
}

pub fn post_json_as(path: &str, body: Value, cookie: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::COOKIE, cookie)
        .body(Body::from(body.to_string()))
        .expect("failed to build request")
}

pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    serde_json::from_slice(&bytes).expect("body should be JSON")
}
