//! Shared application state.
//!
//! Contains the state that is shared across all request handlers: the
//! configuration and the registry of per-client auth stores.

use crate::auth::SessionRegistry;
use crate::config::ConfigV1;
use std::sync::Arc;

/// Application state shared across all HTTP handlers.
///
/// Cloned for each request handler; the registry itself is never copied.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration loaded at startup.
    pub config: Arc<ConfigV1>,
    /// One auth store per client, keyed by the session cookie.
    pub sessions: Arc<SessionRegistry>,
}
