//! One auth store per client.
//!
//! Each browser gets an opaque id in the `finpal_session` cookie on first
//! contact. The registry maps that id to the client's own `AuthStore`, with
//! its own provider instance and its own slice of persistent storage, so a
//! sign-in only ever changes the state of the client that made it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use axum::async_trait;
use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use tracing::{debug, info};
use uuid::Uuid;

use super::hook::AuthHook;
use super::store::AuthStore;
use crate::config::{ConfigV1, Environment};
use crate::persistence::{create_storage, ScopedStorage, UserStorage};
use crate::providers::{provider_factory, ProviderFactory};
use crate::state::AppState;
use crate::utils::http_helpers::HTTPError;

pub const SESSION_COOKIE: &str = "finpal_session";

/// The calling client's id and store, attached to every request.
#[derive(Clone)]
pub struct ClientSession {
    pub id: String,
    pub store: Arc<AuthStore>,
}

struct Entry {
    store: Arc<AuthStore>,
    last_seen: Instant,
}

pub struct SessionRegistry {
    factory: ProviderFactory,
    storage: Arc<dyn UserStorage>,
    idle_timeout: Duration,
    entries: Mutex<HashMap<String, Entry>>,
}

impl SessionRegistry {
    pub fn new(
        factory: ProviderFactory,
        storage: Arc<dyn UserStorage>,
        idle_timeout: Duration,
    ) -> Self {
        SessionRegistry {
            factory,
            storage,
            idle_timeout,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &ConfigV1) -> Self {
        Self::new(
            provider_factory(&config.provider),
            create_storage(&config.persistence),
            Duration::from_secs(config.auth.session_idle_timeout_secs),
        )
    }

    /// The store for `id`, created and initialized on first contact. Stores
    /// idle for longer than the timeout are dropped first. Must be called
    /// from within a Tokio runtime.
    pub fn resolve(&self, id: &str) -> Arc<AuthStore> {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

        let before = entries.len();
        let idle_timeout = self.idle_timeout;
        entries.retain(|_, entry| now.duration_since(entry.last_seen) <= idle_timeout);
        if entries.len() < before {
            debug!("Dropped {} idle client sessions", before - entries.len());
        }

        let entry = entries.entry(id.to_string()).or_insert_with(|| {
            let storage = Arc::new(ScopedStorage::new(
                self.storage.clone(),
                format!("session:{}", id),
            ));
            let store = Arc::new(AuthStore::new(self.factory.clone(), storage));
            store.initialize();
            info!("Opened auth session for a new client");
            Entry {
                store,
                last_seen: now,
            }
        });
        entry.last_seen = now;
        entry.store.clone()
    }

    /// The store for `id`, if the client currently has one.
    pub fn get(&self, id: &str) -> Option<Arc<AuthStore>> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .map(|entry| entry.store.clone())
    }

    /// Drops the client's store. Returns whether one existed.
    pub fn evict(&self, id: &str) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn session_cookie(id: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, id))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .build()
}

/// Middleware resolving the caller's `ClientSession`. Clients without a valid
/// session cookie get a fresh id, returned in `Set-Cookie`.
pub async fn attach_client_session(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let presented = jar
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|id| Uuid::parse_str(id).is_ok());
    let (id, fresh) = match presented {
        Some(id) => (id, false),
        None => (Uuid::new_v4().to_string(), true),
    };

    let store = state.sessions.resolve(&id);
    request.extensions_mut().insert(ClientSession {
        id: id.clone(),
        store,
    });
    let response = next.run(request).await;

    if fresh {
        let secure = state.config.environment() == Environment::Production;
        (jar.add(session_cookie(id, secure)), response).into_response()
    } else {
        response
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for ClientSession {
    type Rejection = HTTPError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, HTTPError> {
        parts.extensions.get::<ClientSession>().cloned().ok_or_else(|| {
            HTTPError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Client session is not attached",
            )
        })
    }
}

/// Handlers take the calling client's hook directly.
#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AuthHook {
    type Rejection = HTTPError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, HTTPError> {
        let session = ClientSession::from_request_parts(parts, state).await?;
        Ok(AuthHook::new(session.store))
    }
}
