use serde::Serialize;

use crate::models::User;

/// Snapshot of the authentication status held by `AuthStore`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthState {
    /// Present iff a session is active.
    pub user: Option<User>,
    /// An operation or the initial observation is in flight.
    pub is_loading: bool,
    /// Message of the most recent failed operation.
    pub error: Option<String>,
    /// Set once when the store starts observing the provider; never cleared.
    pub is_initialized: bool,
}

impl AuthState {
    /// The state at construction, optionally carrying a rehydrated user.
    pub fn hydrated(user: Option<User>) -> Self {
        AuthState {
            user,
            is_loading: true,
            error: None,
            is_initialized: false,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }
}

impl Default for AuthState {
    fn default() -> Self {
        Self::hydrated(None)
    }
}

/// What UI consumers read: the store fields plus the derived `is_authenticated`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthView {
    pub user: Option<User>,
    pub is_loading: bool,
    pub error: Option<String>,
    pub is_authenticated: bool,
}

impl From<&AuthState> for AuthView {
    fn from(state: &AuthState) -> Self {
        AuthView {
            user: state.user.clone(),
            is_loading: state.is_loading,
            error: state.error.clone(),
            is_authenticated: state.is_authenticated(),
        }
    }
}
