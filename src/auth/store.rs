//! The authentication state store.
//!
//! `AuthStore` is the single writer of `AuthState`. UI-facing code reads
//! snapshots or watches the state channel; every transition goes through the
//! operations below or through the observer control loop started by
//! `initialize`.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::state::AuthState;
use crate::errors::{AuthError, ConfigurationError};
use crate::models::User;
use crate::persistence::{read_persisted_user, write_persisted_user, UserStorage};
use crate::providers::{
    AuthEvent, Credentials, FederatedProvider, IdentityProvider, ProviderFactory,
};

/// State and persistence, shared between the store and its control loop.
struct Shared {
    state: watch::Sender<AuthState>,
    storage: Arc<dyn UserStorage>,
}

impl Shared {
    /// Applies `f` as one atomic update. Watchers are notified only if
    /// something changed; a changed `user` is written through to storage
    /// while the state is still locked, so storage sees writes in state order.
    fn update(&self, f: impl FnOnce(&mut AuthState)) {
        self.state.send_if_modified(|state| {
            let before = state.clone();
            f(state);
            if before.user != state.user {
                if let Err(e) = write_persisted_user(self.storage.as_ref(), state.user.as_ref()) {
                    warn!("Failed to persist auth state: {}", e);
                }
            }
            before != *state
        });
    }

    fn set_user(&self, user: Option<User>) {
        self.update(|state| {
            state.user = user;
            state.is_loading = false;
        });
    }

    fn apply(&self, event: AuthEvent) {
        match event {
            AuthEvent::SessionEstablished(user) => {
                debug!(uid = user.uid.as_str(), "session established");
                self.set_user(Some(user));
            }
            AuthEvent::SessionEnded => {
                debug!("session ended");
                self.set_user(None);
            }
            AuthEvent::ObservationFailed(message) => {
                warn!("auth state observation failed: {}", message);
                self.update(|state| {
                    state.error = Some(message);
                    state.is_loading = false;
                });
            }
        }
    }
}

pub struct AuthStore {
    shared: Arc<Shared>,
    factory: ProviderFactory,
    provider: Mutex<Option<Arc<dyn IdentityProvider>>>,
    observer: Mutex<Option<JoinHandle<()>>>,
}

impl AuthStore {
    /// Creates the store, rehydrating the persisted user synchronously.
    pub fn new(factory: ProviderFactory, storage: Arc<dyn UserStorage>) -> Self {
        let user = read_persisted_user(storage.as_ref());
        if let Some(user) = &user {
            info!(uid = user.uid.as_str(), "rehydrated persisted user");
        }
        let (state, _) = watch::channel(AuthState::hydrated(user));

        AuthStore {
            shared: Arc::new(Shared { state, storage }),
            factory,
            provider: Mutex::new(None),
            observer: Mutex::new(None),
        }
    }

    /// A store around an already constructed provider.
    pub fn with_provider(
        provider: Arc<dyn IdentityProvider>,
        storage: Arc<dyn UserStorage>,
    ) -> Self {
        Self::new(Arc::new(move || Ok(provider.clone())), storage)
    }

    /// Current snapshot.
    pub fn state(&self) -> AuthState {
        self.shared.state.borrow().clone()
    }

    /// A receiver that wakes on every state change.
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.shared.state.subscribe()
    }

    /// Starts observing the identity provider. Idempotent: only the first call
    /// registers a subscription. Must be called from within a Tokio runtime.
    pub fn initialize(&self) {
        let claimed = self.shared.state.send_if_modified(|state| {
            if state.is_initialized {
                return false;
            }
            state.is_initialized = true;
            state.is_loading = true;
            true
        });
        if !claimed {
            debug!("auth store already initialized");
            return;
        }

        let provider = match self.provider() {
            Ok(provider) => provider,
            Err(e) => {
                error!("Identity provider initialization error: {}", e);
                self.shared.update(|state| {
                    state.user = None;
                    state.is_loading = false;
                    state.error = Some(e.to_string());
                    state.is_initialized = true;
                });
                return;
            }
        };

        let mut subscription = provider.observe_state();
        let shared = self.shared.clone();
        let handle = tokio::spawn(async move {
            while let Some(event) = subscription.next().await {
                shared.apply(event);
            }
            debug!("auth state observer closed");
        });
        *self.observer.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        info!(provider_name = provider.get_name(), "observing identity provider");
    }

    /// Signs in with email and password. The new user arrives through the
    /// observer, not through this call.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<(), AuthError> {
        self.begin_operation();
        let credentials = Credentials::new(email, password);
        let result = async {
            let provider = self.provider()?;
            provider.sign_in_with_password(&credentials).await?;
            Ok::<(), AuthError>(())
        }
        .await;
        self.finish_operation("sign_in", result)
    }

    /// Creates an account; same contract as `sign_in`.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<(), AuthError> {
        self.begin_operation();
        let credentials = Credentials::new(email, password);
        let result = async {
            let provider = self.provider()?;
            provider.create_account(&credentials).await?;
            Ok::<(), AuthError>(())
        }
        .await;
        self.finish_operation("sign_up", result)
    }

    /// Federated sign-in through Google; same contract as `sign_in`.
    pub async fn sign_in_with_google(&self) -> Result<(), AuthError> {
        self.begin_operation();
        let result = async {
            let provider = self.provider()?;
            provider
                .sign_in_with_federated(FederatedProvider::Google)
                .await?;
            Ok::<(), AuthError>(())
        }
        .await;
        self.finish_operation("sign_in_with_google", result)
    }

    /// Signs out. On success the user is cleared here, without waiting for
    /// the observer.
    pub async fn logout(&self) -> Result<(), AuthError> {
        self.begin_operation();
        let result = async {
            let provider = self.provider()?;
            provider.sign_out().await?;
            Ok::<(), AuthError>(())
        }
        .await;
        let result = self.finish_operation("logout", result);
        if result.is_ok() {
            self.shared.set_user(None);
        }
        result
    }

    fn begin_operation(&self) {
        self.shared.update(|state| {
            state.is_loading = true;
            state.error = None;
        });
    }

    fn finish_operation(
        &self,
        operation: &str,
        result: Result<(), AuthError>,
    ) -> Result<(), AuthError> {
        match result {
            Ok(()) => {
                debug!(operation, "auth operation completed");
                Ok(())
            }
            Err(e) => {
                warn!(operation, "auth operation failed: {}", e);
                let message = e.to_string();
                self.shared.update(|state| {
                    state.error = Some(message);
                    state.is_loading = false;
                });
                Err(e)
            }
        }
    }

    fn provider(&self) -> Result<Arc<dyn IdentityProvider>, ConfigurationError> {
        let mut slot = self.provider.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(provider) = slot.as_ref() {
            return Ok(provider.clone());
        }
        let provider = (self.factory)()?;
        *slot = Some(provider.clone());
        Ok(provider)
    }

    #[cfg(test)]
    fn set_user(&self, user: Option<User>) {
        self.shared.set_user(user);
    }
}

impl Drop for AuthStore {
    fn drop(&mut self) {
        if let Some(handle) = self
            .observer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }
}
