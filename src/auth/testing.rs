//! A scriptable identity provider for store and hook tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use crate::errors::ProviderError;
use crate::models::{Session, User};
use crate::providers::{
    AuthEvent, Credentials, FederatedProvider, IdentityProvider, ObserverRegistry, Subscription,
};

pub fn test_user() -> User {
    User::new("u1", Some("a@b.com".to_string()), None)
}

/// Succeeds with `test_user()` unless a failure is queued; counts observer registrations.
pub struct FakeProvider {
    pub observers: Arc<ObserverRegistry>,
    pub observe_calls: AtomicUsize,
    current: Mutex<Option<User>>,
    failure: Mutex<Option<ProviderError>>,
    /// When false, successful sign-ins do not notify observers, so tests can
    /// tell the observer path from the call's own return.
    pub notify: bool,
}

impl FakeProvider {
    pub fn new() -> Arc<Self> {
        Self::build(None, true)
    }

    pub fn signed_in(user: User) -> Arc<Self> {
        Self::build(Some(user), true)
    }

    pub fn silent() -> Arc<Self> {
        Self::build(None, false)
    }

    fn build(current: Option<User>, notify: bool) -> Arc<Self> {
        Arc::new(FakeProvider {
            observers: ObserverRegistry::new(),
            observe_calls: AtomicUsize::new(0),
            current: Mutex::new(current),
            failure: Mutex::new(None),
            notify,
        })
    }

    /// The next operation fails with `message`.
    pub fn fail_next(&self, message: &str) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(ProviderError::new("auth/test-failure", message));
    }

    pub fn emit(&self, event: AuthEvent) {
        self.observers.emit(event);
    }

    fn take_failure(&self) -> Result<(), ProviderError> {
        match self
            .failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn succeed(&self, user: User) -> Result<Session, ProviderError> {
        self.take_failure()?;
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(user.clone());
        if self.notify {
            self.observers.emit(AuthEvent::SessionEstablished(user.clone()));
        }
        Ok(Session::new(user, "id".to_string(), "refresh".to_string(), 3600))
    }
}

#[async_trait]
impl IdentityProvider for FakeProvider {
    fn get_name(&self) -> &str {
        "fake"
    }

    fn get_type(&self) -> &str {
        "fake"
    }

    async fn sign_in_with_password(
        &self,
        credentials: &Credentials,
    ) -> Result<Session, ProviderError> {
        self.succeed(User::new("u1", Some(credentials.email.clone()), None))
    }

    async fn create_account(&self, credentials: &Credentials) -> Result<Session, ProviderError> {
        self.succeed(User::new("new-user", Some(credentials.email.clone()), None))
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        self.take_failure()?;
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = None;
        if self.notify {
            self.observers.emit(AuthEvent::SessionEnded);
        }
        Ok(())
    }

    async fn sign_in_with_federated(
        &self,
        provider: FederatedProvider,
    ) -> Result<Session, ProviderError> {
        let mut user = User::new("g1", Some("g@b.com".to_string()), None);
        user.provider_id = provider.provider_id().to_string();
        self.succeed(user)
    }

    fn observe_state(&self) -> Subscription {
        self.observe_calls.fetch_add(1, Ordering::SeqCst);
        let current = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        self.observers.subscribe(AuthEvent::from_user(current))
    }
}
