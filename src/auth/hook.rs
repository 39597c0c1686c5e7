use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use super::state::{AuthState, AuthView};
use super::store::AuthStore;
use crate::errors::AuthError;

/// Read adapter over `AuthStore` for UI consumers (page handlers, guards).
///
/// Creating a hook starts observation if nobody has yet; the store's own
/// idempotency makes concurrent hooks safe.
#[derive(Clone)]
pub struct AuthHook {
    store: Arc<AuthStore>,
    receiver: watch::Receiver<AuthState>,
}

impl AuthHook {
    pub fn new(store: Arc<AuthStore>) -> Self {
        if !store.state().is_initialized {
            store.initialize();
        }
        let receiver = store.subscribe();
        AuthHook { store, receiver }
    }

    pub fn view(&self) -> AuthView {
        AuthView::from(&*self.receiver.borrow())
    }

    pub fn is_authenticated(&self) -> bool {
        self.receiver.borrow().is_authenticated()
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<(), AuthError> {
        self.store.sign_in(email, password).await
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> Result<(), AuthError> {
        self.store.sign_up(email, password).await
    }

    pub async fn sign_in_with_google(&self) -> Result<(), AuthError> {
        self.store.sign_in_with_google().await
    }

    pub async fn logout(&self) -> Result<(), AuthError> {
        self.store.logout().await
    }

    /// Waits for the next state change. Returns false if the store is gone.
    pub async fn changed(&mut self) -> bool {
        self.receiver.changed().await.is_ok()
    }

    /// Waits until no operation is in flight, for at most `timeout`.
    /// Returns `None` if the store is still loading when time runs out.
    pub async fn settled(&mut self, timeout: Duration) -> Option<AuthView> {
        let waited = tokio::time::timeout(timeout, self.receiver.wait_for(|s| !s.is_loading)).await;
        match waited {
            Ok(Ok(state)) => Some(AuthView::from(&*state)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::auth::testing::{test_user, FakeProvider};
    use crate::persistence::NoStorage;
    use crate::providers::AuthEvent;

    fn store_with(provider: Arc<FakeProvider>) -> Arc<AuthStore> {
        Arc::new(AuthStore::with_provider(provider, Arc::new(NoStorage::new())))
    }

    #[tokio::test]
    async fn test_hook_initializes_once() {
        let provider = FakeProvider::new();
        let store = store_with(provider.clone());

        let _first = AuthHook::new(store.clone());
        let _second = AuthHook::new(store.clone());

        assert!(store.state().is_initialized);
        assert_eq!(provider.observe_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_view_reports_authentication() {
        let provider = FakeProvider::signed_in(test_user());
        let mut hook = AuthHook::new(store_with(provider));

        let view = hook
            .settled(Duration::from_secs(2))
            .await
            .expect("store should settle");
        assert!(view.is_authenticated);
        assert!(hook.is_authenticated());
        assert_eq!(view.user, Some(test_user()));
        assert!(view.error.is_none());
    }

    #[tokio::test]
    async fn test_operations_delegate_to_store() {
        let provider = FakeProvider::new();
        let mut hook = AuthHook::new(store_with(provider.clone()));
        hook.settled(Duration::from_secs(2)).await.unwrap();

        hook.sign_in("a@b.com", "secret1").await.unwrap();
        let view = hook.settled(Duration::from_secs(2)).await.unwrap();
        assert!(view.is_authenticated);

        hook.logout().await.unwrap();
        assert!(!hook.view().is_authenticated);

        provider.fail_next("invalid credentials");
        assert!(hook.sign_up("a@b.com", "secret1").await.is_err());
        assert_eq!(hook.view().error.as_deref(), Some("invalid credentials"));
    }

    #[tokio::test]
    async fn test_changed_wakes_on_observer_event() {
        let provider = FakeProvider::new();
        let mut hook = AuthHook::new(store_with(provider.clone()));
        hook.settled(Duration::from_secs(2)).await.unwrap();

        provider.emit(AuthEvent::SessionEstablished(test_user()));
        assert!(hook.changed().await);
        assert!(hook.view().is_authenticated);
    }

    #[tokio::test]
    async fn test_settled_times_out_while_loading() {
        let provider = FakeProvider::silent();
        let store = store_with(provider);
        let mut hook = AuthHook::new(store.clone());
        hook.settled(Duration::from_secs(2)).await.unwrap();

        // A silent provider never reports the sign-in, so loading never ends.
        hook.sign_in("a@b.com", "secret1").await.unwrap();
        assert!(hook.settled(Duration::from_millis(50)).await.is_none());
        assert!(store.state().is_loading);
    }
}
