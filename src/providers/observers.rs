//! Auth-state observation: typed events and the subscriber fan-out used by providers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::sync::mpsc;
use tracing::debug;

use crate::models::User;

/// A change of the provider's authentication state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    /// A session is active (sign-in, sign-up, token refresh).
    SessionEstablished(User),
    /// No session is active any more.
    SessionEnded,
    /// The observation channel itself reported an error. The subscription stays open.
    ObservationFailed(String),
}

impl AuthEvent {
    /// The event describing the given current user.
    pub fn from_user(user: Option<User>) -> Self {
        match user {
            Some(user) => AuthEvent::SessionEstablished(user),
            None => AuthEvent::SessionEnded,
        }
    }
}

/// Fan-out of `AuthEvent`s to every open `Subscription`.
#[derive(Default)]
pub struct ObserverRegistry {
    senders: Mutex<HashMap<u64, mpsc::UnboundedSender<AuthEvent>>>,
    next_id: AtomicU64,
}

impl ObserverRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers a new observer. `initial` is delivered before any later event,
    /// so the subscriber always learns the current state first.
    pub fn subscribe(self: &Arc<Self>, initial: AuthEvent) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        // The receiver is alive, so this cannot fail.
        let _ = tx.send(initial);

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.senders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, tx);
        debug!(subscription_id = id, "auth state observer registered");

        Subscription {
            id,
            receiver: rx,
            registry: Arc::downgrade(self),
        }
    }

    /// Delivers `event` to every open subscription, dropping the closed ones.
    pub fn emit(&self, event: AuthEvent) {
        let mut senders = self.senders.lock().unwrap_or_else(PoisonError::into_inner);
        senders.retain(|id, tx| {
            let open = tx.send(event.clone()).is_ok();
            if !open {
                debug!(subscription_id = *id, "pruning closed auth state observer");
            }
            open
        });
    }

    /// Number of currently registered observers.
    pub fn len(&self) -> usize {
        self.senders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn remove(&self, id: u64) {
        self.senders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }
}

/// A standing registration for auth-state changes. Dropping it unsubscribes.
pub struct Subscription {
    id: u64,
    receiver: mpsc::UnboundedReceiver<AuthEvent>,
    registry: Weak<ObserverRegistry>,
}

impl Subscription {
    /// Waits for the next event. Returns `None` once the provider is gone.
    pub async fn next(&mut self) -> Option<AuthEvent> {
        self.receiver.recv().await
    }

    pub fn unsubscribe(self) {
        drop(self)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
            debug!(subscription_id = self.id, "auth state observer released");
        }
    }
}
