use chrono::{DateTime, Duration, Utc};

use super::User;

/// An authenticated session issued by the identity provider.
///
/// Sessions stay in memory; only the `User` part is ever persisted.
#[derive(Clone)]
pub struct Session {
    pub user: User,
    pub id_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn new(user: User, id_token: String, refresh_token: String, expires_in_secs: i64) -> Self {
        Session {
            user,
            id_token,
            refresh_token,
            expires_at: Utc::now() + Duration::seconds(expires_in_secs),
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Time left until the tokens should be refreshed, `margin` ahead of expiry.
    pub fn refresh_delay(&self, margin: Duration) -> std::time::Duration {
        if self.is_expired() {
            return std::time::Duration::ZERO;
        }
        (self.expires_at - margin - Utc::now())
            .to_std()
            .unwrap_or(std::time::Duration::ZERO)
    }
}

impl std::fmt::Debug for Session {
    // Tokens are credentials; keep them out of logs.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("user", &self.user)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}
