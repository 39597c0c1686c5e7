use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::firebase_provider::{FirebaseConfig, FirebaseProvider};
use super::observers::Subscription;
use super::plain_provider::{PlainProvider, PlainProviderConfig};
use crate::errors::{ConfigurationError, ProviderError};
use crate::models::Session;

/// Configuration options for the identity provider.
#[derive(Deserialize, Serialize, JsonSchema, Debug, Clone)]
#[serde(tag = "type")]
pub enum ProviderConfig {
    #[serde(rename = "firebase")]
    Firebase(FirebaseConfig),

    #[serde(rename = "plain")]
    Plain(PlainProviderConfig),
}

impl ProviderConfig {
    pub fn name(&self) -> &str {
        match self {
            ProviderConfig::Firebase(cfg) => &cfg.name,
            ProviderConfig::Plain(cfg) => &cfg.name,
        }
    }
}

/// Email/password pair submitted by the user.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// Third-party identity providers reachable through a popup/redirect flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FederatedProvider {
    Google,
}

impl FederatedProvider {
    pub fn provider_id(&self) -> &'static str {
        match self {
            FederatedProvider::Google => "google.com",
        }
    }
}

/// An identity provider owns sessions: it signs users in and out and reports
/// every change of its authentication state to observers.
///
/// Successful sign-in calls also publish `AuthEvent::SessionEstablished` to
/// every subscription; callers should treat the observer as authoritative.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    fn get_name(&self) -> &str;
    fn get_type(&self) -> &str;

    async fn sign_in_with_password(&self, credentials: &Credentials)
        -> Result<Session, ProviderError>;

    async fn create_account(&self, credentials: &Credentials) -> Result<Session, ProviderError>;

    async fn sign_out(&self) -> Result<(), ProviderError>;

    async fn sign_in_with_federated(
        &self,
        provider: FederatedProvider,
    ) -> Result<Session, ProviderError>;

    /// Registers an observer. The current state is delivered immediately.
    fn observe_state(&self) -> Subscription;
}

/// Builds an identity provider on demand. Construction may fail (e.g.
/// missing configuration); callers decide how to recover.
pub type ProviderFactory =
    Arc<dyn Fn() -> Result<Arc<dyn IdentityProvider>, ConfigurationError> + Send + Sync>;

/// A factory producing one independent provider per call, for one client
/// each. Plain providers built by it share a single account list.
pub fn provider_factory(config: &ProviderConfig) -> ProviderFactory {
    match config {
        ProviderConfig::Firebase(_) => {
            let config = config.clone();
            Arc::new(move || create_identity_provider(&config))
        }
        ProviderConfig::Plain(cfg) => {
            let cfg = cfg.clone();
            let accounts = PlainProvider::accounts(&cfg);
            Arc::new(move || {
                let provider: Arc<dyn IdentityProvider> =
                    Arc::new(PlainProvider::with_accounts(&cfg, accounts.clone())?);
                Ok(provider)
            })
        }
    }
}

/// Create an identity provider from a given config, failing fast on missing settings.
pub fn create_identity_provider(
    config: &ProviderConfig,
) -> Result<Arc<dyn IdentityProvider>, ConfigurationError> {
    let provider: Arc<dyn IdentityProvider> = match config {
        ProviderConfig::Firebase(cfg) => Arc::new(FirebaseProvider::new(cfg)?),
        ProviderConfig::Plain(cfg) => Arc::new(PlainProvider::new(cfg)?),
    };
    info!(
        provider_name = provider.get_name(),
        provider_type = provider.get_type(),
        "identity provider created"
    );
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_debug_hides_password() {
        let creds = Credentials::new("a@b.com", "hunter22");
        let rendered = format!("{:?}", creds);
        assert!(rendered.contains("a@b.com"));
        assert!(!rendered.contains("hunter22"));
    }

    #[test]
    fn test_create_identity_provider_rejects_incomplete_firebase_config() {
        let config: ProviderConfig = serde_json::from_value(serde_json::json!({
            "type": "firebase",
            "api_key": "key",
            "project_id": "finpal"
        }))
        .unwrap();

        let err = create_identity_provider(&config).err().expect("should fail");
        assert_eq!(
            err,
            ConfigurationError::MissingFields(vec![
                "auth_domain",
                "storage_bucket",
                "messaging_sender_id",
                "app_id"
            ])
        );
    }
}
