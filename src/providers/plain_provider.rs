use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::base::{Credentials, FederatedProvider, IdentityProvider};
use super::observers::{AuthEvent, ObserverRegistry, Subscription};
use crate::errors::{ConfigurationError, ProviderError};
use crate::models::user::IdTokenConfig;
use crate::models::{Session, User};

const MIN_PASSWORD_LEN: usize = 6;

/// PlainProviderConfig defines a fixed user list, for offline development and tests.
#[derive(Deserialize, Serialize, Debug, JsonSchema, Clone)]
pub struct PlainProviderConfig {
    /// A friendly name for logs.
    pub name: String,
    /// How issued id tokens are signed.
    pub id_token: IdTokenConfig,
    /// The accounts that can sign in.
    #[serde(default)]
    pub users: Vec<PlainUserEntry>,
}

/// Represents a single account (email + password).
#[derive(Deserialize, Serialize, Debug, JsonSchema, Clone)]
pub struct PlainUserEntry {
    pub uid: String,
    pub email: String,
    pub password: String,
    pub display_name: Option<String>,
}

impl PlainUserEntry {
    fn to_user(&self) -> User {
        User::new(
            self.uid.clone(),
            Some(self.email.clone()),
            self.display_name.clone(),
        )
    }
}

/// The account list, shared by every provider built from one configuration
/// so an account created by one client can sign in from another.
pub type PlainAccounts = Arc<RwLock<Vec<PlainUserEntry>>>;

/// A `PlainProvider` signs users in by comparing credentials to the configured
/// user list. Accounts created through sign-up live in memory only.
pub struct PlainProvider {
    config: PlainProviderConfig,
    users: PlainAccounts,
    current: RwLock<Option<User>>,
    observers: Arc<ObserverRegistry>,
}

impl PlainProvider {
    pub fn new(config: &PlainProviderConfig) -> Result<Self, ConfigurationError> {
        Self::with_accounts(config, Self::accounts(config))
    }

    /// A fresh account list seeded from the configured users.
    pub fn accounts(config: &PlainProviderConfig) -> PlainAccounts {
        Arc::new(RwLock::new(config.users.clone()))
    }

    /// A provider over an existing account list.
    pub fn with_accounts(
        config: &PlainProviderConfig,
        users: PlainAccounts,
    ) -> Result<Self, ConfigurationError> {
        if config.id_token.secret.is_empty() {
            return Err(ConfigurationError::Invalid(format!(
                "plain provider '{}' needs a non-empty id_token.secret",
                config.name
            )));
        }
        info!(
            "Creating plain provider '{}' with {} users",
            config.name,
            config.users.len()
        );
        Ok(Self {
            config: config.clone(),
            users,
            current: RwLock::new(None),
            observers: ObserverRegistry::new(),
        })
    }

    fn issue_session(&self, user: User) -> Result<Session, ProviderError> {
        let id_token = user
            .to_id_token(&self.config.id_token)
            .map_err(|e| ProviderError::new("auth/internal-error", e))?;
        let session = Session::new(
            user.clone(),
            id_token,
            uuid::Uuid::new_v4().to_string(),
            self.config.id_token.exp,
        );
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(user.clone());
        self.observers.emit(AuthEvent::SessionEstablished(user));
        Ok(session)
    }
}

#[async_trait]
impl IdentityProvider for PlainProvider {
    fn get_name(&self) -> &str {
        &self.config.name
    }

    fn get_type(&self) -> &str {
        "plain"
    }

    async fn sign_in_with_password(
        &self,
        credentials: &Credentials,
    ) -> Result<Session, ProviderError> {
        debug!("Plain sign-in attempt for '{}'", credentials.email);
        let matched = self
            .users
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|entry| {
                entry.email.eq_ignore_ascii_case(&credentials.email)
                    && entry.password == credentials.password
            })
            .map(PlainUserEntry::to_user);

        match matched {
            Some(user) => self.issue_session(user),
            None => Err(ProviderError::new(
                "auth/invalid-credential",
                "invalid credentials",
            )),
        }
    }

    async fn create_account(&self, credentials: &Credentials) -> Result<Session, ProviderError> {
        if credentials.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ProviderError::new(
                "auth/weak-password",
                "Password should be at least 6 characters",
            ));
        }

        let entry = {
            let mut users = self.users.write().unwrap_or_else(PoisonError::into_inner);
            if users
                .iter()
                .any(|u| u.email.eq_ignore_ascii_case(&credentials.email))
            {
                return Err(ProviderError::new(
                    "auth/email-already-in-use",
                    "The email address is already in use by another account",
                ));
            }
            let entry = PlainUserEntry {
                uid: uuid::Uuid::new_v4().to_string(),
                email: credentials.email.clone(),
                password: credentials.password.clone(),
                display_name: None,
            };
            users.push(entry.clone());
            entry
        };

        info!("Plain provider '{}' created account '{}'", self.config.name, entry.email);
        self.issue_session(entry.to_user())
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = None;
        self.observers.emit(AuthEvent::SessionEnded);
        Ok(())
    }

    async fn sign_in_with_federated(
        &self,
        _provider: FederatedProvider,
    ) -> Result<Session, ProviderError> {
        Err(ProviderError::new(
            "auth/operation-not-allowed",
            "Federated sign-in is not enabled for the plain provider",
        ))
    }

    fn observe_state(&self) -> Subscription {
        let current = self
            .current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        self.observers.subscribe(AuthEvent::from_user(current))
    }
}
