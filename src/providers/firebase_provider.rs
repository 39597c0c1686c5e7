use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::base::{Credentials, FederatedProvider, IdentityProvider};
use super::observers::{AuthEvent, ObserverRegistry, Subscription};
use crate::errors::{ConfigurationError, ProviderError};
use crate::models::{Session, User};

const DEFAULT_IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com/v1";
const DEFAULT_SECURE_TOKEN_URL: &str = "https://securetoken.googleapis.com/v1";

/// Tokens are refreshed this many seconds before they expire.
const REFRESH_MARGIN_SECS: i64 = 300;
/// Lower bound between two background refreshes.
const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(1);

/// The named values needed to build a Firebase Authentication client.
///
/// The six required keys default to empty so a partial configuration still
/// deserializes and `validate` can report everything that is missing at once.
#[derive(Deserialize, Serialize, Debug, JsonSchema, Clone, Default)]
pub struct FirebaseConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub auth_domain: String,
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub storage_bucket: String,
    #[serde(default)]
    pub messaging_sender_id: String,
    #[serde(default)]
    pub app_id: String,
    pub measurement_id: Option<String>,
    #[serde(default = "default_identity_toolkit_url")]
    pub identity_toolkit_url: String,
    #[serde(default = "default_secure_token_url")]
    pub secure_token_url: String,
}

fn default_name() -> String {
    "firebase".to_string()
}

fn default_identity_toolkit_url() -> String {
    DEFAULT_IDENTITY_TOOLKIT_URL.to_string()
}

fn default_secure_token_url() -> String {
    DEFAULT_SECURE_TOKEN_URL.to_string()
}

impl FirebaseConfig {
    /// Fails if any required value is blank, naming every missing key.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let required = [
            ("api_key", &self.api_key),
            ("auth_domain", &self.auth_domain),
            ("project_id", &self.project_id),
            ("storage_bucket", &self.storage_bucket),
            ("messaging_sender_id", &self.messaging_sender_id),
            ("app_id", &self.app_id),
        ];
        let missing: Vec<&'static str> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(field, _)| *field)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigurationError::MissingFields(missing))
        }
    }
}

/// An IdP credential obtained by a popup or redirect flow run by the host.
#[derive(Clone)]
pub struct IdpCredential {
    pub id_token: String,
    /// The URI the flow returned to; Firebase requires it for `signInWithIdp`.
    pub request_uri: String,
}

/// The host side of federated sign-in: shows the provider's consent screen
/// and hands back the resulting credential.
#[async_trait]
pub trait PopupFlow: Send + Sync {
    async fn obtain_credential(&self, provider: FederatedProvider)
        -> Result<IdpCredential, ProviderError>;
}

/// Firebase Authentication over its REST API.
///
/// While a session is held, a background task refreshes its tokens
/// `REFRESH_MARGIN_SECS` before they expire; observers see every refresh.
pub struct FirebaseProvider {
    core: Arc<FirebaseCore>,
    popup: Option<Arc<dyn PopupFlow>>,
    refresher: Mutex<Option<JoinHandle<()>>>,
}

/// The part of the provider the refresh task shares.
struct FirebaseCore {
    config: FirebaseConfig,
    client: reqwest::Client,
    session: RwLock<Option<Session>>,
    observers: Arc<ObserverRegistry>,
}

/// Token response shared by `signInWithPassword`, `signUp` and `signInWithIdp`.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct AccountResponse {
    local_id: String,
    email: Option<String>,
    display_name: Option<String>,
    photo_url: Option<String>,
    #[serde(default)]
    email_verified: bool,
    provider_id: Option<String>,
    id_token: String,
    refresh_token: String,
    expires_in: String,
}

/// Response of the Secure Token `token` endpoint (snake_case on the wire).
#[derive(Deserialize, Debug)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    expires_in: String,
}

impl FirebaseProvider {
    pub fn new(config: &FirebaseConfig) -> Result<Self, ConfigurationError> {
        config.validate()?;
        info!(
            "Creating Firebase provider for project '{}', name='{}'",
            config.project_id, config.name
        );
        Ok(Self {
            core: Arc::new(FirebaseCore {
                config: config.clone(),
                client: reqwest::Client::new(),
                session: RwLock::new(None),
                observers: ObserverRegistry::new(),
            }),
            popup: None,
            refresher: Mutex::new(None),
        })
    }

    /// Attaches the host's popup/redirect flow, enabling federated sign-in.
    pub fn with_popup_flow(mut self, popup: Arc<dyn PopupFlow>) -> Self {
        self.popup = Some(popup);
        self
    }

    pub fn current_user(&self) -> Option<User> {
        self.core.current_session().map(|s| s.user)
    }

    /// Exchanges the refresh token for a new id token now, then reschedules
    /// the background refresh.
    ///
    /// Observers see `SessionEstablished` on success and `ObservationFailed`
    /// on failure; in both cases the result is also returned.
    pub async fn refresh_session(&self) -> Result<Session, ProviderError> {
        let session = self.core.refresh_once().await?;
        self.schedule_refresh();
        Ok(session)
    }

    async fn sign_in_with(&self, method: &str, body: Value) -> Result<Session, ProviderError> {
        let session = self.core.post_account(method, body).await?;
        self.schedule_refresh();
        Ok(session)
    }

    /// Replaces any running refresh task with one following the current session.
    fn schedule_refresh(&self) {
        let core = self.core.clone();
        let handle = tokio::spawn(async move {
            loop {
                let Some(session) = core.current_session() else {
                    break;
                };
                let delay = session
                    .refresh_delay(chrono::Duration::seconds(REFRESH_MARGIN_SECS))
                    .max(MIN_REFRESH_INTERVAL);
                debug!("Next Firebase token refresh in {:?}", delay);
                tokio::time::sleep(delay).await;
                if core.refresh_once().await.is_err() {
                    break;
                }
            }
        });
        if let Some(previous) = self
            .refresher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle)
        {
            previous.abort();
        }
    }

    fn cancel_refresh(&self) {
        if let Some(handle) = self
            .refresher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }
}

impl Drop for FirebaseProvider {
    fn drop(&mut self) {
        self.cancel_refresh();
    }
}

impl FirebaseCore {
    fn current_session(&self) -> Option<Session> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn refresh_once(&self) -> Result<Session, ProviderError> {
        let Some(current) = self.current_session() else {
            return Err(ProviderError::new(
                "auth/no-current-user",
                "No user is currently signed in",
            ));
        };

        let url = format!("{}/token?key={}", self.config.secure_token_url, self.config.api_key);
        debug!("Refreshing Firebase session for uid '{}'", current.user.uid);
        let result = async {
            let response = self
                .client
                .post(&url)
                .form(&[
                    ("grant_type", "refresh_token"),
                    ("refresh_token", current.refresh_token.as_str()),
                ])
                .send()
                .await
                .map_err(network_error)?;
            let refreshed: RefreshResponse = parse_response(response).await?;
            Ok::<_, ProviderError>(Session::new(
                current.user.clone(),
                refreshed.id_token,
                refreshed.refresh_token,
                parse_expires_in(&refreshed.expires_in)?,
            ))
        }
        .await;

        match result {
            Ok(session) => {
                self.establish(session.clone());
                Ok(session)
            }
            Err(e) => {
                warn!("Firebase session refresh failed: {}", e);
                self.observers
                    .emit(AuthEvent::ObservationFailed(e.message.clone()));
                Err(e)
            }
        }
    }

    fn endpoint(&self, method: &str) -> String {
        format!(
            "{}/accounts:{}?key={}",
            self.config.identity_toolkit_url, method, self.config.api_key
        )
    }

    async fn post_account(&self, method: &str, body: Value) -> Result<Session, ProviderError> {
        let url = self.endpoint(method);
        debug!("Sending Firebase '{}' request", method);
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(network_error)?;
        let account: AccountResponse = parse_response(response).await?;
        let expires_in = parse_expires_in(&account.expires_in)?;

        let user = User {
            uid: account.local_id,
            email: account.email,
            display_name: account.display_name.filter(|s| !s.is_empty()),
            photo_url: account.photo_url,
            email_verified: account.email_verified,
            provider_id: account.provider_id.unwrap_or_else(|| "password".to_string()),
        };
        let session = Session::new(user, account.id_token, account.refresh_token, expires_in);
        self.establish(session.clone());
        Ok(session)
    }

    fn establish(&self, session: Session) {
        let user = session.user.clone();
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = Some(session);
        self.observers.emit(AuthEvent::SessionEstablished(user));
    }
}

#[async_trait]
impl IdentityProvider for FirebaseProvider {
    fn get_name(&self) -> &str {
        &self.core.config.name
    }

    fn get_type(&self) -> &str {
        "firebase"
    }

    async fn sign_in_with_password(
        &self,
        credentials: &Credentials,
    ) -> Result<Session, ProviderError> {
        let body = json!({
            "email": credentials.email,
            "password": credentials.password,
            "returnSecureToken": true,
        });
        self.sign_in_with("signInWithPassword", body).await
    }

    async fn create_account(&self, credentials: &Credentials) -> Result<Session, ProviderError> {
        let body = json!({
            "email": credentials.email,
            "password": credentials.password,
            "returnSecureToken": true,
        });
        self.sign_in_with("signUp", body).await
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        // Firebase sessions are bearer tokens; signing out is purely local.
        self.cancel_refresh();
        let previous = self
            .core
            .session
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(session) = previous {
            debug!("Signed out uid '{}'", session.user.uid);
        }
        self.core.observers.emit(AuthEvent::SessionEnded);
        Ok(())
    }

    async fn sign_in_with_federated(
        &self,
        provider: FederatedProvider,
    ) -> Result<Session, ProviderError> {
        let Some(popup) = &self.popup else {
            return Err(ProviderError::new(
                "auth/operation-not-supported-in-this-environment",
                "Federated sign-in is not supported in this environment",
            ));
        };
        let credential = popup.obtain_credential(provider).await?;
        let post_body = format!(
            "id_token={}&providerId={}",
            urlencoding::encode(&credential.id_token),
            provider.provider_id()
        );
        let body = json!({
            "postBody": post_body,
            "requestUri": credential.request_uri,
            "returnIdpCredential": true,
            "returnSecureToken": true,
        });
        self.sign_in_with("signInWithIdp", body).await
    }

    fn observe_state(&self) -> Subscription {
        self.core
            .observers
            .subscribe(AuthEvent::from_user(self.current_user()))
    }
}

async fn parse_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ProviderError> {
    let status = response.status();
    let body = response.text().await.map_err(network_error)?;

    if status.is_success() {
        serde_json::from_str(&body).map_err(|e| {
            ProviderError::new(
                "auth/internal-error",
                format!("Error parsing response JSON: {}", e),
            )
        })
    } else {
        let raw = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
            .unwrap_or_else(|| format!("Unexpected status code: {}", status));
        Err(map_error_code(&raw))
    }
}

fn network_error(e: reqwest::Error) -> ProviderError {
    ProviderError::new(
        "auth/network-request-failed",
        format!("Network request failed: {}", e),
    )
}

fn parse_expires_in(raw: &str) -> Result<i64, ProviderError> {
    raw.trim().parse().map_err(|_| {
        ProviderError::new(
            "auth/internal-error",
            format!("Unexpected expiresIn value: '{}'", raw),
        )
    })
}

/// Turns a REST error message such as `WEAK_PASSWORD : Password should be at
/// least 6 characters` into an SDK-style code plus a readable message.
pub fn map_error_code(raw: &str) -> ProviderError {
    let (code, detail) = match raw.split_once(" : ") {
        Some((code, detail)) => (code.trim(), Some(detail.trim())),
        None => (raw.trim(), None),
    };

    let (sdk_code, message) = match code {
        "EMAIL_NOT_FOUND" => (
            "auth/user-not-found",
            "There is no user record corresponding to this email",
        ),
        "INVALID_PASSWORD" => ("auth/wrong-password", "The password is invalid"),
        "INVALID_LOGIN_CREDENTIALS" => ("auth/invalid-credential", "invalid credentials"),
        "INVALID_EMAIL" => ("auth/invalid-email", "The email address is badly formatted"),
        "EMAIL_EXISTS" => (
            "auth/email-already-in-use",
            "The email address is already in use by another account",
        ),
        "WEAK_PASSWORD" => (
            "auth/weak-password",
            detail.unwrap_or("Password should be at least 6 characters"),
        ),
        "USER_DISABLED" => (
            "auth/user-disabled",
            "The user account has been disabled by an administrator",
        ),
        "TOO_MANY_ATTEMPTS_TRY_LATER" => (
            "auth/too-many-requests",
            "Access to this account has been temporarily disabled due to many failed login attempts",
        ),
        "TOKEN_EXPIRED" => (
            "auth/user-token-expired",
            "The user's credential is no longer valid. The user must sign in again",
        ),
        "INVALID_REFRESH_TOKEN" => (
            "auth/invalid-refresh-token",
            "The refresh token is invalid. The user must sign in again",
        ),
        other => {
            let sdk_code = format!("auth/{}", other.to_lowercase().replace('_', "-"));
            return ProviderError::new(sdk_code, detail.unwrap_or(other));
        }
    };
    ProviderError::new(sdk_code, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn test_config(base: &str) -> FirebaseConfig {
        FirebaseConfig {
            name: "test-firebase".to_string(),
            api_key: "test-key".to_string(),
            auth_domain: "finpal.firebaseapp.com".to_string(),
            project_id: "finpal".to_string(),
            storage_bucket: "finpal.appspot.com".to_string(),
            messaging_sender_id: "1234".to_string(),
            app_id: "1:1234:web:abcd".to_string(),
            measurement_id: None,
            identity_toolkit_url: base.to_string(),
            secure_token_url: base.to_string(),
        }
    }

    const SIGN_IN_BODY: &str = r#"{
        "localId": "u1",
        "email": "a@b.com",
        "displayName": "",
        "idToken": "id-token-1",
        "refreshToken": "refresh-1",
        "expiresIn": "3600",
        "registered": true
    }"#;

    struct StaticPopup;

    #[async_trait]
    impl PopupFlow for StaticPopup {
        async fn obtain_credential(
            &self,
            _provider: FederatedProvider,
        ) -> Result<IdpCredential, ProviderError> {
            Ok(IdpCredential {
                id_token: "google-id-token".to_string(),
                request_uri: "http://localhost".to_string(),
            })
        }
    }

    #[test]
    fn test_validate_reports_blank_fields() {
        let mut config = test_config("http://unused");
        config.auth_domain = "  ".to_string();
        config.app_id.clear();

        assert_eq!(
            config.validate(),
            Err(ConfigurationError::MissingFields(vec!["auth_domain", "app_id"]))
        );
    }

    #[test]
    fn test_default_endpoints() {
        let config: FirebaseConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.identity_toolkit_url, DEFAULT_IDENTITY_TOOLKIT_URL);
        assert_eq!(config.secure_token_url, DEFAULT_SECURE_TOKEN_URL);
        assert!(FirebaseProvider::new(&config).is_err());
    }

    #[test]
    fn test_map_error_code() {
        let err = map_error_code("INVALID_LOGIN_CREDENTIALS");
        assert_eq!(err.code, "auth/invalid-credential");
        assert_eq!(err.message, "invalid credentials");

        let err = map_error_code("WEAK_PASSWORD : Password should be at least 6 characters");
        assert_eq!(err.code, "auth/weak-password");
        assert_eq!(err.message, "Password should be at least 6 characters");

        let err = map_error_code("OPERATION_NOT_ALLOWED : Password sign-in is disabled");
        assert_eq!(err.code, "auth/operation-not-allowed");
        assert_eq!(err.message, "Password sign-in is disabled");
    }

    #[tokio::test]
    async fn test_sign_in_with_password_success_notifies_observers() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("POST", "/accounts:signInWithPassword")
            .match_query(Matcher::UrlEncoded("key".into(), "test-key".into()))
            .match_body(Matcher::PartialJson(json!({
                "email": "a@b.com",
                "password": "secret1",
                "returnSecureToken": true
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(SIGN_IN_BODY)
            .create_async()
            .await;

        let provider = FirebaseProvider::new(&test_config(&server.url())).unwrap();
        let mut sub = provider.observe_state();
        assert_eq!(sub.next().await, Some(AuthEvent::SessionEnded));

        let session = provider
            .sign_in_with_password(&Credentials::new("a@b.com", "secret1"))
            .await
            .unwrap();
        m.assert_async().await;

        assert_eq!(session.user.uid, "u1");
        assert_eq!(session.user.email.as_deref(), Some("a@b.com"));
        assert!(session.user.display_name.is_none());
        assert_eq!(session.id_token, "id-token-1");
        assert!(!session.is_expired());
        assert_eq!(
            sub.next().await,
            Some(AuthEvent::SessionEstablished(session.user.clone()))
        );
        assert_eq!(provider.current_user(), Some(session.user));
    }

    #[tokio::test]
    async fn test_sign_in_rejected_maps_error() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("POST", "/accounts:signInWithPassword")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"{"error":{"code":400,"message":"INVALID_LOGIN_CREDENTIALS","errors":[]}}"#)
            .create_async()
            .await;

        let provider = FirebaseProvider::new(&test_config(&server.url())).unwrap();
        let err = provider
            .sign_in_with_password(&Credentials::new("a@b.com", "wrong"))
            .await
            .unwrap_err();
        m.assert_async().await;

        assert_eq!(err.code, "auth/invalid-credential");
        assert_eq!(err.message, "invalid credentials");
        assert!(provider.current_user().is_none());
    }

    #[tokio::test]
    async fn test_create_account_email_exists() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("POST", "/accounts:signUp")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"{"error":{"code":400,"message":"EMAIL_EXISTS"}}"#)
            .create_async()
            .await;

        let provider = FirebaseProvider::new(&test_config(&server.url())).unwrap();
        let err = provider
            .create_account(&Credentials::new("a@b.com", "secret1"))
            .await
            .unwrap_err();
        m.assert_async().await;

        assert_eq!(err.code, "auth/email-already-in-use");
    }

    #[tokio::test]
    async fn test_unparseable_error_body_reports_status() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", "/accounts:signUp")
            .match_query(Matcher::Any)
            .with_status(502)
            .with_body("Bad Gateway")
            .create_async()
            .await;

        let provider = FirebaseProvider::new(&test_config(&server.url())).unwrap();
        let err = provider
            .create_account(&Credentials::new("a@b.com", "secret1"))
            .await
            .unwrap_err();

        assert_eq!(err.message, "Unexpected status code: 502 Bad Gateway");
    }

    #[tokio::test]
    async fn test_federated_sign_in_without_popup_flow() {
        let provider = FirebaseProvider::new(&test_config("http://unused")).unwrap();
        let err = provider
            .sign_in_with_federated(FederatedProvider::Google)
            .await
            .unwrap_err();
        assert_eq!(err.code, "auth/operation-not-supported-in-this-environment");
    }

    #[tokio::test]
    async fn test_federated_sign_in_with_popup_flow() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("POST", "/accounts:signInWithIdp")
            .match_query(Matcher::Any)
            .match_body(Matcher::PartialJson(json!({
                "postBody": "id_token=google-id-token&providerId=google.com",
                "requestUri": "http://localhost"
            })))
            .with_status(200)
            .with_body(
                r#"{"localId":"g1","email":"g@b.com","displayName":"Gee","photoUrl":"https://p/g.png",
                "emailVerified":true,"providerId":"google.com","idToken":"id-g","refreshToken":"r-g","expiresIn":"3600"}"#,
            )
            .create_async()
            .await;

        let provider = FirebaseProvider::new(&test_config(&server.url()))
            .unwrap()
            .with_popup_flow(Arc::new(StaticPopup));
        let session = provider
            .sign_in_with_federated(FederatedProvider::Google)
            .await
            .unwrap();
        m.assert_async().await;

        assert_eq!(session.user.uid, "g1");
        assert_eq!(session.user.provider_id, "google.com");
        assert_eq!(session.user.display_name.as_deref(), Some("Gee"));
        assert!(session.user.email_verified);
    }

    #[tokio::test]
    async fn test_sign_out_ends_session() {
        let provider = FirebaseProvider::new(&test_config("http://unused")).unwrap();
        let mut sub = provider.observe_state();
        assert_eq!(sub.next().await, Some(AuthEvent::SessionEnded));

        provider.sign_out().await.unwrap();
        assert_eq!(sub.next().await, Some(AuthEvent::SessionEnded));
        assert!(provider.current_user().is_none());
    }

    #[tokio::test]
    async fn test_refresh_session() {
        let mut server = Server::new_async().await;
        let _sign_in = server
            .mock("POST", "/accounts:signInWithPassword")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(SIGN_IN_BODY)
            .create_async()
            .await;
        let refresh = server
            .mock("POST", "/token")
            .match_query(Matcher::UrlEncoded("key".into(), "test-key".into()))
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
                Matcher::UrlEncoded("refresh_token".into(), "refresh-1".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"id_token":"id-token-2","refresh_token":"refresh-2","expires_in":"3600","user_id":"u1"}"#)
            .create_async()
            .await;

        let provider = FirebaseProvider::new(&test_config(&server.url())).unwrap();
        provider
            .sign_in_with_password(&Credentials::new("a@b.com", "secret1"))
            .await
            .unwrap();

        let session = provider.refresh_session().await.unwrap();
        refresh.assert_async().await;
        assert_eq!(session.id_token, "id-token-2");
        assert_eq!(session.refresh_token, "refresh-2");
        assert_eq!(session.user.uid, "u1");
    }

    #[tokio::test]
    async fn test_refresh_failure_reaches_observers() {
        let mut server = Server::new_async().await;
        let _sign_in = server
            .mock("POST", "/accounts:signInWithPassword")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(SIGN_IN_BODY)
            .create_async()
            .await;
        let _refresh = server
            .mock("POST", "/token")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"{"error":{"code":400,"message":"TOKEN_EXPIRED"}}"#)
            .create_async()
            .await;

        let provider = FirebaseProvider::new(&test_config(&server.url())).unwrap();
        provider
            .sign_in_with_password(&Credentials::new("a@b.com", "secret1"))
            .await
            .unwrap();
        let mut sub = provider.observe_state();
        assert!(matches!(sub.next().await, Some(AuthEvent::SessionEstablished(_))));

        let err = provider.refresh_session().await.unwrap_err();
        assert_eq!(err.code, "auth/user-token-expired");
        assert_eq!(sub.next().await, Some(AuthEvent::ObservationFailed(err.message)));
    }

    #[tokio::test]
    async fn test_refresh_without_session() {
        let provider = FirebaseProvider::new(&test_config("http://unused")).unwrap();
        let err = provider.refresh_session().await.unwrap_err();
        assert_eq!(err.code, "auth/no-current-user");
    }

    const SHORT_LIVED_SIGN_IN_BODY: &str = r#"{
        "localId": "u1",
        "email": "a@b.com",
        "idToken": "id-token-1",
        "refreshToken": "refresh-1",
        "expiresIn": "1"
    }"#;

    async fn next_event(sub: &mut Subscription) -> Option<AuthEvent> {
        tokio::time::timeout(std::time::Duration::from_secs(5), sub.next())
            .await
            .expect("timed out waiting for an auth event")
    }

    #[tokio::test]
    async fn test_expiring_session_is_refreshed_in_background() {
        let mut server = Server::new_async().await;
        let _sign_in = server
            .mock("POST", "/accounts:signInWithPassword")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(SHORT_LIVED_SIGN_IN_BODY)
            .create_async()
            .await;
        let refresh = server
            .mock("POST", "/token")
            .match_query(Matcher::Any)
            .match_body(Matcher::UrlEncoded("refresh_token".into(), "refresh-1".into()))
            .with_status(200)
            .with_body(r#"{"id_token":"id-token-2","refresh_token":"refresh-2","expires_in":"3600"}"#)
            .expect(1)
            .create_async()
            .await;

        let provider = FirebaseProvider::new(&test_config(&server.url())).unwrap();
        let mut sub = provider.observe_state();
        assert_eq!(next_event(&mut sub).await, Some(AuthEvent::SessionEnded));

        let session = provider
            .sign_in_with_password(&Credentials::new("a@b.com", "secret1"))
            .await
            .unwrap();
        assert_eq!(
            next_event(&mut sub).await,
            Some(AuthEvent::SessionEstablished(session.user.clone()))
        );

        // The refresh fires on its own, without any call from the test.
        assert_eq!(
            next_event(&mut sub).await,
            Some(AuthEvent::SessionEstablished(session.user))
        );
        refresh.assert_async().await;
        assert_eq!(
            provider.core.current_session().map(|s| s.id_token).as_deref(),
            Some("id-token-2")
        );
    }

    #[tokio::test]
    async fn test_background_refresh_failure_reaches_observers() {
        let mut server = Server::new_async().await;
        let _sign_in = server
            .mock("POST", "/accounts:signInWithPassword")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(SHORT_LIVED_SIGN_IN_BODY)
            .create_async()
            .await;
        let _refresh = server
            .mock("POST", "/token")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"{"error":{"code":400,"message":"INVALID_REFRESH_TOKEN"}}"#)
            .create_async()
            .await;

        let provider = FirebaseProvider::new(&test_config(&server.url())).unwrap();
        provider
            .sign_in_with_password(&Credentials::new("a@b.com", "secret1"))
            .await
            .unwrap();
        let mut sub = provider.observe_state();
        assert!(matches!(next_event(&mut sub).await, Some(AuthEvent::SessionEstablished(_))));

        assert_eq!(
            next_event(&mut sub).await,
            Some(AuthEvent::ObservationFailed(
                "The refresh token is invalid. The user must sign in again".to_string()
            ))
        );
    }

    #[tokio::test]
    async fn test_sign_out_stops_background_refresh() {
        let mut server = Server::new_async().await;
        let _sign_in = server
            .mock("POST", "/accounts:signInWithPassword")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(SHORT_LIVED_SIGN_IN_BODY)
            .create_async()
            .await;
        let refresh = server
            .mock("POST", "/token")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"id_token":"id-token-2","refresh_token":"refresh-2","expires_in":"3600"}"#)
            .expect(0)
            .create_async()
            .await;

        let provider = FirebaseProvider::new(&test_config(&server.url())).unwrap();
        provider
            .sign_in_with_password(&Credentials::new("a@b.com", "secret1"))
            .await
            .unwrap();
        provider.sign_out().await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(1500)).await;
        refresh.assert_async().await;
    }

    #[tokio::test]
    async fn test_unparseable_expiry_is_internal_error() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", "/accounts:signInWithPassword")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(SIGN_IN_BODY.replace(r#""expiresIn": "3600""#, r#""expiresIn": "soon""#))
            .create_async()
            .await;

        let provider = FirebaseProvider::new(&test_config(&server.url())).unwrap();
        let err = provider
            .sign_in_with_password(&Credentials::new("a@b.com", "secret1"))
            .await
            .unwrap_err();

        assert_eq!(err.code, "auth/internal-error");
        assert!(err.message.contains("'soon'"));
        assert!(provider.current_user().is_none());
    }
}
