use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The identity record of a signed-in user, as issued by the identity provider.
///
/// Field names follow the browser SDK's user JSON so a persisted record can be
/// read back by either side.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub uid: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default, rename = "photoURL")]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
    /// The sign-in method that produced the session (`password`, `google.com`, ...).
    #[serde(default = "default_provider_id")]
    pub provider_id: String,
}

fn default_provider_id() -> String {
    "password".to_string()
}

/// Settings for signing id tokens issued locally (see `PlainProvider`).
#[derive(Serialize, Deserialize, Debug, Clone, JsonSchema)]
pub struct IdTokenConfig {
    pub iss: String,
    /// Lifetime in seconds.
    pub exp: i64,
    pub secret: String,
}

impl User {
    /// Construct a new password-based User.
    pub fn new(uid: impl Into<String>, email: Option<String>, display_name: Option<String>) -> Self {
        User {
            uid: uid.into(),
            email,
            display_name,
            photo_url: None,
            email_verified: false,
            provider_id: default_provider_id(),
        }
    }

    /// Sign an HS256 id token carrying this user's identity claims.
    pub fn to_id_token(&self, config: &IdTokenConfig) -> Result<String, String> {
        #[derive(Serialize)]
        struct Claims<'a> {
            sub: &'a str,
            iss: &'a str,
            exp: i64,
            iat: i64,

            email: &'a Option<String>,
            name: &'a Option<String>,
            email_verified: bool,
            provider_id: &'a str,
        }

        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: &self.uid,
            iss: &config.iss,
            exp: now + config.exp,
            iat: now,
            email: &self.email,
            name: &self.display_name,
            email_verified: self.email_verified,
            provider_id: &self.provider_id,
        };

        let encoding_key = EncodingKey::from_secret(config.secret.as_ref());
        encode(&Header::default(), &claims, &encoding_key)
            .map_err(|e| format!("Failed to encode id token: {}", e))
    }
}
