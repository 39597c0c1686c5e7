//! Error types shared by providers, storage and the auth store.

use thiserror::Error;

/// The identity provider client could not be built from the given settings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error(
        "Firebase configuration is missing required fields: {}. Please check your configuration.",
        .0.join(", ")
    )]
    MissingFields(Vec<&'static str>),

    #[error("Invalid provider configuration: {0}")]
    Invalid(String),
}

/// A sign-in, sign-up, sign-out or federated call rejected by the provider.
///
/// `code` follows the `auth/<kebab-case>` convention of the browser SDK so UI
/// code can branch on it; `message` is what gets shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ProviderError {
    pub code: String,
    pub message: String,
}

impl ProviderError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        ProviderError {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Errors surfaced by `AuthStore` operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Operation(#[from] ProviderError),

    #[error("{0}")]
    Observer(String),
}

/// Failures of the local key-value persistence.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_message_lists_every_field() {
        let err = ConfigurationError::MissingFields(vec!["api_key", "app_id"]);
        assert_eq!(
            err.to_string(),
            "Firebase configuration is missing required fields: api_key, app_id. Please check your configuration."
        );
    }

    #[test]
    fn test_auth_error_displays_provider_message() {
        let err: AuthError = ProviderError::new("auth/invalid-credential", "invalid credentials").into();
        assert_eq!(err.to_string(), "invalid credentials");
    }
}
