use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::auth::forms::FieldErrors;
use crate::errors::AuthError;

/// A general purpose HTTP error type that can be converted into an `IntoResponse`.
#[derive(Debug)]
pub struct HTTPError {
    status: StatusCode,
    message: String,
    /// Per-field validation messages; rendered instead of `message` when set.
    fields: Option<FieldErrors>,
}

impl HTTPError {
    /// Creates a new HTTP error with the given status code and message.
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        HTTPError {
            status,
            message: message.into(),
            fields: None,
        }
    }

    /// A 422 carrying the form's field errors.
    pub fn validation(fields: FieldErrors) -> Self {
        HTTPError {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: "Invalid form".to_string(),
            fields: Some(fields),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

/// Failed auth operations surface the message the store recorded.
impl From<AuthError> for HTTPError {
    fn from(err: AuthError) -> Self {
        let status = match &err {
            AuthError::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
            AuthError::Operation(_) | AuthError::Observer(_) => StatusCode::UNAUTHORIZED,
        };
        HTTPError::new(status, err.to_string())
    }
}

/// Converts our `HTTPError` into an HTTP response.
impl IntoResponse for HTTPError {
    fn into_response(self) -> Response {
        let body = match self.fields {
            Some(fields) => json!({ "errors": fields }),
            None => json!({ "error": self.message }),
        };
        (self.status, Json(body)).into_response()
    }
}
