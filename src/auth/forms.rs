//! Validation of the credential forms submitted by the UI.

use std::collections::BTreeMap;

use serde::Deserialize;

const MIN_PASSWORD_LEN: usize = 6;

const INVALID_EMAIL: &str = "Invalid email address";
const SHORT_PASSWORD: &str = "Password must be at least 6 characters";
const PASSWORD_MISMATCH: &str = "Passwords do not match";

/// Field name → first validation message for that field.
pub type FieldErrors = BTreeMap<String, String>;

#[derive(Deserialize, Debug, Clone)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    /// Where to go after signing in, as carried by the route guard.
    pub from: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct RegisterForm {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl LoginForm {
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        check_credentials(&self.email, &self.password, &mut errors);
        finish(errors)
    }
}

impl RegisterForm {
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        check_credentials(&self.email, &self.password, &mut errors);
        if self.password != self.confirm_password {
            errors.insert("confirm_password".to_string(), PASSWORD_MISMATCH.to_string());
        }
        finish(errors)
    }
}

fn check_credentials(email: &str, password: &str, errors: &mut FieldErrors) {
    if !is_valid_email(email) {
        errors.insert("email".to_string(), INVALID_EMAIL.to_string());
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        errors.insert("password".to_string(), SHORT_PASSWORD.to_string());
    }
}

fn finish(errors: FieldErrors) -> Result<(), FieldErrors> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Structural check: one `@`, a non-empty local part, and a dotted domain
/// whose labels are non-empty and whose last label has at least two chars.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2
        && labels.iter().all(|label| !label.is_empty())
        && labels.last().map_or(false, |tld| tld.chars().count() >= 2)
}
