//! Credential forms and their client-side validation
//!
//! Validation runs before any request is sent. Failures use the same
//! [`FieldErrors`] shape the server returns, so callers render both alike.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use validator::{Validate, ValidationError};

use crate::error::{AuthError, FieldErrors};

static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("username pattern compiles"));

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles"));

fn field_error(code: &'static str, message: &'static str) -> ValidationError {
    ValidationError::new(code).with_message(Cow::Borrowed(message))
}

fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username.is_empty() {
        return Err(field_error("required", "Username is required"));
    }
    if username.chars().count() < 3 {
        return Err(field_error(
            "too_short",
            "Username must be at least 3 characters long",
        ));
    }
    if !USERNAME_RE.is_match(username) {
        return Err(field_error(
            "invalid_characters",
            "Username can only contain letters, numbers, and underscores",
        ));
    }
    Ok(())
}

fn validate_login_username(username: &str) -> Result<(), ValidationError> {
    if username.trim().is_empty() {
        return Err(field_error("required", "Username is required"));
    }
    Ok(())
}

fn validate_login_password(password: &str) -> Result<(), ValidationError> {
    if password.trim().is_empty() {
        return Err(field_error("required", "Password is required"));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), ValidationError> {
    if email.is_empty() {
        return Err(field_error("required", "Email is required"));
    }
    if !EMAIL_RE.is_match(email) {
        return Err(field_error(
            "invalid_email",
            "Please enter a valid email address",
        ));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(field_error("required", "Password is required"));
    }
    if password.chars().count() < 6 {
        return Err(field_error(
            "too_short",
            "Password must be at least 6 characters long",
        ));
    }
    Ok(())
}

/// Body of `POST /token/`
#[derive(Clone, Serialize, Validate)]
pub struct LoginForm {
    #[validate(custom(function = "validate_login_username"))]
    pub username: String,

    /// Sent as typed; blank input is still rejected
    #[validate(custom(function = "validate_login_password"))]
    pub password: String,
}

impl LoginForm {
    /// Surrounding whitespace in the username is dropped
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into().trim().to_string(),
            password: password.into(),
        }
    }

    /// Check the form, returning field errors on failure
    pub fn check(&self) -> Result<(), AuthError> {
        self.validate()
            .map_err(|e| AuthError::Validation(FieldErrors::from(e)))
    }
}

impl std::fmt::Debug for LoginForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginForm")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Body of `POST /register/`.
///
/// `password2` is the local confirmation field and is never sent. Extra
/// profile fields are passed through untouched.
#[derive(Clone, Serialize, Validate)]
pub struct RegistrationForm {
    #[validate(custom(function = "validate_username"))]
    pub username: String,

    #[validate(custom(function = "validate_email"))]
    pub email: String,

    #[validate(custom(function = "validate_password"))]
    pub password: String,

    #[serde(skip_serializing)]
    #[validate(must_match(other = "password", message = "Passwords do not match"))]
    pub password2: String,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl RegistrationForm {
    /// Form with the confirmation already matching `password`
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        let password = password.into();
        Self {
            username: username.into().trim().to_string(),
            email: email.into().trim().to_string(),
            password2: password.clone(),
            password,
            extra: serde_json::Map::new(),
        }
    }

    pub fn with_confirmation(mut self, password2: impl Into<String>) -> Self {
        self.password2 = password2.into();
        self
    }

    /// Attach an additional field sent alongside the credentials
    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Check the form, returning field errors on failure
    pub fn check(&self) -> Result<(), AuthError> {
        self.validate()
            .map_err(|e| AuthError::Validation(FieldErrors::from(e)))
    }
}

impl std::fmt::Debug for RegistrationForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistrationForm")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("extra", &self.extra)
            .finish()
    }
}
