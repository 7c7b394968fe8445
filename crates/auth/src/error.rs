//! Authentication errors

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Access token could not be parsed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("Malformed token: {0}")]
    Malformed(String),

    #[error("Token payload has no subject")]
    MissingSubject,
}

/// Field-level validation messages, keyed by field name.
///
/// Same shape whether produced by local form validation or returned by the
/// server (`{"username": ["A user with that username already exists."]}`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message against a field
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    /// Messages for one field (empty when the field is valid)
    pub fn get(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Interpret a server error body as field errors.
    ///
    /// Strings become single messages, arrays keep every element, anything
    /// else is kept as its JSON text. `detail` is a message, not a field.
    /// Returns `None` when no field entries remain.
    pub fn from_server_payload(payload: &Value) -> Option<Self> {
        let object = payload.as_object()?;
        if object.is_empty() {
            return None;
        }

        let mut errors = Self::new();
        for (field, value) in object.iter().filter(|(field, _)| field.as_str() != "detail") {
            match value {
                Value::String(message) => errors.add(field, message),
                Value::Array(items) => {
                    for item in items {
                        match item {
                            Value::String(message) => errors.add(field, message),
                            other => errors.add(field, other.to_string()),
                        }
                    }
                }
                other => errors.add(field, other.to_string()),
            }
        }
        (!errors.is_empty()).then_some(errors)
    }
}

impl From<validator::ValidationErrors> for FieldErrors {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields = Self::new();
        for (field, field_errors) in errors.field_errors() {
            for error in field_errors.iter() {
                let message = error
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| error.code.to_string());
                fields.add(field.to_string(), message);
            }
        }
        fields
    }
}

impl std::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            if !first {
                write!(f, "; ")?;
            }
            first = false;
            write!(f, "{}: {}", field, messages.join(", "))?;
        }
        Ok(())
    }
}

/// Login or registration failed. Returned to the caller as a value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AuthError {
    #[error("Validation failed: {0}")]
    Validation(FieldErrors),

    #[error("{0}")]
    Rejected(String),

    /// The server refused the request. `body` is the payload exactly as
    /// sent; `fields` is its field-map view, possibly empty.
    #[error("{message}")]
    Server {
        message: String,
        fields: FieldErrors,
        body: Value,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Server issued an unreadable access token: {0}")]
    InvalidToken(#[from] DecodeError),
}

impl AuthError {
    /// Classify a non-2xx response body.
    ///
    /// `{"detail": "..."}` is a server message, any other non-empty object is
    /// field validation, everything else falls back to `fallback`.
    pub fn from_response_body(body: Option<&Value>, fallback: &str) -> Self {
        let Some(body) = body else {
            return AuthError::Rejected(fallback.to_string());
        };

        if let Some(detail) = body.get("detail").and_then(Value::as_str) {
            return AuthError::Rejected(detail.to_string());
        }

        match FieldErrors::from_server_payload(body) {
            Some(fields) => AuthError::Validation(fields),
            None => AuthError::Rejected(fallback.to_string()),
        }
    }

    /// Keep a non-2xx body as the caller's error payload.
    ///
    /// Any non-empty body, JSON or plain text, is carried unchanged. Only an
    /// absent or empty body falls back to `fallback`.
    pub fn from_payload(body: Option<Value>, fallback: &str) -> Self {
        let body = match body {
            None | Some(Value::Null) => return AuthError::Rejected(fallback.to_string()),
            Some(Value::String(text)) if text.trim().is_empty() => {
                return AuthError::Rejected(fallback.to_string())
            }
            Some(body) => body,
        };

        let fields = FieldErrors::from_server_payload(&body).unwrap_or_default();
        let message = payload_message(&body)
            .or_else(|| (!fields.is_empty()).then(|| fields.to_string()))
            .unwrap_or_else(|| fallback.to_string());

        AuthError::Server {
            message,
            fields,
            body,
        }
    }

    /// Field-level messages, local or from the server
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            AuthError::Validation(fields) => Some(fields),
            AuthError::Server { fields, .. } if !fields.is_empty() => Some(fields),
            _ => None,
        }
    }

    /// Raw server payload, when the server sent one
    pub fn payload(&self) -> Option<&Value> {
        match self {
            AuthError::Server { body, .. } => Some(body),
            _ => None,
        }
    }
}

/// Human-readable message carried directly in a payload
fn payload_message(body: &Value) -> Option<String> {
    match body {
        Value::String(text) => Some(text.trim().to_string()),
        Value::Array(items) => {
            let messages: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
            (!messages.is_empty()).then(|| messages.join(" "))
        }
        Value::Object(object) => object
            .get("detail")
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}

/// Refresh token exchange failed. Always ends the session.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RefreshError {
    #[error("No refresh token stored")]
    MissingRefreshToken,

    #[error("Refresh rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Network error during refresh: {0}")]
    Network(String),

    #[error("Refreshed access token is unreadable: {0}")]
    InvalidToken(#[from] DecodeError),
}
