//! Access token decoding
//!
//! Only the payload segment is read. The header and signature belong to the
//! server, and expiry is judged by the session.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;

use crate::claims::{Claims, Role};
use crate::error::DecodeError;

/// Payload as issued by the backend.
///
/// SimpleJWT issues `user_id`; other issuers use `sub` or `username`.
#[derive(Debug, Deserialize)]
struct TokenPayload {
    sub: Option<String>,
    username: Option<String>,
    user_id: Option<serde_json::Value>,
    #[serde(default)]
    role: Option<Role>,
    exp: f64,
}

impl TokenPayload {
    fn subject(&self) -> Option<String> {
        if let Some(sub) = self.sub.as_deref().filter(|s| !s.is_empty()) {
            return Some(sub.to_string());
        }
        if let Some(username) = self.username.as_deref().filter(|s| !s.is_empty()) {
            return Some(username.to_string());
        }
        match &self.user_id {
            Some(serde_json::Value::String(id)) if !id.is_empty() => Some(id.clone()),
            Some(serde_json::Value::Number(id)) => Some(id.to_string()),
            _ => None,
        }
    }
}

fn malformed(reason: impl std::fmt::Display) -> DecodeError {
    tracing::debug!(error = %reason, "Access token decode failed");
    DecodeError::Malformed(reason.to_string())
}

/// Decode an access token into claims without verifying its signature
pub fn decode_access_token(token: &str) -> Result<Claims, DecodeError> {
    let segments: Vec<&str> = token.split('.').collect();
    let [_, payload, _] = segments.as_slice() else {
        return Err(malformed("expected three dot-separated segments"));
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(malformed)?;
    let payload: TokenPayload = serde_json::from_slice(&bytes).map_err(malformed)?;

    if !payload.exp.is_finite() {
        return Err(malformed("exp is not a finite number"));
    }
    let subject = payload.subject().ok_or(DecodeError::MissingSubject)?;

    Ok(Claims {
        subject,
        role: payload.role.unwrap_or_default(),
        expires_at: payload.exp.floor() as i64,
    })
}

/// Format an `Authorization` header value
pub fn bearer_header(token: &str) -> String {
    format!("Bearer {}", token)
}

/// Extract the token from an `Authorization` header value
pub fn extract_bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
