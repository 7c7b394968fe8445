use libris_auth::RefreshError;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Request failed with status code {status}")]
    Status { status: u16, body: String },

    #[error("Session expired: {0}")]
    SessionExpired(RefreshError),

    #[error("Failed to parse response: {0}")]
    Decode(String),
}

impl ApiError {
    /// HTTP status of the failed response, if one was received
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Request(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Server-provided `detail` message from a JSON error body
    pub fn detail(&self) -> Option<String> {
        let ApiError::Status { body, .. } = self else {
            return None;
        };
        serde_json::from_str::<Value>(body)
            .ok()?
            .get("detail")?
            .as_str()
            .map(str::to_string)
    }

    pub fn is_session_expired(&self) -> bool {
        matches!(self, ApiError::SessionExpired(_))
    }
}
