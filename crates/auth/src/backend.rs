//! Auth backend over HTTP
//!
//! Real client for the three REST endpoints the session depends on:
//! `POST {base}/token/`, `POST {base}/token/refresh/`, `POST {base}/register/`.

use reqwest::StatusCode;
use serde_json::Value;

use crate::error::{AuthError, RefreshError};
use crate::forms::{LoginForm, RegistrationForm};
use crate::types::{RefreshRequest, RefreshedTokens, TokenPair};

pub const TOKEN_PATH: &str = "/token/";
pub const TOKEN_REFRESH_PATH: &str = "/token/refresh/";
pub const REGISTER_PATH: &str = "/register/";

const LOGIN_FALLBACK: &str = "Login failed";
const REGISTER_FALLBACK: &str = "Registration failed";

/// Auth backend trait for different implementations.
#[async_trait::async_trait]
pub trait AuthBackend: Send + Sync {
    /// Exchange credentials for an access/refresh pair.
    async fn obtain_token_pair(&self, form: &LoginForm) -> Result<TokenPair, AuthError>;

    /// Create an account. Does not sign the user in.
    async fn register(&self, form: &RegistrationForm) -> Result<(), AuthError>;

    /// Exchange a refresh token for a new access token.
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedTokens, RefreshError>;
}

/// Real HTTP client for the auth endpoints.
pub struct HttpAuthBackend {
    http: reqwest::Client,
    base_url: String,
}

impl HttpAuthBackend {
    pub fn new(base_url: &str) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Share a connection pool with the resource client
    pub fn with_client(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Read a failed response body as JSON, if it is JSON at all
async fn error_body(response: reqwest::Response) -> Option<Value> {
    let text = response.text().await.ok()?;
    serde_json::from_str(&text).ok()
}

/// Read a failed response body, keeping non-JSON text as a string
async fn error_payload(response: reqwest::Response) -> Option<Value> {
    let text = response.text().await.ok()?;
    if text.trim().is_empty() {
        return None;
    }
    Some(serde_json::from_str(&text).unwrap_or(Value::String(text)))
}

fn detail_message(body: Option<&Value>, status: StatusCode) -> String {
    body.and_then(|b| b.get("detail"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("Request failed with status code {}", status.as_u16()))
}

#[async_trait::async_trait]
impl AuthBackend for HttpAuthBackend {
    async fn obtain_token_pair(&self, form: &LoginForm) -> Result<TokenPair, AuthError> {
        let response = self
            .http
            .post(self.url(TOKEN_PATH))
            .json(form)
            .send()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = error_body(response).await;
            tracing::debug!(status = %status, username = %form.username, "Token request rejected");
            return Err(AuthError::from_response_body(body.as_ref(), LOGIN_FALLBACK));
        }

        response.json::<TokenPair>().await.map_err(|e| {
            tracing::debug!(error = %e, "Token response unreadable");
            AuthError::Rejected(LOGIN_FALLBACK.to_string())
        })
    }

    async fn register(&self, form: &RegistrationForm) -> Result<(), AuthError> {
        let response = self
            .http
            .post(self.url(REGISTER_PATH))
            .json(form)
            .send()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = error_payload(response).await;
            tracing::debug!(status = %status, username = %form.username, "Registration rejected");
            return Err(AuthError::from_payload(body, REGISTER_FALLBACK));
        }

        Ok(())
    }

    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedTokens, RefreshError> {
        let response = self
            .http
            .post(self.url(TOKEN_REFRESH_PATH))
            .json(&RefreshRequest {
                refresh: refresh_token,
            })
            .send()
            .await
            .map_err(|e| RefreshError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = error_body(response).await;
            return Err(RefreshError::Rejected {
                status: status.as_u16(),
                message: detail_message(body.as_ref(), status),
            });
        }

        response
            .json::<RefreshedTokens>()
            .await
            .map_err(|e| RefreshError::Rejected {
                status: status.as_u16(),
                message: format!("Unreadable refresh response: {}", e),
            })
    }
}
