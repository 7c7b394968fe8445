//! Authenticated REST client
//!
//! Every request reads the access token from the store at send time and
//! carries it as a bearer header. A 401 on a first attempt triggers one
//! token refresh through the [`SessionManager`] and one retry; a failed
//! refresh ends the session and sends the navigator to the login path.

use std::sync::Arc;

use libris_auth::{bearer_header, SessionManager};
use reqwest::header::AUTHORIZATION;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::ApiError;
use crate::navigation::Navigator;
use crate::request::ApiRequest;

pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: Arc<SessionManager>,
    navigator: Arc<dyn Navigator>,
    login_path: String,
}

impl ApiClient {
    pub fn new(
        http: reqwest::Client,
        base_url: &str,
        session: Arc<SessionManager>,
        navigator: Arc<dyn Navigator>,
        login_path: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
            navigator,
            login_path: login_path.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Send a request, refreshing the access token once on 401.
    ///
    /// Returns the response only when its status is 2xx.
    pub async fn send(&self, request: ApiRequest) -> Result<reqwest::Response, ApiError> {
        let token = self.session.access_token();
        let response = self.dispatch(&request, token.as_deref()).await?;

        if response.status() != StatusCode::UNAUTHORIZED || request.is_retry() {
            return Self::check_status(response).await;
        }

        tracing::debug!(
            method = %request.method(),
            path = %request.path(),
            "Received 401, refreshing access token"
        );

        let retry = request.as_retry();
        let fresh = match self.session.refresh_access_token(token.as_deref()).await {
            Ok(fresh) => fresh,
            Err(e) => {
                tracing::info!(error = %e, "Session expired, redirecting to login");
                self.navigator.navigate(&self.login_path);
                return Err(ApiError::SessionExpired(e));
            }
        };

        let response = self.dispatch(&retry, Some(&fresh)).await?;
        Self::check_status(response).await
    }

    /// Send a request and decode the JSON body. An empty body decodes as
    /// JSON `null`.
    pub async fn send_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        let response = self.send(request).await?;
        let text = response.text().await?;
        let text = if text.trim().is_empty() { "null" } else { text.as_str() };
        serde_json::from_str(text).map_err(|e| ApiError::Decode(e.to_string()))
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send_json(ApiRequest::get(path)).await
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = serde_json::to_value(body).map_err(|e| ApiError::Decode(e.to_string()))?;
        self.send_json(ApiRequest::post(path).with_json(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.send(ApiRequest::delete(path)).await?;
        Ok(())
    }

    async fn dispatch(
        &self,
        request: &ApiRequest,
        token: Option<&str>,
    ) -> Result<reqwest::Response, ApiError> {
        let mut builder = self
            .http
            .request(request.method().clone(), self.url(request.path()));

        if !request.query().is_empty() {
            builder = builder.query(request.query());
        }
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, bearer_header(token));
        }
        if let Some(body) = request.body() {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        tracing::debug!(
            method = %request.method(),
            path = %request.path(),
            status = %response.status(),
            retry = request.retry_count(),
            "API response"
        );
        Ok(response)
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Failed to read response body".to_string());
        Err(ApiError::Status {
            status: status.as_u16(),
            body,
        })
    }
}
