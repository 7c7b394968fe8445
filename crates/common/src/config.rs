//! Configuration management following 12-factor app principles
//!
//! All configuration is loaded from environment variables (optionally
//! seeded from a `.env` file) so the same binary can point at a local
//! backend, a staging server, or the offline mock provider.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Default REST backend root (the Django API mount point)
pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8000/api";

/// Default route the client is sent to when a session ends
pub const DEFAULT_LOGIN_PATH: &str = "/login";

/// Which auth backend implementation to construct
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthProvider {
    /// Real REST backend over HTTP
    Http,
    /// In-process backend issuing locally minted tokens
    Mock,
}

impl FromStr for AuthProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(AuthProvider::Http),
            "mock" => Ok(AuthProvider::Mock),
            other => Err(Error::Configuration(format!(
                "Unknown auth provider: {}. Supported providers: http, mock",
                other
            ))),
        }
    }
}

impl std::fmt::Display for AuthProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthProvider::Http => write!(f, "http"),
            AuthProvider::Mock => write!(f, "mock"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// REST backend root, without trailing slash
    pub api_base_url: String,

    /// Auth backend implementation
    pub auth_provider: AuthProvider,

    /// File holding the persisted access/refresh tokens
    pub token_file: PathBuf,

    /// Route used when the session is lost
    pub login_path: String,

    /// Tracing filter directive
    pub rust_log: String,
}

impl ClientConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if it exists

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_base_url = normalize_api_base_url(
            &lookup("LIBRIS_API_BASE_URL").unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
        )?;

        let auth_provider = match lookup("LIBRIS_AUTH_PROVIDER") {
            Some(value) => value.parse()?,
            None => AuthProvider::Http,
        };

        let token_file = lookup("LIBRIS_TOKEN_FILE")
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_token_file);

        let login_path = lookup("LIBRIS_LOGIN_PATH")
            .filter(|value| value.starts_with('/'))
            .unwrap_or_else(|| DEFAULT_LOGIN_PATH.to_string());

        let rust_log = lookup("RUST_LOG").unwrap_or_else(|| "libris=info".to_string());

        let config = Self {
            api_base_url,
            auth_provider,
            token_file,
            login_path,
            rust_log,
        };

        tracing::debug!(
            api_base_url = %config.api_base_url,
            auth_provider = %config.auth_provider,
            token_file = %config.token_file.display(),
            "Client configuration loaded"
        );

        Ok(config)
    }

    /// Replace the backend root, applying the same checks as `from_env`
    pub fn with_api_base_url(mut self, url: &str) -> Result<Self> {
        self.api_base_url = normalize_api_base_url(url)?;
        Ok(self)
    }
}

/// Trim whitespace and trailing slashes, then require an http(s) URL
fn normalize_api_base_url(raw: &str) -> Result<String> {
    let url = raw.trim().trim_end_matches('/');

    if url.is_empty() {
        return Err(Error::Configuration(
            "LIBRIS_API_BASE_URL must not be empty".to_string(),
        ));
    }
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(Error::Configuration(format!(
            "LIBRIS_API_BASE_URL must be an http(s) URL, got {}",
            url
        )));
    }
    Ok(url.to_string())
}

/// `<data_dir>/libris/tokens.json`, or the working directory when the
/// platform has no data directory
fn default_token_file() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("libris")
        .join("tokens.json")
}
