//! Client authentication session for Libris
//!
//! Token storage, access-token decoding, the session lifecycle, and the
//! route guard that gates protected views. The auth endpoints sit behind the
//! [`AuthBackend`] trait so tests and offline runs can swap in
//! [`MockAuthBackend`].

mod backend;
mod claims;
mod error;
mod forms;
mod guard;
mod jwt;
mod mock;
mod session;
mod store;
mod types;

use std::sync::Arc;

use libris_common::{AuthProvider, ClientConfig};

pub use backend::{AuthBackend, HttpAuthBackend, REGISTER_PATH, TOKEN_PATH, TOKEN_REFRESH_PATH};
pub use claims::{Claims, Role};
pub use error::{AuthError, DecodeError, FieldErrors, RefreshError};
pub use forms::{LoginForm, RegistrationForm};
pub use guard::{GuardDecision, RouteGuard};
pub use jwt::{bearer_header, decode_access_token, extract_bearer_token};
pub use mock::{MockAuthBackend, MockAuthCall};
pub use session::{SessionManager, SessionPhase, SessionState};
pub use store::{
    FileTokenStore, MemoryTokenStore, TokenStore, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY,
};
pub use types::{RefreshedTokens, TokenPair};

/// Auth backend factory
pub struct AuthBackendFactory;

impl AuthBackendFactory {
    /// Create the auth backend selected by configuration
    pub fn create(config: &ClientConfig) -> Arc<dyn AuthBackend> {
        Self::create_with_client(config, reqwest::Client::new())
    }

    /// Same as [`create`](Self::create), reusing an existing connection pool
    pub fn create_with_client(config: &ClientConfig, http: reqwest::Client) -> Arc<dyn AuthBackend> {
        match config.auth_provider {
            AuthProvider::Http => {
                tracing::info!(base_url = %config.api_base_url, "Creating HTTP auth backend");
                Arc::new(HttpAuthBackend::with_client(http, &config.api_base_url))
            }
            AuthProvider::Mock => {
                tracing::info!("Creating mock auth backend with demo users");
                Arc::new(MockAuthBackend::with_demo_users())
            }
        }
    }
}
