//! Mock Auth Backend Implementation
//!
//! Programmable in-process backend for tests and offline use:
//! - Registered users with passwords and roles
//! - Access tokens minted as real JWTs so the session can decode them
//! - Opaque refresh tokens that can be revoked or rejected wholesale
//! - Call recording for assertions

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::json;

use crate::backend::AuthBackend;
use crate::claims::Role;
use crate::error::{AuthError, RefreshError};
use crate::forms::{LoginForm, RegistrationForm};
use crate::types::{RefreshedTokens, TokenPair};

const MOCK_SIGNING_SECRET: &[u8] = b"libris-mock-signing-secret";

/// A call received by the mock backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockAuthCall {
    ObtainTokenPair { username: String },
    Register { username: String },
    Refresh { refresh_token: String },
}

#[derive(Debug, Clone)]
struct MockUser {
    password: String,
    role: Role,
}

#[derive(Debug)]
struct MockState {
    users: HashMap<String, MockUser>,
    refresh_tokens: HashMap<String, String>,
    access_ttl: Duration,
    reject_refresh: bool,
    rotate_refresh: bool,
    calls: Vec<MockAuthCall>,
}

/// Mock auth backend with programmable behavior
#[derive(Debug, Clone)]
pub struct MockAuthBackend {
    state: Arc<Mutex<MockState>>,
}

impl Default for MockAuthBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAuthBackend {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                users: HashMap::new(),
                refresh_tokens: HashMap::new(),
                access_ttl: Duration::minutes(5),
                reject_refresh: false,
                rotate_refresh: false,
                calls: Vec::new(),
            })),
        }
    }

    /// Backend pre-seeded with demo accounts for each role
    pub fn with_demo_users() -> Self {
        let backend = Self::new();
        backend.add_user("reader", "reader123", Role::User);
        backend.add_user("librarian", "librarian123", Role::Librarian);
        backend.add_user("admin", "admin123", Role::Admin);
        backend
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a user directly, bypassing validation
    pub fn add_user(&self, username: &str, password: &str, role: Role) {
        self.lock().users.insert(
            username.to_string(),
            MockUser {
                password: password.to_string(),
                role,
            },
        );
    }

    /// Lifetime of minted access tokens (negative values mint expired tokens)
    pub fn set_access_ttl(&self, ttl: Duration) {
        self.lock().access_ttl = ttl;
    }

    /// Make every refresh call fail as if the refresh token had expired
    pub fn set_reject_refresh(&self, reject: bool) {
        self.lock().reject_refresh = reject;
    }

    /// Issue a new refresh token on every refresh
    pub fn set_rotate_refresh(&self, rotate: bool) {
        self.lock().rotate_refresh = rotate;
    }

    /// Invalidate every outstanding refresh token
    pub fn revoke_refresh_tokens(&self) {
        self.lock().refresh_tokens.clear();
    }

    /// Mint an access token for any subject and role
    pub fn mint_access_token(&self, subject: &str, role: Role) -> String {
        let ttl = self.lock().access_ttl;
        mint_access_token(subject, role, ttl)
    }

    /// Return all recorded calls
    pub fn recorded_calls(&self) -> Vec<MockAuthCall> {
        self.lock().calls.clone()
    }

    /// Number of refresh calls received
    pub fn refresh_count(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| matches!(c, MockAuthCall::Refresh { .. }))
            .count()
    }

    /// Clear recorded calls
    pub fn reset_calls(&self) {
        self.lock().calls.clear();
    }

    fn issue_refresh_token(state: &mut MockState, username: &str) -> String {
        let token = format!("refresh-{}", uuid::Uuid::new_v4());
        state
            .refresh_tokens
            .insert(token.clone(), username.to_string());
        token
    }
}

fn mint_access_token(subject: &str, role: Role, ttl: Duration) -> String {
    let now = Utc::now();
    let claims = json!({
        "token_type": "access",
        "sub": subject,
        "role": role,
        "iat": now.timestamp(),
        "exp": (now + ttl).timestamp(),
        "jti": uuid::Uuid::new_v4().to_string(),
    });

    // HS256 with a byte secret only fails on serialization, which json! values rule out
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(MOCK_SIGNING_SECRET),
    )
    .unwrap_or_default()
}

#[async_trait::async_trait]
impl AuthBackend for MockAuthBackend {
    async fn obtain_token_pair(&self, form: &LoginForm) -> Result<TokenPair, AuthError> {
        let mut state = self.lock();
        state.calls.push(MockAuthCall::ObtainTokenPair {
            username: form.username.clone(),
        });

        let role = match state.users.get(&form.username) {
            Some(user) if user.password == form.password => user.role,
            _ => {
                tracing::debug!(username = %form.username, "Mock auth: rejecting credentials");
                return Err(AuthError::Rejected(
                    "No active account found with the given credentials".to_string(),
                ));
            }
        };

        let access = mint_access_token(&form.username, role, state.access_ttl);
        let refresh = Self::issue_refresh_token(&mut state, &form.username);
        tracing::debug!(username = %form.username, "Mock auth: issued token pair");

        Ok(TokenPair { access, refresh })
    }

    async fn register(&self, form: &RegistrationForm) -> Result<(), AuthError> {
        let mut state = self.lock();
        state.calls.push(MockAuthCall::Register {
            username: form.username.clone(),
        });

        if state.users.contains_key(&form.username) {
            return Err(AuthError::from_payload(
                Some(json!({"username": ["A user with that username already exists."]})),
                "Registration failed",
            ));
        }

        state.users.insert(
            form.username.clone(),
            MockUser {
                password: form.password.clone(),
                role: Role::User,
            },
        );
        Ok(())
    }

    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedTokens, RefreshError> {
        let mut state = self.lock();
        state.calls.push(MockAuthCall::Refresh {
            refresh_token: refresh_token.to_string(),
        });

        let rejected = || RefreshError::Rejected {
            status: 401,
            message: "Token is invalid or expired".to_string(),
        };

        if state.reject_refresh {
            return Err(rejected());
        }

        let username = state
            .refresh_tokens
            .get(refresh_token)
            .cloned()
            .ok_or_else(rejected)?;
        let role = state
            .users
            .get(&username)
            .map(|u| u.role)
            .unwrap_or_default();

        let access = mint_access_token(&username, role, state.access_ttl);
        let refresh = if state.rotate_refresh {
            state.refresh_tokens.remove(refresh_token);
            Some(Self::issue_refresh_token(&mut state, &username))
        } else {
            None
        };

        Ok(RefreshedTokens { access, refresh })
    }
}
