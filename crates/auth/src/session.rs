//! Client session lifecycle
//!
//! [`SessionManager`] owns the authentication state of one application
//! instance. It is constructed once, shared by `Arc`, and is the only writer
//! of [`SessionState`]. Views and guards read snapshots or subscribe to
//! changes through a `watch` channel.
//!
//! ```text
//! Initializing ──initialize()──> Authenticated
//!      │                              │
//!      └──────────────────────> Unauthenticated <── logout() / refresh failure
//! ```
//!
//! Within one operation tokens are persisted before the state is published,
//! so an observer that sees `is_authenticated() == true` can always read a
//! token from the store.

use std::sync::Arc;

use tokio::sync::{watch, Mutex};

use crate::backend::AuthBackend;
use crate::claims::Claims;
use crate::error::{AuthError, RefreshError};
use crate::forms::{LoginForm, RegistrationForm};
use crate::jwt::decode_access_token;
use crate::store::{TokenStore, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};

/// Lifecycle phase, derived from [`SessionState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Initializing,
    Authenticated,
    Unauthenticated,
}

/// Snapshot of the session as seen by views
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub user: Option<Claims>,
    pub loading: bool,
}

impl SessionState {
    fn initializing() -> Self {
        Self {
            user: None,
            loading: true,
        }
    }

    /// Reflects the last computed state, not a live expiry check
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn phase(&self) -> SessionPhase {
        if self.loading {
            SessionPhase::Initializing
        } else if self.user.is_some() {
            SessionPhase::Authenticated
        } else {
            SessionPhase::Unauthenticated
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::initializing()
    }
}

/// Authentication session for one application instance
pub struct SessionManager {
    store: Arc<dyn TokenStore>,
    backend: Arc<dyn AuthBackend>,
    state: watch::Sender<SessionState>,
    refresh_lock: Mutex<()>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn TokenStore>, backend: Arc<dyn AuthBackend>) -> Self {
        let (state, _) = watch::channel(SessionState::initializing());
        Self {
            store,
            backend,
            state,
            refresh_lock: Mutex::new(()),
        }
    }

    /// Current state snapshot
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Receive every subsequent state change
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    pub fn user(&self) -> Option<Claims> {
        self.state.borrow().user.clone()
    }

    /// Access token as currently stored
    pub fn access_token(&self) -> Option<String> {
        self.store.get(ACCESS_TOKEN_KEY)
    }

    pub fn token_store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    /// Restore the session from stored tokens.
    ///
    /// Runs once: later calls return the current state untouched. Ends with
    /// `loading == false` on every branch.
    pub fn initialize(&self) -> SessionState {
        if !self.state.borrow().loading {
            tracing::debug!("Session already initialized");
            return self.state();
        }

        let user = self.load_stored_claims();
        match &user {
            Some(claims) => tracing::info!(
                subject = %claims.subject,
                role = %claims.role,
                "Session restored from stored token"
            ),
            None => tracing::debug!("No usable stored session"),
        }

        self.state.send_modify(|state| {
            state.user = user;
            state.loading = false;
        });
        self.state()
    }

    /// Re-check the stored access token now.
    ///
    /// Ends the session when the token is gone, unreadable, or expired.
    /// Returns whether the session is still authenticated. Before
    /// [`initialize`](Self::initialize) has run this is a no-op returning
    /// `false`.
    pub fn revalidate(&self) -> bool {
        if self.state.borrow().loading {
            tracing::debug!("Revalidate skipped, session not initialized");
            return false;
        }

        let user = self.load_stored_claims();
        let authenticated = user.is_some();
        self.state.send_if_modified(|state| {
            if state.user == user {
                return false;
            }
            state.user = user;
            true
        });
        authenticated
    }

    /// Sign in with username and password.
    ///
    /// On failure nothing is stored and the state is unchanged; the error is
    /// returned for the caller to display.
    pub async fn login(&self, username: &str, password: &str) -> Result<(), AuthError> {
        let form = LoginForm::new(username, password);
        form.check()?;

        tracing::debug!(username = %form.username, "Attempting login");

        let pair = self
            .backend
            .obtain_token_pair(&form)
            .await
            .inspect_err(|e| {
                tracing::warn!(username = %form.username, error = %e, "Login failed");
            })?;

        let claims = decode_access_token(&pair.access).inspect_err(|e| {
            tracing::warn!(username = %form.username, error = %e, "Login returned unreadable token");
        })?;

        self.store.set(ACCESS_TOKEN_KEY, &pair.access);
        self.store.set(REFRESH_TOKEN_KEY, &pair.refresh);

        tracing::info!(
            subject = %claims.subject,
            role = %claims.role,
            "Login successful"
        );

        self.state.send_modify(|state| {
            state.user = Some(claims);
            state.loading = false;
        });
        Ok(())
    }

    /// Create an account. The session is not changed; the user still has to
    /// log in.
    pub async fn register(&self, form: &RegistrationForm) -> Result<(), AuthError> {
        form.check()?;

        self.backend.register(form).await.inspect_err(|e| {
            tracing::warn!(username = %form.username, error = %e, "Registration failed");
        })?;

        tracing::info!(username = %form.username, "Registration successful");
        Ok(())
    }

    /// Drop both tokens and end the session. Safe to call repeatedly.
    pub fn logout(&self) {
        self.clear_tokens();
        let was_authenticated = self.state.send_if_modified(|state| {
            if state.user.is_none() {
                return false;
            }
            state.user = None;
            true
        });
        if was_authenticated {
            tracing::info!("Logged out");
        }
    }

    /// Exchange the stored refresh token for a new access token.
    ///
    /// `stale` is the access token the failing request carried. Refreshes
    /// are serialised; a caller that finds the stored token already differs
    /// from `stale` reuses it instead of refreshing again.
    ///
    /// Any failure ends the session before the error is returned.
    pub async fn refresh_access_token(&self, stale: Option<&str>) -> Result<String, RefreshError> {
        let _guard = self.refresh_lock.lock().await;

        if let Some(current) = self.store.get(ACCESS_TOKEN_KEY) {
            if stale != Some(current.as_str()) {
                tracing::debug!("Access token already refreshed by a concurrent request");
                return Ok(current);
            }
        }

        match self.exchange_refresh_token().await {
            Ok((access, claims)) => {
                tracing::debug!(subject = %claims.subject, "Access token refreshed");
                self.state.send_modify(|state| {
                    state.user = Some(claims);
                    state.loading = false;
                });
                Ok(access)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Token refresh failed, ending session");
                self.logout();
                Err(e)
            }
        }
    }

    async fn exchange_refresh_token(&self) -> Result<(String, Claims), RefreshError> {
        let refresh = self
            .store
            .get(REFRESH_TOKEN_KEY)
            .ok_or(RefreshError::MissingRefreshToken)?;

        let tokens = self.backend.refresh(&refresh).await?;
        let claims = decode_access_token(&tokens.access)?;

        self.store.set(ACCESS_TOKEN_KEY, &tokens.access);
        if let Some(rotated) = &tokens.refresh {
            self.store.set(REFRESH_TOKEN_KEY, rotated);
        }

        Ok((tokens.access, claims))
    }

    /// Decode the stored access token, clearing storage when it is unusable
    fn load_stored_claims(&self) -> Option<Claims> {
        let token = self.store.get(ACCESS_TOKEN_KEY)?;

        match decode_access_token(&token) {
            Ok(claims) if !claims.is_expired() => Some(claims),
            Ok(claims) => {
                tracing::info!(subject = %claims.subject, "Stored access token expired");
                self.clear_tokens();
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "Stored access token unreadable");
                self.clear_tokens();
                None
            }
        }
    }

    fn clear_tokens(&self) {
        self.store.remove(ACCESS_TOKEN_KEY);
        self.store.remove(REFRESH_TOKEN_KEY);
    }
}
