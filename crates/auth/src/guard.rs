//! Route guard for protected views
//!
//! Pure decision over a [`SessionState`] snapshot. Optionally restricted to
//! a minimum [`Role`], like the tier check on staff-only views.

use tokio::sync::watch;

use crate::claims::Role;
use crate::session::SessionState;

/// What to render for a protected view
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Session still initializing; show a placeholder
    Loading,
    /// Render the protected content
    Allow,
    /// Replace the current location with the login path
    Redirect(String),
    /// Signed in but the role is too low
    Forbidden,
}

#[derive(Debug, Clone)]
pub struct RouteGuard {
    login_path: String,
    required_role: Option<Role>,
}

impl RouteGuard {
    pub fn new(login_path: impl Into<String>) -> Self {
        Self {
            login_path: login_path.into(),
            required_role: None,
        }
    }

    /// Only admit users whose role is at least `role`
    pub fn requiring(mut self, role: Role) -> Self {
        self.required_role = Some(role);
        self
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    pub fn evaluate(&self, state: &SessionState) -> GuardDecision {
        if state.loading {
            return GuardDecision::Loading;
        }

        let Some(user) = &state.user else {
            return GuardDecision::Redirect(self.login_path.clone());
        };

        match self.required_role {
            Some(required) if !user.role.satisfies(required) => {
                tracing::debug!(
                    subject = %user.subject,
                    role = %user.role,
                    required = %required,
                    "Route guard: insufficient role"
                );
                GuardDecision::Forbidden
            }
            _ => GuardDecision::Allow,
        }
    }

    /// Wait until initialization settles, then decide.
    ///
    /// Falls back to a redirect when the session manager is gone.
    pub async fn resolve(&self, rx: &mut watch::Receiver<SessionState>) -> GuardDecision {
        match rx.wait_for(|state| !state.loading).await {
            Ok(state) => self.evaluate(&state),
            Err(_) => GuardDecision::Redirect(self.login_path.clone()),
        }
    }
}
