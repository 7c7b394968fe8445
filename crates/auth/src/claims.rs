//! Access token claims

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Role carried in the access token.
///
/// Variants are declared in ascending privilege so `Ord` gives
/// `User < Librarian < Admin`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Librarian,
    Admin,
}

impl Role {
    /// Check if this role meets a minimum requirement
    pub fn satisfies(&self, required: Role) -> bool {
        *self >= required
    }

    /// Check if this role can manage the catalogue (librarian or admin)
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Librarian | Role::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Librarian => write!(f, "librarian"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

/// Identity decoded from an access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (username or user id)
    pub subject: String,
    /// Role for authorization decisions
    pub role: Role,
    /// Expires at (epoch seconds)
    pub expires_at: i64,
}

impl Claims {
    /// A token is live while `expires_at * 1000 > now` in milliseconds.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.saturating_mul(1000) <= now.timestamp_millis()
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Expiry as a timestamp, `None` when out of chrono's range
    pub fn expires_at_utc(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.expires_at, 0).single()
    }
}
