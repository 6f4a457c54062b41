//! Cookie-backed sessions.
//!
//! A session row maps an opaque token (the `session` cookie value) to the
//! account that signed in with credentials. Rows are created at sign-in,
//! deleted at sign-out, and swept once expired.

use chrono::{DateTime, Duration, Utc};
use querydeck_core::UserId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque session token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    /// Generates a new unguessable token.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("sess_{}", ulid::Ulid::new()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SessionToken {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SessionToken {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A row of the `sessions` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: SessionToken,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Starts a session for `user_id` lasting `duration`.
    #[must_use]
    pub fn start(user_id: UserId, duration: Duration) -> Self {
        let now = Utc::now();
        Self {
            token: SessionToken::generate(),
            user_id,
            created_at: now,
            expires_at: now + duration,
        }
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_tokens_are_unique() {
        let a = SessionToken::generate();
        let b = SessionToken::generate();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("sess_"));
    }

    #[test]
    fn token_from_str() {
        let token: SessionToken = "abc".into();
        assert_eq!(token.to_string(), "abc");
    }

    #[test]
    fn fresh_session_is_not_expired() {
        let session = Session::start(UserId::new(), Duration::hours(1));
        assert!(!session.is_expired());
        assert!(session.expires_at > session.created_at);
    }

    #[test]
    fn negative_duration_is_expired() {
        let session = Session::start(UserId::new(), Duration::seconds(-1));
        assert!(session.is_expired());
    }
}
