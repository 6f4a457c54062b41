//! Stored accounts.
//!
//! An account is created either by the OAuth sign-in path or by an external
//! registration path. A missing `password_hash` means the account can only
//! sign in through its linked OAuth provider.
//!
//! Emails are stored in canonical form (trimmed, lower-cased) and one
//! mailbox maps to at most one account regardless of how it was typed.

use chrono::{DateTime, Utc};
use querydeck_core::UserId;
use serde::{Deserialize, Serialize};

/// Canonical form of an email address.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// A platform account as persisted in the `users` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: UserId,
    pub email: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    /// Argon2 PHC digest; `None` disables credentials sign-in.
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub oauth_provider: Option<String>,
    pub oauth_id: Option<String>,
    pub active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Creates an active account with a fresh id and no credentials.
    #[must_use]
    pub fn new(email: impl AsRef<str>) -> Self {
        Self {
            id: UserId::new(),
            email: normalize_email(email.as_ref()),
            name: None,
            avatar_url: None,
            password_hash: None,
            oauth_provider: None,
            oauth_id: None,
            active: true,
            last_login: None,
            created_at: Utc::now(),
        }
    }

    /// Returns true if credentials sign-in is possible for this account.
    #[must_use]
    pub fn has_password(&self) -> bool {
        self.password_hash.is_some()
    }

    /// Returns true if an OAuth provider is linked.
    #[must_use]
    pub fn is_linked(&self) -> bool {
        self.oauth_provider.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_account_is_active_and_unlinked() {
        let account = Account::new("alice@example.com");

        assert!(account.active);
        assert!(!account.has_password());
        assert!(!account.is_linked());
        assert!(account.last_login.is_none());
        assert!(account.id.to_string().starts_with("usr_"));
    }

    #[test]
    fn email_is_stored_canonically() {
        let account = Account::new("  Alice@Example.COM ");

        assert_eq!(account.email, "alice@example.com");
    }

    #[test]
    fn password_hash_is_never_serialized() {
        let mut account = Account::new("alice@example.com");
        account.password_hash = Some("$argon2id$secret".to_string());

        let json = serde_json::to_value(&account).expect("serialize");
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["email"], "alice@example.com");
    }
}
