//! The resolved caller identity.

use querydeck_core::UserId;
use serde::Serialize;
use std::fmt;

use crate::account::Account;

/// Which credential produced a [`Principal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialSource {
    Bearer,
    PlatformSession,
    SessionCookie,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Bearer => "bearer",
            Self::PlatformSession => "platform_session",
            Self::SessionCookie => "session_cookie",
        })
    }
}

/// Identity attached to a request after successful authentication.
///
/// Built per request and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub id: UserId,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    pub source: CredentialSource,
}

impl Principal {
    /// Builds a principal from a stored account.
    #[must_use]
    pub fn from_account(account: &Account, source: CredentialSource) -> Self {
        Self {
            id: account.id,
            email: account.email.clone(),
            name: account.name.clone(),
            avatar_url: account.avatar_url.clone(),
            provider: account.oauth_provider.clone(),
            source,
        }
    }
}
