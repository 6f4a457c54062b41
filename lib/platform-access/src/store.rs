//! Storage and provider seams consumed by identity resolution and linking.
//!
//! The server implements these against Postgres; tests use in-memory maps.

use async_trait::async_trait;
use querydeck_core::UserId;

use crate::account::Account;
use crate::error::{ProviderError, StoreError};
use crate::request::AuthRequest;
use crate::session::{Session, SessionToken};

/// Account storage.
///
/// Implementations must enforce uniqueness of `email` and of
/// `(oauth_provider, oauth_id)`, reporting violations as
/// [`StoreError::Conflict`].
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_by_id(&self, id: UserId) -> Result<Option<Account>, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError>;

    async fn find_by_oauth(
        &self,
        provider: &str,
        oauth_id: &str,
    ) -> Result<Option<Account>, StoreError>;

    /// Inserts a new account.
    async fn create(&self, account: &Account) -> Result<(), StoreError>;

    /// Links an OAuth identity to an existing account.
    ///
    /// Must only succeed if the account has no provider or already has
    /// `provider`; otherwise returns [`StoreError::Conflict`] and leaves the
    /// row untouched. A present `avatar_url` replaces the stored avatar.
    async fn link_oauth(
        &self,
        id: UserId,
        provider: &str,
        oauth_id: &str,
        avatar_url: Option<&str>,
    ) -> Result<(), StoreError>;

    /// Stamps `last_login` with the current time.
    async fn touch_last_login(&self, id: UserId) -> Result<(), StoreError>;

    /// Lists all accounts, newest first.
    async fn list(&self) -> Result<Vec<Account>, StoreError>;
}

/// Cookie-session storage.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn find(&self, token: &SessionToken) -> Result<Option<Session>, StoreError>;

    async fn create(&self, session: &Session) -> Result<(), StoreError>;

    async fn delete(&self, token: &SessionToken) -> Result<(), StoreError>;

    /// Removes expired rows, returning how many were deleted.
    async fn delete_expired(&self) -> Result<u64, StoreError>;
}

/// Session object returned by the platform-session provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlatformSession {
    pub id: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
    pub picture: Option<String>,
    pub provider: Option<String>,
}

/// Externally managed session verification.
#[async_trait]
pub trait PlatformSessionProvider: Send + Sync {
    /// Returns the session attached to `request`, if any.
    async fn session(&self, request: &AuthRequest)
    -> Result<Option<PlatformSession>, ProviderError>;
}
