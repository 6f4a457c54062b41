//! Reconciling OAuth sign-ins with stored accounts.
//!
//! The linker consumes the *result* of an OAuth exchange (provider, the
//! provider's account id, email, profile) and decides whether the sign-in
//! is accepted and which account it belongs to:
//!
//! 1. an account already linked to `(provider, provider_account_id)` is
//!    adopted and its `last_login` stamped;
//! 2. otherwise the email decides: no account creates one, an unlinked
//!    account is linked, an account linked to a different provider is a
//!    conflict and the sign-in is rejected without touching any row.
//!
//! Provider names and emails are compared in canonical (lower-case) form, so
//! `GitHub` and `github` are one provider and `Alice@Example.com` is the
//! same mailbox as `alice@example.com`.
//!
//! Storage failures reject (fail closed). The check-then-act sequence is not
//! transactional; storage uniqueness rules are the final arbiter and a
//! conflict reported by a write is also a rejection.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use querydeck_core::UserId;

use crate::account::{Account, normalize_email};
use crate::error::StoreError;
use crate::store::AccountStore;

/// Profile fields some providers return separately from the top-level ones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthProfile {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

/// Result of an upstream OAuth exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthIdentity {
    pub provider: String,
    pub provider_account_id: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub profile: OAuthProfile,
}

impl OAuthIdentity {
    /// Copy with the provider name and email in canonical form.
    #[must_use]
    pub fn canonical(&self) -> Self {
        Self {
            provider: self.provider.trim().to_lowercase(),
            email: normalize_email(&self.email),
            ..self.clone()
        }
    }

    /// Top-level name, falling back to the profile's.
    #[must_use]
    pub fn display_name(&self) -> Option<String> {
        self.name.clone().or_else(|| self.profile.name.clone())
    }

    /// Top-level image, falling back to the profile picture.
    #[must_use]
    pub fn avatar(&self) -> Option<String> {
        self.image.clone().or_else(|| self.profile.picture.clone())
    }
}

/// Why a sign-in was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// The email is already linked to another provider.
    ProviderConflict { linked: String },
    /// A storage uniqueness rule refused the write.
    StorageConflict,
    /// Storage failed.
    StorageFailure,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProviderConflict { linked } => {
                write!(f, "email already linked to provider '{linked}'")
            }
            Self::StorageConflict => write!(f, "storage uniqueness conflict"),
            Self::StorageFailure => write!(f, "storage failure"),
        }
    }
}

/// Outcome of [`OAuthLinker::link`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutcome {
    /// Account already linked to this identity.
    Existing(UserId),
    /// Identity linked onto an existing account with the same email.
    Linked(UserId),
    /// New account created.
    Created(UserId),
    /// Provider is not an OAuth provider; accepted without storage access.
    PassThrough,
    Rejected(RejectReason),
}

impl LinkOutcome {
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        !matches!(self, Self::Rejected(_))
    }

    /// Account the sign-in resolved to, for linked outcomes.
    #[must_use]
    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Self::Existing(id) | Self::Linked(id) | Self::Created(id) => Some(*id),
            Self::PassThrough | Self::Rejected(_) => None,
        }
    }
}

/// Set of provider names handled as OAuth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthProviders(HashSet<String>);

impl OAuthProviders {
    /// Parses a comma-separated provider list, case-insensitively.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        Self(
            raw.split(',')
                .map(|p| p.trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        )
    }

    #[must_use]
    pub fn contains(&self, provider: &str) -> bool {
        self.0.contains(&provider.to_lowercase())
    }
}

fn reject_for(error: &StoreError) -> LinkOutcome {
    match error {
        StoreError::Conflict { .. } => LinkOutcome::Rejected(RejectReason::StorageConflict),
        StoreError::Backend { .. } | StoreError::Corrupt { .. } => {
            LinkOutcome::Rejected(RejectReason::StorageFailure)
        }
    }
}

/// Reconciles OAuth identities against [`AccountStore`].
pub struct OAuthLinker {
    accounts: Arc<dyn AccountStore>,
    providers: OAuthProviders,
}

impl OAuthLinker {
    pub fn new(accounts: Arc<dyn AccountStore>, providers: OAuthProviders) -> Self {
        Self {
            accounts,
            providers,
        }
    }

    /// Decides whether `identity` may sign in, creating or linking as needed.
    #[instrument(skip_all, fields(provider = %identity.provider))]
    pub async fn link(&self, identity: &OAuthIdentity) -> LinkOutcome {
        let identity = identity.canonical();
        if !self.providers.contains(&identity.provider) {
            debug!("not an OAuth provider; passing through");
            return LinkOutcome::PassThrough;
        }

        match self.reconcile(&identity).await {
            Ok(outcome) => outcome,
            Err(error) => {
                warn!(%error, "account reconciliation failed; rejecting sign-in");
                reject_for(&error)
            }
        }
    }

    async fn reconcile(&self, identity: &OAuthIdentity) -> Result<LinkOutcome, StoreError> {
        if let Some(account) = self
            .accounts
            .find_by_oauth(&identity.provider, &identity.provider_account_id)
            .await?
        {
            self.accounts.touch_last_login(account.id).await?;
            return Ok(LinkOutcome::Existing(account.id));
        }

        let Some(existing) = self.accounts.find_by_email(&identity.email).await? else {
            let mut account = Account::new(&identity.email);
            account.name = identity.display_name();
            account.avatar_url = identity.avatar();
            account.oauth_provider = Some(identity.provider.clone());
            account.oauth_id = Some(identity.provider_account_id.clone());
            account.last_login = Some(account.created_at);
            self.accounts.create(&account).await?;
            info!(user_id = %account.id, "created account from OAuth sign-in");
            return Ok(LinkOutcome::Created(account.id));
        };

        match existing.oauth_provider.as_deref() {
            Some(linked) if linked != identity.provider => {
                warn!(
                    user_id = %existing.id,
                    linked,
                    "email already linked to a different OAuth provider"
                );
                Ok(LinkOutcome::Rejected(RejectReason::ProviderConflict {
                    linked: linked.to_string(),
                }))
            }
            _ => {
                self.accounts
                    .link_oauth(
                        existing.id,
                        &identity.provider,
                        &identity.provider_account_id,
                        identity.avatar().as_deref(),
                    )
                    .await?;
                info!(user_id = %existing.id, "linked OAuth identity to existing account");
                Ok(LinkOutcome::Linked(existing.id))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryAccounts;

    fn identity(provider: &str, account_id: &str, email: &str) -> OAuthIdentity {
        OAuthIdentity {
            provider: provider.to_string(),
            provider_account_id: account_id.to_string(),
            email: email.to_string(),
            name: None,
            image: None,
            profile: OAuthProfile::default(),
        }
    }

    fn linker(accounts: &Arc<MemoryAccounts>) -> OAuthLinker {
        OAuthLinker::new(accounts.clone(), OAuthProviders::parse("google,github"))
    }

    #[tokio::test]
    async fn brand_new_identity_creates_one_account() {
        let accounts = Arc::new(MemoryAccounts::default());
        let mut incoming = identity("github", "gh-1", "new@example.com");
        incoming.profile = OAuthProfile {
            name: Some("Profile Name".to_string()),
            picture: Some("https://img/profile.png".to_string()),
        };

        let outcome = linker(&accounts).link(&incoming).await;

        let stored = accounts.snapshot();
        assert_eq!(stored.len(), 1);
        assert_eq!(outcome, LinkOutcome::Created(stored[0].id));
        assert_eq!(stored[0].name.as_deref(), Some("Profile Name"));
        assert_eq!(stored[0].avatar_url.as_deref(), Some("https://img/profile.png"));
        assert_eq!(stored[0].oauth_provider.as_deref(), Some("github"));
        assert_eq!(stored[0].oauth_id.as_deref(), Some("gh-1"));
        assert!(stored[0].password_hash.is_none());
    }

    #[tokio::test]
    async fn top_level_name_and_image_win_over_profile() {
        let accounts = Arc::new(MemoryAccounts::default());
        let mut incoming = identity("google", "g-1", "n@example.com");
        incoming.name = Some("Top".to_string());
        incoming.image = Some("https://img/top.png".to_string());
        incoming.profile.name = Some("Profile".to_string());
        incoming.profile.picture = Some("https://img/profile.png".to_string());

        linker(&accounts).link(&incoming).await;

        let stored = accounts.snapshot();
        assert_eq!(stored[0].name.as_deref(), Some("Top"));
        assert_eq!(stored[0].avatar_url.as_deref(), Some("https://img/top.png"));
    }

    #[tokio::test]
    async fn known_identity_is_adopted_and_stamped() {
        let mut account = Account::new("known@example.com");
        account.oauth_provider = Some("google".to_string());
        account.oauth_id = Some("g-7".to_string());
        let accounts = Arc::new(MemoryAccounts::with(vec![account.clone()]));

        let outcome = linker(&accounts)
            .link(&identity("google", "g-7", "known@example.com"))
            .await;

        assert_eq!(outcome, LinkOutcome::Existing(account.id));
        assert!(accounts.snapshot()[0].last_login.is_some());
        assert_eq!(accounts.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn unlinked_email_is_linked() {
        let mut account = Account::new("pw@example.com");
        account.password_hash = Some("$argon2id$stub".to_string());
        let accounts = Arc::new(MemoryAccounts::with(vec![account.clone()]));
        let mut incoming = identity("github", "gh-9", "pw@example.com");
        incoming.profile.picture = Some("https://img/fallback.png".to_string());

        let outcome = linker(&accounts).link(&incoming).await;

        assert_eq!(outcome, LinkOutcome::Linked(account.id));
        let stored = &accounts.snapshot()[0];
        assert_eq!(stored.oauth_provider.as_deref(), Some("github"));
        assert_eq!(stored.oauth_id.as_deref(), Some("gh-9"));
        assert_eq!(stored.avatar_url.as_deref(), Some("https://img/fallback.png"));
        assert!(stored.password_hash.is_some());
    }

    #[tokio::test]
    async fn email_linked_to_other_provider_is_rejected_without_writes() {
        let mut account = Account::new("taken@example.com");
        account.oauth_provider = Some("google".to_string());
        account.oauth_id = Some("g-1".to_string());
        let accounts = Arc::new(MemoryAccounts::with(vec![account.clone()]));

        let outcome = linker(&accounts)
            .link(&identity("github", "gh-1", "taken@example.com"))
            .await;

        assert_eq!(
            outcome,
            LinkOutcome::Rejected(RejectReason::ProviderConflict {
                linked: "google".to_string()
            })
        );
        assert!(!outcome.is_accepted());
        assert_eq!(accounts.writes(), 0);
        assert_eq!(accounts.snapshot(), vec![account]);
    }

    #[tokio::test]
    async fn email_case_does_not_open_a_second_account() {
        let mut account = Account::new("alice@example.com");
        account.oauth_provider = Some("google".to_string());
        account.oauth_id = Some("g-1".to_string());
        let accounts = Arc::new(MemoryAccounts::with(vec![account.clone()]));

        let outcome = linker(&accounts)
            .link(&identity("github", "gh-1", "Alice@Example.com"))
            .await;

        assert_eq!(
            outcome,
            LinkOutcome::Rejected(RejectReason::ProviderConflict {
                linked: "google".to_string()
            })
        );
        assert_eq!(accounts.writes(), 0);
        assert_eq!(accounts.snapshot(), vec![account]);
    }

    #[tokio::test]
    async fn provider_case_matches_the_linked_identity() {
        let mut account = Account::new("gh@example.com");
        account.oauth_provider = Some("github".to_string());
        account.oauth_id = Some("gh-9".to_string());
        let accounts = Arc::new(MemoryAccounts::with(vec![account.clone()]));

        let outcome = linker(&accounts)
            .link(&identity("GitHub", "gh-9", "gh@example.com"))
            .await;

        assert_eq!(outcome, LinkOutcome::Existing(account.id));
        assert_eq!(accounts.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn created_account_stores_canonical_provider_and_email() {
        let accounts = Arc::new(MemoryAccounts::default());

        linker(&accounts)
            .link(&identity("Google", "g-2", " New.Person@Example.com"))
            .await;

        let stored = accounts.snapshot();
        assert_eq!(stored[0].email, "new.person@example.com");
        assert_eq!(stored[0].oauth_provider.as_deref(), Some("google"));
    }

    #[tokio::test]
    async fn storage_failure_rejects() {
        let accounts = Arc::new(MemoryAccounts::failing());

        let outcome = linker(&accounts)
            .link(&identity("google", "g-1", "x@example.com"))
            .await;

        assert_eq!(outcome, LinkOutcome::Rejected(RejectReason::StorageFailure));
    }

    #[tokio::test]
    async fn unconfigured_provider_passes_through_without_storage() {
        let accounts = Arc::new(MemoryAccounts::failing());

        let outcome = linker(&accounts)
            .link(&identity("credentials", "whatever", "x@example.com"))
            .await;

        assert_eq!(outcome, LinkOutcome::PassThrough);
        assert!(outcome.is_accepted());
        assert_eq!(outcome.user_id(), None);
        assert_eq!(accounts.reads.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn write_conflict_is_a_rejection() {
        // Another sign-in linked the email between our read and our write.
        struct RacingAccounts(MemoryAccounts);

        #[async_trait::async_trait]
        impl AccountStore for RacingAccounts {
            async fn find_by_id(&self, id: UserId) -> Result<Option<Account>, StoreError> {
                self.0.find_by_id(id).await
            }
            async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
                self.0.find_by_email(email).await
            }
            async fn find_by_oauth(
                &self,
                provider: &str,
                oauth_id: &str,
            ) -> Result<Option<Account>, StoreError> {
                self.0.find_by_oauth(provider, oauth_id).await
            }
            async fn create(&self, _account: &Account) -> Result<(), StoreError> {
                Err(StoreError::Conflict {
                    details: "users_email_key".to_string(),
                })
            }
            async fn link_oauth(
                &self,
                id: UserId,
                provider: &str,
                oauth_id: &str,
                avatar_url: Option<&str>,
            ) -> Result<(), StoreError> {
                self.0.link_oauth(id, provider, oauth_id, avatar_url).await
            }
            async fn touch_last_login(&self, id: UserId) -> Result<(), StoreError> {
                self.0.touch_last_login(id).await
            }
            async fn list(&self) -> Result<Vec<Account>, StoreError> {
                self.0.list().await
            }
        }

        let accounts = Arc::new(RacingAccounts(MemoryAccounts::default()));
        let linker = OAuthLinker::new(accounts, OAuthProviders::parse("google"));

        let outcome = linker
            .link(&identity("google", "g-1", "race@example.com"))
            .await;

        assert_eq!(outcome, LinkOutcome::Rejected(RejectReason::StorageConflict));
    }

    #[test]
    fn providers_parse_case_insensitively() {
        let providers = OAuthProviders::parse(" Google , github,,");
        assert!(providers.contains("google"));
        assert!(providers.contains("GitHub"));
        assert!(!providers.contains("credentials"));
    }

    #[test]
    fn identity_deserializes_camel_case() {
        let identity: OAuthIdentity = serde_json::from_value(serde_json::json!({
            "provider": "github",
            "providerAccountId": "42",
            "email": "a@b.com",
            "profile": {"picture": "https://img/a.png"}
        }))
        .expect("deserialize");

        assert_eq!(identity.provider_account_id, "42");
        assert_eq!(identity.avatar().as_deref(), Some("https://img/a.png"));
        assert!(identity.name.is_none());
    }
}
