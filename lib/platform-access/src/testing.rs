//! In-memory stores for unit tests.

use async_trait::async_trait;
use chrono::Utc;
use querydeck_core::UserId;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::account::{Account, normalize_email};
use crate::error::{ProviderError, StoreError};
use crate::request::AuthRequest;
use crate::session::{Session, SessionToken};
use crate::store::{AccountStore, PlatformSession, PlatformSessionProvider, SessionStore};

fn backend_down() -> StoreError {
    StoreError::Backend {
        details: "connection refused".to_string(),
    }
}

/// Account store enforcing the same uniqueness rules as the database.
#[derive(Default)]
pub struct MemoryAccounts {
    pub accounts: Mutex<Vec<Account>>,
    pub failing: bool,
    pub writes: AtomicUsize,
    pub reads: AtomicUsize,
}

impl MemoryAccounts {
    pub fn with(accounts: Vec<Account>) -> Self {
        Self {
            accounts: Mutex::new(accounts),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn snapshot(&self) -> Vec<Account> {
        self.accounts.lock().unwrap().clone()
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn read(&self) -> Result<(), StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(backend_down());
        }
        Ok(())
    }
}

#[async_trait]
impl AccountStore for MemoryAccounts {
    async fn find_by_id(&self, id: UserId) -> Result<Option<Account>, StoreError> {
        self.read()?;
        Ok(self.snapshot().into_iter().find(|a| a.id == id))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        self.read()?;
        let email = normalize_email(email);
        Ok(self
            .snapshot()
            .into_iter()
            .find(|a| normalize_email(&a.email) == email))
    }

    async fn find_by_oauth(
        &self,
        provider: &str,
        oauth_id: &str,
    ) -> Result<Option<Account>, StoreError> {
        self.read()?;
        Ok(self.snapshot().into_iter().find(|a| {
            a.oauth_provider.as_deref() == Some(provider) && a.oauth_id.as_deref() == Some(oauth_id)
        }))
    }

    async fn create(&self, account: &Account) -> Result<(), StoreError> {
        if self.failing {
            return Err(backend_down());
        }
        let mut accounts = self.accounts.lock().unwrap();
        let duplicate = accounts.iter().any(|a| {
            normalize_email(&a.email) == normalize_email(&account.email)
                || (a.oauth_provider.is_some()
                    && a.oauth_provider == account.oauth_provider
                    && a.oauth_id == account.oauth_id)
        });
        if duplicate {
            return Err(StoreError::Conflict {
                details: "duplicate account".to_string(),
            });
        }
        accounts.push(account.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn link_oauth(
        &self,
        id: UserId,
        provider: &str,
        oauth_id: &str,
        avatar_url: Option<&str>,
    ) -> Result<(), StoreError> {
        if self.failing {
            return Err(backend_down());
        }
        let mut accounts = self.accounts.lock().unwrap();
        let account = accounts
            .iter_mut()
            .find(|a| a.id == id && a.oauth_provider.as_deref().is_none_or(|p| p == provider))
            .ok_or_else(|| StoreError::Conflict {
                details: "account already linked to another provider".to_string(),
            })?;
        account.oauth_provider = Some(provider.to_string());
        account.oauth_id = Some(oauth_id.to_string());
        if let Some(avatar_url) = avatar_url {
            account.avatar_url = Some(avatar_url.to_string());
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn touch_last_login(&self, id: UserId) -> Result<(), StoreError> {
        if self.failing {
            return Err(backend_down());
        }
        let mut accounts = self.accounts.lock().unwrap();
        if let Some(account) = accounts.iter_mut().find(|a| a.id == id) {
            account.last_login = Some(Utc::now());
            self.writes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Account>, StoreError> {
        self.read()?;
        Ok(self.snapshot())
    }
}

#[derive(Default)]
pub struct MemorySessions {
    pub sessions: Mutex<Vec<Session>>,
    pub failing: bool,
    pub lookups: AtomicUsize,
}

impl MemorySessions {
    pub fn with(sessions: Vec<Session>) -> Self {
        Self {
            sessions: Mutex::new(sessions),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionStore for MemorySessions {
    async fn find(&self, token: &SessionToken) -> Result<Option<Session>, StoreError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(backend_down());
        }
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .iter()
            .find(|s| &s.token == token)
            .cloned())
    }

    async fn create(&self, session: &Session) -> Result<(), StoreError> {
        self.sessions.lock().unwrap().push(session.clone());
        Ok(())
    }

    async fn delete(&self, token: &SessionToken) -> Result<(), StoreError> {
        self.sessions.lock().unwrap().retain(|s| &s.token != token);
        Ok(())
    }

    async fn delete_expired(&self) -> Result<u64, StoreError> {
        let mut sessions = self.sessions.lock().unwrap();
        let before = sessions.len();
        sessions.retain(|s| !s.is_expired());
        Ok((before - sessions.len()) as u64)
    }
}

/// Provider returning a fixed answer and counting calls.
pub struct StaticProvider {
    pub answer: Result<Option<PlatformSession>, ProviderError>,
    pub calls: AtomicUsize,
}

impl StaticProvider {
    pub fn none() -> Self {
        Self::answering(Ok(None))
    }

    pub fn session(session: PlatformSession) -> Self {
        Self::answering(Ok(Some(session)))
    }

    pub fn broken() -> Self {
        Self::answering(Err(ProviderError {
            reason: "decryption failed".to_string(),
        }))
    }

    fn answering(answer: Result<Option<PlatformSession>, ProviderError>) -> Self {
        Self {
            answer,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlatformSessionProvider for StaticProvider {
    async fn session(
        &self,
        _request: &AuthRequest,
    ) -> Result<Option<PlatformSession>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer.clone()
    }
}
