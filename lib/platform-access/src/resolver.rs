//! Ordered, multi-strategy identity resolution.
//!
//! Strategies run strictly in sequence: bearer token, then platform session,
//! then session cookie. Each one either resolves a [`Principal`], fails
//! terminally, or skips to the next. Only the bearer strategy ever fails
//! terminally, and only when a bearer header is actually present: an
//! explicit credential that does not verify must never be downgraded to an
//! implicit one such as a leftover browser cookie on the same request.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::error::AccessError;
use crate::principal::{CredentialSource, Principal};
use crate::request::AuthRequest;
use crate::session::SessionToken;
use crate::store::{AccountStore, PlatformSessionProvider, SessionStore};
use crate::token::TokenCodec;

pub const NO_REQUEST: &str = "No request provided";
pub const NO_AUTHENTICATION: &str = "No authentication provided";
pub const INVALID_TOKEN: &str = "Invalid or expired token";
pub const USER_NOT_FOUND: &str = "User not found or inactive";
pub const AUTHENTICATION_FAILED: &str = "Authentication failed";

/// Name of the cookie holding a credentials-login session token.
pub const SESSION_COOKIE: &str = "session";

/// Outcome of a single strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt {
    Resolved(Principal),
    /// This strategy does not apply; try the next one.
    Skip,
    /// Stop resolution with this error.
    Fail(AccessError),
}

/// One way of identifying the caller.
#[async_trait]
pub trait Strategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn attempt(&self, request: &AuthRequest) -> Attempt;
}

/// `Authorization: Bearer <token>` verified by [`TokenCodec`].
pub struct BearerStrategy {
    codec: TokenCodec,
    accounts: Arc<dyn AccountStore>,
}

impl BearerStrategy {
    pub fn new(codec: TokenCodec, accounts: Arc<dyn AccountStore>) -> Self {
        Self { codec, accounts }
    }
}

#[async_trait]
impl Strategy for BearerStrategy {
    fn name(&self) -> &'static str {
        "bearer"
    }

    async fn attempt(&self, request: &AuthRequest) -> Attempt {
        let Some(token) = request.bearer_token() else {
            return Attempt::Skip;
        };

        let verified = match self.codec.verify(token) {
            Ok(verified) => verified,
            Err(rejection) => {
                debug!(%rejection, "bearer token rejected");
                return Attempt::Fail(AccessError::unauthenticated(INVALID_TOKEN));
            }
        };

        let user_id = verified.payload.user_id;
        match self.accounts.find_by_id(user_id).await {
            Ok(Some(account)) if account.active => {
                Attempt::Resolved(Principal::from_account(&account, CredentialSource::Bearer))
            }
            Ok(_) => {
                debug!(%user_id, "bearer token names a missing or inactive account");
                Attempt::Fail(AccessError::unauthenticated(USER_NOT_FOUND))
            }
            Err(error) => {
                warn!(%user_id, %error, "account lookup failed during bearer authentication");
                Attempt::Fail(AccessError::internal(AUTHENTICATION_FAILED))
            }
        }
    }
}

/// Session managed by the external platform-session provider.
pub struct PlatformSessionStrategy {
    provider: Arc<dyn PlatformSessionProvider>,
}

impl PlatformSessionStrategy {
    pub fn new(provider: Arc<dyn PlatformSessionProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Strategy for PlatformSessionStrategy {
    fn name(&self) -> &'static str {
        "platform_session"
    }

    async fn attempt(&self, request: &AuthRequest) -> Attempt {
        let session = match self.provider.session(request).await {
            Ok(Some(session)) => session,
            Ok(None) => return Attempt::Skip,
            Err(error) => {
                warn!(%error, "platform session provider failed; falling through");
                return Attempt::Skip;
            }
        };

        let Some(raw_id) = session.id.as_deref() else {
            return Attempt::Skip;
        };
        let id = match raw_id.parse() {
            Ok(id) => id,
            Err(error) => {
                warn!(%error, "platform session carries an unusable id");
                return Attempt::Skip;
            }
        };

        Attempt::Resolved(Principal {
            id,
            email: session.email.unwrap_or_default(),
            name: session.name,
            avatar_url: session.picture,
            provider: session.provider,
            source: CredentialSource::PlatformSession,
        })
    }
}

/// Token in the session cookie, looked up in session storage.
pub struct CookieSessionStrategy {
    cookie_name: String,
    sessions: Arc<dyn SessionStore>,
    accounts: Arc<dyn AccountStore>,
}

impl CookieSessionStrategy {
    pub fn new(
        cookie_name: impl Into<String>,
        sessions: Arc<dyn SessionStore>,
        accounts: Arc<dyn AccountStore>,
    ) -> Self {
        Self {
            cookie_name: cookie_name.into(),
            sessions,
            accounts,
        }
    }
}

#[async_trait]
impl Strategy for CookieSessionStrategy {
    fn name(&self) -> &'static str {
        "session_cookie"
    }

    async fn attempt(&self, request: &AuthRequest) -> Attempt {
        let Some(raw) = request.cookie(&self.cookie_name) else {
            return Attempt::Skip;
        };
        let token = SessionToken::from(raw);

        let session = match self.sessions.find(&token).await {
            Ok(Some(session)) if !session.is_expired() => session,
            Ok(_) => return Attempt::Skip,
            Err(error) => {
                warn!(%error, "session lookup failed; falling through");
                return Attempt::Skip;
            }
        };

        match self.accounts.find_by_id(session.user_id).await {
            Ok(Some(account)) if account.active => Attempt::Resolved(Principal::from_account(
                &account,
                CredentialSource::SessionCookie,
            )),
            Ok(_) => Attempt::Skip,
            Err(error) => {
                warn!(user_id = %session.user_id, %error, "session owner lookup failed; falling through");
                Attempt::Skip
            }
        }
    }
}

/// Runs strategies in order until one resolves or fails.
pub struct IdentityResolver {
    strategies: Vec<Box<dyn Strategy>>,
}

impl IdentityResolver {
    /// Creates a resolver over an explicit strategy order.
    pub fn new(strategies: Vec<Box<dyn Strategy>>) -> Self {
        Self { strategies }
    }

    /// Creates the standard bearer → platform session → cookie resolver.
    pub fn standard(
        codec: TokenCodec,
        accounts: Arc<dyn AccountStore>,
        provider: Arc<dyn PlatformSessionProvider>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        Self::new(vec![
            Box::new(BearerStrategy::new(codec, accounts.clone())),
            Box::new(PlatformSessionStrategy::new(provider)),
            Box::new(CookieSessionStrategy::new(SESSION_COOKIE, sessions, accounts)),
        ])
    }

    /// Names of the strategies in evaluation order.
    pub fn order(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Identifies the caller of `request`.
    ///
    /// # Errors
    ///
    /// Returns the terminal failure of a strategy, or 401 if every strategy
    /// skipped or no request was supplied.
    #[instrument(skip_all)]
    pub async fn resolve(&self, request: Option<&AuthRequest>) -> Result<Principal, AccessError> {
        let Some(request) = request else {
            return Err(AccessError::unauthenticated(NO_REQUEST));
        };

        for strategy in &self.strategies {
            match strategy.attempt(request).await {
                Attempt::Resolved(principal) => {
                    debug!(strategy = strategy.name(), user_id = %principal.id, "caller resolved");
                    return Ok(principal);
                }
                Attempt::Fail(error) => {
                    debug!(strategy = strategy.name(), %error, "resolution stopped");
                    return Err(error);
                }
                Attempt::Skip => {}
            }
        }

        Err(AccessError::unauthenticated(NO_AUTHENTICATION))
    }
}
