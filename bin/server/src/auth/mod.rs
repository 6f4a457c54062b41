//! Authentication for the querydeck server.
//!
//! This module provides:
//! - Credentials sign-in backed by database sessions (`session` cookie)
//! - The OAuth callback that links sign-ins to accounts and issues the
//!   signed `platform_session` cookie
//! - Route guards that resolve the caller and enforce per-route rules
//!
//! # Authorization Model
//!
//! Identity is resolved on every request, with no caching: a bearer API
//! token first, then the platform session cookie, then the database session
//! cookie. Administrators are the emails on a static allow-list loaded at
//! startup. Resource access is ownership: a project is visible only to its
//! owner, and anything else looks like it does not exist.

pub mod db;
pub mod middleware;
pub mod platform;
pub mod routes;

use querydeck_instrumentation::QueryHistorySink;
use querydeck_platform_access::{
    AccountStore, IdentityResolver, OAuthLinker, SessionStore, TokenCodec,
};
use sqlx::PgPool;
use std::sync::Arc;

use crate::config::{ServerConfig, SessionConfig};
use crate::db::{PgProjectRepository, PgQueryHistory, Project};
use crate::query::{PgQueryRunner, QueryRunner};

pub use db::{PgAccountRepository, PgSessionRepository};
pub use middleware::{Credentials, Guard, OwnedResources, ResourceKind};
pub use platform::{PLATFORM_COOKIE, SignedCookieProvider};
pub use routes::{login, logout, oauth_callback};

/// Storage and execution backends.
pub struct Stores {
    pub accounts: Arc<dyn AccountStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub projects: Arc<dyn OwnedResources<Resource = Project>>,
    pub history: Arc<dyn QueryHistorySink>,
    pub runner: Arc<dyn QueryRunner>,
}

impl Stores {
    /// Postgres-backed stores sharing one pool.
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            accounts: Arc::new(PgAccountRepository::new(pool.clone())),
            sessions: Arc::new(PgSessionRepository::new(pool.clone())),
            projects: Arc::new(PgProjectRepository::new(pool.clone())),
            history: Arc::new(PgQueryHistory::new(pool)),
            runner: Arc::new(PgQueryRunner),
        }
    }
}

/// Shared application state.
pub struct AppState {
    pub guard: Guard,
    pub accounts: Arc<dyn AccountStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub projects: Arc<dyn OwnedResources<Resource = Project>>,
    pub history: Arc<dyn QueryHistorySink>,
    pub runner: Arc<dyn QueryRunner>,
    pub linker: OAuthLinker,
    /// Codec for bearer API tokens.
    pub api_tokens: TokenCodec,
    /// Codec for the `platform_session` cookie.
    pub platform_tokens: TokenCodec,
    pub session_config: SessionConfig,
    pub gateway_key: Option<String>,
}

impl AppState {
    /// Wires the resolver, guard, and linker over `stores`.
    pub fn new(config: &ServerConfig, stores: Stores) -> Self {
        let api_tokens = TokenCodec::new(config.auth.token_secret.as_bytes(), config.auth.token_ttl());
        let platform_tokens = TokenCodec::new(
            config.auth.platform_secret.as_bytes(),
            config.session.duration(),
        );

        let resolver = IdentityResolver::standard(
            api_tokens.clone(),
            stores.accounts.clone(),
            Arc::new(SignedCookieProvider::new(platform_tokens.clone())),
            stores.sessions.clone(),
        );
        tracing::debug!(order = ?resolver.order(), "identity resolver ready");

        Self {
            guard: Guard::new(
                resolver,
                config.auth.admins(),
                config.environment.exposes_errors(),
            ),
            linker: OAuthLinker::new(stores.accounts.clone(), config.auth.providers()),
            accounts: stores.accounts,
            sessions: stores.sessions,
            projects: stores.projects,
            history: stores.history,
            runner: stores.runner,
            api_tokens,
            platform_tokens,
            session_config: config.session.clone(),
            gateway_key: config.auth.gateway_key.clone(),
        }
    }
}
