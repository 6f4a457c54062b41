//! Authentication and authorization primitives for querydeck.
//!
//! This crate provides:
//! - Signed identity tokens (`TokenCodec`) and password digests (`password`)
//! - The caller identity (`Principal`) and the stored `Account`
//! - `IdentityResolver`, which tries bearer token, platform session, and
//!   session cookie in that order
//! - `OAuthLinker`, which reconciles OAuth sign-ins with stored accounts
//! - `AdminAllowList`, the static set of administrator emails
//!
//! Storage is abstracted behind async traits in [`store`] so the server can
//! back them with Postgres.
//!
//! # Example
//!
//! ```
//! use chrono::Duration;
//! use querydeck_core::UserId;
//! use querydeck_platform_access::{AdminAllowList, TokenCodec, TokenPayload, TokenType};
//!
//! let codec = TokenCodec::new(b"signing-secret", Duration::hours(1));
//! let payload = TokenPayload::new(UserId::new(), "alice@example.com")
//!     .with_type(TokenType::ApiToken);
//!
//! let token = codec.issue(&payload).expect("issue");
//! let verified = codec.verify(&token).expect("verify");
//! assert_eq!(verified.payload, payload);
//!
//! let admins = AdminAllowList::parse("Alice@Example.com, ,ops@example.com");
//! assert!(admins.contains("alice@example.com"));
//! ```

pub mod account;
pub mod admin;
pub mod error;
pub mod oauth;
pub mod password;
pub mod principal;
pub mod request;
pub mod resolver;
pub mod session;
pub mod store;
pub mod token;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use account::{Account, normalize_email};
pub use admin::AdminAllowList;
pub use error::{
    AccessError, PasswordError, ProviderError, StoreError, TokenError, TokenRejection,
};
pub use oauth::{
    LinkOutcome, OAuthIdentity, OAuthLinker, OAuthProfile, OAuthProviders, RejectReason,
};
pub use principal::{CredentialSource, Principal};
pub use request::AuthRequest;
pub use resolver::{Attempt, IdentityResolver, SESSION_COOKIE, Strategy};
pub use session::{Session, SessionToken};
pub use store::{AccountStore, PlatformSession, PlatformSessionProvider, SessionStore};
pub use token::{TokenCodec, TokenPayload, TokenType, VerifiedToken};
