//! Error types for the platform-access crate.
//!
//! - `AccessError`: the caller-facing failure taxonomy, one variant per
//!   response status the authorization layer may produce
//! - `StoreError`: failures reported by account/session storage
//! - `ProviderError`: failures from the external platform-session provider
//! - `TokenError` / `TokenRejection`: token issuance and verification
//! - `PasswordError`: password hashing failures

use std::fmt;

/// A failure to authenticate or authorize a request.
///
/// The message is the exact text returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    /// Required routing parameter missing (400).
    BadRequest { message: String },
    /// No usable credentials, or credentials that do not resolve (401).
    Unauthenticated { message: String },
    /// Authenticated but not permitted (403).
    Forbidden { message: String },
    /// Resource missing or owned by someone else (404).
    NotFound { message: String },
    /// Unexpected storage or provider failure (500).
    Internal { message: String },
}

impl AccessError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::Unauthenticated {
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// HTTP status code for this failure.
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            Self::BadRequest { .. } => 400,
            Self::Unauthenticated { .. } => 401,
            Self::Forbidden { .. } => 403,
            Self::NotFound { .. } => 404,
            Self::Internal { .. } => 500,
        }
    }

    /// Caller-facing message.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest { message }
            | Self::Unauthenticated { message }
            | Self::Forbidden { message }
            | Self::NotFound { message }
            | Self::Internal { message } => message,
        }
    }
}

impl fmt::Display for AccessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message(), self.status())
    }
}

impl std::error::Error for AccessError {}

/// Errors from account, session, or resource storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A uniqueness rule rejected the write (duplicate email, a second
    /// provider for one email, a reused provider account id).
    Conflict { details: String },
    /// The backing store failed.
    Backend { details: String },
    /// A stored row could not be decoded.
    Corrupt { details: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Conflict { details } => write!(f, "storage conflict: {details}"),
            Self::Backend { details } => write!(f, "storage failure: {details}"),
            Self::Corrupt { details } => write!(f, "corrupt stored record: {details}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Errors from the external platform-session provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    pub reason: String,
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session provider failed: {}", self.reason)
    }
}

impl std::error::Error for ProviderError {}

/// Failure to issue a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenError {
    pub reason: String,
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to issue token: {}", self.reason)
    }
}

impl std::error::Error for TokenError {}

/// Why a token failed verification.
///
/// Verification never panics; every failure is one of these values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRejection {
    /// Not three segments, bad base64, or a payload that does not decode.
    Malformed,
    /// Signature does not match the signed segments.
    BadSignature,
    /// Signature valid but `exp` has passed.
    Expired,
}

impl fmt::Display for TokenRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed => write!(f, "malformed token"),
            Self::BadSignature => write!(f, "token signature mismatch"),
            Self::Expired => write!(f, "token has expired"),
        }
    }
}

impl std::error::Error for TokenRejection {}

/// Failure to hash a password.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordError {
    pub reason: String,
}

impl fmt::Display for PasswordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "password hashing failed: {}", self.reason)
    }
}

impl std::error::Error for PasswordError {}
