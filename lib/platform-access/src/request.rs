//! Framework-neutral view of the credential-bearing parts of a request.

use std::collections::HashMap;

/// Exact, case-sensitive scheme prefix for bearer credentials.
const BEARER_PREFIX: &str = "Bearer ";

/// The pieces of an inbound request that identity resolution reads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthRequest {
    authorization: Option<String>,
    cookies: HashMap<String, String>,
}

impl AuthRequest {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the raw `Authorization` header value.
    #[must_use]
    pub fn with_authorization(mut self, value: impl Into<String>) -> Self {
        self.authorization = Some(value.into());
        self
    }

    #[must_use]
    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    /// Returns the bearer token, if the header uses the `Bearer ` scheme.
    ///
    /// Any other scheme, or no header at all, is treated as "no bearer
    /// token". An empty token after the prefix is still returned.
    #[must_use]
    pub fn bearer_token(&self) -> Option<&str> {
        self.authorization
            .as_deref()
            .and_then(|value| value.strip_prefix(BEARER_PREFIX))
    }

    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }
}
