//! Signed identity tokens.
//!
//! Tokens are HS256 JWTs: `base64url(header).base64url(claims).signature`.
//! The issuer adds `iat` and `exp`; everything else in the claims is the
//! caller-supplied [`TokenPayload`] and survives a round trip unchanged.

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use querydeck_core::UserId;
use serde::{Deserialize, Serialize};

use crate::error::{TokenError, TokenRejection};

/// Purpose a token was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    /// Explicitly issued for programmatic API access.
    ApiToken,
    /// Issued by the sign-in flow as the platform session.
    Session,
}

/// Identity fields carried inside a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPayload {
    pub user_id: UserId,
    pub email: String,
    pub token_type: Option<TokenType>,
    pub name: Option<String>,
    pub picture: Option<String>,
    pub provider: Option<String>,
    pub role: Option<String>,
}

impl TokenPayload {
    /// Creates a payload with only the required fields set.
    #[must_use]
    pub fn new(user_id: UserId, email: impl Into<String>) -> Self {
        Self {
            user_id,
            email: email.into(),
            token_type: None,
            name: None,
            picture: None,
            provider: None,
            role: None,
        }
    }

    #[must_use]
    pub fn with_type(mut self, token_type: TokenType) -> Self {
        self.token_type = Some(token_type);
        self
    }

    #[must_use]
    pub fn with_name(mut self, name: Option<String>) -> Self {
        self.name = name;
        self
    }

    #[must_use]
    pub fn with_picture(mut self, picture: Option<String>) -> Self {
        self.picture = picture;
        self
    }

    #[must_use]
    pub fn with_provider(mut self, provider: Option<String>) -> Self {
        self.provider = provider;
        self
    }

    #[must_use]
    pub fn with_role(mut self, role: Option<String>) -> Self {
        self.role = role;
        self
    }
}

/// A verified payload plus the fields the issuer stamped on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedToken {
    pub payload: TokenPayload,
    pub issued_at: i64,
    pub expires_at: i64,
}

/// Wire form of the claims.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    #[serde(rename = "userId", alias = "id")]
    user_id: UserId,
    email: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    token_type: Option<TokenType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    picture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    iat: i64,
    exp: i64,
}

impl Claims {
    fn into_verified(self) -> VerifiedToken {
        VerifiedToken {
            payload: TokenPayload {
                user_id: self.user_id,
                email: self.email,
                token_type: self.token_type,
                name: self.name,
                picture: self.picture,
                provider: self.provider,
                role: self.role,
            },
            issued_at: self.iat,
            expires_at: self.exp,
        }
    }
}

/// Issues and verifies tokens under a single secret.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    /// Creates a codec whose tokens expire `ttl` after issue.
    #[must_use]
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    /// Signs `payload`.
    ///
    /// # Errors
    ///
    /// Returns an error only if the claims cannot be serialized.
    pub fn issue(&self, payload: &TokenPayload) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = Claims {
            user_id: payload.user_id,
            email: payload.email.clone(),
            token_type: payload.token_type,
            name: payload.name.clone(),
            picture: payload.picture.clone(),
            provider: payload.provider.clone(),
            role: payload.role.clone(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key).map_err(|e| {
            TokenError {
                reason: e.to_string(),
            }
        })
    }

    /// Checks the signature and expiry of `token` and returns its payload.
    pub fn verify(&self, token: &str) -> Result<VerifiedToken, TokenRejection> {
        let validation = Validation::new(Algorithm::HS256);

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims.into_verified())
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenRejection::Expired,
                ErrorKind::InvalidSignature => TokenRejection::BadSignature,
                _ => TokenRejection::Malformed,
            })
    }
}
