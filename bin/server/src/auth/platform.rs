//! Platform sessions carried in a signed cookie.
//!
//! After an OAuth sign-in is accepted the server issues a session-type token
//! under the platform secret and stores it in the `platform_session` cookie.
//! This provider reads it back for identity resolution.

use async_trait::async_trait;
use querydeck_platform_access::{
    AuthRequest, PlatformSession, PlatformSessionProvider, ProviderError, TokenCodec, TokenType,
};

/// Platform session cookie name.
pub const PLATFORM_COOKIE: &str = "platform_session";

/// Verifies the `platform_session` cookie.
pub struct SignedCookieProvider {
    codec: TokenCodec,
}

impl SignedCookieProvider {
    pub fn new(codec: TokenCodec) -> Self {
        Self { codec }
    }
}

#[async_trait]
impl PlatformSessionProvider for SignedCookieProvider {
    async fn session(
        &self,
        request: &AuthRequest,
    ) -> Result<Option<PlatformSession>, ProviderError> {
        let Some(cookie) = request.cookie(PLATFORM_COOKIE) else {
            return Ok(None);
        };

        let verified = match self.codec.verify(cookie) {
            Ok(verified) => verified,
            Err(rejection) => {
                tracing::debug!(%rejection, "ignoring unverifiable platform session");
                return Ok(None);
            }
        };

        let payload = verified.payload;
        if payload.token_type != Some(TokenType::Session) {
            tracing::debug!("ignoring platform cookie holding a non-session token");
            return Ok(None);
        }

        Ok(Some(PlatformSession {
            id: Some(payload.user_id.to_string()),
            email: Some(payload.email),
            name: payload.name,
            picture: payload.picture,
            provider: payload.provider,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use querydeck_core::UserId;
    use querydeck_platform_access::TokenPayload;

    fn codec() -> TokenCodec {
        TokenCodec::new(b"platform-secret", chrono::Duration::hours(1))
    }

    #[tokio::test]
    async fn no_cookie_is_no_session() {
        let provider = SignedCookieProvider::new(codec());

        let session = provider.session(&AuthRequest::new()).await.expect("ok");

        assert!(session.is_none());
    }

    #[tokio::test]
    async fn valid_cookie_yields_session() {
        let codec = codec();
        let user_id = UserId::new();
        let token = codec
            .issue(
                &TokenPayload::new(user_id, "dana@example.com")
                    .with_type(TokenType::Session)
                    .with_provider(Some("github".to_string())),
            )
            .expect("issue");
        let request = AuthRequest::new().with_cookie(PLATFORM_COOKIE, token);

        let session = SignedCookieProvider::new(codec)
            .session(&request)
            .await
            .expect("ok")
            .expect("session");

        assert_eq!(session.id, Some(user_id.to_string()));
        assert_eq!(session.email.as_deref(), Some("dana@example.com"));
        assert_eq!(session.provider.as_deref(), Some("github"));
    }

    #[tokio::test]
    async fn api_token_in_cookie_is_ignored() {
        let codec = codec();
        let token = codec
            .issue(&TokenPayload::new(UserId::new(), "dana@example.com"))
            .expect("issue");
        let request = AuthRequest::new().with_cookie(PLATFORM_COOKIE, token);

        let session = SignedCookieProvider::new(codec)
            .session(&request)
            .await
            .expect("ok");

        assert!(session.is_none());
    }

    #[tokio::test]
    async fn cookie_signed_elsewhere_is_ignored() {
        let foreign = TokenCodec::new(b"other", chrono::Duration::hours(1));
        let token = foreign
            .issue(&TokenPayload::new(UserId::new(), "x@example.com").with_type(TokenType::Session))
            .expect("issue");
        let request = AuthRequest::new().with_cookie(PLATFORM_COOKIE, token);

        let session = SignedCookieProvider::new(codec())
            .session(&request)
            .await
            .expect("ok");

        assert!(session.is_none());
    }
}
