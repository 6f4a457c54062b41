//! Sign-in and sign-out routes.

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use querydeck_platform_access::{
    CredentialSource, LinkOutcome, OAuthIdentity, Principal, SESSION_COOKIE, Session,
    SessionToken, StoreError, TokenError, TokenPayload, TokenType, normalize_email, password,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use time::Duration as TimeDuration;

use super::{AppState, PLATFORM_COOKIE};
use crate::error::{ApiSuccess, REDACTED};

/// Header carrying the sign-in gateway's shared key.
pub const GATEWAY_KEY_HEADER: &str = "x-gateway-key";

const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Body of `POST /auth/login`.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    email: String,
    password: String,
}

fn session_cookie(
    name: &'static str,
    value: String,
    state: &AppState,
) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .secure(state.session_config.secure_cookies)
        .same_site(SameSite::Lax)
        .max_age(TimeDuration::minutes(state.session_config.duration_minutes))
        .build()
}

/// Compares secrets without stopping at the first differing byte.
fn keys_match(presented: &[u8], expected: &[u8]) -> bool {
    presented.len() == expected.len()
        && presented
            .iter()
            .zip(expected)
            .fold(0u8, |diff, (a, b)| diff | (a ^ b))
            == 0
}

fn removal(name: &'static str) -> Cookie<'static> {
    Cookie::build((name, "")).path("/").max_age(TimeDuration::ZERO).build()
}

/// Signs in with email and password, starting a database session.
pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(body): Json<LoginRequest>,
) -> Result<(CookieJar, Response), AuthError> {
    let account = state
        .accounts
        .find_by_email(&normalize_email(&body.email))
        .await?
        .filter(|account| account.active)
        .ok_or(AuthError::InvalidCredentials)?;

    if !password::verify(&body.password, account.password_hash.as_deref()) {
        tracing::debug!(user_id = %account.id, "credentials sign-in refused");
        return Err(AuthError::InvalidCredentials);
    }

    let session = Session::start(account.id, state.session_config.duration());
    state.sessions.create(&session).await?;

    if let Err(error) = state.accounts.touch_last_login(account.id).await {
        tracing::warn!(user_id = %account.id, %error, "failed to record last login");
    }

    tracing::info!(user_id = %account.id, "signed in with credentials");
    let principal = Principal::from_account(&account, CredentialSource::SessionCookie);
    let cookie = session_cookie(SESSION_COOKIE, session.token.to_string(), &state);

    Ok((
        jar.add(cookie),
        ApiSuccess::new(json!({ "user": principal })).into_response(),
    ))
}

/// Ends the session and clears both session cookies.
pub async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> impl IntoResponse {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        let token = SessionToken::from(cookie.value());
        if let Err(error) = state.sessions.delete(&token).await {
            tracing::warn!(%error, "failed to delete session on sign-out");
        }
    }

    (
        jar.add(removal(SESSION_COOKIE)).add(removal(PLATFORM_COOKIE)),
        ApiSuccess::new(json!({})).with_message("Signed out"),
    )
}

/// Completes an OAuth sign-in relayed by the sign-in gateway.
///
/// Accepted sign-ins that resolve to an account receive the signed
/// `platform_session` cookie. Non-OAuth providers pass through with no
/// cookie.
pub async fn oauth_callback(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(identity): Json<OAuthIdentity>,
) -> Result<(CookieJar, Response), AuthError> {
    let identity = identity.canonical();
    let authorized = match (state.gateway_key.as_deref(), headers.get(GATEWAY_KEY_HEADER)) {
        (Some(expected), Some(presented)) => keys_match(presented.as_bytes(), expected.as_bytes()),
        _ => false,
    };
    if !authorized {
        return Err(AuthError::GatewayKey);
    }

    let outcome = state.linker.link(&identity).await;
    let Some(user_id) = outcome.user_id() else {
        return match outcome {
            LinkOutcome::Rejected(reason) => {
                tracing::warn!(provider = %identity.provider, %reason, "OAuth sign-in rejected");
                Err(AuthError::SignInRejected)
            }
            _ => Ok((jar, ApiSuccess::new(json!({ "linked": false })).into_response())),
        };
    };

    let payload = TokenPayload::new(user_id, &identity.email)
        .with_type(TokenType::Session)
        .with_name(identity.display_name())
        .with_picture(identity.avatar())
        .with_provider(Some(identity.provider.clone()));
    let token = state.platform_tokens.issue(&payload)?;

    let created = matches!(outcome, LinkOutcome::Created(_));
    Ok((
        jar.add(session_cookie(PLATFORM_COOKIE, token, &state)),
        ApiSuccess::new(json!({ "linked": true, "userId": user_id, "created": created }))
            .into_response(),
    ))
}

/// Sign-in route errors.
#[derive(Debug)]
pub enum AuthError {
    InvalidCredentials,
    GatewayKey,
    SignInRejected,
    Store(StoreError),
    Token(TokenError),
}

impl From<StoreError> for AuthError {
    fn from(error: StoreError) -> Self {
        Self::Store(error)
    }
}

impl From<TokenError> for AuthError {
    fn from(error: TokenError) -> Self {
        Self::Token(error)
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::InvalidCredentials => (StatusCode::UNAUTHORIZED, INVALID_CREDENTIALS),
            Self::GatewayKey => (StatusCode::UNAUTHORIZED, "Invalid gateway key"),
            Self::SignInRejected => (StatusCode::FORBIDDEN, "Sign-in rejected"),
            Self::Store(error) => {
                tracing::error!(%error, "sign-in storage failure");
                (StatusCode::INTERNAL_SERVER_ERROR, REDACTED)
            }
            Self::Token(error) => {
                tracing::error!(%error, "failed to issue platform session");
                (StatusCode::INTERNAL_SERVER_ERROR, REDACTED)
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_keys_match_only_when_identical() {
        assert!(keys_match(b"gateway-secret", b"gateway-secret"));
        assert!(!keys_match(b"gateway-secreT", b"gateway-secret"));
        assert!(!keys_match(b"gateway", b"gateway-secret"));
        assert!(!keys_match(b"", b"gateway-secret"));
    }
}
