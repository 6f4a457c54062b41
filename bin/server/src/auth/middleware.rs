//! Route guards and the credentials extractor.
//!
//! A [`Guard`] wraps a handler: it resolves the caller, applies the
//! route's rule, and only then invokes the handler. Every failure before
//! the handler renders as `{"error": message}`; the handler never runs.
//! Errors and panics raised by the handler itself become the 500 envelope.

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{
        header::{AUTHORIZATION, COOKIE},
        request::Parts,
    },
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::Cookie;
use futures::FutureExt;
use querydeck_core::UserId;
use querydeck_platform_access::{
    AccessError, AdminAllowList, AuthRequest, IdentityResolver, Principal, StoreError,
};
use std::collections::HashMap;
use std::convert::Infallible;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use crate::error::{ApiError, HandlerError, HandlerResult, REDACTED};

pub const ADMIN_REQUIRED: &str = "Unauthorized. Admin access required.";

/// Route parameter and display label of an owned resource type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceKind {
    pub param: &'static str,
    pub label: &'static str,
}

/// Lookup of resources scoped to their owner.
#[async_trait]
pub trait OwnedResources: Send + Sync {
    type Resource: Send;

    fn kind(&self) -> ResourceKind;

    /// Returns the resource with `id` only if `owner` owns it. Unknown ids,
    /// malformed ids, and resources owned by someone else all yield `None`.
    async fn find_owned(
        &self,
        id: &str,
        owner: UserId,
    ) -> Result<Option<Self::Resource>, StoreError>;
}

/// Authentication and authorization around handlers.
#[derive(Clone)]
pub struct Guard {
    resolver: Arc<IdentityResolver>,
    admins: Arc<AdminAllowList>,
    expose_errors: bool,
}

impl Guard {
    pub fn new(resolver: IdentityResolver, admins: AdminAllowList, expose_errors: bool) -> Self {
        Self {
            resolver: Arc::new(resolver),
            admins: Arc::new(admins),
            expose_errors,
        }
    }

    /// Requires any authenticated caller.
    pub async fn plain<H, Fut, T>(&self, request: Option<&AuthRequest>, handler: H) -> Response
    where
        H: FnOnce(Principal) -> Fut,
        Fut: Future<Output = HandlerResult<T>>,
        T: IntoResponse,
    {
        match self.resolver.resolve(request).await {
            Ok(principal) => self.invoke(async move { handler(principal).await }).await,
            Err(error) => ApiError(error).into_response(),
        }
    }

    /// Requires a caller whose email is on the admin allow-list.
    pub async fn admin_only<H, Fut, T>(&self, request: Option<&AuthRequest>, handler: H) -> Response
    where
        H: FnOnce(Principal) -> Fut,
        Fut: Future<Output = HandlerResult<T>>,
        T: IntoResponse,
    {
        let principal = match self.resolver.resolve(request).await {
            Ok(principal) => principal,
            Err(error) => return ApiError(error).into_response(),
        };

        if !self.admins.contains(&principal.email) {
            tracing::debug!(user_id = %principal.id, "admin route refused");
            return ApiError(AccessError::forbidden(ADMIN_REQUIRED)).into_response();
        }

        self.invoke(async move { handler(principal).await }).await
    }

    /// Requires a caller who owns the resource named by the route parameter.
    ///
    /// The resource is handed to the handler so it is loaded exactly once.
    /// Missing parameter is 400; absent, malformed, or foreign resources are
    /// all 404 so ownership is never disclosed.
    pub async fn resource_owner<R, H, Fut, T>(
        &self,
        request: Option<&AuthRequest>,
        resources: &R,
        params: Result<HashMap<String, String>, String>,
        handler: H,
    ) -> Response
    where
        R: OwnedResources + ?Sized,
        H: FnOnce(Principal, R::Resource) -> Fut,
        Fut: Future<Output = HandlerResult<T>>,
        T: IntoResponse,
    {
        let principal = match self.resolver.resolve(request).await {
            Ok(principal) => principal,
            Err(error) => return ApiError(error).into_response(),
        };

        let kind = resources.kind();
        let params = match params {
            Ok(params) => params,
            Err(rejection) => {
                tracing::error!(%rejection, "failed to read route parameters");
                return ApiError(AccessError::internal(REDACTED)).into_response();
            }
        };
        let Some(id) = params.get(kind.param).filter(|id| !id.trim().is_empty()) else {
            return ApiError(AccessError::bad_request(format!("{} ID is required", kind.label)))
                .into_response();
        };

        match resources.find_owned(id, principal.id).await {
            Ok(Some(resource)) => {
                self.invoke(async move { handler(principal, resource).await })
                    .await
            }
            Ok(None) => {
                ApiError(AccessError::not_found(format!("{} not found", kind.label)))
                    .into_response()
            }
            Err(error) => {
                tracing::error!(%error, resource = kind.label, "ownership lookup failed");
                ApiError(AccessError::internal(REDACTED)).into_response()
            }
        }
    }

    async fn invoke<Fut, T>(&self, handler: Fut) -> Response
    where
        Fut: Future<Output = HandlerResult<T>>,
        T: IntoResponse,
    {
        match AssertUnwindSafe(handler).catch_unwind().await {
            Ok(Ok(output)) => output.into_response(),
            Ok(Err(error)) => error.into_response(self.expose_errors),
            Err(panic) => HandlerError::from_panic(panic).into_response(self.expose_errors),
        }
    }
}

/// The request's credentials, lifted out of headers and cookies.
pub struct Credentials(pub AuthRequest);

impl<S> FromRequestParts<S> for Credentials
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let mut request = AuthRequest::new();
        // Opaque bytes are kept lossily so a malformed bearer header still
        // reaches verification instead of reading as "no header".
        if let Some(value) = parts.headers.get(AUTHORIZATION) {
            request = request.with_authorization(String::from_utf8_lossy(value.as_bytes()));
        }

        // A repeated cookie name keeps its first value.
        let cookies = parts
            .headers
            .get_all(COOKIE)
            .into_iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| Cookie::parse_encoded(pair.trim()).ok());
        for cookie in cookies {
            if request.cookie(cookie.name()).is_none() {
                request = request.with_cookie(cookie.name(), cookie.value());
            }
        }

        Ok(Credentials(request))
    }
}
