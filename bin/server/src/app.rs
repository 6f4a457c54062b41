//! HTTP routes.

use axum::{
    Json, Router,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use querydeck_core::UserId;
use querydeck_instrumentation::{
    QueryHistoryEntry, QueryTimer, QueryType, Timing, classify, spawn_log_history,
};
use querydeck_platform_access::{
    AccessError, Account, AccountStore, Principal, TokenCodec, TokenPayload, TokenType,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::auth::{AppState, Credentials, login, logout, oauth_callback};
use crate::db::Project;
use crate::error::{ApiError, ApiSuccess, HandlerResult};
use crate::query::{QueryError, QueryOutcome};

/// Builds the application router.
///
/// The OAuth callback is only mounted when a gateway key is configured.
pub fn router(state: Arc<AppState>) -> Router {
    let mut router = Router::new()
        .route("/health", get(health))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/api/me", get(me))
        .route("/api/tokens", post(issue_token))
        .route("/api/admin/accounts", get(list_accounts))
        .route("/api/projects/{project_id}", get(get_project))
        .route("/api/projects/{project_id}/queries", post(run_query));

    if state.gateway_key.is_some() {
        router = router.route("/auth/oauth/callback", post(oauth_callback));
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}

type RouteParams = Result<Path<HashMap<String, String>>, PathRejection>;

fn route_params(params: RouteParams) -> Result<HashMap<String, String>, String> {
    params.map(|Path(params)| params).map_err(|e| e.body_text())
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn me(State(state): State<Arc<AppState>>, Credentials(request): Credentials) -> Response {
    state
        .guard
        .plain(Some(&request), |principal| async move {
            Ok(ApiSuccess::new(json!({ "user": principal })))
        })
        .await
}

async fn issue_token(
    State(state): State<Arc<AppState>>,
    Credentials(request): Credentials,
) -> Response {
    let codec = state.api_tokens.clone();
    state
        .guard
        .plain(Some(&request), |principal| issue_api_token(codec, principal))
        .await
}

async fn issue_api_token(
    codec: TokenCodec,
    principal: Principal,
) -> HandlerResult<ApiSuccess<Value>> {
    let payload = TokenPayload::new(principal.id, principal.email)
        .with_type(TokenType::ApiToken)
        .with_name(principal.name)
        .with_picture(principal.avatar_url)
        .with_provider(principal.provider);
    let token = codec.issue(&payload)?;
    tracing::info!(user_id = %principal.id, "issued API token");

    Ok(ApiSuccess::new(json!({ "token": token, "tokenType": "Bearer" })))
}

/// Account as listed to administrators.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AccountSummary {
    id: UserId,
    email: String,
    name: Option<String>,
    provider: Option<String>,
    active: bool,
    last_login: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<Account> for AccountSummary {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            email: account.email,
            name: account.name,
            provider: account.oauth_provider,
            active: account.active,
            last_login: account.last_login,
            created_at: account.created_at,
        }
    }
}

async fn list_accounts(
    State(state): State<Arc<AppState>>,
    Credentials(request): Credentials,
) -> Response {
    let accounts = state.accounts.clone();
    state
        .guard
        .admin_only(Some(&request), |_| account_summaries(accounts))
        .await
}

async fn account_summaries(accounts: Arc<dyn AccountStore>) -> HandlerResult<ApiSuccess<Value>> {
    let summaries: Vec<AccountSummary> = accounts
        .list()
        .await?
        .into_iter()
        .map(AccountSummary::from)
        .collect();

    Ok(ApiSuccess::new(
        json!({ "count": summaries.len(), "accounts": summaries }),
    ))
}

async fn get_project(
    State(state): State<Arc<AppState>>,
    Credentials(request): Credentials,
    params: RouteParams,
) -> Response {
    state
        .guard
        .resource_owner(
            Some(&request),
            state.projects.as_ref(),
            route_params(params),
            |_, project| async move { Ok(ApiSuccess::new(json!({ "project": project }))) },
        )
        .await
}

/// Body of `POST /api/projects/{project_id}/queries`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest {
    query: String,
    #[serde(default)]
    natural_language_input: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    query_type: QueryType,
    #[serde(flatten)]
    outcome: QueryOutcome,
    #[serde(flatten)]
    timing: Timing,
}

async fn run_query(
    State(state): State<Arc<AppState>>,
    Credentials(request): Credentials,
    params: RouteParams,
    body: Result<Json<QueryRequest>, JsonRejection>,
) -> Response {
    let executor = state.clone();
    state
        .guard
        .resource_owner(
            Some(&request),
            state.projects.as_ref(),
            route_params(params),
            |principal, project| execute_query(executor, principal, project, body),
        )
        .await
}

async fn execute_query(
    state: Arc<AppState>,
    principal: Principal,
    project: Project,
    body: Result<Json<QueryRequest>, JsonRejection>,
) -> HandlerResult<Response> {
    let body = match body {
        Ok(Json(body)) if !body.query.trim().is_empty() => body,
        Ok(_) => return Ok(ApiError(AccessError::bad_request("Query is required")).into_response()),
        Err(rejection) => {
            return Ok(ApiError(AccessError::bad_request(rejection.body_text())).into_response());
        }
    };

    let query_type = classify(&body.query);
    let timer = QueryTimer::start();
    let result = state.runner.run(&project, &body.query, query_type).await;
    let timing = timer.end();

    let entry = QueryHistoryEntry::succeeded(
        project.id,
        principal.id,
        body.query,
        query_type,
        timing.execution_time_ms,
    )
    .with_natural_language(body.natural_language_input);

    match result {
        Ok(outcome) => {
            spawn_log_history(state.history.clone(), entry);
            Ok(ApiSuccess::new(QueryResponse {
                query_type,
                outcome,
                timing,
            })
            .into_response())
        }
        Err(error) => {
            spawn_log_history(state.history.clone(), entry.failed_with(error.to_string()));
            match error {
                QueryError::Execution { details } => Ok((
                    StatusCode::BAD_REQUEST,
                    Json(json!({
                        "success": false,
                        "error": details,
                        "queryType": query_type,
                        "executionTimeMs": timing.execution_time_ms,
                        "executionTimeSeconds": timing.execution_time_seconds,
                    })),
                )
                    .into_response()),
                other => Err(other.into()),
            }
        }
    }
}
