//! HTTP request handlers.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::server::{AppState, RequestId};
use crate::error::Error;
use crate::router::{ExecutionResult, TaskRequest};
use crate::storage;

/// Response header carrying the request id.
pub const REQUEST_ID_HEADER: &str = "x-switchboard-request-id";
/// Response header naming the backend that produced the output.
pub const BACKEND_HEADER: &str = "x-switchboard-backend";
/// Response header, "true" when a fallback backend was used.
pub const FALLBACK_HEADER: &str = "x-switchboard-fallback";

/// Body of `POST /v1/execute`.
#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    #[serde(flatten)]
    pub task: TaskRequest,
    /// Run through the retry wrapper with this many attempts.
    #[serde(default)]
    pub max_retries: Option<u32>,
    /// Pin the request to one backend (always retried, never falls back).
    #[serde(default)]
    pub backend: Option<String>,
}

/// Attach backend and fallback headers to an execution response.
fn attach_execution_headers(headers: &mut HeaderMap, result: &ExecutionResult) {
    if let Some(value) = result
        .backend
        .as_deref()
        .and_then(|name| HeaderValue::from_str(name).ok())
    {
        headers.insert(BACKEND_HEADER, value);
    }
    headers.insert(
        FALLBACK_HEADER,
        HeaderValue::from_static(if result.fallback_used { "true" } else { "false" }),
    );
}

/// Handle POST /v1/execute
///
/// Without `max_retries` or `backend` this is a single fallback execution:
/// exhaustion is a 200 with `"success": false`. The retry paths signal
/// exhaustion as 502.
pub async fn execute(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(body): Json<ExecuteRequest>,
) -> Result<Response, Error> {
    tracing::info!(
        request_id = %request_id.0,
        task = %body.task.task,
        operation = ?body.task.operation,
        max_retries = ?body.max_retries,
        backend = ?body.backend,
        "Execute request"
    );

    let executor = &state.executor;
    let result = match (&body.backend, body.max_retries) {
        (Some(backend), max_retries) => {
            executor
                .execute_on_with_retry(backend, &body.task, max_retries)
                .await?
        }
        (None, Some(max_retries)) => {
            executor
                .execute_with_retry(&body.task, Some(max_retries))
                .await?
        }
        (None, None) => executor.execute_with_fallback(&body.task).await?,
    };

    tracing::info!(
        request_id = %request_id.0,
        success = result.success,
        backend = ?result.backend,
        fallback_used = result.fallback_used,
        cost = result.cost,
        "Execute completed"
    );

    let mut response = Json(&result).into_response();
    attach_execution_headers(response.headers_mut(), &result);
    Ok(response)
}

/// Handle GET /v1/providers
///
/// Backends in registration order with their live metrics and the score
/// each would get under the default criteria.
pub async fn list_providers(State(state): State<AppState>) -> impl IntoResponse {
    let executor = &state.executor;
    let providers: Vec<serde_json::Value> = executor
        .selector()
        .rank(executor.registry(), None)
        .into_iter()
        .map(|(backend, score)| {
            serde_json::json!({
                "name": backend.name(),
                "type": backend.kind(),
                "default_model": backend.default_model(),
                "embedding_model": backend.embedding_model(),
                "rate_per_1k": backend.rate_per_1k(),
                "timeout_secs": backend.timeout().as_secs_f64(),
                "metrics": backend.metrics_summary(),
                "score": score,
            })
        })
        .collect();

    Json(serde_json::json!({
        "criteria": executor.selector().default_criteria(),
        "providers": providers
    }))
}

/// Query parameters for GET /v1/stats
#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    /// Only count outcomes at or after this RFC 3339 timestamp.
    pub since: Option<String>,
}

/// Handle GET /v1/stats
///
/// Aggregates from the persisted outcome log; empty without a database.
pub async fn stats(
    State(state): State<AppState>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<serde_json::Value>, Error> {
    let since = query
        .since
        .as_deref()
        .map(|s| {
            DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| Error::InvalidRequest(format!("invalid 'since' timestamp: {}", e)))
        })
        .transpose()?;

    let rows = match &state.db {
        Some(pool) => storage::query_by_backend(pool, since).await?,
        None => Vec::new(),
    };

    Ok(Json(serde_json::json!({
        "persisted": state.db.is_some(),
        "backends": rows
    })))
}

/// Handle GET /health
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "switchboard",
        "backends": state.executor.registry().len()
    }))
}
