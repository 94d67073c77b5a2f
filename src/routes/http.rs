// JSON handlers: version, login, actions, action logs, summaries, telemetry query, metrics

use axum::{
    Json,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::AppState;
use crate::dispatcher::DispatchError;
use crate::models::ActionRequest;
use crate::query::{TelemetryQuery, run_query};
use crate::version::{NAME, VERSION};

const DEFAULT_ACTION_LOG_LIMIT: u32 = 10;
const MAX_ACTION_LOG_LIMIT: u32 = 1000;

fn error_response(status: StatusCode, message: impl std::fmt::Display) -> Response {
    (status, Json(json!({ "error": message.to_string() }))).into_response()
}

/// GET /version: returns service name and version (from Cargo.toml at build time).
pub(super) async fn version_handler() -> impl IntoResponse {
    Json(json!({
        "name": NAME,
        "version": VERSION,
    }))
}

#[derive(Debug, Deserialize)]
pub(super) struct LoginRequest {
    user_id: Option<String>,
    password: Option<String>,
}

/// POST /api/login: 200 `{success, user_id}` when the credentials match a stored user, else 401.
pub(super) async fn login_handler(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Response {
    let (Some(user_id), Some(password)) = (body.user_id, body.password) else {
        return error_response(StatusCode::UNAUTHORIZED, "Invalid credentials");
    };
    match state.credentials.authenticate(&user_id, &password).await {
        Ok(Some(user)) => Json(json!({ "success": true, "user_id": user.user_id })).into_response(),
        Ok(None) => {
            debug!(user_id = %user_id, "login rejected");
            error_response(StatusCode::UNAUTHORIZED, "Invalid credentials")
        }
        Err(e) => {
            warn!(error = %e, operation = "authenticate", "credential lookup failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e)
        }
    }
}

/// POST /api/actions: 200 with the upstream response, 400 when rejected, 502 when the
/// management API call failed.
pub(super) async fn actions_handler(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Response {
    let request = match ActionRequest::from_json(body) {
        Ok(r) => r,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e),
    };
    match state.dispatcher.dispatch(request).await {
        Ok(result) => Json(result).into_response(),
        Err(DispatchError::InvalidAction(e)) => error_response(StatusCode::BAD_REQUEST, e),
        Err(DispatchError::Upstream(e)) => (
            StatusCode::BAD_GATEWAY,
            Json(json!({
                "error": e.to_string(),
                "upstream_status": e.audit_status(),
                "upstream_response": e.audit_response(),
            })),
        )
            .into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct ActionLogsParams {
    limit: Option<u32>,
    actor: Option<String>,
}

/// GET /api/action_logs?limit=N&actor=..: persisted audit records, newest first.
pub(super) async fn action_logs_handler(
    State(state): State<AppState>,
    Query(params): Query<ActionLogsParams>,
) -> Response {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_ACTION_LOG_LIMIT)
        .min(MAX_ACTION_LOG_LIMIT);
    match state
        .audit
        .store()
        .recent_actions(limit, params.actor.as_deref())
        .await
    {
        Ok(records) => Json(json!({ "action_logs": records })).into_response(),
        Err(e) => {
            warn!(error = %e, operation = "recent_actions", "action log query failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e)
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct SummaryRange {
    start: i64,
    end: i64,
}

/// GET /api/summaries?start=..&end=.. (unix seconds)
pub(super) async fn summaries_handler(
    State(state): State<AppState>,
    Query(range): Query<SummaryRange>,
) -> Response {
    if range.start > range.end {
        return error_response(
            StatusCode::BAD_REQUEST,
            format!("start ({}) is after end ({})", range.start, range.end),
        );
    }
    match state.summaries.summaries_between(range.start, range.end).await {
        Ok(summaries) => Json(json!({ "summaries": summaries })).into_response(),
        Err(e) => {
            warn!(error = %e, operation = "summaries_between", "summary query failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e)
        }
    }
}

/// POST /api/telemetry/query: summaries in range, plus raw archives when asked for.
pub(super) async fn telemetry_query_handler(
    State(state): State<AppState>,
    Json(query): Json<TelemetryQuery>,
) -> Response {
    if query.start_time > query.end_time {
        return error_response(
            StatusCode::BAD_REQUEST,
            format!(
                "start_time ({}) is after end_time ({})",
                query.start_time, query.end_time
            ),
        );
    }
    match run_query(state.summaries.as_ref(), state.archive.as_ref(), &query).await {
        Ok(result) => Json(result).into_response(),
        Err(e) => {
            warn!(error = %e, operation = "telemetry_query", "telemetry query failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e)
        }
    }
}

/// GET /metrics: takes a fresh snapshot on every scrape, then renders the gauges.
pub(super) async fn metrics_handler(State(state): State<AppState>) -> Response {
    let snapshot = state.aggregator.collect_snapshot().await;
    state.metrics.observe(&snapshot);
    match state.metrics.render() {
        Ok(text) => (
            [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
            text,
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, operation = "render_metrics", "metrics encoding failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e)
        }
    }
}
