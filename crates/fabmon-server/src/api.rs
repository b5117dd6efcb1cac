pub mod alarms;

use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use fabmon_alarm::error::AlarmError;
use fabmon_storage::AlarmStore;
use serde::Serialize;
use serde_json::Value;

/// API response envelope. `err_code` is 0 on success.
#[derive(Serialize)]
pub struct ApiResponse<T>
where
    T: Serialize,
{
    pub err_code: i32,
    pub err_msg: String,
    pub trace_id: String,
    pub data: Option<T>,
}

pub fn success_response<T>(status: StatusCode, trace_id: &str, data: T) -> Response
where
    T: Serialize,
{
    (
        status,
        Json(ApiResponse {
            err_code: 0,
            err_msg: "success".to_string(),
            trace_id: trace_id.to_string(),
            data: Some(data),
        }),
    )
        .into_response()
}

fn to_custom_error_code(code: &str) -> i32 {
    match code {
        "bad_request" => 1001,
        "not_found" => 1004,
        "conflict" => 1005,
        "already_acknowledged" => 1101,
        "nothing_updated" => 1102,
        "id_exhausted" => 1103,
        "snapshot_unavailable" => 1104,
        "internal_error" => 1500,
        "storage_error" => 1501,
        _ => 1999,
    }
}

pub fn error_response(status: StatusCode, trace_id: &str, code: &str, msg: &str) -> Response {
    (
        status,
        Json(ApiResponse::<Value> {
            err_code: to_custom_error_code(code),
            err_msg: msg.to_string(),
            trace_id: trace_id.to_string(),
            data: None,
        }),
    )
        .into_response()
}

/// Map an engine error onto the response envelope.
pub fn alarm_error_response(trace_id: &str, err: &AlarmError) -> Response {
    let (status, code) = match err {
        AlarmError::Validation(_) => (StatusCode::BAD_REQUEST, "bad_request"),
        AlarmError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
        AlarmError::IdExhausted { .. } => (StatusCode::CONFLICT, "id_exhausted"),
        AlarmError::AlreadyAcknowledged(_) => (StatusCode::CONFLICT, "already_acknowledged"),
        AlarmError::NothingUpdated => (StatusCode::NOT_FOUND, "nothing_updated"),
        AlarmError::SnapshotUnavailable(_) => {
            (StatusCode::SERVICE_UNAVAILABLE, "snapshot_unavailable")
        }
        AlarmError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
    };
    if status.is_server_error() {
        tracing::error!(error = %err, "Request failed");
    }
    error_response(status, trace_id, code, &err.to_string())
}

#[derive(Serialize)]
struct HealthResponse {
    version: String,
    uptime_secs: i64,
    config_count: u64,
    storage_status: String,
}

async fn health(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let uptime = (Utc::now() - state.start_time).num_seconds();
    let (config_count, storage_status) = match state.store.count_alarm_configs() {
        Ok(count) => (count, "ok".to_string()),
        Err(e) => {
            tracing::error!(error = %e, "Health check storage probe failed");
            (0, "error".to_string())
        }
    };
    success_response(
        StatusCode::OK,
        &trace_id,
        HealthResponse {
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_secs: uptime,
            config_count,
            storage_status,
        },
    )
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .merge(alarms::alarm_routes())
}
