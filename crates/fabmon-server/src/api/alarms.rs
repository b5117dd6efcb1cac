use crate::api::{alarm_error_response, error_response, success_response};
use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use fabmon_common::types::{AlarmOccurrence, AlarmResult};
use fabmon_storage::AlarmStore;
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
struct PollFailureBody {
    config_id: String,
    config_name: String,
    error: String,
}

#[derive(Serialize)]
struct PollResponse {
    results: Vec<AlarmResult>,
    failures: Vec<PollFailureBody>,
}

/// POST /v1/alarms/poll — run one evaluation cycle against the current
/// telemetry snapshot and return the firing alarms.
async fn poll(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    match state.engine.run_poll_cycle().await {
        Ok(outcome) => success_response(
            StatusCode::OK,
            &trace_id,
            PollResponse {
                results: outcome.results,
                failures: outcome
                    .failures
                    .into_iter()
                    .map(|f| PollFailureBody {
                        config_id: f.config_id,
                        config_name: f.config_name,
                        error: f.error,
                    })
                    .collect(),
            },
        ),
        Err(e) => alarm_error_response(&trace_id, &e),
    }
}

#[derive(Deserialize)]
struct AckRequest {
    action: String,
    actor: String,
}

/// POST /v1/alarms/occurrences/{id}/ack — acknowledge one occurrence with
/// an operator-chosen action.
async fn acknowledge(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<AckRequest>,
) -> impl IntoResponse {
    match state.engine.acknowledge_one(&id, &body.action, &body.actor) {
        Ok(occurrence) => success_response(StatusCode::OK, &trace_id, occurrence),
        Err(e) => alarm_error_response(&trace_id, &e),
    }
}

#[derive(Deserialize)]
struct BulkAckRequest {
    occurrence_ids: Vec<String>,
    actor: String,
}

/// POST /v1/alarms/ack — acknowledge a batch of occurrences with the
/// fixed mass-acknowledgment action.
async fn acknowledge_bulk(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Json(body): Json<BulkAckRequest>,
) -> impl IntoResponse {
    match state
        .engine
        .acknowledge_many(&body.occurrence_ids, &body.actor)
    {
        Ok(occurrences) => success_response(StatusCode::OK, &trace_id, occurrences),
        Err(e) => alarm_error_response(&trace_id, &e),
    }
}

#[derive(Deserialize)]
struct SnoozeRequest {
    occurrence_ids: Vec<String>,
    snooze: bool,
    #[serde(default)]
    duration_secs: Option<i64>,
    #[serde(default)]
    at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
struct SnoozeResponse {
    modified: usize,
}

/// POST /v1/alarms/snooze — set or clear the snooze flag on a batch of
/// occurrences.
async fn snooze(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Json(body): Json<SnoozeRequest>,
) -> impl IntoResponse {
    match state.engine.snooze(
        &body.occurrence_ids,
        body.snooze,
        body.duration_secs,
        body.at,
    ) {
        Ok(modified) => success_response(StatusCode::OK, &trace_id, SnoozeResponse { modified }),
        Err(e) => alarm_error_response(&trace_id, &e),
    }
}

/// GET /v1/alarms/ack-actions — deduplicated union of every config's
/// permitted acknowledgment actions.
async fn ack_actions(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    match state.engine.ack_actions() {
        Ok(actions) => success_response(StatusCode::OK, &trace_id, actions),
        Err(e) => alarm_error_response(&trace_id, &e),
    }
}

/// GET /v1/alarms/events — per-config occurrence rollups.
async fn list_events(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    match state.engine.list_events() {
        Ok(events) => success_response(StatusCode::OK, &trace_id, events),
        Err(e) => alarm_error_response(&trace_id, &e),
    }
}

#[derive(Deserialize)]
struct OccurrenceQuery {
    #[serde(default)]
    config_id: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    offset: Option<usize>,
}

/// GET /v1/alarms/occurrences — occurrence history, newest first,
/// optionally filtered by config.
async fn list_occurrences(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Query(params): Query<OccurrenceQuery>,
) -> Response {
    let limit = params.limit.unwrap_or(20);
    let offset = params.offset.unwrap_or(0);
    match state
        .store
        .list_occurrences(params.config_id.as_deref(), limit, offset)
    {
        Ok(occurrences) => {
            success_response::<Vec<AlarmOccurrence>>(StatusCode::OK, &trace_id, occurrences)
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to list occurrences");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "storage_error",
                "Internal query error",
            )
        }
    }
}

pub fn alarm_routes() -> Router<AppState> {
    Router::new()
        .route("/v1/alarms/poll", post(poll))
        .route("/v1/alarms/occurrences/:id/ack", post(acknowledge))
        .route("/v1/alarms/ack", post(acknowledge_bulk))
        .route("/v1/alarms/snooze", post(snooze))
        .route("/v1/alarms/ack-actions", get(ack_actions))
        .route("/v1/alarms/events", get(list_events))
        .route("/v1/alarms/occurrences", get(list_occurrences))
}
