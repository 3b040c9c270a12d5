//! API route definitions.

use std::path::PathBuf;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use super::state::AppState;
use crate::artifact::Artifact;
use crate::tester::LoadTestError;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/runs", post(start_run))
        .route("/runs/current", get(current_run).delete(clear_run))
        .route("/runs/current/summary", get(current_summary))
        .route("/runs/current/outcomes", get(current_outcomes))
        .route("/runs/current/stop", post(stop_run))
}

/// Errors surfaced to API clients as `{ "error": ... }` with a status code.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Conflict(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::Conflict(m) => (StatusCode::CONFLICT, m),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<LoadTestError> for ApiError {
    fn from(e: LoadTestError) -> Self {
        match e {
            LoadTestError::ZeroRequests => ApiError::BadRequest(e.to_string()),
            LoadTestError::RunInProgress => ApiError::Conflict(e.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct StartRunRequest {
    /// Artifact file on the host running poolprobe.
    path: PathBuf,
    #[serde(default = "default_count")]
    count: u32,
}

fn default_count() -> u32 {
    5
}

async fn health() -> Json<Value> {
    Json(json!({
        "data": {
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION")
        },
        "meta": {
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "version": env!("CARGO_PKG_VERSION")
        }
    }))
}

async fn start_run(
    State(state): State<AppState>,
    Json(req): Json<StartRunRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    state.limits.check(req.count).map_err(ApiError::BadRequest)?;

    let artifact = Artifact::from_path(&req.path)
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let mut tester = state.tester.write().await;
    let run_id = tester.try_start(artifact, req.count)?;
    tracing::info!(%run_id, count = req.count, "run started via API");

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "data": { "run_id": run_id, "total": req.count } })),
    ))
}

async fn current_run(State(state): State<AppState>) -> Json<Value> {
    let tester = state.tester.read().await;
    Json(json!({
        "data": tester.snapshot(),
        "meta": { "run_id": tester.run_id(), "running": tester.is_running() }
    }))
}

async fn current_summary(State(state): State<AppState>) -> Json<Value> {
    let tester = state.tester.read().await;
    let snapshot = tester.snapshot();
    Json(json!({
        "data": {
            "summary": snapshot.summary,
            "total_elapsed_ms": snapshot.total_elapsed_ms,
            "average_duration_ms": snapshot.average_duration_ms,
            "completion_fraction": snapshot.completion_fraction,
        },
        "meta": { "run_id": tester.run_id(), "running": tester.is_running() }
    }))
}

async fn current_outcomes(State(state): State<AppState>) -> Json<Value> {
    let outcomes = state.tester.read().await.outcomes();
    Json(json!({ "data": outcomes, "meta": { "total": outcomes.len() } }))
}

async fn stop_run(State(state): State<AppState>) -> Json<Value> {
    let stopped = state.tester.read().await.stop();
    Json(json!({
        "data": { "stop_requested": stopped },
        "meta": { "message": "in-flight attempts are not aborted" }
    }))
}

async fn clear_run(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    let mut tester = state.tester.write().await;
    if tester.is_running() {
        return Err(ApiError::Conflict(
            "cannot clear results while a run is in progress".to_string(),
        ));
    }
    tester.clear();
    Ok(StatusCode::NO_CONTENT)
}
