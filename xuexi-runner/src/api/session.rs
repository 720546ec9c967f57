//! Session control handlers
//!
//! POST /api/start, /api/stop, /api/pause, /api/resume; GET /api/status

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiResult;
use crate::session::{SessionSnapshot, Status};
use crate::AppState;

/// POST /api/start request
#[derive(Debug, Deserialize)]
pub struct StartRequest {
    pub tasklist: Vec<crate::session::StageKind>,
}

/// POST /api/start response
#[derive(Debug, Serialize, Deserialize)]
pub struct StartResponse {
    pub session_id: Uuid,
    pub status: Status,
}

/// Response for stop/pause/resume
#[derive(Debug, Serialize, Deserialize)]
pub struct ControlResponse {
    pub session_id: Option<Uuid>,
    pub status: Status,
}

/// POST /api/start
///
/// Spawns the session task and returns 202 Accepted immediately.
pub async fn start(
    State(state): State<AppState>,
    Json(request): Json<StartRequest>,
) -> ApiResult<(StatusCode, Json<StartResponse>)> {
    let session_id = state.sessions.start(request.tasklist).await?;
    let status = state.sessions.status().await;
    Ok((StatusCode::ACCEPTED, Json(StartResponse { session_id, status })))
}

/// POST /api/stop
///
/// Cooperative: status reads `running` until the task reaches a safe point.
pub async fn stop(State(state): State<AppState>) -> ApiResult<(StatusCode, Json<ControlResponse>)> {
    state.sessions.stop().await?;
    control_response(&state).await
}

/// POST /api/pause
pub async fn pause(State(state): State<AppState>) -> ApiResult<(StatusCode, Json<ControlResponse>)> {
    state.sessions.pause().await?;
    control_response(&state).await
}

/// POST /api/resume
pub async fn resume(State(state): State<AppState>) -> ApiResult<(StatusCode, Json<ControlResponse>)> {
    state.sessions.resume().await?;
    control_response(&state).await
}

async fn control_response(state: &AppState) -> ApiResult<(StatusCode, Json<ControlResponse>)> {
    let snapshot = state.sessions.snapshot().await;
    Ok((
        StatusCode::ACCEPTED,
        Json(ControlResponse {
            session_id: snapshot.session_id,
            status: snapshot.status,
        }),
    ))
}

/// GET /api/status
pub async fn status(State(state): State<AppState>) -> Json<SessionSnapshot> {
    Json(state.sessions.snapshot().await)
}

/// Build session control routes
pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/api/start", post(start))
        .route("/api/stop", post(stop))
        .route("/api/pause", post(pause))
        .route("/api/resume", post(resume))
        .route("/api/status", get(status))
}
