use super::state::AppState;
use crate::controller::RecorderSnapshot;
use crate::error::RecorderError;
use crate::store;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Serialize;
use tracing::error;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct CommandResponse {
    pub status: String,
    pub snapshot: RecorderSnapshot,
}

#[derive(Debug, Serialize)]
pub struct RecordingEntry {
    pub file_name: String,
    pub path: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn command_ok(state: &AppState, status: &str) -> axum::response::Response {
    (
        StatusCode::OK,
        Json(CommandResponse {
            status: status.to_string(),
            snapshot: state.controller.snapshot(),
        }),
    )
        .into_response()
}

fn command_err(err: RecorderError) -> axum::response::Response {
    let status = match &err {
        RecorderError::InvalidState { .. } => StatusCode::CONFLICT,
        RecorderError::PermissionDenied => StatusCode::FORBIDDEN,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error!("Command failed: {}", err);
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
        .into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /recorder/start
pub async fn start_recording(State(state): State<AppState>) -> impl IntoResponse {
    match state.controller.start().await {
        Ok(()) => command_ok(&state, "recording"),
        Err(e) => command_err(e),
    }
}

/// POST /recorder/pause
pub async fn pause_recording(State(state): State<AppState>) -> impl IntoResponse {
    match state.controller.pause().await {
        Ok(()) => command_ok(&state, "paused"),
        Err(e) => command_err(e),
    }
}

/// POST /recorder/resume
pub async fn resume_recording(State(state): State<AppState>) -> impl IntoResponse {
    match state.controller.resume().await {
        Ok(()) => command_ok(&state, "recording"),
        Err(e) => command_err(e),
    }
}

/// POST /recorder/stop
pub async fn stop_recording(State(state): State<AppState>) -> impl IntoResponse {
    match state.controller.stop().await {
        Ok(_) => command_ok(&state, "stopped"),
        Err(e) => command_err(e),
    }
}

/// POST /recorder/play
pub async fn start_playback(State(state): State<AppState>) -> impl IntoResponse {
    match state.controller.play().await {
        Ok(()) => command_ok(&state, "playing"),
        Err(e) => command_err(e),
    }
}

/// POST /recorder/stop-playback
pub async fn stop_playback(State(state): State<AppState>) -> impl IntoResponse {
    match state.controller.stop_playback().await {
        Ok(()) => command_ok(&state, "stopped"),
        Err(e) => command_err(e),
    }
}

/// GET /recorder/state
pub async fn get_state(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.controller.snapshot())).into_response()
}

/// GET /recordings
/// List completed recordings, newest first.
pub async fn list_recordings(State(state): State<AppState>) -> impl IntoResponse {
    match store::list_recordings(&state.recordings_dir) {
        Ok(paths) => {
            let entries: Vec<RecordingEntry> = paths
                .into_iter()
                .map(|p| RecordingEntry {
                    file_name: p
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                    path: p.display().to_string(),
                })
                .collect();
            (StatusCode::OK, Json(entries)).into_response()
        }
        Err(e) => {
            error!("Failed to list recordings: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("Failed to list recordings: {}", e),
                }),
            )
                .into_response()
        }
    }
}

/// GET /health
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
