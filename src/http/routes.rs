use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Recording control
        .route("/recorder/start", post(handlers::start_recording))
        .route("/recorder/pause", post(handlers::pause_recording))
        .route("/recorder/resume", post(handlers::resume_recording))
        .route("/recorder/stop", post(handlers::stop_recording))
        // Playback control
        .route("/recorder/play", post(handlers::start_playback))
        .route("/recorder/stop-playback", post(handlers::stop_playback))
        // Observable state and listings
        .route("/recorder/state", get(handlers::get_state))
        .route("/recordings", get(handlers::list_recordings))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
