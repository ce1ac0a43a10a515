//! REST API module for the Wordchain server
//!
//! Read-only HTTP endpoints for operators:
//! - Health check
//! - Connection counts
//! - The current room snapshot
//!
//! Gameplay itself only happens over WebSocket.

pub mod response;

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

use crate::api::response::{ApiResponse, ServerStatus};
use crate::game::room::RoomState;
use crate::net::session::SessionState;
use crate::AppState;

/// API version prefix
pub const API_VERSION: &str = "v1";

/// Create the API router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/status", get(server_status))
        .route("/room", get(room_state));

    Router::new()
        .nest(&format!("/api/{}", API_VERSION), api_routes)
        // Add CORS middleware
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        // Add request tracing
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Connection counts
async fn server_status(State(state): State<Arc<AppState>>) -> Json<ApiResponse<ServerStatus>> {
    let counts = state.session_manager.count_by_state();
    let status = ServerStatus {
        version: crate::VERSION.to_string(),
        connections: state.session_manager.count(),
        playing: counts.get(&SessionState::Playing).copied().unwrap_or(0),
    };
    Json(ApiResponse::success("Server status", status))
}

/// Current room snapshot, fetched through the dispatcher
async fn room_state(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<RoomState>>, (StatusCode, Json<ApiResponse<RoomState>>)> {
    match state.dispatcher.snapshot().await {
        Ok(room) => Ok(Json(ApiResponse::success("Room state", room))),
        Err(e) => {
            warn!(error = %e, "Room snapshot unavailable");
            Err((
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse::failure(e.to_string())),
            ))
        }
    }
}
