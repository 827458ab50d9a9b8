use axum::{extract::State, http::StatusCode, Json};
use crate::{models::HealthResponse, AppState};
use tracing::debug;

/// Health check endpoint
pub async fn health_check() -> Json<HealthResponse> {
    debug!("Health check requested");
    Json(HealthResponse {
        status: "ok".to_string(),
        message: "Server is running".to_string(),
    })
}

/// Readiness check endpoint
///
/// Ready once the room hub can be locked, i.e. the message loop is not wedged.
pub async fn ready_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    debug!("Readiness check requested");
    let rooms = state.hub.lock().await.registry.room_count();
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".to_string(),
            message: format!("Service is ready ({} rooms)", rooms),
        }),
    )
}
