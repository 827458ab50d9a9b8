use crate::{models::{ErrorResponse, RoomInfoResponse}, AppState};
use axum::{extract::{Path, State}, http::StatusCode, Json};
use tracing::error;

/// Describe a live room without touching it
pub async fn room_info(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<(StatusCode, Json<RoomInfoResponse>), (StatusCode, Json<ErrorResponse>)> {

    let hub = state.hub.lock().await;
    let room = match hub.registry.get(&room_id) {
        Some(room) => room,
        None => {
            error!("Room '{}' not found", room_id);
            let status = StatusCode::NOT_FOUND;
            return Err((status, Json(ErrorResponse {
                code: status.as_u16(),
                status: status.to_string(),
                error: format!("Room '{}' not found", room_id),
            })));
        }
    };

    Ok((
        StatusCode::OK,
        Json(RoomInfoResponse {
            id: room.id.clone(),
            n_participants: room.participant_count() as u32,
            content_length: room.content.len() as u64,
            eviction_pending: hub.registry.is_eviction_pending(&room_id),
        }),
    ))
}
