use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Summary of one live room
#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct RoomInfoResponse {
    pub id: String,
    pub n_participants: u32,
    pub content_length: u64,
    pub eviction_pending: bool,
}
