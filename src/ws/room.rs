use indexmap::IndexMap;

use crate::models::UserInfo;

pub type ConnectionId = String;

/// One shared document and the connections currently attached to it.
#[derive(Clone, Debug)]
pub struct Room {
    pub id: String,
    pub content: String,
    /// Keyed by connection id, kept in join order.
    pub participants: IndexMap<ConnectionId, UserInfo>,
}

impl Room {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            content: seed_content(id),
            participants: IndexMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }
}

/// Initial document of a freshly created room. Embeds the room id verbatim.
pub fn seed_content(room_id: &str) -> String {
    format!(
        r#"/**
 * Welcome to CollabPad!
 * Room: {room_id}
 *
 * Share this URL to collaborate in real-time.
 * All changes are synced instantly over WebSocket.
 */

function hello() {{
    console.log("Start coding together!");
}}

hello();"#
    )
}
