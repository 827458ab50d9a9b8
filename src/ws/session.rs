use serde_json::Value;
use tracing::{debug, info, warn};

use crate::models::{
    CursorMoveMessage, InitMessage, Participant, ReceivedMessage, SendMessage, SessionError,
    TextUpdateMessage, UserInfo, UserLeftMessage,
};
use super::hub::Hub;
use super::presence;
use super::room::ConnectionId;
use super::transport::Transport;

/// Per-connection protocol state.
///
/// A session starts unbound, becomes bound to exactly one room on its first
/// `join-room` and stays bound until the connection goes away. There is no
/// leave message; switching rooms requires a new connection.
#[derive(Debug)]
pub struct Session {
    conn_id: ConnectionId,
    room_id: Option<String>,
    user: Option<UserInfo>,
}

impl Session {
    pub fn new(conn_id: ConnectionId) -> Self {
        Self {
            conn_id,
            room_id: None,
            user: None,
        }
    }

    pub fn connection_id(&self) -> &str {
        &self.conn_id
    }

    pub fn room_id(&self) -> Option<&str> {
        self.room_id.as_deref()
    }

    pub fn user(&self) -> Option<&UserInfo> {
        self.user.as_ref()
    }

    #[cfg(test)]
    pub fn is_bound(&self) -> bool {
        self.room_id.is_some()
    }

    /// Decode one inbound text frame and act on it. Failures are reported to
    /// this connection as an `error` event.
    pub fn handle_text<T: Transport>(&mut self, hub: &mut Hub<T>, text: &str) {
        let result = serde_json::from_str::<ReceivedMessage>(text)
            .map_err(SessionError::from)
            .and_then(|msg| self.dispatch(hub, msg));

        if let Err(e) = result {
            warn!("Rejected message from connection {}: {}", self.conn_id, e);
            hub.transport.send_to(&self.conn_id, &SendMessage::Error(e.to_message()));
        }
    }

    fn dispatch<T: Transport>(&mut self, hub: &mut Hub<T>, msg: ReceivedMessage) -> Result<(), SessionError> {
        match msg {
            ReceivedMessage::JoinRoom(join) => self.join(hub, join.room_id, join.user),
            ReceivedMessage::TextChange(change) => {
                self.apply_edit(hub, &change.room_id, change.content, change.cursor_pos)
            }
            ReceivedMessage::CursorUpdate(cursor) => self.report_cursor(hub, &cursor.room_id, cursor.cursor_pos),
        }
    }

    /// Attach this connection to a room, creating the room if needed.
    ///
    /// The joiner gets `init`; everyone else gets `user-joined`; then the
    /// whole room, joiner included, gets `users-update`.
    pub fn join<T: Transport>(&mut self, hub: &mut Hub<T>, room_id: String, user: UserInfo) -> Result<(), SessionError> {
        if let Some(current) = &self.room_id {
            return Err(SessionError::AlreadyJoined(current.clone()));
        }
        let user = user.sanitized();

        let room = hub.registry.get_or_create(&room_id);
        room.participants.insert(self.conn_id.clone(), user.clone());
        let content = room.content.clone();
        let users = presence::snapshot(room);

        hub.transport.join_room(&room_id, &self.conn_id);
        hub.transport.send_to(
            &self.conn_id,
            &SendMessage::Init(InitMessage {
                content,
                users: users.clone(),
            }),
        );
        hub.transport.broadcast_to_room_except(
            &room_id,
            Some(&self.conn_id),
            &SendMessage::UserJoined(Participant {
                id: self.conn_id.clone(),
                user: user.clone(),
            }),
        );
        hub.transport
            .broadcast_to_room_except(&room_id, None, &SendMessage::UsersUpdate(users));

        info!("User {} joined room {} (connection {})", user.name, room_id, self.conn_id);
        self.room_id = Some(room_id);
        self.user = Some(user);
        Ok(())
    }

    /// Replace the room's document with `content` and relay it to the other
    /// participants. No merging: the last processed edit wins.
    pub fn apply_edit<T: Transport>(
        &mut self,
        hub: &mut Hub<T>,
        room_id: &str,
        content: String,
        cursor_pos: Value,
    ) -> Result<(), SessionError> {
        let room_id = self.bound_room(room_id)?;
        let room = hub
            .registry
            .get_mut(room_id)
            .ok_or_else(|| SessionError::RoomNotFound(room_id.to_string()))?;
        room.content.clone_from(&content);

        debug!("Room {} updated by {} ({} bytes)", room_id, self.conn_id, content.len());
        hub.transport.broadcast_to_room_except(
            room_id,
            Some(&self.conn_id),
            &SendMessage::TextUpdate(TextUpdateMessage {
                content,
                user_id: self.conn_id.clone(),
                cursor_pos,
            }),
        );
        Ok(())
    }

    /// Relay a cursor position to the other participants.
    pub fn report_cursor<T: Transport>(&self, hub: &mut Hub<T>, room_id: &str, cursor_pos: Value) -> Result<(), SessionError> {
        let room_id = self.bound_room(room_id)?;
        hub.transport.broadcast_to_room_except(
            room_id,
            Some(&self.conn_id),
            &SendMessage::CursorMove(CursorMoveMessage {
                user_id: self.conn_id.clone(),
                cursor_pos,
            }),
        );
        Ok(())
    }

    /// Detach from the bound room, if any. Safe to call more than once.
    ///
    /// Remaining participants get `user-left` followed by `users-update`. A
    /// room left empty is scheduled for eviction.
    pub fn teardown<T: Transport>(&mut self, hub: &mut Hub<T>) {
        let Some(room_id) = self.room_id.take() else {
            return;
        };
        self.user = None;
        hub.transport.leave_room(&room_id, &self.conn_id);

        let Some(room) = hub.registry.get_mut(&room_id) else {
            warn!("Room {} vanished while connection {} was attached", room_id, self.conn_id);
            return;
        };
        room.participants.shift_remove(&self.conn_id);
        let users = presence::snapshot(room);
        let now_empty = room.is_empty();

        hub.transport.broadcast_to_room_except(
            &room_id,
            None,
            &SendMessage::UserLeft(UserLeftMessage {
                id: self.conn_id.clone(),
            }),
        );
        hub.transport
            .broadcast_to_room_except(&room_id, None, &SendMessage::UsersUpdate(users));
        info!("Connection {} left room {}", self.conn_id, room_id);

        if now_empty {
            hub.registry.schedule_eviction(&room_id);
        }
    }

    fn bound_room<'a>(&'a self, requested: &str) -> Result<&'a str, SessionError> {
        match self.room_id.as_deref() {
            None => Err(SessionError::NotJoined),
            Some(bound) if bound == requested => Ok(bound),
            Some(bound) => Err(SessionError::RoomMismatch {
                bound: bound.to_string(),
                requested: requested.to_string(),
            }),
        }
    }
}
