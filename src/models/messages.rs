use serde::{Deserialize, Serialize};
use serde_json::Value;
use crate::models::{Participant, UserInfo};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoomMessage {
    pub room_id: String,
    pub user: UserInfo,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TextChangeMessage {
    pub room_id: String,
    pub content: String,
    #[serde(default)]
    pub cursor_pos: Value,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CursorUpdateMessage {
    pub room_id: String,
    pub cursor_pos: Value,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InitMessage {
    pub content: String,
    pub users: Vec<Participant>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TextUpdateMessage {
    pub content: String,
    pub user_id: String,
    pub cursor_pos: Value,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CursorMoveMessage {
    pub user_id: String,
    pub cursor_pos: Value,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UserLeftMessage {
    pub id: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    InvalidPayload,
    NotJoined,
    RoomMismatch,
    AlreadyJoined,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ErrorMessage {
    pub kind: ErrorKind,
    pub message: String,
}

/// Frames a client may send. Every frame is an `{"event": .., "data": ..}` envelope.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "event", content = "data")]
pub enum ReceivedMessage {
    #[serde(rename = "join-room")]
    JoinRoom(JoinRoomMessage),
    #[serde(rename = "text-change")]
    TextChange(TextChangeMessage),
    #[serde(rename = "cursor-update")]
    CursorUpdate(CursorUpdateMessage),
}

/// Frames the server pushes to clients.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "event", content = "data")]
pub enum SendMessage {
    #[serde(rename = "init")]
    Init(InitMessage),
    #[serde(rename = "user-joined")]
    UserJoined(Participant),
    #[serde(rename = "users-update")]
    UsersUpdate(Vec<Participant>),
    #[serde(rename = "text-update")]
    TextUpdate(TextUpdateMessage),
    #[serde(rename = "cursor-move")]
    CursorMove(CursorMoveMessage),
    #[serde(rename = "user-left")]
    UserLeft(UserLeftMessage),
    #[serde(rename = "error")]
    Error(ErrorMessage),
}
