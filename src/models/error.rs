use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::models::{ErrorKind, ErrorMessage};

/// Response for an error
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub code: u16,
    pub status: String,
    pub error: String,
}

/// Protocol-level failures. Each one is reported back to the offending
/// connection only and leaves room state untouched.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
    #[error("connection has not joined a room")]
    NotJoined,
    #[error("connection is bound to room '{bound}', not '{requested}'")]
    RoomMismatch { bound: String, requested: String },
    #[error("connection already joined room '{0}'")]
    AlreadyJoined(String),
    #[error("room '{0}' no longer exists")]
    RoomNotFound(String),
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::InvalidPayload(_) => ErrorKind::InvalidPayload,
            SessionError::NotJoined | SessionError::RoomNotFound(_) => ErrorKind::NotJoined,
            SessionError::RoomMismatch { .. } => ErrorKind::RoomMismatch,
            SessionError::AlreadyJoined(_) => ErrorKind::AlreadyJoined,
        }
    }

    pub fn to_message(&self) -> ErrorMessage {
        ErrorMessage {
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(e: serde_json::Error) -> Self {
        SessionError::InvalidPayload(e.to_string())
    }
}
