//! WebSocket Message Types
//!
//! Defines the wire protocol between editor clients and the hub, and the
//! codec that turns text frames into [`ClientMessage`] values.
//!
//! Every frame is a JSON object tagged by its `type` field. Field names on
//! the wire are camelCase.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Full replacement of the room's document
    #[serde(rename_all = "camelCase")]
    CodeUpdate {
        /// Complete document text
        code: String,
        #[serde(default)]
        language: Option<String>,
        #[serde(default)]
        cursor_position: Option<i64>,
        #[serde(default)]
        user_id: Option<String>,
    },
    /// Ephemeral cursor movement
    #[serde(rename_all = "camelCase")]
    CursorMove {
        cursor_position: i64,
        #[serde(default)]
        user_id: Option<String>,
    },
}

impl ClientMessage {
    /// Every `type` tag a client may send
    pub const KINDS: &'static [&'static str] = &["code_update", "cursor_move"];

    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::CodeUpdate { .. } => "code_update",
            ClientMessage::CursorMove { .. } => "cursor_move",
        }
    }
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Room snapshot sent once to a newly joined session
    #[serde(rename_all = "camelCase")]
    Init {
        code: String,
        language: String,
        connection_count: usize,
    },
    /// Another session replaced the document
    #[serde(rename_all = "camelCase")]
    CodeUpdate {
        code: String,
        cursor_position: Option<i64>,
        user_id: Option<String>,
        timestamp: String,
    },
    /// Another session moved its cursor
    #[serde(rename_all = "camelCase")]
    CursorMove {
        cursor_position: Option<i64>,
        user_id: Option<String>,
        timestamp: String,
    },
    /// A session joined the room
    #[serde(rename_all = "camelCase")]
    UserJoined {
        connection_count: usize,
        timestamp: String,
    },
    /// A session left the room
    #[serde(rename_all = "camelCase")]
    UserLeft {
        connection_count: usize,
        timestamp: String,
    },
    /// Protocol error, sent only to the offending session
    Error {
        message: String,
    },
}

impl ServerMessage {
    pub fn init(
        code: impl Into<String>,
        language: impl Into<String>,
        connection_count: usize,
    ) -> Self {
        ServerMessage::Init {
            code: code.into(),
            language: language.into(),
            connection_count,
        }
    }

    pub fn code_update(
        code: impl Into<String>,
        cursor_position: Option<i64>,
        user_id: Option<String>,
    ) -> Self {
        ServerMessage::CodeUpdate {
            code: code.into(),
            cursor_position,
            user_id,
            timestamp: now_timestamp(),
        }
    }

    pub fn cursor_move(cursor_position: i64, user_id: Option<String>) -> Self {
        ServerMessage::CursorMove {
            cursor_position: Some(cursor_position),
            user_id,
            timestamp: now_timestamp(),
        }
    }

    pub fn user_joined(connection_count: usize) -> Self {
        ServerMessage::UserJoined {
            connection_count,
            timestamp: now_timestamp(),
        }
    }

    pub fn user_left(connection_count: usize) -> Self {
        ServerMessage::UserLeft {
            connection_count,
            timestamp: now_timestamp(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::Init { .. } => "init",
            ServerMessage::CodeUpdate { .. } => "code_update",
            ServerMessage::CursorMove { .. } => "cursor_move",
            ServerMessage::UserJoined { .. } => "user_joined",
            ServerMessage::UserLeft { .. } => "user_left",
            ServerMessage::Error { .. } => "error",
        }
    }
}

/// Server timestamp: RFC 3339, UTC, millisecond precision
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Errors produced while decoding or encoding frames
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Invalid message format: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("Message is missing its \"type\" field")]
    MissingType,

    #[error("Unknown message type: {0}")]
    UnknownType(String),

    #[error("Failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Decode a text frame into a client message
///
/// Distinguishes an unknown `type` from a known type with bad fields so
/// the client gets a precise error back.
pub fn decode(text: &str) -> Result<ClientMessage, CodecError> {
    let value: serde_json::Value = serde_json::from_str(text).map_err(CodecError::Malformed)?;

    let kind = value
        .get("type")
        .and_then(serde_json::Value::as_str)
        .ok_or(CodecError::MissingType)?;
    if !ClientMessage::KINDS.contains(&kind) {
        return Err(CodecError::UnknownType(kind.to_string()));
    }

    serde_json::from_value(value).map_err(CodecError::Malformed)
}

/// Encode a server message as a text frame
pub fn encode(message: &ServerMessage) -> Result<String, CodecError> {
    serde_json::to_string(message).map_err(CodecError::Encode)
}
