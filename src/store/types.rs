//! Store data types
//!
//! Rooms and their shared documents. One document per room.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Opaque room identifier, issued by the store
pub type RoomId = String;

/// Language assigned to new rooms and to updates that omit one
pub const DEFAULT_LANGUAGE: &str = "python";

/// Code a freshly created room starts with
pub const WELCOME_CODE: &str =
    "# Welcome to the collaborative coding room!\n# Start typing...\n";

/// Length of generated room ids (short enough to share by hand)
pub const ROOM_ID_LEN: usize = 8;

/// A collaboration room
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Room {
    pub id: RoomId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Current shared document of a room
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Document {
    pub room_id: RoomId,
    pub code: String,
    pub language: String,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub fn new(
        room_id: impl Into<RoomId>,
        code: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            room_id: room_id.into(),
            code: code.into(),
            language: language.into(),
            updated_at: Utc::now(),
        }
    }

    /// The document every new room is seeded with
    pub fn welcome(room_id: impl Into<RoomId>) -> Self {
        Self::new(room_id, WELCOME_CODE, DEFAULT_LANGUAGE)
    }
}

/// Generate a short room id from a v4 UUID
pub fn generate_room_id() -> RoomId {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(ROOM_ID_LEN);
    id
}

/// Convert stored milliseconds back to a UTC timestamp
pub(crate) fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(ms).unwrap_or_default()
}
