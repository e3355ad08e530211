//! Data Transfer Objects
//!
//! Request and response types for the API endpoints.
//! These types are serialized/deserialized to/from JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::DEFAULT_LANGUAGE;

// ============================================
// ROOM DTOs
// ============================================

/// Room creation response
#[derive(Debug, Serialize)]
pub struct RoomCreatedResponse {
    /// Shareable room id
    #[serde(rename = "roomId")]
    pub room_id: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// Room details with its current document
#[derive(Debug, Serialize)]
pub struct RoomResponse {
    #[serde(rename = "roomId")]
    pub room_id: String,
    pub created_at: DateTime<Utc>,
    /// Current document text
    pub code: String,
    /// Current document language
    pub language: String,
    /// Sessions currently connected to the room
    #[serde(rename = "connectionCount")]
    pub connection_count: usize,
}

// ============================================
// AUTOCOMPLETE DTOs
// ============================================

/// Autocomplete request
#[derive(Debug, Deserialize)]
pub struct AutocompleteRequest {
    /// Current code content
    pub code: String,
    /// Cursor position in the code (characters, >= 0)
    #[serde(rename = "cursorPosition")]
    pub cursor_position: usize,
    /// Programming language
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

/// Autocomplete response
#[derive(Debug, Serialize)]
pub struct AutocompleteResponse {
    pub suggestion: String,
    /// Confidence in [0, 1]
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

// ============================================
// HEALTH DTOs
// ============================================

/// Root status response
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
    pub message: String,
    pub version: String,
}

/// Full health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "healthy" or "degraded"
    pub status: String,
    /// "connected" or "error"
    pub database: String,
    /// Rooms with at least one connected session
    pub rooms: usize,
    /// Connected sessions across all rooms
    pub sessions: usize,
    pub uptime_seconds: u64,
    pub version: String,
}
