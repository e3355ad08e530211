//! Room Routes
//!
//! - POST /api/rooms - Create a room
//! - GET /api/rooms/:room_id - Room details and current document

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::api::dto::{RoomCreatedResponse, RoomResponse};
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;

/// POST /api/rooms
///
/// Create a new collaboration room seeded with the welcome document.
pub async fn create_room(
    State(state): State<Arc<AppState>>,
) -> ApiResult<(StatusCode, Json<RoomCreatedResponse>)> {
    let room = state.store.create_room().await?;

    Ok((
        StatusCode::CREATED,
        Json(RoomCreatedResponse {
            room_id: room.id,
            created_at: room.created_at,
        }),
    ))
}

/// GET /api/rooms/:room_id
///
/// Room metadata, current document and live presence count.
pub async fn get_room(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
) -> ApiResult<Json<RoomResponse>> {
    let room = state
        .store
        .get_room(&room_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Room {} not found", room_id)))?;

    let document = state.store.load_document(&room.id).await?;
    let (code, language) = match document {
        Some(doc) => (doc.code, doc.language),
        None => (String::new(), state.hub.config().default_language.clone()),
    };

    Ok(Json(RoomResponse {
        connection_count: state.hub.connection_count(&room.id).await,
        room_id: room.id,
        created_at: room.created_at,
        code,
        language,
    }))
}
