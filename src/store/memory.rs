//! In-memory store
//!
//! Volatile implementation of [`RoomStore`]. Nothing survives a restart.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::error::{StoreError, StoreResult};
use super::types::{generate_room_id, Document, Room, RoomId};
use super::{RoomStore, MAX_ID_ATTEMPTS};

#[derive(Default)]
struct Tables {
    rooms: HashMap<RoomId, Room>,
    documents: HashMap<RoomId, Document>,
}

/// Room store backed by in-process hash maps
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a room with a caller-chosen id (fixtures)
    pub async fn insert_room(&self, room_id: impl Into<RoomId>) -> Room {
        let room_id = room_id.into();
        let now = Utc::now();
        let room = Room {
            id: room_id.clone(),
            created_at: now,
            updated_at: now,
        };

        let mut tables = self.tables.write().await;
        tables.rooms.insert(room_id.clone(), room.clone());
        tables
            .documents
            .insert(room_id.clone(), Document::welcome(room_id));
        room
    }

    pub async fn room_count(&self) -> usize {
        self.tables.read().await.rooms.len()
    }
}

#[async_trait]
impl RoomStore for MemoryStore {
    async fn create_room(&self) -> StoreResult<Room> {
        let mut tables = self.tables.write().await;

        for _ in 0..MAX_ID_ATTEMPTS {
            let id = generate_room_id();
            if tables.rooms.contains_key(&id) {
                continue;
            }

            let now = Utc::now();
            let room = Room {
                id: id.clone(),
                created_at: now,
                updated_at: now,
            };
            tables.rooms.insert(id.clone(), room.clone());
            tables.documents.insert(id.clone(), Document::welcome(id));
            return Ok(room);
        }

        Err(StoreError::IdExhausted(MAX_ID_ATTEMPTS))
    }

    async fn get_room(&self, room_id: &str) -> StoreResult<Option<Room>> {
        Ok(self.tables.read().await.rooms.get(room_id).cloned())
    }

    async fn load_document(&self, room_id: &str) -> StoreResult<Option<Document>> {
        Ok(self.tables.read().await.documents.get(room_id).cloned())
    }

    async fn save_document(
        &self,
        room_id: &str,
        code: &str,
        language: &str,
    ) -> StoreResult<Document> {
        let mut tables = self.tables.write().await;
        let room = tables
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| StoreError::RoomNotFound(room_id.to_string()))?;

        let document = Document::new(room_id, code, language);
        room.updated_at = document.updated_at;
        tables
            .documents
            .insert(room_id.to_string(), document.clone());

        Ok(document)
    }
}
