//! Room & Document Store
//!
//! Persistence for rooms and their shared documents. The hub only ever
//! talks to the [`RoomStore`] trait; two implementations are provided:
//!
//! - [`SqliteStore`]: durable, SQLite-backed (default)
//! - [`MemoryStore`]: volatile, in-process (tests, `storage.in_memory`)
//!
//! Each room owns exactly one document. `save_document` is a full
//! replacement: the last write wins.

mod error;
mod memory;
mod sqlite;
mod types;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use types::{
    generate_room_id, Document, Room, RoomId, DEFAULT_LANGUAGE, ROOM_ID_LEN, WELCOME_CODE,
};

use async_trait::async_trait;

/// Attempts at finding an unused room id before giving up
pub(crate) const MAX_ID_ATTEMPTS: usize = 5;

/// Persistence surface consumed by the hub and the HTTP API
#[async_trait]
pub trait RoomStore: Send + Sync {
    /// Create a room seeded with the welcome document
    async fn create_room(&self) -> StoreResult<Room>;

    /// Fetch room metadata
    async fn get_room(&self, room_id: &str) -> StoreResult<Option<Room>>;

    /// Check whether a room has been created
    async fn room_exists(&self, room_id: &str) -> StoreResult<bool> {
        Ok(self.get_room(room_id).await?.is_some())
    }

    /// Load the room's current document
    async fn load_document(&self, room_id: &str) -> StoreResult<Option<Document>>;

    /// Replace the room's document
    async fn save_document(
        &self,
        room_id: &str,
        code: &str,
        language: &str,
    ) -> StoreResult<Document>;
}
