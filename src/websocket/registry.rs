//! Room Registry
//!
//! In-memory map from room id to the sessions currently joined to it.
//! A bucket is created on the first join and removed as soon as it is
//! empty, so `rooms.len()` is always the number of occupied rooms.
//!
//! A single `RwLock` guards the whole map; every mutation completes under
//! the write lock, so a concurrent [`RoomRegistry::snapshot`] never sees a
//! half-applied join or leave.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use super::session::{SessionHandle, SessionId};
use crate::store::RoomId;

/// Serializes document reads and writes within one room
pub type DocumentSequencer = Arc<Mutex<()>>;

/// Sessions of one room
struct RoomBucket {
    sessions: HashMap<SessionId, SessionHandle>,
    /// Lives exactly as long as the bucket
    sequencer: DocumentSequencer,
}

impl RoomBucket {
    fn new() -> Self {
        Self {
            sessions: HashMap::new(),
            sequencer: Arc::new(Mutex::new(())),
        }
    }
}

/// Tracks which sessions belong to which room
#[derive(Default)]
pub struct RoomRegistry {
    rooms: RwLock<HashMap<RoomId, RoomBucket>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a session to its room, creating the bucket if needed
    ///
    /// Returns the room's membership count after insertion and the room's
    /// document sequencer. Registering the same session twice is a no-op.
    pub async fn register(
        &self,
        room_id: &str,
        handle: SessionHandle,
    ) -> (usize, DocumentSequencer) {
        let mut rooms = self.rooms.write().await;
        let bucket = rooms
            .entry(room_id.to_string())
            .or_insert_with(RoomBucket::new);

        bucket.sessions.entry(handle.id()).or_insert(handle);

        (bucket.sessions.len(), Arc::clone(&bucket.sequencer))
    }

    /// Remove a session; drops the bucket when it becomes empty
    ///
    /// Returns whether the session was present.
    pub async fn unregister(&self, room_id: &str, session_id: SessionId) -> bool {
        let mut rooms = self.rooms.write().await;
        let Some(bucket) = rooms.get_mut(room_id) else {
            return false;
        };

        let removed = bucket.sessions.remove(&session_id).is_some();
        if bucket.sessions.is_empty() {
            rooms.remove(room_id);
            tracing::debug!(room_id = %room_id, "Room emptied");
        }

        removed
    }

    /// Independent copy of a room's membership
    pub async fn snapshot(&self, room_id: &str) -> Vec<SessionHandle> {
        self.rooms
            .read()
            .await
            .get(room_id)
            .map(|bucket| bucket.sessions.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of sessions in a room (0 if the room is empty)
    pub async fn count(&self, room_id: &str) -> usize {
        self.rooms
            .read()
            .await
            .get(room_id)
            .map(|bucket| bucket.sessions.len())
            .unwrap_or(0)
    }

    /// Whether `session_id` is currently joined to `room_id`
    pub async fn contains(&self, room_id: &str, session_id: SessionId) -> bool {
        self.rooms
            .read()
            .await
            .get(room_id)
            .is_some_and(|bucket| bucket.sessions.contains_key(&session_id))
    }

    /// The room's document sequencer, if `session_id` is a member
    pub async fn sequencer_for(
        &self,
        room_id: &str,
        session_id: SessionId,
    ) -> Option<DocumentSequencer> {
        let rooms = self.rooms.read().await;
        let bucket = rooms.get(room_id)?;
        bucket
            .sessions
            .contains_key(&session_id)
            .then(|| Arc::clone(&bucket.sequencer))
    }

    /// Whether a bucket exists for `room_id`
    pub async fn has_room(&self, room_id: &str) -> bool {
        self.rooms.read().await.contains_key(room_id)
    }

    /// Number of occupied rooms
    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    /// Number of sessions across all rooms
    pub async fn session_count(&self) -> usize {
        self.rooms
            .read()
            .await
            .values()
            .map(|bucket| bucket.sessions.len())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(room_id: &str) -> SessionHandle {
        SessionHandle::new(room_id, None, 8).0
    }

    #[tokio::test]
    async fn test_register_unregister() {
        let registry = RoomRegistry::new();
        let a = handle("r1");
        let b = handle("r1");

        assert_eq!(registry.register("r1", a.clone()).await.0, 1);
        assert_eq!(registry.register("r1", b.clone()).await.0, 2);
        assert_eq!(registry.count("r1").await, 2);
        assert!(registry.contains("r1", a.id()).await);

        assert!(registry.unregister("r1", a.id()).await);
        assert_eq!(registry.count("r1").await, 1);
        assert!(!registry.contains("r1", a.id()).await);
        assert!(registry.has_room("r1").await);

        assert!(registry.unregister("r1", b.id()).await);
        assert!(!registry.has_room("r1").await);
        assert_eq!(registry.room_count().await, 0);
    }

    #[tokio::test]
    async fn test_register_is_idempotent() {
        let registry = RoomRegistry::new();
        let a = handle("r1");

        registry.register("r1", a.clone()).await;
        let (count, _) = registry.register("r1", a.clone()).await;
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_unregister_absent_is_noop() {
        let registry = RoomRegistry::new();
        let a = handle("r1");

        assert!(!registry.unregister("r1", a.id()).await);
        registry.register("r1", handle("r1")).await;
        assert!(!registry.unregister("r1", a.id()).await);
        assert_eq!(registry.count("r1").await, 1);
    }

    #[tokio::test]
    async fn test_snapshot_is_a_copy() {
        let registry = RoomRegistry::new();
        let a = handle("r1");
        registry.register("r1", a.clone()).await;

        let snapshot = registry.snapshot("r1").await;
        registry.register("r1", handle("r1")).await;
        registry.unregister("r1", a.id()).await;

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id(), a.id());
        assert!(registry.snapshot("r2").await.is_empty());
    }

    #[tokio::test]
    async fn test_sequencer_requires_membership() {
        let registry = RoomRegistry::new();
        let a = handle("r1");
        let outsider = handle("r1");

        let (_, seq) = registry.register("r1", a.clone()).await;
        let found = registry.sequencer_for("r1", a.id()).await.unwrap();
        assert!(Arc::ptr_eq(&seq, &found));
        assert!(registry.sequencer_for("r1", outsider.id()).await.is_none());
        assert!(registry.sequencer_for("r2", a.id()).await.is_none());
    }

    #[tokio::test]
    async fn test_no_leak_after_concurrent_churn() {
        let registry = Arc::new(RoomRegistry::new());
        let mut tasks = Vec::new();

        for i in 0..64 {
            let registry = Arc::clone(&registry);
            tasks.push(tokio::spawn(async move {
                let room = format!("room-{}", i % 4);
                let h = handle(&room);
                registry.register(&room, h.clone()).await;
                tokio::task::yield_now().await;
                registry.unregister(&room, h.id()).await;
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(registry.room_count().await, 0);
        assert_eq!(registry.session_count().await, 0);
    }
}
