//! State Mutation Arbiter
//!
//! Applies client messages to room state. `code_update` replaces the
//! stored document and is then rebroadcast; `cursor_move` is relayed
//! without touching the store.
//!
//! Document writes in a room go through the room's sequencer, so the
//! stored document and the order of rebroadcast updates agree. The store
//! write and the broadcast are not atomic: if the process dies between
//! them, peers miss an update that was persisted.

use std::sync::Arc;

use super::broadcast::{BroadcastReport, Dispatcher};
use super::hub::HubError;
use super::messages::{ClientMessage, ServerMessage};
use super::registry::RoomRegistry;
use super::session::Session;
use crate::store::RoomStore;

pub struct Arbiter {
    registry: Arc<RoomRegistry>,
    dispatcher: Dispatcher,
    store: Arc<dyn RoomStore>,
    default_language: String,
}

impl Arbiter {
    pub fn new(
        registry: Arc<RoomRegistry>,
        dispatcher: Dispatcher,
        store: Arc<dyn RoomStore>,
        default_language: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            dispatcher,
            store,
            default_language: default_language.into(),
        }
    }

    /// Apply one message from `session`
    ///
    /// Fails with [`HubError::NotRegistered`] if the session is no longer
    /// in its room, and with [`HubError::Store`] if the write failed; in
    /// both cases nothing is broadcast.
    pub async fn apply(
        &self,
        session: &mut Session,
        message: ClientMessage,
    ) -> Result<BroadcastReport, HubError> {
        match message {
            ClientMessage::CodeUpdate {
                code,
                language,
                cursor_position,
                user_id,
            } => {
                let sequencer = self
                    .registry
                    .sequencer_for(session.room_id(), session.id())
                    .await
                    .ok_or(HubError::NotRegistered)?;

                let language = language.unwrap_or_else(|| self.default_language.clone());
                let user_id = user_id.or_else(|| session.user_id().map(str::to_owned));
                if let Some(position) = cursor_position {
                    session.set_cursor_position(position);
                }

                let _guard = sequencer.lock().await;
                let saved = self
                    .store
                    .save_document(session.room_id(), &code, &language)
                    .await?;

                tracing::debug!(
                    room_id = %session.room_id(),
                    session_id = %session.id(),
                    bytes = saved.code.len(),
                    language = %saved.language,
                    "Document replaced"
                );

                let update = ServerMessage::code_update(saved.code, cursor_position, user_id);
                Ok(self
                    .dispatcher
                    .broadcast(session.room_id(), &update, Some(session.id()))
                    .await)
            }
            ClientMessage::CursorMove {
                cursor_position,
                user_id,
            } => {
                if !self.registry.contains(session.room_id(), session.id()).await {
                    return Err(HubError::NotRegistered);
                }

                session.set_cursor_position(cursor_position);
                let user_id = user_id.or_else(|| session.user_id().map(str::to_owned));

                let moved = ServerMessage::cursor_move(cursor_position, user_id);
                Ok(self
                    .dispatcher
                    .broadcast(session.room_id(), &moved, Some(session.id()))
                    .await)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Document, MemoryStore, Room, StoreError, StoreResult};
    use crate::websocket::hub::{Hub, HubConfig};
    use async_trait::async_trait;

    async fn setup() -> (Hub, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        store.insert_room("r1").await;
        let hub = Hub::new(store.clone(), HubConfig::default());
        (hub, store)
    }

    #[tokio::test]
    async fn test_code_update_persists_and_broadcasts() {
        let (hub, store) = setup().await;
        let (mut a, mut rx_a) = hub.join("r1", Some("alice".to_string())).await.unwrap();
        let (b, mut rx_b) = hub.join("r1", None).await.unwrap();
        while rx_a.try_recv().is_ok() {}
        rx_b.try_recv().unwrap();

        let report = hub
            .arbiter()
            .apply(
                &mut a,
                ClientMessage::CodeUpdate {
                    code: "x = 1".to_string(),
                    language: None,
                    cursor_position: Some(5),
                    user_id: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(report.delivered, 1);
        assert_eq!(a.cursor_position(), Some(5));

        match rx_b.try_recv().unwrap() {
            ServerMessage::CodeUpdate {
                code,
                cursor_position,
                user_id,
                ..
            } => {
                assert_eq!(code, "x = 1");
                assert_eq!(cursor_position, Some(5));
                assert_eq!(user_id.as_deref(), Some("alice"));
            }
            other => panic!("Expected CodeUpdate, got {:?}", other),
        }
        assert!(rx_a.try_recv().is_err());

        let doc = store.load_document("r1").await.unwrap().unwrap();
        assert_eq!(doc.code, "x = 1");
        assert_eq!(doc.language, "python");

        a.leave().await;
        b.leave().await;
    }

    #[tokio::test]
    async fn test_cursor_move_is_not_persisted() {
        let (hub, store) = setup().await;
        let before = store.load_document("r1").await.unwrap().unwrap();

        let (mut a, _rx_a) = hub.join("r1", None).await.unwrap();
        let (b, mut rx_b) = hub.join("r1", None).await.unwrap();
        rx_b.try_recv().unwrap();

        hub.arbiter()
            .apply(
                &mut a,
                ClientMessage::CursorMove {
                    cursor_position: 12,
                    user_id: Some("bob".to_string()),
                },
            )
            .await
            .unwrap();

        assert!(matches!(
            rx_b.try_recv().unwrap(),
            ServerMessage::CursorMove { cursor_position: Some(12), .. }
        ));
        assert_eq!(a.cursor_position(), Some(12));
        assert_eq!(store.load_document("r1").await.unwrap().unwrap(), before);

        a.leave().await;
        b.leave().await;
    }

    #[tokio::test]
    async fn test_evicted_session_cannot_write() {
        let (hub, store) = setup().await;
        let (mut a, _rx_a) = hub.join("r1", None).await.unwrap();
        hub.registry().unregister("r1", a.id()).await;

        let result = hub
            .arbiter()
            .apply(
                &mut a,
                ClientMessage::CodeUpdate {
                    code: "lost".to_string(),
                    language: None,
                    cursor_position: None,
                    user_id: None,
                },
            )
            .await;
        assert!(matches!(result, Err(HubError::NotRegistered)));
        assert_ne!(store.load_document("r1").await.unwrap().unwrap().code, "lost");

        a.leave().await;
    }

    /// Store whose writes always fail
    struct ReadOnlyStore(MemoryStore);

    #[async_trait]
    impl RoomStore for ReadOnlyStore {
        async fn create_room(&self) -> StoreResult<Room> {
            self.0.create_room().await
        }
        async fn get_room(&self, room_id: &str) -> StoreResult<Option<Room>> {
            self.0.get_room(room_id).await
        }
        async fn load_document(&self, room_id: &str) -> StoreResult<Option<Document>> {
            self.0.load_document(room_id).await
        }
        async fn save_document(&self, _: &str, _: &str, _: &str) -> StoreResult<Document> {
            Err(StoreError::Lock("read-only".to_string()))
        }
    }

    #[tokio::test]
    async fn test_store_failure_skips_broadcast() {
        let inner = MemoryStore::new();
        inner.insert_room("r1").await;
        let hub = Hub::new(Arc::new(ReadOnlyStore(inner)), HubConfig::default());

        let (mut a, _rx_a) = hub.join("r1", None).await.unwrap();
        let (b, mut rx_b) = hub.join("r1", None).await.unwrap();
        rx_b.try_recv().unwrap();

        let result = hub
            .arbiter()
            .apply(
                &mut a,
                ClientMessage::CodeUpdate {
                    code: "x".to_string(),
                    language: None,
                    cursor_position: None,
                    user_id: None,
                },
            )
            .await;
        assert!(matches!(result, Err(HubError::Store(_))));
        assert!(rx_b.try_recv().is_err());

        a.leave().await;
        b.leave().await;
    }
}
