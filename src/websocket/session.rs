//! Session Lifecycle
//!
//! A [`Session`] is one connection's membership in one room. It moves
//! through `Connecting -> Active -> Closing -> Closed` and the leave
//! sequence runs exactly once, whichever way the connection ends:
//!
//! - explicitly, via [`Session::leave`]
//! - implicitly, when the session is dropped (task cancelled, panic); the
//!   leave sequence is then spawned onto the current runtime
//!
//! The registry stores a cloneable [`SessionHandle`] for each session;
//! the `Session` itself is owned by the connection's task.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, Notify};
use uuid::Uuid;

use super::hub::{Hub, HubError};
use super::messages::ServerMessage;
use crate::store::RoomId;

/// Unique identifier for a session
pub type SessionId = Uuid;

/// Where a session is in its lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Registered, initial snapshot not yet delivered
    Connecting,
    /// Joined and announced to the room
    Active,
    /// Leave sequence in progress
    Closing,
    /// Terminal
    Closed,
}

/// Why a message could not be queued for a session
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("Outbound queue full")]
    QueueFull,

    #[error("Connection closed")]
    Closed,
}

/// Registry-side reference to a session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: SessionId,
    room_id: RoomId,
    user_id: Option<String>,
    outbound: mpsc::Sender<ServerMessage>,
    shutdown: Arc<Notify>,
}

impl SessionHandle {
    /// Create a handle and the receiving end of its outbound queue
    pub fn new(
        room_id: impl Into<RoomId>,
        user_id: Option<String>,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<ServerMessage>) {
        let (outbound, rx) = mpsc::channel(capacity.max(1));
        let handle = Self {
            id: Uuid::new_v4(),
            room_id: room_id.into(),
            user_id,
            outbound,
            shutdown: Arc::new(Notify::new()),
        };
        (handle, rx)
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Queue a message without waiting
    pub fn deliver(&self, message: ServerMessage) -> Result<(), DeliveryError> {
        self.outbound.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }

    /// Ask the owning task to end the session
    pub fn evict(&self) {
        self.shutdown.notify_one();
    }

    /// Resolves once [`SessionHandle::evict`] has been called
    pub fn shutdown_signal(&self) -> Arc<Notify> {
        Arc::clone(&self.shutdown)
    }
}

/// One connection's membership in a room
pub struct Session {
    handle: SessionHandle,
    state: SessionState,
    cursor_position: Option<i64>,
    hub: Hub,
}

impl Session {
    fn new(hub: Hub, handle: SessionHandle) -> Self {
        Self {
            handle,
            state: SessionState::Connecting,
            cursor_position: None,
            hub,
        }
    }

    pub fn id(&self) -> SessionId {
        self.handle.id()
    }

    pub fn room_id(&self) -> &str {
        self.handle.room_id()
    }

    /// Display id supplied when connecting
    pub fn user_id(&self) -> Option<&str> {
        self.handle.user_id()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Last cursor position reported by this session (never persisted)
    pub fn cursor_position(&self) -> Option<i64> {
        self.cursor_position
    }

    pub(crate) fn set_cursor_position(&mut self, position: i64) {
        self.cursor_position = Some(position);
    }

    /// Signal fired when the dispatcher evicts this session
    pub fn shutdown_signal(&self) -> Arc<Notify> {
        self.handle.shutdown_signal()
    }

    /// Send a message to this session only
    pub fn reply(&self, message: ServerMessage) -> Result<(), DeliveryError> {
        self.handle.deliver(message)
    }

    /// Run the join sequence
    ///
    /// On success the session is `Active`, has been sent `init`, and the
    /// rest of the room has been sent `user_joined`.
    pub(crate) async fn join(
        hub: &Hub,
        room_id: &str,
        user_id: Option<String>,
    ) -> Result<(Session, mpsc::Receiver<ServerMessage>), HubError> {
        if !hub.store().room_exists(room_id).await? {
            tracing::info!(room_id = %room_id, "Join refused: room not found");
            return Err(HubError::RoomNotFound(room_id.to_string()));
        }

        let limit = hub.config().max_connections;
        if hub.registry().session_count().await >= limit {
            tracing::warn!(room_id = %room_id, limit, "Join refused: connection limit reached");
            return Err(HubError::TooManyConnections(limit));
        }

        let (handle, outbound) =
            SessionHandle::new(room_id, user_id, hub.config().outbound_queue_capacity);
        let mut session = Session::new(hub.clone(), handle.clone());
        let (_, sequencer) = hub.registry().register(room_id, handle).await;

        // Holding the sequencer keeps concurrent updates from landing
        // between the snapshot and the init message.
        let init = {
            let seq_guard = sequencer.lock().await;
            let document = match hub.store().load_document(room_id).await {
                Ok(document) => document,
                Err(e) => {
                    tracing::error!(room_id = %room_id, error = %e, "Failed to load document");
                    drop(seq_guard);
                    session.leave().await;
                    return Err(e.into());
                }
            };

            let (code, language) = match document {
                Some(doc) => (doc.code, doc.language),
                None => (String::new(), hub.config().default_language.clone()),
            };
            let count = hub.registry().count(room_id).await;
            let init = ServerMessage::init(code, language, count);
            session.reply(init).map(|()| count)
        };

        let count = match init {
            Ok(count) => count,
            Err(e) => {
                session.leave().await;
                return Err(e.into());
            }
        };

        session.state = SessionState::Active;
        tracing::info!(
            room_id = %room_id,
            session_id = %session.id(),
            user_id = ?session.user_id(),
            connection_count = count,
            "Session joined"
        );

        let joined = ServerMessage::user_joined(hub.registry().count(room_id).await);
        hub.dispatcher()
            .broadcast(room_id, &joined, Some(session.id()))
            .await;

        Ok((session, outbound))
    }

    /// Run the leave sequence and close the session
    pub async fn leave(mut self) {
        let announce = match self.state {
            SessionState::Active => true,
            SessionState::Connecting => false,
            SessionState::Closing | SessionState::Closed => return,
        };

        self.state = SessionState::Closing;
        depart(
            self.hub.clone(),
            self.handle.room_id.clone(),
            self.id(),
            announce,
        )
        .await;
        self.state = SessionState::Closed;
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let announce = match self.state {
            SessionState::Closed => return,
            SessionState::Active => true,
            SessionState::Connecting | SessionState::Closing => false,
        };

        let room_id = self.handle.room_id.clone();
        let session_id = self.id();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                tracing::debug!(
                    room_id = %room_id,
                    session_id = %session_id,
                    "Session dropped without leaving, cleaning up"
                );
                runtime.spawn(depart(self.hub.clone(), room_id, session_id, announce));
            }
            Err(_) => {
                tracing::warn!(
                    room_id = %room_id,
                    session_id = %session_id,
                    "Session dropped outside a runtime; registry entry left behind"
                );
            }
        }
    }
}

/// Unregister a session and tell the rest of the room
async fn depart(hub: Hub, room_id: RoomId, session_id: SessionId, announce: bool) {
    let was_registered = hub.registry().unregister(&room_id, session_id).await;
    let remaining = hub.registry().count(&room_id).await;

    tracing::info!(
        room_id = %room_id,
        session_id = %session_id,
        was_registered,
        connection_count = remaining,
        "Session left"
    );

    if announce {
        hub.dispatcher()
            .broadcast(&room_id, &ServerMessage::user_left(remaining), None)
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::websocket::hub::HubConfig;
    use std::time::Duration;

    async fn hub_with_room(room_id: &str) -> Hub {
        let store = Arc::new(MemoryStore::new());
        store.insert_room(room_id).await;
        Hub::new(store, HubConfig::default())
    }

    #[test]
    fn test_handle_delivery_errors() {
        let (handle, rx) = SessionHandle::new("r1", Some("alice".to_string()), 1);
        assert_eq!(handle.user_id(), Some("alice"));

        assert!(handle.deliver(ServerMessage::user_joined(1)).is_ok());
        assert_eq!(
            handle.deliver(ServerMessage::user_joined(1)),
            Err(DeliveryError::QueueFull)
        );

        drop(rx);
        assert_eq!(
            handle.deliver(ServerMessage::user_joined(1)),
            Err(DeliveryError::Closed)
        );
    }

    #[tokio::test]
    async fn test_join_sends_init_and_activates() {
        let hub = hub_with_room("r1").await;

        let (session, mut rx) = Session::join(&hub, "r1", None).await.unwrap();
        assert_eq!(session.state(), SessionState::Active);
        assert_eq!(hub.registry().count("r1").await, 1);

        match rx.try_recv().unwrap() {
            ServerMessage::Init {
                language,
                connection_count,
                ..
            } => {
                assert_eq!(language, "python");
                assert_eq!(connection_count, 1);
            }
            other => panic!("Expected Init, got {:?}", other),
        }

        session.leave().await;
        assert!(!hub.registry().has_room("r1").await);
    }

    #[tokio::test]
    async fn test_join_unknown_room() {
        let hub = hub_with_room("r1").await;

        let result = Session::join(&hub, "ghost", None).await;
        assert!(matches!(result, Err(HubError::RoomNotFound(id)) if id == "ghost"));
        assert_eq!(hub.registry().room_count().await, 0);
    }

    #[tokio::test]
    async fn test_leave_announces_once() {
        let hub = hub_with_room("r1").await;
        let (a, mut rx_a) = Session::join(&hub, "r1", None).await.unwrap();
        let (b, _rx_b) = Session::join(&hub, "r1", None).await.unwrap();

        // init + user_joined
        assert!(matches!(rx_a.try_recv(), Ok(ServerMessage::Init { .. })));
        assert!(matches!(
            rx_a.try_recv(),
            Ok(ServerMessage::UserJoined { connection_count: 2, .. })
        ));

        b.leave().await;
        assert!(matches!(
            rx_a.try_recv(),
            Ok(ServerMessage::UserLeft { connection_count: 1, .. })
        ));
        assert!(rx_a.try_recv().is_err());

        a.leave().await;
        assert_eq!(hub.registry().room_count().await, 0);
    }

    #[tokio::test]
    async fn test_drop_runs_leave() {
        let hub = hub_with_room("r1").await;
        let (_a, mut rx_a) = Session::join(&hub, "r1", None).await.unwrap();
        let (b, _rx_b) = Session::join(&hub, "r1", None).await.unwrap();
        let b_id = b.id();
        rx_a.try_recv().unwrap();
        rx_a.try_recv().unwrap();

        drop(b);

        let msg = tokio::time::timeout(Duration::from_secs(1), rx_a.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(msg, ServerMessage::UserLeft { connection_count: 1, .. }));
        assert!(!hub.registry().contains("r1", b_id).await);
    }

    #[tokio::test]
    async fn test_connection_limit() {
        let store = Arc::new(MemoryStore::new());
        store.insert_room("r1").await;
        let hub = Hub::new(
            store,
            HubConfig {
                max_connections: 1,
                ..HubConfig::default()
            },
        );

        let (a, _rx) = Session::join(&hub, "r1", None).await.unwrap();
        let result = Session::join(&hub, "r1", None).await;
        assert!(matches!(result, Err(HubError::TooManyConnections(1))));
        assert_eq!(hub.registry().count("r1").await, 1);

        a.leave().await;
    }
}
