//! Collaboration Hub
//!
//! Facade over the room registry, broadcast dispatcher, session lifecycle
//! and state arbiter. One [`Hub`] is shared by every connection; it is a
//! cheap clone around an `Arc`.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

use super::arbiter::Arbiter;
use super::broadcast::Dispatcher;
use super::messages::{self, ServerMessage};
use super::registry::RoomRegistry;
use super::session::{DeliveryError, Session};
use crate::store::{RoomStore, StoreError, DEFAULT_LANGUAGE};

/// Close code sent when the requested room does not exist
pub const CLOSE_ROOM_NOT_FOUND: u16 = 4004;
/// Close code sent when the hub is at capacity (RFC 6455 "try again later")
pub const CLOSE_TRY_AGAIN_LATER: u16 = 1013;
/// Close code for unexpected server-side failures
pub const CLOSE_INTERNAL_ERROR: u16 = 1011;

/// Configuration for the hub
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Maximum number of concurrent sessions across all rooms
    pub max_connections: usize,
    /// Messages buffered per session before it is considered stalled
    pub outbound_queue_capacity: usize,
    /// Language used when a document or update carries none
    pub default_language: String,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            max_connections: 1000,
            outbound_queue_capacity: 256,
            default_language: DEFAULT_LANGUAGE.to_string(),
        }
    }
}

struct HubInner {
    registry: Arc<RoomRegistry>,
    dispatcher: Dispatcher,
    arbiter: Arbiter,
    store: Arc<dyn RoomStore>,
    config: HubConfig,
}

/// Entry point for every connection's lifetime
#[derive(Clone)]
pub struct Hub {
    inner: Arc<HubInner>,
}

impl Hub {
    /// Create a hub on top of `store`
    pub fn new(store: Arc<dyn RoomStore>, config: HubConfig) -> Self {
        let registry = Arc::new(RoomRegistry::new());
        let dispatcher = Dispatcher::new(Arc::clone(&registry));
        let arbiter = Arbiter::new(
            Arc::clone(&registry),
            dispatcher.clone(),
            Arc::clone(&store),
            config.default_language.clone(),
        );

        Self {
            inner: Arc::new(HubInner {
                registry,
                dispatcher,
                arbiter,
                store,
                config,
            }),
        }
    }

    /// Join `room_id`, returning the session and its outbound queue
    pub async fn join(
        &self,
        room_id: &str,
        user_id: Option<String>,
    ) -> Result<(Session, mpsc::Receiver<ServerMessage>), HubError> {
        Session::join(self, room_id, user_id).await
    }

    /// Decode and apply one text frame from `session`
    ///
    /// Returns false if the connection should be closed. Protocol errors
    /// are answered with an `error` message; store failures are logged and
    /// dropped. Neither ends the session.
    pub async fn handle_text(&self, session: &mut Session, text: &str) -> bool {
        let message = match messages::decode(text) {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!(
                    room_id = %session.room_id(),
                    session_id = %session.id(),
                    error = %e,
                    "Invalid client message"
                );
                return session.reply(ServerMessage::error(e.to_string())).is_ok();
            }
        };

        let kind = message.kind();
        match self.inner.arbiter.apply(session, message).await {
            Ok(report) => {
                tracing::debug!(
                    room_id = %session.room_id(),
                    session_id = %session.id(),
                    message_type = kind,
                    delivered = report.delivered,
                    "Message applied"
                );
                true
            }
            Err(HubError::Store(e)) => {
                tracing::warn!(
                    room_id = %session.room_id(),
                    session_id = %session.id(),
                    error = %e,
                    "Failed to persist update, not broadcasting"
                );
                true
            }
            Err(e) => {
                tracing::debug!(
                    room_id = %session.room_id(),
                    session_id = %session.id(),
                    error = %e,
                    "Dropping session"
                );
                false
            }
        }
    }

    pub fn registry(&self) -> &Arc<RoomRegistry> {
        &self.inner.registry
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.inner.dispatcher
    }

    pub fn arbiter(&self) -> &Arbiter {
        &self.inner.arbiter
    }

    pub fn store(&self) -> &Arc<dyn RoomStore> {
        &self.inner.store
    }

    pub fn config(&self) -> &HubConfig {
        &self.inner.config
    }

    /// Presence count for a room
    pub async fn connection_count(&self, room_id: &str) -> usize {
        self.inner.registry.count(room_id).await
    }

    /// Sessions across all rooms
    pub async fn session_count(&self) -> usize {
        self.inner.registry.session_count().await
    }

    /// Rooms with at least one session
    pub async fn room_count(&self) -> usize {
        self.inner.registry.room_count().await
    }
}

/// Errors that can occur in the hub
#[derive(Debug, Error)]
pub enum HubError {
    #[error("Room not found")]
    RoomNotFound(String),

    #[error("Too many connections (limit: {0})")]
    TooManyConnections(usize),

    #[error("Session is not registered in its room")]
    NotRegistered,

    #[error("Failed to deliver message: {0}")]
    Delivery(#[from] DeliveryError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl HubError {
    /// WebSocket close code and reason for a refused or aborted session
    pub fn close_frame(&self) -> (u16, &'static str) {
        match self {
            HubError::RoomNotFound(_) => (CLOSE_ROOM_NOT_FOUND, "Room not found"),
            HubError::TooManyConnections(_) => (CLOSE_TRY_AGAIN_LATER, "Too many connections"),
            _ => (CLOSE_INTERNAL_ERROR, "Internal error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    async fn hub() -> Hub {
        let store = Arc::new(MemoryStore::new());
        store.insert_room("r1").await;
        Hub::new(store, HubConfig::default())
    }

    #[test]
    fn test_default_config() {
        let config = HubConfig::default();
        assert_eq!(config.max_connections, 1000);
        assert_eq!(config.outbound_queue_capacity, 256);
        assert_eq!(config.default_language, "python");
    }

    #[test]
    fn test_close_frames() {
        assert_eq!(
            HubError::RoomNotFound("ghost".into()).close_frame(),
            (4004, "Room not found")
        );
        assert_eq!(HubError::TooManyConnections(1).close_frame().0, 1013);
        assert_eq!(HubError::NotRegistered.close_frame().0, 1011);
    }

    #[tokio::test]
    async fn test_handle_text_reports_protocol_errors() {
        let hub = hub().await;
        let (mut a, mut rx) = hub.join("r1", None).await.unwrap();
        rx.try_recv().unwrap();

        assert!(hub.handle_text(&mut a, "{not json").await);
        assert!(matches!(rx.try_recv(), Ok(ServerMessage::Error { .. })));

        assert!(hub.handle_text(&mut a, r#"{"type": "join"}"#).await);
        match rx.try_recv().unwrap() {
            ServerMessage::Error { message } => assert!(message.contains("join")),
            other => panic!("Expected Error, got {:?}", other),
        }

        // Session survives and can still edit
        assert!(hub.handle_text(&mut a, r#"{"type": "code_update", "code": "ok"}"#).await);
        let doc = hub.store().load_document("r1").await.unwrap().unwrap();
        assert_eq!(doc.code, "ok");

        a.leave().await;
    }

    #[tokio::test]
    async fn test_handle_text_closes_evicted_session() {
        let hub = hub().await;
        let (mut a, _rx) = hub.join("r1", None).await.unwrap();
        hub.registry().unregister("r1", a.id()).await;

        assert!(!hub.handle_text(&mut a, r#"{"type": "cursor_move", "cursorPosition": 1}"#).await);
        a.leave().await;
    }

    #[tokio::test]
    async fn test_presence_counts() {
        let hub = hub().await;
        assert_eq!(hub.session_count().await, 0);

        let (a, _rx_a) = hub.join("r1", None).await.unwrap();
        let (b, _rx_b) = hub.join("r1", None).await.unwrap();
        assert_eq!(hub.connection_count("r1").await, 2);
        assert_eq!(hub.room_count().await, 1);

        a.leave().await;
        b.leave().await;
        assert_eq!(hub.session_count().await, 0);
        assert_eq!(hub.room_count().await, 0);
    }
}
