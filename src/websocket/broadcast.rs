//! Broadcast Dispatcher
//!
//! Fans a message out to every session of a room except the sender.
//! Iterates over a registry snapshot, never the live map, and never awaits
//! a recipient: delivery is a non-blocking enqueue onto the session's
//! bounded outbound queue.
//!
//! A recipient whose queue is closed or full is evicted: removed from the
//! registry and told to shut down. Its own task then runs the leave
//! sequence. Eviction is never reported to the sender.

use std::sync::Arc;

use super::messages::ServerMessage;
use super::registry::RoomRegistry;
use super::session::SessionId;

/// Outcome of one broadcast call
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Recipients that accepted the message
    pub delivered: usize,
    /// Recipients evicted because delivery failed
    pub dropped: usize,
}

/// Delivers room-scoped messages
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<RoomRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<RoomRegistry>) -> Self {
        Self { registry }
    }

    /// Send `message` to every session in `room_id` except `exclude`
    pub async fn broadcast(
        &self,
        room_id: &str,
        message: &ServerMessage,
        exclude: Option<SessionId>,
    ) -> BroadcastReport {
        let recipients = self.registry.snapshot(room_id).await;
        let mut report = BroadcastReport::default();

        for recipient in recipients {
            if Some(recipient.id()) == exclude {
                continue;
            }

            match recipient.deliver(message.clone()) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    tracing::warn!(
                        room_id = %room_id,
                        session_id = %recipient.id(),
                        message_type = message.kind(),
                        error = %e,
                        "Delivery failed, evicting session"
                    );
                    self.registry.unregister(room_id, recipient.id()).await;
                    recipient.evict();
                    report.dropped += 1;
                }
            }
        }

        tracing::trace!(
            room_id = %room_id,
            message_type = message.kind(),
            delivered = report.delivered,
            dropped = report.dropped,
            "Broadcast"
        );

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::websocket::session::SessionHandle;

    async fn join(
        registry: &RoomRegistry,
        room_id: &str,
        capacity: usize,
    ) -> (SessionHandle, tokio::sync::mpsc::Receiver<ServerMessage>) {
        let (handle, rx) = SessionHandle::new(room_id, None, capacity);
        registry.register(room_id, handle.clone()).await;
        (handle, rx)
    }

    #[tokio::test]
    async fn test_excludes_sender() {
        let registry = Arc::new(RoomRegistry::new());
        let dispatcher = Dispatcher::new(Arc::clone(&registry));

        let (a, mut rx_a) = join(&registry, "r1", 8).await;
        let (_b, mut rx_b) = join(&registry, "r1", 8).await;
        let (_c, mut rx_c) = join(&registry, "r1", 8).await;

        let msg = ServerMessage::code_update("x=1", None, None);
        let report = dispatcher.broadcast("r1", &msg, Some(a.id())).await;

        assert_eq!(report, BroadcastReport { delivered: 2, dropped: 0 });
        assert!(rx_a.try_recv().is_err());
        assert_eq!(rx_b.try_recv().unwrap(), msg);
        assert_eq!(rx_c.try_recv().unwrap(), msg);
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_other_rooms_untouched() {
        let registry = Arc::new(RoomRegistry::new());
        let dispatcher = Dispatcher::new(Arc::clone(&registry));

        let (_a, _rx_a) = join(&registry, "r1", 8).await;
        let (_b, mut rx_b) = join(&registry, "r2", 8).await;

        dispatcher
            .broadcast("r1", &ServerMessage::user_joined(1), None)
            .await;
        assert!(rx_b.try_recv().is_err());

        let report = dispatcher
            .broadcast("empty", &ServerMessage::user_joined(0), None)
            .await;
        assert_eq!(report, BroadcastReport::default());
    }

    #[tokio::test]
    async fn test_dead_recipient_is_evicted() {
        let registry = Arc::new(RoomRegistry::new());
        let dispatcher = Dispatcher::new(Arc::clone(&registry));

        let (_a, mut rx_a) = join(&registry, "r1", 8).await;
        let (b, rx_b) = join(&registry, "r1", 8).await;
        drop(rx_b);

        let report = dispatcher
            .broadcast("r1", &ServerMessage::user_joined(2), None)
            .await;

        assert_eq!(report, BroadcastReport { delivered: 1, dropped: 1 });
        assert!(rx_a.try_recv().is_ok());
        assert!(!registry.contains("r1", b.id()).await);
        assert_eq!(registry.count("r1").await, 1);
    }

    #[tokio::test]
    async fn test_slow_recipient_is_evicted_and_signalled() {
        let registry = Arc::new(RoomRegistry::new());
        let dispatcher = Dispatcher::new(Arc::clone(&registry));

        let (slow, _rx_slow) = join(&registry, "r1", 1).await;
        let (_fast, mut rx_fast) = join(&registry, "r1", 8).await;
        let shutdown = slow.shutdown_signal();

        dispatcher.broadcast("r1", &ServerMessage::user_joined(2), None).await;
        let report = dispatcher.broadcast("r1", &ServerMessage::user_joined(2), None).await;

        assert_eq!(report, BroadcastReport { delivered: 1, dropped: 1 });
        assert!(!registry.contains("r1", slow.id()).await);
        // Permit stored by evict() resolves immediately
        tokio::time::timeout(std::time::Duration::from_secs(1), shutdown.notified())
            .await
            .unwrap();
        assert!(rx_fast.try_recv().is_ok());
        assert!(rx_fast.try_recv().is_ok());
    }
}
