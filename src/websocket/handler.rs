//! WebSocket Handler
//!
//! Handles WebSocket upgrade requests on `/ws/:room_id` and drives one
//! session per connection: a writer task drains the session's outbound
//! queue into the socket while this task reads frames and feeds them to
//! the hub.

use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use super::hub::{Hub, CLOSE_TRY_AGAIN_LATER};
use super::messages::{self, ServerMessage};
use super::session::Session;
use crate::api::AppState;

/// Query parameters accepted on connect
#[derive(Debug, Default, Deserialize)]
pub struct ConnectParams {
    /// Display id for this participant
    #[serde(default, rename = "userId")]
    pub user_id: Option<String>,
}

/// WebSocket upgrade handler
///
/// This is the entry point for WebSocket connections.
/// It upgrades the HTTP connection to WebSocket and joins the room.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Path(room_id): Path<String>,
    Query(params): Query<ConnectParams>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let hub = state.hub.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, hub, room_id, params.user_id))
}

/// How long the writer may take to flush queued messages after the session ends
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Close frame for a session the server ended on its own
const EVICTED: (u16, &str) = (CLOSE_TRY_AGAIN_LATER, "Session evicted");

/// What the read loop does after one frame
#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    /// Stop reading; send this close frame, if any, once the writer drains
    Stop(Option<(u16, &'static str)>),
}

/// Handle an established WebSocket connection
async fn handle_socket(socket: WebSocket, hub: Hub, room_id: String, user_id: Option<String>) {
    let (mut sender, mut receiver) = socket.split();

    let (mut session, mut outbound) = match hub.join(&room_id, user_id).await {
        Ok(joined) => joined,
        Err(e) => {
            let (code, reason) = e.close_frame();
            tracing::debug!(room_id = %room_id, error = %e, code, "Closing refused connection");
            let _ = sender.send(close_message(code, reason)).await;
            return;
        }
    };

    let session_id = session.id();
    let shutdown = session.shutdown_signal();

    // Forwards the outbound queue to the socket; hands the sink back once
    // every sender of the queue is gone
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = outbound.recv().await {
            let text = match messages::encode(&msg) {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!(
                        session_id = %session_id,
                        error = %e,
                        "Failed to encode message"
                    );
                    continue;
                }
            };
            if sender.send(Message::Text(text)).await.is_err() {
                tracing::debug!(session_id = %session_id, "WebSocket send failed");
                return None;
            }
        }
        Some(sender)
    });

    let mut writer_finished = false;
    let close = loop {
        tokio::select! {
            frame = receiver.next() => {
                match frame {
                    Some(Ok(msg)) => match handle_ws_message(&hub, &mut session, msg).await {
                        Flow::Continue => {}
                        Flow::Stop(close) => break close,
                    },
                    Some(Err(e)) => {
                        tracing::debug!(
                            session_id = %session_id,
                            error = %e,
                            "WebSocket receive error"
                        );
                        break None;
                    }
                    None => break None,
                }
            }
            _ = shutdown.notified() => {
                tracing::debug!(session_id = %session_id, "Session evicted");
                break Some(EVICTED);
            }
            _ = &mut send_task => {
                writer_finished = true;
                break None;
            }
        }
    };

    // Leaving drops the last queue sender, which lets the writer finish
    session.leave().await;
    if writer_finished {
        return;
    }

    match tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut send_task).await {
        Ok(Ok(Some(mut sender))) => {
            if let Some((code, reason)) = close {
                let _ = sender.send(close_message(code, reason)).await;
            }
        }
        Ok(Ok(None)) => {}
        Ok(Err(e)) => {
            tracing::debug!(session_id = %session_id, error = %e, "Writer task failed");
        }
        Err(_) => {
            tracing::debug!(session_id = %session_id, "Writer did not drain in time");
            send_task.abort();
        }
    }
}

fn close_message(code: u16, reason: &'static str) -> Message {
    Message::Close(Some(CloseFrame {
        code,
        reason: reason.into(),
    }))
}

/// Handle a received WebSocket message
async fn handle_ws_message(hub: &Hub, session: &mut Session, message: Message) -> Flow {
    let keep_open = match message {
        Message::Text(text) => hub.handle_text(session, &text).await,
        Message::Binary(_) => {
            // We don't support binary messages
            session
                .reply(ServerMessage::error("Binary messages not supported"))
                .is_ok()
        }
        Message::Ping(_) | Message::Pong(_) => {
            // Axum answers pings automatically
            true
        }
        Message::Close(_) => {
            tracing::debug!(session_id = %session.id(), "Client requested close");
            return Flow::Stop(None);
        }
    };

    if keep_open {
        Flow::Continue
    } else {
        Flow::Stop(Some(EVICTED))
    }
}
