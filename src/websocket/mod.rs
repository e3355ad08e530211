//! Real-Time Collaboration Hub
//!
//! Room-scoped WebSocket fan-out and shared document synchronization.
//!
//! ## Architecture
//!
//! - **Messages**: wire protocol and codec
//! - **RoomRegistry**: which sessions are in which room
//! - **Dispatcher**: fan-out to a room, excluding the sender
//! - **Session**: join/leave lifecycle with guaranteed cleanup
//! - **Arbiter**: applies document updates (last write wins) and relays cursors
//! - **Hub**: facade composing the above
//! - **Handler**: axum WebSocket glue
//!
//! ## Usage
//!
//! Clients connect to `/ws/{roomId}` (optionally `?userId=alice`) and
//! receive an `init` snapshot, then exchange `code_update` and
//! `cursor_move` messages.
//!
//! ## Example
//!
//! ```javascript
//! // Browser
//! const ws = new WebSocket('ws://localhost:8000/ws/3f9a1c2b');
//!
//! ws.onmessage = (event) => {
//!   const msg = JSON.parse(event.data);
//!   if (msg.type === 'init') editor.setValue(msg.code);
//! };
//!
//! ws.send(JSON.stringify({type: 'code_update', code: editor.getValue()}));
//! ```

mod arbiter;
mod broadcast;
mod handler;
mod hub;
mod messages;
mod registry;
mod session;

pub use arbiter::Arbiter;
pub use broadcast::{BroadcastReport, Dispatcher};
pub use handler::{websocket_handler, ConnectParams};
pub use hub::{
    Hub, HubConfig, HubError, CLOSE_INTERNAL_ERROR, CLOSE_ROOM_NOT_FOUND, CLOSE_TRY_AGAIN_LATER,
};
pub use messages::{decode, encode, now_timestamp, ClientMessage, CodecError, ServerMessage};
pub use registry::{DocumentSequencer, RoomRegistry};
pub use session::{DeliveryError, Session, SessionHandle, SessionId, SessionState};
