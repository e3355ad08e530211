//! # Pairsync
//!
//! Real-time pair programming server. Clients join a room over a WebSocket,
//! receive the room's shared document, and see each other's edits and
//! cursor moves as they happen.
//!
//! ## Modules
//!
//! - [`websocket`]: Room registry, broadcast, session lifecycle and edit arbitration
//! - [`store`]: Room and document persistence (SQLite or in-memory)
//! - [`autocomplete`]: Mocked completion suggestions
//! - [`api`]: HTTP server with Axum
//! - [`config`]: TOML configuration and logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pairsync::store::{MemoryStore, RoomStore};
//! use pairsync::websocket::{Hub, HubConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(MemoryStore::new());
//!     let room = store.create_room().await?;
//!
//!     let hub = Hub::new(store, HubConfig::default());
//!     let (mut session, mut outbound) = hub.join(&room.id, None).await?;
//!
//!     // First message is always the document snapshot
//!     println!("{:?}", outbound.recv().await);
//!
//!     hub.handle_text(&mut session, r#"{"type": "code_update", "code": "print(1)"}"#)
//!         .await;
//!     session.leave().await;
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod autocomplete;
pub mod config;
pub mod store;
pub mod websocket;

// Re-export top-level types for convenience
pub use api::{build_router, serve, ApiConfig, ApiError, AppState};

pub use autocomplete::{suggest, Suggestion};

pub use config::{generate_default_config, init_logging, Config, ConfigError, LoggingConfig};

pub use store::{Document, MemoryStore, Room, RoomStore, SqliteStore, StoreError, StoreResult};

pub use websocket::{
    websocket_handler, ClientMessage, Hub, HubConfig, HubError, ServerMessage, Session,
};
