//! Application State
//!
//! Shared state accessible by all API handlers.
//! Wrapped in Arc for thread-safe sharing across async tasks.

use std::sync::Arc;
use std::time::Instant;

use crate::store::RoomStore;
use crate::websocket::{Hub, HubConfig};

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// Room and document persistence
    pub store: Arc<dyn RoomStore>,
    /// Collaboration hub for WebSocket sessions
    pub hub: Hub,
    /// API configuration
    pub config: Arc<ApiConfig>,
    /// Server start time for uptime tracking
    pub start_time: Instant,
}

impl AppState {
    /// Create an AppState with the default hub configuration
    pub fn new(store: Arc<dyn RoomStore>, config: ApiConfig) -> Self {
        Self::with_hub_config(store, config, HubConfig::default())
    }

    /// Create AppState with custom hub configuration
    pub fn with_hub_config(
        store: Arc<dyn RoomStore>,
        config: ApiConfig,
        hub_config: HubConfig,
    ) -> Self {
        let hub = Hub::new(Arc::clone(&store), hub_config);
        Self {
            store,
            hub,
            config: Arc::new(config),
            start_time: Instant::now(),
        }
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Allowed CORS origins (empty = any)
    pub cors_origins: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: Vec::new(),
        }
    }
}

impl ApiConfig {
    /// Create config with custom host and port
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_api_config_addr() {
        assert_eq!(ApiConfig::new("127.0.0.1", 9000).addr(), "127.0.0.1:9000");
        assert_eq!(ApiConfig::default().port, 8000);
    }

    #[tokio::test]
    async fn test_state_shares_store_with_hub() {
        let store: Arc<dyn RoomStore> = Arc::new(MemoryStore::new());
        let state = AppState::new(Arc::clone(&store), ApiConfig::default());
        assert!(Arc::ptr_eq(&state.store, state.hub.store()));
        assert_eq!(state.hub.session_count().await, 0);
    }
}
