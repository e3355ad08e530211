//! Health Routes
//!
//! Health check endpoints for monitoring and Kubernetes probes.
//!
//! - GET / - Service banner
//! - GET /health/live - Liveness probe (process is alive)
//! - GET /health/ready - Readiness probe (store answers)
//! - GET /health - Full health status

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::api::dto::{HealthResponse, StatusResponse};
use crate::api::state::AppState;

/// GET /
pub async fn root() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok".to_string(),
        message: "Pairsync real-time pair programming server is running".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /health/live
///
/// Kubernetes liveness probe.
/// Returns 200 if the process is alive, no dependency checks.
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// GET /health/ready
///
/// Kubernetes readiness probe.
/// Returns 200 if the store can be queried.
pub async fn readiness(State(state): State<Arc<AppState>>) -> StatusCode {
    if check_store_health(&state).await {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// GET /health
///
/// Full health status with hub presence figures.
pub async fn full_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let store_ok = check_store_health(&state).await;

    Json(HealthResponse {
        status: if store_ok { "healthy" } else { "degraded" }.to_string(),
        database: if store_ok { "connected" } else { "error" }.to_string(),
        rooms: state.hub.room_count().await,
        sessions: state.hub.session_count().await,
        uptime_seconds: state.uptime_seconds(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Probe the store with a lookup that touches the rooms table
async fn check_store_health(state: &AppState) -> bool {
    match state.store.room_exists("").await {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Store health check failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_liveness() {
        let status = liveness().await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_root() {
        let Json(body) = root().await;
        assert_eq!(body.status, "ok");
        assert_eq!(body.version, env!("CARGO_PKG_VERSION"));
    }
}
