//! Health Check API
//!
//! Liveness and readiness for the control server itself.

use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// Health state shared across handlers
#[derive(Clone)]
pub struct HealthState {
    /// Server start time for uptime calculation
    pub start_time: Instant,
    /// Application version
    pub version: &'static str,
    /// Router credentials present in settings
    pub router_configured: bool,
    /// Number of configured shutdown targets
    pub shutdown_targets: usize,
}

impl HealthState {
    pub fn new(router_configured: bool, shutdown_targets: usize) -> Self {
        Self {
            start_time: Instant::now(),
            version: env!("CARGO_PKG_VERSION"),
            router_configured,
            shutdown_targets,
        }
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
    pub router_configured: bool,
    pub shutdown_targets: usize,
    /// Timestamp (ISO 8601)
    pub timestamp: String,
}

pub async fn health_check(State(state): State<Arc<HealthState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: state.version,
        uptime_secs: state.uptime_secs(),
        router_configured: state.router_configured,
        shutdown_targets: state.shutdown_targets,
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// Liveness probe
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// Readiness probe
///
/// Not ready until router credentials are configured, since every
/// `/router` request would fail without them.
pub async fn readiness(State(state): State<Arc<HealthState>>) -> StatusCode {
    if state.router_configured {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// Create health check router
pub fn health_router(state: Arc<HealthState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/healthz", get(liveness))
        .route("/readyz", get(readiness))
        .with_state(state)
}
