//! System API
//!
//! `POST /system/shutdown` → 202 with the shutdown report. 202 means the
//! shutdowns are scheduled; hosts power off after the grace period.

use crate::shutdown::{ShutdownOrchestrator, ShutdownReport, ShutdownTarget};
use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use std::sync::Arc;
use tracing::info;

/// Orchestrator plus the configured targets
pub struct SystemApiState {
    pub orchestrator: ShutdownOrchestrator,
    pub targets: Vec<ShutdownTarget>,
}

pub async fn shutdown_handler(
    State(state): State<Arc<SystemApiState>>,
) -> (StatusCode, Json<ShutdownReport>) {
    info!(targets = state.targets.len(), "system shutdown requested");

    let report = state.orchestrator.shutdown(&state.targets).await;

    let failed = report.remotes.iter().filter(|r| !r.is_success()).count();
    info!(
        remotes = report.remotes.len(),
        failed,
        local_ok = report.local.is_success(),
        "system shutdown scheduled"
    );

    (StatusCode::ACCEPTED, Json(report))
}

pub fn system_router(state: Arc<SystemApiState>) -> Router {
    Router::new()
        .route("/system/shutdown", post(shutdown_handler))
        .with_state(state)
}
