//! Network Status API
//!
//! - `GET /check-connection` → always 200, `ok` or `not ok`
//! - `GET /external-ip` → 200 with the address, or 404 with an empty body

use crate::probe::ConnectivityProbe;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::sync::Arc;

pub async fn check_connection(State(probe): State<Arc<ConnectivityProbe>>) -> &'static str {
    if probe.check_connectivity().await {
        "ok"
    } else {
        "not ok"
    }
}

pub async fn external_ip(State(probe): State<Arc<ConnectivityProbe>>) -> Response {
    match probe.external_ip().await {
        Ok(ip) => ip.into_response(),
        Err(_) => StatusCode::NOT_FOUND.into_response(),
    }
}

pub fn network_router(probe: Arc<ConnectivityProbe>) -> Router {
    Router::new()
        .route("/check-connection", get(check_connection))
        .route("/external-ip", get(external_ip))
        .with_state(probe)
}
