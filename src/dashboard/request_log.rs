//! Request logging middleware
//!
//! Tags every request with a v4 UUID and logs its start and end.

use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;
use tracing::info;
use uuid::Uuid;

pub async fn log_requests(request: Request, next: Next) -> Response {
    let id = Uuid::new_v4();
    let method = request.method().clone();
    let uri = request.uri().path().to_string();
    let started = Instant::now();

    info!(%id, %method, %uri, "request start");

    let response = next.run(request).await;

    info!(
        %id,
        %method,
        %uri,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request end"
    );

    response
}
