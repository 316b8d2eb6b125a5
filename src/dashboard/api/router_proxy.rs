//! Router API passthrough
//!
//! Everything under `/router` goes to the router with the session token
//! attached. The WiFi, VPN and client-list pages of the dashboard all talk
//! to the router through here.

use crate::error::ProxyForwardError;
use crate::proxy::AuthenticatingProxy;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, Uri},
    response::Response,
    routing::any,
    Router,
};
use std::sync::Arc;
use tracing::warn;

use super::mounted_path;

/// Mount point of the router passthrough
pub const ROUTER_PREFIX: &str = "/router";

pub async fn forward_to_router(
    State(proxy): State<Arc<AuthenticatingProxy>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ProxyForwardError> {
    let path = mounted_path(&uri, ROUTER_PREFIX);

    proxy
        .forward(method, &path, &headers, body)
        .await
        .inspect_err(|e| warn!(%path, error = %e, "router request failed"))
}

pub fn router_proxy_router(proxy: Arc<AuthenticatingProxy>) -> Router {
    Router::new()
        .route(ROUTER_PREFIX, any(forward_to_router))
        .route(&format!("{}/{{*rest}}", ROUTER_PREFIX), any(forward_to_router))
        .with_state(proxy)
}
