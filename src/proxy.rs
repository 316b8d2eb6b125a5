//! HTTP Forwarding
//!
//! [`Forwarder`] relays a request to a fixed upstream and streams the answer
//! back untouched. [`AuthenticatingProxy`] puts a router session token on
//! every request before handing it to a forwarder.

use crate::error::ProxyForwardError;
use crate::session::SessionTokenManager;
use axum::{
    body::{Body, Bytes},
    http::{
        header::{self, HeaderName},
        HeaderMap, HeaderValue, Method,
    },
    response::Response,
};
use reqwest::Client;
use std::sync::Arc;
use tracing::debug;

/// Headers that describe a single connection and are never relayed
const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(name)
}

/// Client for transparent forwarding: redirects are handed back to the
/// caller instead of being followed.
pub fn passthrough_client() -> reqwest::Result<Client> {
    Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
}

/// Relays requests to one upstream base URL
#[derive(Clone)]
pub struct Forwarder {
    client: Client,
    base_url: String,
}

impl Forwarder {
    /// `base_url` is scheme and authority, e.g. `http://192.168.8.1`
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send `method path_and_query` upstream with the caller's headers and
    /// body. `authorization` replaces any inbound `Authorization` header.
    pub async fn send(
        &self,
        method: Method,
        path_and_query: &str,
        headers: &HeaderMap,
        body: Bytes,
        authorization: Option<&str>,
    ) -> Result<Response, ProxyForwardError> {
        let url = format!("{}{}", self.base_url, path_and_query);

        let mut outbound = HeaderMap::with_capacity(headers.len() + 1);
        for (name, value) in headers {
            if is_hop_by_hop(name) || name == header::HOST || name == header::CONTENT_LENGTH {
                continue;
            }
            outbound.append(name.clone(), value.clone());
        }

        if let Some(token) = authorization {
            let value = HeaderValue::from_str(token)
                .map_err(|e| ProxyForwardError::InvalidRequest(e.to_string()))?;
            outbound.insert(header::AUTHORIZATION, value);
        }

        debug!(%method, %url, "forwarding request");

        let response = self
            .client
            .request(method, &url)
            .headers(outbound)
            .body(body)
            .send()
            .await
            .map_err(|e| ProxyForwardError::Downstream(e.to_string()))?;

        let mut builder = Response::builder().status(response.status());
        if let Some(relayed) = builder.headers_mut() {
            for (name, value) in response.headers() {
                if !is_hop_by_hop(name) {
                    relayed.append(name.clone(), value.clone());
                }
            }
        }

        builder
            .body(Body::from_stream(response.bytes_stream()))
            .map_err(|e| ProxyForwardError::Downstream(e.to_string()))
    }
}

/// Reverse proxy to the router API with session-token injection
pub struct AuthenticatingProxy {
    sessions: Arc<SessionTokenManager>,
    upstream: Forwarder,
}

impl AuthenticatingProxy {
    pub fn new(sessions: Arc<SessionTokenManager>, upstream: Forwarder) -> Self {
        Self { sessions, upstream }
    }

    pub fn sessions(&self) -> &Arc<SessionTokenManager> {
        &self.sessions
    }

    /// Forward one request. Every call goes through `acquire()`; without a
    /// token the router is never contacted.
    pub async fn forward(
        &self,
        method: Method,
        path_and_query: &str,
        headers: &HeaderMap,
        body: Bytes,
    ) -> Result<Response, ProxyForwardError> {
        let token = self.sessions.acquire().await?;

        self.upstream
            .send(method, path_and_query, headers, body, Some(token.value()))
            .await
    }
}
