//! Error taxonomy
//!
//! Three tiers, applied the same way at every call site:
//!
//! - **Absorbed**: probe failures fold into a value (`false`, [`ProbeUnavailable`])
//! - **Surfaced**: auth and forwarding failures become HTTP failure responses
//! - **Isolated**: a failing shutdown target only affects its own report entry ([`ExecError`])

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Router login failed. Nothing is cached when this is returned.
///
/// `Clone` so one failed login attempt can be handed to every caller
/// that was waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamAuthError {
    #[error("Router unreachable: {0}")]
    Unreachable(String),

    #[error("Router rejected login with status {0}")]
    Rejected(u16),

    #[error("Malformed login response: {0}")]
    MalformedResponse(String),
}

/// Forwarding a request downstream failed
#[derive(Debug, Error)]
pub enum ProxyForwardError {
    #[error("No router session: {0}")]
    Unauthenticated(#[from] UpstreamAuthError),

    #[error("Downstream unreachable: {0}")]
    Downstream(String),

    #[error("Invalid downstream request: {0}")]
    InvalidRequest(String),
}

impl ProxyForwardError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthenticated(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Downstream(_) => StatusCode::BAD_GATEWAY,
            Self::InvalidRequest(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ProxyForwardError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.to_string(),
        });

        (status, body).into_response()
    }
}

/// External IP could not be determined
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("External IP unavailable: {reason}")]
pub struct ProbeUnavailable {
    pub reason: String,
}

impl ProbeUnavailable {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Running a shutdown command on one host failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecError {
    #[error("Failed to start command: {0}")]
    Spawn(String),

    #[error("{0}")]
    CommandFailed(String),

    #[error("Command timed out after {0:?}")]
    Timeout(Duration),

    #[error("Shutdown task failed: {0}")]
    Join(String),
}

/// Error response format
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
