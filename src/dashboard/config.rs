//! Dashboard Configuration
//!
//! HTTP listener settings, localhost-only by default.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Dashboard server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Bind address (default: 127.0.0.1)
    pub bind_addr: IpAddr,
    /// Port number (default: 3001)
    pub port: u16,
    /// Allowed CORS origins
    pub cors_origins: Vec<String>,
    /// Enable request logging
    pub log_requests: bool,
    /// Built dashboard assets (None = fallback page only)
    pub static_dir: Option<String>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 3001,
            cors_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
            log_requests: true,
            static_dir: Some("../app/build".to_string()),
        }
    }
}

impl DashboardConfig {
    /// Apply `CONTROL_BIND_ADDR`, `CONTROL_PORT`, `CONTROL_STATIC_DIR`
    pub fn apply_env_overrides(&mut self) {
        if let Ok(addr) = std::env::var("CONTROL_BIND_ADDR") {
            match addr.parse() {
                Ok(parsed) => self.bind_addr = parsed,
                Err(_) => tracing::warn!("Ignoring invalid CONTROL_BIND_ADDR: {}", addr),
            }
        }

        if let Ok(port) = std::env::var("CONTROL_PORT") {
            match port.parse() {
                Ok(parsed) => self.port = parsed,
                Err(_) => tracing::warn!("Ignoring invalid CONTROL_PORT: {}", port),
            }
        }

        if let Ok(dir) = std::env::var("CONTROL_STATIC_DIR") {
            self.static_dir = if dir.is_empty() { None } else { Some(dir) };
        }
    }

    /// Check if bound to localhost only
    pub fn is_localhost(&self) -> bool {
        self.bind_addr.is_loopback()
    }

    /// Get the socket address
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }

    /// Get the base URL for this server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.socket_addr())
    }
}
