//! Dashboard HTTP Server
//!
//! Axum-based server with the control API, static dashboard assets, CORS,
//! request logging and graceful shutdown.

use crate::config::Config;
use crate::dashboard::api::{api_router, DashboardApiState};
use crate::dashboard::config::DashboardConfig;
use crate::dashboard::request_log::log_requests;
use axum::{
    http::{header, Method},
    middleware,
    response::{Html, IntoResponse},
    routing::get,
    Router,
};
use std::path::Path;
use tokio::signal;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Dashboard server
pub struct DashboardServer {
    config: DashboardConfig,
    state: DashboardApiState,
}

impl DashboardServer {
    pub fn new(config: DashboardConfig, state: DashboardApiState) -> Self {
        Self { config, state }
    }

    /// Build the server and all its services from configuration
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let state = DashboardApiState::from_config(config)?;
        Ok(Self::new(config.settings.server.clone(), state))
    }

    /// Build the router with all routes and middleware
    pub fn build_router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(
                self.config
                    .cors_origins
                    .iter()
                    .filter_map(|o| o.parse().ok())
                    .collect::<Vec<_>>(),
            )
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

        let mut router = api_router(self.state.clone());

        router = match self.config.static_dir.as_deref() {
            Some(dir) if Path::new(dir).is_dir() => router.fallback_service(ServeDir::new(dir)),
            Some(dir) => {
                warn!("Static directory {} not found - serving fallback page", dir);
                router.route("/", get(index_handler))
            }
            None => router.route("/", get(index_handler)),
        };

        router = router.layer(cors);

        if self.config.log_requests {
            router = router
                .layer(middleware::from_fn(log_requests))
                .layer(TraceLayer::new_for_http());
        }

        router
    }

    /// Start the server and run until shutdown signal
    pub async fn run(self) -> anyhow::Result<()> {
        let addr = self.config.socket_addr();
        let router = self.build_router();

        info!("Starting control server on {}", addr);

        if !self.config.is_localhost() {
            warn!("Control server bound to {} - reachable from the network", addr);
        }

        let listener = tokio::net::TcpListener::bind(addr).await?;

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("Control server shut down gracefully");
        Ok(())
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }
}

/// Serve the fallback index page
async fn index_handler() -> impl IntoResponse {
    Html(FALLBACK_INDEX)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}

/// Fallback index page when no dashboard build is present
const FALLBACK_INDEX: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>Control Server</title>
</head>
<body>
    <h1>Control Server</h1>
    <p>The dashboard build was not found. API endpoints:</p>
    <ul>
        <li><a href="/api/health">/api/health</a></li>
        <li><a href="/check-connection">/check-connection</a></li>
        <li><a href="/external-ip">/external-ip</a></li>
        <li><a href="/security/settings">/security/settings</a></li>
    </ul>
</body>
</html>"#;
