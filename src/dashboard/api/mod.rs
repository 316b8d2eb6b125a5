//! Dashboard API Endpoints
//!
//! Routes the dashboard calls, each group with its own state.

pub mod health;
pub mod network;
pub mod router_proxy;
pub mod security;
pub mod system;

use crate::config::{Config, SettingsStore};
use crate::probe::ConnectivityProbe;
use crate::proxy::{passthrough_client, AuthenticatingProxy, Forwarder};
use crate::session::{RouterLoginClient, SessionTokenManager};
use crate::shutdown::{CommandRunner, ShutdownOrchestrator, SshRunner};
use axum::{http::Uri, Router};
use std::sync::Arc;
use std::time::Duration;
use zeroize::Zeroizing;

pub use health::{health_router, HealthResponse, HealthState};
pub use network::network_router;
pub use router_proxy::{router_proxy_router, ROUTER_PREFIX};
pub use security::{security_router, SecurityApiState, SecuritySettings, CAMERA_PREFIX};
pub use system::{system_router, SystemApiState};

/// Router login deadline
const LOGIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Combined dashboard API state
#[derive(Clone)]
pub struct DashboardApiState {
    pub health: Arc<HealthState>,
    pub network: Arc<ConnectivityProbe>,
    pub system: Arc<SystemApiState>,
    pub security: Arc<SecurityApiState>,
    pub router: Arc<AuthenticatingProxy>,
}

impl DashboardApiState {
    /// Wire up all services from configuration, shutting hosts down over SSH
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let timeout = config.settings.shutdown.command_timeout();
        Self::with_runner(config, Arc::new(SshRunner::new(timeout)))
    }

    /// Wire up all services with a custom shutdown command runner
    pub fn with_runner(config: &Config, runner: Arc<dyn CommandRunner>) -> anyhow::Result<Self> {
        let settings = &config.settings;

        let login_client = reqwest::Client::builder().timeout(LOGIN_TIMEOUT).build()?;
        let login = RouterLoginClient::new(
            login_client,
            settings.router.host.clone(),
            Zeroizing::new(settings.router.password.clone()),
        );
        let sessions = Arc::new(SessionTokenManager::new(
            Arc::new(login),
            settings.router.token_ttl(),
        ));

        let passthrough = passthrough_client()?;
        let router = AuthenticatingProxy::new(
            sessions,
            Forwarder::new(passthrough.clone(), settings.router.base_url()),
        );

        let network = ConnectivityProbe::new(passthrough.clone(), settings.probes.clone());

        let system = SystemApiState {
            orchestrator: ShutdownOrchestrator::new(runner, settings.shutdown.command()),
            targets: settings.systems.clone(),
        };

        let security = SecurityApiState {
            settings: Arc::new(SettingsStore::new(
                config.settings_path.clone(),
                settings.clone(),
            )),
            camera: Forwarder::new(passthrough, settings.camera.upstream.clone()),
        };

        Ok(Self {
            health: Arc::new(HealthState::new(
                !settings.router.password.is_empty(),
                settings.systems.len(),
            )),
            network: Arc::new(network),
            system: Arc::new(system),
            security: Arc::new(security),
            router: Arc::new(router),
        })
    }
}

/// Create the full API router
///
/// Routes:
/// - GET /api/health, /api/healthz, /api/readyz
/// - GET /check-connection, /external-ip
/// - POST /system/shutdown
/// - GET|POST /security/settings
/// - ANY /security/camera-feed/*
/// - ANY /router/*
pub fn api_router(state: DashboardApiState) -> Router {
    Router::new()
        .nest("/api", health_router(state.health))
        .merge(network_router(state.network))
        .merge(system_router(state.system))
        .merge(security_router(state.security))
        .merge(router_proxy_router(state.router))
}

/// Path and query of `uri` with the mount `prefix` removed
pub(crate) fn mounted_path(uri: &Uri, prefix: &str) -> String {
    let path = uri.path().strip_prefix(prefix).unwrap_or(uri.path());
    let path = if path.is_empty() { "/" } else { path };

    match uri.query() {
        Some(query) => format!("{}?{}", path, query),
        None => path.to_string(),
    }
}
