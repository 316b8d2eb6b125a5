//! Control Server
//!
//! Local control-plane backend for the home dashboard.
//!
//! # Features
//!
//! - **Router proxy**: transparent passthrough to the router API with an
//!   in-memory session token, logged in once and shared by concurrent callers
//! - **Network probes**: captive-portal-aware connectivity check and external IP
//! - **Shutdown orchestration**: SSH fan-out to every configured host, then
//!   the local machine, with per-host results
//! - **Security settings**: alert toggle persisted to the settings file
//! - **Camera feed**: unauthenticated passthrough to the local camera service
//!
//! # Architecture
//!
//! ```text
//! Dashboard ──► Control Server ──► Router API      (session token)
//!                     │
//!                     ├── Probes ──► neverssl.com / icanhazip.com
//!                     ├── Shutdown ──► ssh host… ──► local
//!                     └── Camera ──► localhost:3002
//! ```

pub mod config;
pub mod dashboard;
pub mod error;
pub mod probe;
pub mod proxy;
pub mod session;
pub mod shutdown;

#[cfg(test)]
mod testing;

pub use config::{Config, Settings, SettingsStore};
pub use dashboard::{DashboardApiState, DashboardConfig, DashboardServer};
pub use error::{ExecError, ProbeUnavailable, ProxyForwardError, UpstreamAuthError};
pub use probe::{ConnectivityProbe, ProbeConfig};
pub use proxy::{AuthenticatingProxy, Forwarder};
pub use session::{
    Clock, RouterLogin, RouterLoginClient, SessionToken, SessionTokenManager, SystemClock,
};
pub use shutdown::{
    CommandRunner, Outcome, ShutdownCommand, ShutdownOrchestrator, ShutdownReport,
    ShutdownResult, ShutdownTarget, SshRunner,
};
