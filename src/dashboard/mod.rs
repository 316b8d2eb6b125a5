//! Dashboard Backend
//!
//! HTTP surface the browser dashboard talks to.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                 Control Server                   │
//! ├──────────────────────────────────────────────────┤
//! │  ANY  /router/*            → Router API (+token) │
//! │  GET  /check-connection    → ok / not ok         │
//! │  GET  /external-ip         → IP or 404           │
//! │  POST /system/shutdown     → 202 + report        │
//! │  GET  /security/settings   → Alerts toggle       │
//! │  POST /security/settings   → Save toggle         │
//! │  ANY  /security/camera-feed/* → Camera service   │
//! │  GET  /api/health          → Health check        │
//! │  GET  /*                   → Dashboard build     │
//! └──────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod config;
pub mod request_log;
pub mod server;

pub use api::{
    api_router, health_router, network_router, router_proxy_router, security_router,
    system_router, DashboardApiState, HealthResponse, HealthState, SecurityApiState,
    SecuritySettings, SystemApiState,
};
pub use config::DashboardConfig;
pub use server::DashboardServer;
