//! Configuration management
//!
//! Settings come from a JSON file (`CONTROL_SETTINGS`, default
//! `settings.json`); a few scalars can be overridden from the environment.
//! The alerts toggle is written back to the same file at runtime.

use crate::dashboard::DashboardConfig;
use crate::probe::ProbeConfig;
use crate::shutdown::{ShutdownCommand, ShutdownTarget};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::RwLock;

/// Default settings file
const DEFAULT_SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub level: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Router management API
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterSettings {
    pub host: String,
    pub password: String,
    /// Session token lifetime in seconds
    pub token_ttl_secs: u64,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            host: "192.168.8.1".to_string(),
            password: String::new(),
            token_ttl_secs: 300,
        }
    }
}

impl RouterSettings {
    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_secs)
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.host)
    }
}

impl std::fmt::Debug for RouterSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterSettings")
            .field("host", &self.host)
            .field("password", &"<redacted>")
            .field("token_ttl_secs", &self.token_ttl_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShutdownSettings {
    /// Minutes between scheduling and power-off
    pub grace_minutes: u32,
    /// Upper bound for one SSH or local command
    pub command_timeout_secs: u64,
}

impl Default for ShutdownSettings {
    fn default() -> Self {
        Self {
            grace_minutes: 1,
            command_timeout_secs: 30,
        }
    }
}

impl ShutdownSettings {
    pub fn command(&self) -> ShutdownCommand {
        ShutdownCommand {
            grace_minutes: self.grace_minutes,
        }
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertSettings {
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    /// Camera feed service base URL
    pub upstream: String,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            upstream: "http://localhost:3002".to_string(),
        }
    }
}

/// Everything the settings file can hold
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub log: LogSettings,
    pub router: RouterSettings,
    pub probes: ProbeConfig,
    /// Remote hosts shut down by `/system/shutdown`, in this order
    pub systems: Vec<ShutdownTarget>,
    pub shutdown: ShutdownSettings,
    pub alerts: AlertSettings,
    pub camera: CameraSettings,
    pub server: DashboardConfig,
}

impl Settings {
    /// Parse a settings file
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading settings file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("parsing settings file {}", path.display()))
    }

    /// Apply `CONTROL_*` environment overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("CONTROL_ROUTER_HOST") {
            self.router.host = host;
        }

        if let Ok(password) = std::env::var("CONTROL_ROUTER_PASSWORD") {
            self.router.password = password;
        }

        self.server.apply_env_overrides();
    }
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Where settings were (or would be) read from and written back to
    pub settings_path: PathBuf,

    /// False when the settings file was missing and defaults were used
    pub loaded_from_file: bool,

    pub settings: Settings,
}

impl Config {
    /// Load configuration from the settings file and environment variables
    pub fn from_env() -> Result<Self> {
        let settings_path = std::env::var("CONTROL_SETTINGS")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_SETTINGS_FILE));

        Self::from_path(settings_path)
    }

    /// Load from an explicit settings path, then apply environment overrides
    pub fn from_path(settings_path: PathBuf) -> Result<Self> {
        let loaded_from_file = settings_path.exists();
        let mut settings = if loaded_from_file {
            Settings::load(&settings_path)?
        } else {
            Settings::default()
        };
        settings.apply_env_overrides();

        Ok(Self {
            settings_path,
            loaded_from_file,
            settings,
        })
    }
}

/// Settings shared with request handlers, persisted on change
pub struct SettingsStore {
    path: PathBuf,
    settings: RwLock<Settings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf, settings: Settings) -> Self {
        Self {
            path,
            settings: RwLock::new(settings),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn alerts_enabled(&self) -> bool {
        self.settings.read().await.alerts.enabled
    }

    /// Update the alerts toggle and write it to the settings file
    ///
    /// Only `alerts.enabled` is patched into the file as it exists on disk.
    /// Environment overrides held in memory are never written back.
    pub async fn set_alerts_enabled(&self, enabled: bool) -> Result<()> {
        let mut settings = self.settings.write().await;

        let mut doc = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => serde_json::from_str::<Value>(&raw)
                .with_context(|| format!("parsing settings file {}", self.path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => json!({}),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("reading settings file {}", self.path.display()))
            }
        };

        let root = doc
            .as_object_mut()
            .with_context(|| format!("settings file {} is not an object", self.path.display()))?;
        let alerts = root.entry("alerts").or_insert_with(|| json!({}));
        match alerts.as_object_mut() {
            Some(alerts) => {
                alerts.insert("enabled".to_string(), Value::Bool(enabled));
            }
            None => *alerts = json!({ "enabled": enabled }),
        }

        let raw = serde_json::to_string_pretty(&doc)?;
        tokio::fs::write(&self.path, raw)
            .await
            .with_context(|| format!("writing settings file {}", self.path.display()))?;

        settings.alerts.enabled = enabled;
        Ok(())
    }
}
