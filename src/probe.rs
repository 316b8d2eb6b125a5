//! Network Health Probes
//!
//! Two independent, deadline-bound checks:
//!
//! - **Connectivity**: fetch a plain-HTTP page and look for a marker string.
//!   Captive portals rewrite unencrypted traffic, so a missing marker means
//!   "not really online". Always answers with a bool.
//! - **External IP**: ask an IP-echo service for our public address.
//!   Failure is a distinct [`ProbeUnavailable`] outcome.

use crate::error::ProbeUnavailable;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Probe endpoints, marker and deadlines
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Unencrypted page that should contain `marker`
    pub connectivity_url: String,
    /// Expected substring, matched case-insensitively
    pub marker: String,
    /// Connectivity deadline in milliseconds
    pub connectivity_timeout_ms: u64,
    /// Service answering with our public IP as plain text
    pub external_ip_url: String,
    /// External IP deadline in milliseconds
    pub external_ip_timeout_ms: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            connectivity_url: "http://neverssl.com".to_string(),
            marker: "neverssl".to_string(),
            connectivity_timeout_ms: 2000,
            external_ip_url: "https://icanhazip.com".to_string(),
            external_ip_timeout_ms: 5000,
        }
    }
}

impl ProbeConfig {
    pub fn connectivity_timeout(&self) -> Duration {
        Duration::from_millis(self.connectivity_timeout_ms)
    }

    pub fn external_ip_timeout(&self) -> Duration {
        Duration::from_millis(self.external_ip_timeout_ms)
    }
}

/// Connectivity and external IP checks
#[derive(Clone)]
pub struct ConnectivityProbe {
    client: Client,
    config: ProbeConfig,
}

impl ConnectivityProbe {
    pub fn new(client: Client, config: ProbeConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// True iff the marker page arrived within the deadline and contains
    /// the marker. Timeouts, transport errors and non-2xx all yield false.
    pub async fn check_connectivity(&self) -> bool {
        let url = &self.config.connectivity_url;
        let deadline = self.config.connectivity_timeout();

        match tokio::time::timeout(deadline, self.fetch_text(url)).await {
            Ok(Ok(body)) => {
                let online = contains_marker(&body, &self.config.marker);
                if !online {
                    debug!(%url, "connectivity marker missing, likely a captive portal");
                }
                online
            }
            Ok(Err(e)) => {
                debug!(%url, error = %e, "connectivity probe failed");
                false
            }
            Err(_) => {
                debug!(%url, ?deadline, "connectivity probe timed out");
                false
            }
        }
    }

    /// Public IP as reported by the echo service, trimmed
    pub async fn external_ip(&self) -> Result<String, ProbeUnavailable> {
        let url = &self.config.external_ip_url;
        let deadline = self.config.external_ip_timeout();

        match tokio::time::timeout(deadline, self.fetch_text(url)).await {
            Ok(Ok(body)) => Ok(body.trim().to_string()),
            Ok(Err(e)) => {
                debug!(%url, error = %e, "external IP probe failed");
                Err(ProbeUnavailable::new(e.to_string()))
            }
            Err(_) => {
                debug!(%url, ?deadline, "external IP probe timed out");
                Err(ProbeUnavailable::new(format!("timed out after {:?}", deadline)))
            }
        }
    }

    async fn fetch_text(&self, url: &str) -> reqwest::Result<String> {
        self.client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
    }
}

fn contains_marker(body: &str, marker: &str) -> bool {
    body.to_lowercase().contains(&marker.to_lowercase())
}
