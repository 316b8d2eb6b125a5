//! Security API
//!
//! - `GET /security/settings` → `{"alertsEnabled": bool}`
//! - `POST /security/settings` → store the toggle, answer `ok`
//! - `ANY /security/camera-feed/*` → passthrough to the camera service

use crate::config::SettingsStore;
use crate::error::{ErrorResponse, ProxyForwardError};
use crate::proxy::Forwarder;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri},
    response::Response,
    routing::{any, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

use super::mounted_path;

/// Mount point of the camera passthrough
pub const CAMERA_PREFIX: &str = "/security/camera-feed";

pub struct SecurityApiState {
    pub settings: Arc<SettingsStore>,
    pub camera: Forwarder,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecuritySettings {
    pub alerts_enabled: bool,
}

pub async fn get_settings(State(state): State<Arc<SecurityApiState>>) -> Json<SecuritySettings> {
    Json(SecuritySettings {
        alerts_enabled: state.settings.alerts_enabled().await,
    })
}

pub async fn update_settings(
    State(state): State<Arc<SecurityApiState>>,
    Json(update): Json<SecuritySettings>,
) -> Result<&'static str, (StatusCode, Json<ErrorResponse>)> {
    state
        .settings
        .set_alerts_enabled(update.alerts_enabled)
        .await
        .map_err(|e| {
            error!(error = %e, "failed to save security settings");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "Internal Server Error".to_string(),
                    message: "Failed to save settings".to_string(),
                }),
            )
        })?;

    info!(alerts_enabled = update.alerts_enabled, "security settings updated");
    Ok("ok")
}

/// Camera feed passthrough, no router session involved
pub async fn camera_feed(
    State(state): State<Arc<SecurityApiState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ProxyForwardError> {
    let path = mounted_path(&uri, CAMERA_PREFIX);
    state.camera.send(method, &path, &headers, body, None).await
}

pub fn security_router(state: Arc<SecurityApiState>) -> Router {
    Router::new()
        .route("/security/settings", get(get_settings).post(update_settings))
        .route(CAMERA_PREFIX, any(camera_feed))
        .route(&format!("{}/{{*rest}}", CAMERA_PREFIX), any(camera_feed))
        .with_state(state)
}
