//! Device discovery and binding
//!
//! GET /api/devices, POST /api/connect_device

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::collaborators::DeviceInfo;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct DevicesResponse {
    pub devices: Vec<DeviceInfo>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConnectResponse {
    pub connected: bool,
    pub device: DeviceInfo,
}

/// GET /api/devices
pub async fn list_devices(State(state): State<AppState>) -> ApiResult<Json<DevicesResponse>> {
    let devices = state
        .connector
        .list_devices()
        .await
        .map_err(|e| ApiError::Upstream(format!("device discovery failed: {}", e)))?;
    Ok(Json(DevicesResponse { devices }))
}

/// POST /api/connect_device
///
/// **Request:** `{"serial": "emulator-5554", "name": "Pixel"}`
///
/// **Errors:**
/// - 400 Bad Request: empty serial
/// - 409 Conflict: a session is running
/// - 502 Bad Gateway: the device could not be bound
pub async fn connect_device(
    State(state): State<AppState>,
    Json(device): Json<DeviceInfo>,
) -> ApiResult<Json<ConnectResponse>> {
    if device.serial.trim().is_empty() {
        return Err(ApiError::BadRequest("serial cannot be empty".to_string()));
    }

    state
        .sessions
        .connect(state.connector.as_ref(), &device)
        .await?;
    info!(serial = %device.serial, "Device bound via API");

    Ok(Json(ConnectResponse {
        connected: true,
        device,
    }))
}

/// Build device routes
pub fn device_routes() -> Router<AppState> {
    Router::new()
        .route("/api/devices", get(list_devices))
        .route("/api/connect_device", post(connect_device))
}
