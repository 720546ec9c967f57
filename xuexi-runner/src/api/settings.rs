//! Settings API
//!
//! GET /api/settings returns the current runner settings (API key masked);
//! POST /api/settings updates them, persists them to the TOML file and
//! rebuilds the oracle for sessions started afterwards.

use crate::config::{build_oracle, is_valid_key, mask_key, resolve_api_key};
use crate::session::RunSettings;
use crate::{ApiError, ApiResult, AppState};
use axum::{extract::State, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, warn};
use xuexi_common::config::{write_toml_config, TomlConfig};

/// POST /api/settings request; absent fields are left unchanged
#[derive(Debug, Default, Deserialize)]
pub struct UpdateSettingsRequest {
    pub api_key: Option<String>,
    pub oracle_endpoint: Option<String>,
    pub oracle_model: Option<String>,
    pub evidence_dir: Option<PathBuf>,
    pub time_unit_ms: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SettingsResponse {
    /// Masked API key, when one is configured
    pub api_key: Option<String>,
    pub oracle_ready: bool,
    pub oracle_endpoint: Option<String>,
    pub oracle_model: Option<String>,
    pub evidence_dir: Option<PathBuf>,
    pub time_unit_ms: u64,
    /// Whether the last update reached the config file
    pub persisted: bool,
}

async fn settings_response(state: &AppState, config: &TomlConfig, persisted: bool) -> SettingsResponse {
    SettingsResponse {
        api_key: config.api_key.as_deref().map(mask_key),
        oracle_ready: state.sessions.has_oracle().await,
        oracle_endpoint: config.oracle.endpoint.clone(),
        oracle_model: config.oracle.model.clone(),
        evidence_dir: config.evidence_dir.clone(),
        time_unit_ms: config.time_unit_ms(),
        persisted,
    }
}

/// GET /api/settings
pub async fn get_settings(State(state): State<AppState>) -> Json<SettingsResponse> {
    let config = state.config.read().await.clone();
    Json(settings_response(&state, &config, state.config_path.is_some()).await)
}

/// POST /api/settings
///
/// **Errors:**
/// - 400 Bad Request: empty or whitespace-only API key, zero time unit
///
/// **Note:** TOML write failures log warnings but do not fail the request
pub async fn update_settings(
    State(state): State<AppState>,
    Json(request): Json<UpdateSettingsRequest>,
) -> ApiResult<Json<SettingsResponse>> {
    if let Some(key) = &request.api_key {
        if !is_valid_key(key) {
            return Err(ApiError::BadRequest(
                "API key cannot be empty or whitespace-only".to_string(),
            ));
        }
    }
    if request.time_unit_ms == Some(0) {
        return Err(ApiError::BadRequest("time_unit_ms must be positive".to_string()));
    }

    let config = {
        let mut config = state.config.write().await;
        if let Some(key) = request.api_key {
            config.api_key = Some(key.trim().to_string());
        }
        if let Some(endpoint) = request.oracle_endpoint {
            config.oracle.endpoint = Some(endpoint);
        }
        if let Some(model) = request.oracle_model {
            config.oracle.model = Some(model);
        }
        if let Some(dir) = request.evidence_dir {
            config.evidence_dir = Some(dir);
        }
        if let Some(ms) = request.time_unit_ms {
            config.time_unit_ms = Some(ms);
        }
        config.clone()
    };

    state
        .sessions
        .set_oracle(build_oracle(resolve_api_key(&config), &config))
        .await;
    state
        .sessions
        .set_settings(RunSettings::from_config(&config))
        .await;
    info!("Runner settings updated via API");

    let persisted = match &state.config_path {
        Some(path) => match write_toml_config(&config, path) {
            Ok(()) => {
                info!("Settings written to {}", path.display());
                true
            }
            Err(e) => {
                warn!("TOML write failed (settings applied in memory): {}", e);
                false
            }
        },
        None => false,
    };

    Ok(Json(settings_response(&state, &config, persisted).await))
}

/// Build settings routes
pub fn settings_routes() -> Router<AppState> {
    Router::new().route("/api/settings", get(get_settings).post(update_settings))
}
