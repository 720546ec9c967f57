//! xuexi-runner library interface
//!
//! Session engine, stage algorithms, collaborator contracts and the HTTP
//! API. Exposed as a library for integration testing.

pub mod api;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod session;
pub mod stages;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use collaborators::DeviceConnector;
use session::SessionController;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use xuexi_common::config::TomlConfig;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Session engine and bound device
    pub sessions: Arc<SessionController>,
    /// Device discovery and binding
    pub connector: Arc<dyn DeviceConnector>,
    /// Current runner settings
    pub config: Arc<RwLock<TomlConfig>>,
    /// Where settings updates are written; `None` keeps them in memory
    pub config_path: Option<PathBuf>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last session failure for diagnostics
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(
        sessions: Arc<SessionController>,
        connector: Arc<dyn DeviceConnector>,
        config: TomlConfig,
        config_path: Option<PathBuf>,
    ) -> Self {
        let last_error = sessions.last_error_handle();
        Self {
            sessions,
            connector,
            config: Arc::new(RwLock::new(config)),
            config_path,
            startup_time: Utc::now(),
            last_error,
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .merge(api::session_routes())
        .route("/api/events", get(api::event_stream))
        .merge(api::device_routes())
        .merge(api::settings_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
