//! xuexi-runner - session orchestrator service
//!
//! Binds an Android device over ADB, runs feed, media and quiz stages
//! against it and streams progress to the web UI over SSE.

use anyhow::{Context, Result};
use clap::Parser;
use std::future::IntoFuture;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use xuexi_common::config::{load_toml_config, resolve_config_path, CONFIG_ENV_VAR};
use xuexi_common::events::EventLog;

use xuexi_runner::collaborators::{
    adb::AdbConnector, matcher::PerceptualMatcher, notifier::TracingNotifier,
    remote_pipeline::DEFAULT_PIPELINE_ENDPOINT,
};
use xuexi_runner::config::{build_oracle, resolve_api_key};
use xuexi_runner::session::{RunSettings, SessionController};
use xuexi_runner::AppState;

#[derive(Debug, Parser)]
#[command(name = "xuexi-runner", version, about = "Session orchestrator service")]
struct Args {
    /// Config file (overrides XUEXI_CONFIG and the default location)
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Listen address (overrides the config file)
    #[arg(long)]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref(), CONFIG_ENV_VAR);
    let config_missing = !config_path.exists();
    let config = load_toml_config(&config_path)
        .with_context(|| format!("Failed to load config {}", config_path.display()))?;

    // Initialize tracing; RUST_LOG wins over the config level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting xuexi-runner");
    info!("Version: {} ({})", env!("CARGO_PKG_VERSION"), env!("GIT_HASH"));
    info!("Config: {}", config_path.display());
    if config_missing {
        warn!("Config file not found, running with defaults");
    }

    let oracle = build_oracle(resolve_api_key(&config), &config);
    let settings = RunSettings::from_config(&config);
    if let Some(dir) = settings.evidence.dir() {
        info!("Evidence directory: {}", dir.display());
    }

    let sessions = Arc::new(
        SessionController::new(
            Arc::new(EventLog::new()),
            Arc::new(PerceptualMatcher::new()),
            Arc::new(TracingNotifier),
            oracle,
            settings,
        )
        .with_app_package(config.app_package()),
    );

    let adb = config
        .adb_path
        .clone()
        .unwrap_or_else(|| PathBuf::from("adb"));
    let pipeline = config
        .pipeline
        .endpoint
        .clone()
        .unwrap_or_else(|| DEFAULT_PIPELINE_ENDPOINT.to_string());
    info!("Pipeline agent: {}", pipeline);
    let connector = Arc::new(AdbConnector::new(adb, pipeline).context("Failed to build HTTP client")?);

    let listen = args
        .listen
        .unwrap_or_else(|| config.listen_addr().to_string());
    let state = AppState::new(sessions.clone(), connector, config, Some(config_path));
    let app = xuexi_runner::build_router(state);

    let listener = tokio::net::TcpListener::bind(&listen)
        .await
        .with_context(|| format!("Failed to bind {}", listen))?;
    info!("Listening on http://{}", listen);
    info!("Health check: http://{}/health", listen);

    // SSE streams never end on their own, so the server is dropped rather
    // than drained once the session has wound down
    tokio::select! {
        result = axum::serve(listener, app).into_future() => result?,
        _ = shutdown_signal(sessions) => {}
    }

    info!("xuexi-runner stopped");
    Ok(())
}

/// Resolve on Ctrl-C, asking any running session to stop first
async fn shutdown_signal(sessions: Arc<SessionController>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
    if sessions.stop().await.is_ok() {
        if let Some(handle) = sessions.current().await {
            let status = handle.finished().await;
            info!(%status, "Session wound down");
        }
    }
}
