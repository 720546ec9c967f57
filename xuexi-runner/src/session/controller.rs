//! Session lifecycle management

use super::{
    RunSettings, SessionError, SessionHandle, SessionSnapshot, StageContext, StageKind,
    StageServices, Status,
};
use crate::collaborators::{
    DeviceConnector, DeviceContext, DeviceInfo, Matcher, Notification, Notifier, Oracle, Severity,
};
use crate::stages::{self, StageError};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, warn};
use uuid::Uuid;
use xuexi_common::config::DEFAULT_APP_PACKAGE;
use xuexi_common::events::{EventKind, EventLog};

/// Owns the bound device and at most one active session
///
/// The event log is controller-wide: device binding lines carry no session
/// id, stage lines carry the id of the session that produced them.
pub struct SessionController {
    events: Arc<EventLog>,
    matcher: Arc<dyn Matcher>,
    notifier: Arc<dyn Notifier>,
    oracle: RwLock<Option<Arc<dyn Oracle>>>,
    device: RwLock<Option<Arc<DeviceContext>>>,
    settings: RwLock<RunSettings>,
    app_package: String,
    current: Mutex<Option<Arc<SessionHandle>>>,
    last_error: Arc<RwLock<Option<String>>>,
}

impl SessionController {
    pub fn new(
        events: Arc<EventLog>,
        matcher: Arc<dyn Matcher>,
        notifier: Arc<dyn Notifier>,
        oracle: Option<Arc<dyn Oracle>>,
        settings: RunSettings,
    ) -> Self {
        Self {
            events,
            matcher,
            notifier,
            oracle: RwLock::new(oracle),
            device: RwLock::new(None),
            settings: RwLock::new(settings),
            app_package: DEFAULT_APP_PACKAGE.to_string(),
            current: Mutex::new(None),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Package launched after a device is bound
    pub fn with_app_package(mut self, package: impl Into<String>) -> Self {
        self.app_package = package.into();
        self
    }

    pub fn events(&self) -> &Arc<EventLog> {
        &self.events
    }

    /// Shared slot holding the last session failure
    pub fn last_error_handle(&self) -> Arc<RwLock<Option<String>>> {
        Arc::clone(&self.last_error)
    }

    /// Replace the oracle used by sessions started from now on
    pub async fn set_oracle(&self, oracle: Option<Arc<dyn Oracle>>) {
        *self.oracle.write().await = oracle;
    }

    pub async fn has_oracle(&self) -> bool {
        self.oracle.read().await.is_some()
    }

    /// Replace run settings for sessions started from now on
    pub async fn set_settings(&self, settings: RunSettings) {
        *self.settings.write().await = settings;
    }

    // ========================================================================
    // Device binding
    // ========================================================================

    /// Bind a device through `connector` and launch the target app
    ///
    /// On failure the controller is left unconnected and the operator is
    /// notified.
    pub async fn connect(
        &self,
        connector: &dyn DeviceConnector,
        device: &DeviceInfo,
    ) -> Result<(), SessionError> {
        self.ensure_idle().await?;

        match connector.connect(device).await {
            Ok(context) => {
                self.attach(context).await;
                Ok(())
            }
            Err(e) => {
                *self.device.write().await = None;
                let message = format!("failed to connect {}: {}", device.serial, e);
                warn!(serial = %device.serial, error = %e, "Device connection failed");
                self.notifier.notify(&Notification {
                    title: super::NOTIFICATION_TITLE.to_string(),
                    message: message.clone(),
                    severity: Severity::Warning,
                    timeout_secs: super::ESCALATION_TIMEOUT_SECS,
                });
                self.events.append(EventKind::Info, message, None);
                Err(SessionError::ConnectionFailure(e.to_string()))
            }
        }
    }

    /// Install an already-built device context and launch the target app
    pub async fn attach(&self, context: DeviceContext) {
        let serial = context.device.serial.clone();
        self.events
            .append(EventKind::Info, format!("device connected: {}", serial), None);
        info!(serial = %serial, "Device connected");

        self.events.append(
            EventKind::Info,
            format!("launching {}", self.app_package),
            None,
        );
        if let Err(e) = context.controller.start_app(&self.app_package).await {
            warn!(serial = %serial, error = %e, "App launch failed");
            self.events
                .append(EventKind::Info, format!("app launch failed: {}", e), None);
        }

        *self.device.write().await = Some(Arc::new(context));
    }

    pub async fn is_connected(&self) -> bool {
        self.device.read().await.is_some()
    }

    pub async fn connected_device(&self) -> Option<DeviceInfo> {
        self.device.read().await.as_ref().map(|d| d.device.clone())
    }

    async fn ensure_idle(&self) -> Result<(), SessionError> {
        match self.current.lock().await.as_ref() {
            Some(handle) if handle.status().is_active() => Err(SessionError::AlreadyRunning),
            _ => Ok(()),
        }
    }

    // ========================================================================
    // Session control
    // ========================================================================

    /// Start a session running `stages` in order
    ///
    /// Returns as soon as the background task is spawned.
    pub async fn start(&self, stages: Vec<StageKind>) -> Result<Uuid, SessionError> {
        let mut current = self.current.lock().await;

        if matches!(current.as_ref(), Some(h) if h.status().is_active()) {
            return Err(SessionError::AlreadyRunning);
        }

        let device = self
            .device
            .read()
            .await
            .clone()
            .ok_or(SessionError::NotConnected)?;

        if stages.is_empty() {
            return Err(SessionError::InvalidStages("no stages requested".to_string()));
        }
        if let Some(kind) = stages.iter().find(|k| !k.is_supported()) {
            return Err(SessionError::InvalidStages(format!("{} is not supported", kind)));
        }

        let handle = Arc::new(SessionHandle::new(stages));
        let services = StageServices {
            events: Arc::clone(&self.events),
            matcher: Arc::clone(&self.matcher),
            oracle: self.oracle.read().await.clone(),
            notifier: Arc::clone(&self.notifier),
        };
        let settings = self.settings.read().await.clone();
        let ctx = StageContext::new(Arc::clone(&handle), device, services, settings);

        let session_id = handle.id();
        info!(session_id = %session_id, stages = ?handle.stages(), "Session started");

        let last_error = Arc::clone(&self.last_error);
        tokio::spawn(async move {
            run_session(ctx, last_error).await;
        });

        *current = Some(handle);
        Ok(session_id)
    }

    /// Request a cooperative stop
    pub async fn stop(&self) -> Result<(), SessionError> {
        let current = self.current.lock().await;
        let handle = current.as_ref().ok_or(SessionError::NotRunning)?;
        handle.request_stop()?;
        info!(session_id = %handle.id(), "Stop requested");
        Ok(())
    }

    pub async fn pause(&self) -> Result<(), SessionError> {
        let current = self.current.lock().await;
        let handle = current.as_ref().ok_or(SessionError::NotRunning)?;
        handle.pause()?;
        info!(session_id = %handle.id(), "Pause requested");
        Ok(())
    }

    pub async fn resume(&self) -> Result<(), SessionError> {
        let current = self.current.lock().await;
        let handle = current.as_ref().ok_or(SessionError::NotPaused)?;
        handle.resume()?;
        info!(session_id = %handle.id(), "Session resumed");
        Ok(())
    }

    /// Current (or most recent) session handle
    pub async fn current(&self) -> Option<Arc<SessionHandle>> {
        self.current.lock().await.clone()
    }

    pub async fn status(&self) -> Status {
        self.current
            .lock()
            .await
            .as_ref()
            .map(|h| h.status())
            .unwrap_or(Status::Idle)
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let current = self.current().await;
        let device = self.connected_device().await;
        SessionSnapshot {
            status: current.as_ref().map(|h| h.status()).unwrap_or(Status::Idle),
            session_id: current.as_ref().map(|h| h.id()),
            stages: current.map(|h| h.stages().to_vec()).unwrap_or_default(),
            connected: device.is_some(),
            device: device.map(|d| d.serial),
        }
    }
}

/// Body of the session task
async fn run_session(ctx: StageContext, last_error: Arc<RwLock<Option<String>>>) {
    let session = Arc::clone(ctx.session());
    let session_id = session.id();

    let mut failure = None;
    let outcome = match run_stages(&ctx).await {
        Ok(()) => Status::Completed,
        Err(StageError::Cancelled) => Status::Stopped,
        Err(e) => {
            error!(session_id = %session_id, error = %e, "Session failed");
            let message = format!("session failed: {}", e);
            *last_error.write().await = Some(e.to_string());
            ctx.notify(Severity::Critical, message.clone(), super::ESCALATION_TIMEOUT_SECS);
            failure = Some(message);
            Status::Failed
        }
    };

    // The terminal event is appended before the status flips
    session.finish(outcome, |status| match status {
        Status::Completed => {
            ctx.emit(EventKind::Completed, "all tasks completed");
        }
        Status::Stopped => {
            ctx.emit(EventKind::Stopped, "session stopped");
        }
        _ => {
            let message = failure.take().unwrap_or_else(|| "session failed".to_string());
            ctx.emit(EventKind::Failed, message);
        }
    });
}

async fn run_stages(ctx: &StageContext) -> Result<(), StageError> {
    for &kind in ctx.session().stages() {
        ctx.checkpoint().await?;
        ctx.log(format!("task started: {}", kind));
        stages::run_stage(ctx, kind).await?;
        ctx.log(format!("task finished: {}", kind));
    }
    // A pause or stop accepted during the last call lands here
    ctx.checkpoint().await
}
