//! Per-run context handed to every stage

use super::{escalation, EvidenceStore, Pacer, ScrollGesture, SessionHandle, Status};
use crate::collaborators::{
    ActionId, ActionParams, Detection, DeviceContext, Frame, Matcher, Notification, Notifier, Oracle, Point,
    Recognition, Region, Severity,
};
use crate::stages::StageError;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::ops::RangeInclusive;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};
use uuid::Uuid;
use xuexi_common::config::TomlConfig;
use xuexi_common::events::{Event, EventKind, EventLog};

/// Collaborators that are not bound to a device
#[derive(Clone)]
pub struct StageServices {
    pub events: Arc<EventLog>,
    pub matcher: Arc<dyn Matcher>,
    /// `None` when no API key is configured; every oracle question escalates
    pub oracle: Option<Arc<dyn Oracle>>,
    pub notifier: Arc<dyn Notifier>,
}

/// Tunables for a run
#[derive(Debug, Clone, Default)]
pub struct RunSettings {
    pub pacer: Pacer,
    pub evidence: EvidenceStore,
    /// Fixed RNG seed; entropy-seeded when unset
    pub seed: Option<u64>,
}

impl RunSettings {
    pub fn from_config(config: &TomlConfig) -> Self {
        Self {
            pacer: Pacer::from_millis(config.time_unit_ms()),
            evidence: EvidenceStore::new(config.evidence_dir.clone()),
            seed: None,
        }
    }
}

/// Everything a stage may touch
///
/// Every outward call goes through a context method that passes a safe
/// point first, so a stop request is honored before the next device action.
pub struct StageContext {
    session: Arc<SessionHandle>,
    device: Arc<DeviceContext>,
    services: StageServices,
    pacer: Pacer,
    evidence: EvidenceStore,
    rng: Mutex<StdRng>,
}

impl StageContext {
    pub fn new(
        session: Arc<SessionHandle>,
        device: Arc<DeviceContext>,
        services: StageServices,
        settings: RunSettings,
    ) -> Self {
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            evidence: settings.evidence.for_session(session.id()),
            session,
            device,
            services,
            pacer: settings.pacer,
            rng: Mutex::new(rng),
        }
    }

    pub fn session(&self) -> &Arc<SessionHandle> {
        &self.session
    }

    pub fn session_id(&self) -> Uuid {
        self.session.id()
    }

    pub fn device(&self) -> &DeviceContext {
        &self.device
    }

    pub fn matcher(&self) -> &dyn Matcher {
        self.services.matcher.as_ref()
    }

    pub fn oracle(&self) -> Option<&dyn Oracle> {
        self.services.oracle.as_deref()
    }

    pub fn evidence(&self) -> &EvidenceStore {
        &self.evidence
    }

    pub fn pacer(&self) -> Pacer {
        self.pacer
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    /// Append an operator-facing progress line
    pub fn log(&self, message: impl Into<String>) -> Event {
        self.emit(EventKind::Info, message)
    }

    pub fn emit(&self, kind: EventKind, message: impl Into<String>) -> Event {
        let event = self
            .services
            .events
            .append(kind, message, Some(self.session.id()));
        info!(session_id = %self.session.id(), kind = kind.as_str(), "{}", event.message);
        event
    }

    pub fn notify(&self, severity: Severity, message: impl Into<String>, timeout_secs: u32) {
        self.services.notifier.notify(&Notification {
            title: escalation::NOTIFICATION_TITLE.to_string(),
            message: message.into(),
            severity,
            timeout_secs,
        });
    }

    // ------------------------------------------------------------------
    // Safe points and waits
    // ------------------------------------------------------------------

    /// Safe point: fails with `Cancelled` after a stop request and blocks
    /// while the session is paused
    pub async fn checkpoint(&self) -> Result<(), StageError> {
        if self.session.is_cancelled() {
            return Err(StageError::Cancelled);
        }

        let mut status = self.session.subscribe_status();
        let paused = *status.borrow() == Status::Paused;
        if paused {
            debug!(session_id = %self.session.id(), "Paused; waiting for resume");
            let cancel = self.session.cancel_token();
            tokio::select! {
                _ = cancel.cancelled() => return Err(StageError::Cancelled),
                resumed = async { status.wait_for(|s| *s != Status::Paused).await.map(|_| ()) } => {
                    if resumed.is_err() {
                        return Err(StageError::Cancelled);
                    }
                }
            }
        }

        if self.session.is_cancelled() {
            return Err(StageError::Cancelled);
        }
        Ok(())
    }

    /// Wait `units`, with a safe point on either side
    ///
    /// A stop request cuts the wait short.
    pub async fn wait(&self, units: f64) -> Result<(), StageError> {
        self.checkpoint().await?;
        tokio::select! {
            _ = self.session.cancel_token().cancelled() => return Err(StageError::Cancelled),
            _ = self.pacer.sleep(units) => {}
        }
        self.checkpoint().await
    }

    /// Wait a random whole number of units in `lo..=hi`; returns the units
    /// waited
    pub async fn wait_random(&self, lo: u32, hi: u32) -> Result<f64, StageError> {
        let units = self.with_rng(|rng| rng.gen_range(lo..=hi)) as f64;
        self.wait(units).await?;
        Ok(units)
    }

    pub fn random_in(&self, range: RangeInclusive<i32>) -> i32 {
        self.with_rng(|rng| rng.gen_range(range))
    }

    pub fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut rng)
    }

    /// Operator handoff; returns once resumed, `Cancelled` if stopped
    pub async fn escalate(&self, reason: &str) -> Result<(), StageError> {
        escalation::escalate(self, reason).await
    }

    // ------------------------------------------------------------------
    // Device actions
    // ------------------------------------------------------------------
    //
    // Each collaborator call is bracketed by safe points.

    pub async fn capture(&self) -> Result<Frame, StageError> {
        self.checkpoint().await?;
        let frame = self.device.controller.capture().await?;
        self.checkpoint().await?;
        Ok(frame)
    }

    pub async fn tap(&self, at: Point) -> Result<(), StageError> {
        self.checkpoint().await?;
        self.device.controller.tap(at).await?;
        self.checkpoint().await
    }

    pub async fn swipe(&self, gesture: ScrollGesture) -> Result<(), StageError> {
        self.checkpoint().await?;
        self.device
            .controller
            .swipe(gesture.from, gesture.to, gesture.duration_ms)
            .await?;
        self.checkpoint().await
    }

    pub async fn detect(&self, frame: &Frame) -> Result<Vec<Detection>, StageError> {
        self.checkpoint().await?;
        let detections = self.device.detector.detect(frame).await?;
        self.checkpoint().await?;
        Ok(detections)
    }

    pub async fn input_text(&self, text: &str) -> Result<(), StageError> {
        self.checkpoint().await?;
        self.device.controller.input_text(text).await?;
        self.checkpoint().await
    }

    /// Feed-style scroll with a fresh random gesture
    pub async fn scroll(&self) -> Result<(), StageError> {
        let gesture = self.with_rng(|rng| ScrollGesture::feed(rng));
        self.swipe(gesture).await
    }

    /// Long scroll with a fresh random gesture
    pub async fn long_scroll(&self) -> Result<(), StageError> {
        let gesture = self.with_rng(|rng| ScrollGesture::long(rng));
        self.swipe(gesture).await
    }

    pub async fn run(&self, action: ActionId) -> Result<Recognition, StageError> {
        self.run_with(action, None).await
    }

    pub async fn run_with(
        &self,
        action: ActionId,
        params: Option<ActionParams>,
    ) -> Result<Recognition, StageError> {
        self.checkpoint().await?;
        let recognition = self.device.recognizer.run(action, params).await?;
        debug!(node = %action, matched = recognition.matched, "Node finished");
        self.checkpoint().await?;
        Ok(recognition)
    }

    /// Run a node whose target must be on screen; returns its box
    pub async fn require(&self, action: ActionId) -> Result<Region, StageError> {
        let recognition = self.run(action).await?;
        match recognition.region {
            Some(region) if recognition.matched => Ok(region),
            _ => Err(StageError::MissingTarget(action)),
        }
    }
}
