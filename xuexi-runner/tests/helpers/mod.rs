//! Test Helper Utilities
//!
//! Scripted in-memory collaborators for driving the session engine without
//! a device. Every controller call and pipeline node run is appended to a
//! shared [`Journal`] so tests can assert on the exact action sequence.

#![allow(dead_code)]

use image::Rgb;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use xuexi_common::events::{Event, EventLog};
use xuexi_runner::collaborators::{
    ActionId, ActionParams, Choice, CollaboratorError, CollaboratorResult, ContentClass,
    ContentFingerprint, Controller, Detection, Detector, DeviceConnector, DeviceContext, DeviceInfo, Frame, Matcher,
    Notification, Notifier, Oracle, Point, Recognition, Recognizer, Region,
};
use xuexi_runner::session::{
    EvidenceStore, Pacer, RunSettings, SessionController, SessionHandle, StageContext, StageKind,
    StageServices,
};

/// Stage time unit used by every test
pub const TEST_UNIT_MS: u64 = 1;

/// Size of frames returned by [`ScriptedController`]
pub const FRAME_WIDTH: u32 = 360;
pub const FRAME_HEIGHT: u32 = 640;

/// Box returned by nodes that match without a script
pub const DEFAULT_BOX: Region = Region {
    x: 20,
    y: 20,
    w: 60,
    h: 30,
};

pub fn fast_settings() -> RunSettings {
    RunSettings {
        pacer: Pacer::from_millis(TEST_UNIT_MS),
        evidence: EvidenceStore::disabled(),
        seed: Some(42),
    }
}

// ============================================================================
// Journal
// ============================================================================

/// One observed outward action
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Capture,
    Tap(Point),
    Swipe { from: Point, to: Point, duration_ms: u32 },
    InputText(String),
    StartApp(String),
    Node(ActionId),
}

#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<Step>>>);

impl Journal {
    pub fn push(&self, step: Step) {
        self.0.lock().unwrap().push(step);
    }

    pub fn steps(&self) -> Vec<Step> {
        self.0.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    pub fn count_node(&self, action: ActionId) -> usize {
        self.steps()
            .iter()
            .filter(|s| **s == Step::Node(action))
            .count()
    }

    pub fn taps(&self) -> Vec<Point> {
        self.steps()
            .into_iter()
            .filter_map(|s| match s {
                Step::Tap(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    /// Captures since the most recent browse entry node
    pub fn captures_since_entry(&self) -> usize {
        self.steps()
            .iter()
            .rev()
            .take_while(|s| {
                !matches!(
                    s,
                    Step::Node(ActionId::EnterFeed | ActionId::EnterMediaChannel)
                )
            })
            .filter(|s| **s == Step::Capture)
            .count()
    }

    pub fn count_choose(&self) -> usize {
        self.steps()
            .iter()
            .filter(|s| matches!(s, Step::Node(ActionId::Choose(_))))
            .count()
    }
}

// ============================================================================
// Device-bound collaborators
// ============================================================================

pub struct ScriptedController {
    journal: Journal,
    frames: Mutex<VecDeque<Frame>>,
    default_frame: Mutex<Frame>,
    paint_by_stage: AtomicBool,
}

impl ScriptedController {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            frames: Mutex::new(VecDeque::new()),
            default_frame: Mutex::new(Frame::from_pixel(
                FRAME_WIDTH,
                FRAME_HEIGHT,
                Rgb([200, 200, 200]),
            )),
            paint_by_stage: AtomicBool::new(false),
        }
    }

    /// Unqueued captures become solid frames whose red channel is the
    /// capture's ordinal within the current browse stage, so every stage
    /// sees the same sequence 1, 2, 3...
    pub fn paint_by_stage(&self) {
        self.paint_by_stage.store(true, Ordering::SeqCst);
    }

    pub fn queue_frame(&self, frame: Frame) {
        self.frames.lock().unwrap().push_back(frame);
    }

    pub fn set_default_frame(&self, frame: Frame) {
        *self.default_frame.lock().unwrap() = frame;
    }
}

#[async_trait::async_trait]
impl Controller for ScriptedController {
    async fn capture(&self) -> CollaboratorResult<Frame> {
        self.journal.push(Step::Capture);
        if let Some(queued) = self.frames.lock().unwrap().pop_front() {
            return Ok(queued);
        }
        if self.paint_by_stage.load(Ordering::SeqCst) {
            let ordinal = self.journal.captures_since_entry().min(255) as u8;
            return Ok(Frame::from_pixel(
                FRAME_WIDTH,
                FRAME_HEIGHT,
                Rgb([ordinal, 0, 0]),
            ));
        }
        Ok(self.default_frame.lock().unwrap().clone())
    }

    async fn tap(&self, at: Point) -> CollaboratorResult<()> {
        self.journal.push(Step::Tap(at));
        Ok(())
    }

    async fn swipe(&self, from: Point, to: Point, duration_ms: u32) -> CollaboratorResult<()> {
        self.journal.push(Step::Swipe {
            from,
            to,
            duration_ms,
        });
        Ok(())
    }

    async fn input_text(&self, text: &str) -> CollaboratorResult<()> {
        self.journal.push(Step::InputText(text.to_string()));
        Ok(())
    }

    async fn start_app(&self, package: &str) -> CollaboratorResult<()> {
        self.journal.push(Step::StartApp(package.to_string()));
        Ok(())
    }
}

/// Recognizer answering from per-node scripts, then per-node defaults,
/// then [`Recognition::hit`] at [`DEFAULT_BOX`]
pub struct ScriptedRecognizer {
    journal: Journal,
    scripts: Mutex<HashMap<ActionId, VecDeque<Recognition>>>,
    defaults: Mutex<HashMap<ActionId, Recognition>>,
    params: Mutex<Vec<(ActionId, Option<ActionParams>)>>,
    delays: Mutex<HashMap<ActionId, Duration>>,
    returned: Mutex<Vec<ActionId>>,
}

impl ScriptedRecognizer {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            scripts: Mutex::new(HashMap::new()),
            defaults: Mutex::new(HashMap::new()),
            params: Mutex::new(Vec::new()),
            delays: Mutex::new(HashMap::new()),
            returned: Mutex::new(Vec::new()),
        }
    }

    /// Every run of `action` takes `delay` after being journaled
    pub fn set_delay(&self, action: ActionId, delay: Duration) {
        self.delays.lock().unwrap().insert(action, delay);
    }

    /// Queue results for the next runs of `action`
    pub fn script(&self, action: ActionId, results: Vec<Recognition>) {
        self.scripts
            .lock()
            .unwrap()
            .entry(action)
            .or_default()
            .extend(results);
    }

    pub fn set_default(&self, action: ActionId, result: Recognition) {
        self.defaults.lock().unwrap().insert(action, result);
    }

    /// Runs of `action` that have returned to the caller
    pub fn returned(&self, action: ActionId) -> usize {
        self.returned
            .lock()
            .unwrap()
            .iter()
            .filter(|a| **a == action)
            .count()
    }

    fn next_result(&self, action: ActionId) -> Recognition {
        let scripted = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&action)
            .and_then(|q| q.pop_front());
        scripted
            .or_else(|| self.defaults.lock().unwrap().get(&action).cloned())
            .unwrap_or_else(|| Recognition::hit(DEFAULT_BOX))
    }

    /// Params passed to every run of `action`
    pub fn params_for(&self, action: ActionId) -> Vec<Option<ActionParams>> {
        self.params
            .lock()
            .unwrap()
            .iter()
            .filter(|(a, _)| *a == action)
            .map(|(_, p)| p.clone())
            .collect()
    }
}

#[async_trait::async_trait]
impl Recognizer for ScriptedRecognizer {
    async fn run(
        &self,
        action: ActionId,
        params: Option<ActionParams>,
    ) -> CollaboratorResult<Recognition> {
        self.journal.push(Step::Node(action));
        self.params.lock().unwrap().push((action, params));
        let delay = self.delays.lock().unwrap().get(&action).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let result = self.next_result(action);
        self.returned.lock().unwrap().push(action);
        Ok(result)
    }
}

/// Detector answering from queued rounds, then a default round
pub struct ScriptedDetector {
    rounds: Mutex<VecDeque<Vec<Detection>>>,
    default_round: Mutex<Vec<Detection>>,
}

impl ScriptedDetector {
    pub fn new(default_round: Vec<Detection>) -> Self {
        Self {
            rounds: Mutex::new(VecDeque::new()),
            default_round: Mutex::new(default_round),
        }
    }

    pub fn queue_round(&self, round: Vec<Detection>) {
        self.rounds.lock().unwrap().push_back(round);
    }

    pub fn set_default_round(&self, round: Vec<Detection>) {
        *self.default_round.lock().unwrap() = round;
    }
}

#[async_trait::async_trait]
impl Detector for ScriptedDetector {
    async fn detect(&self, _frame: &Frame) -> CollaboratorResult<Vec<Detection>> {
        let queued = self.rounds.lock().unwrap().pop_front();
        Ok(queued.unwrap_or_else(|| self.default_round.lock().unwrap().clone()))
    }
}

pub fn detection(region: Region, label: ContentClass) -> Detection {
    Detection {
        region,
        label,
        confidence: 0.9,
    }
}

/// Two articles and one video, all inside the default frame
pub fn default_detections() -> Vec<Detection> {
    vec![
        detection(Region::new(0, 100, 300, 120), ContentClass::Article),
        detection(Region::new(0, 260, 300, 120), ContentClass::ArticleImage),
        detection(Region::new(0, 420, 300, 120), ContentClass::Video),
    ]
}

// ============================================================================
// Session-wide collaborators
// ============================================================================

/// Every candidate is new
pub struct NeverSimilar;

impl Matcher for NeverSimilar {
    fn fingerprint(&self, _crop: &Frame) -> ContentFingerprint {
        ContentFingerprint::from_bytes(Vec::new())
    }

    fn score(&self, _candidate: &ContentFingerprint, _reference: &ContentFingerprint) -> f32 {
        0.0
    }
}

fn red_fingerprint(crop: &Frame) -> ContentFingerprint {
    ContentFingerprint::from_bytes(vec![crop.get_pixel(0, 0)[0]])
}

/// Score is the candidate's top-left red channel / 100
pub struct RedKeyedMatcher;

impl Matcher for RedKeyedMatcher {
    fn fingerprint(&self, crop: &Frame) -> ContentFingerprint {
        red_fingerprint(crop)
    }

    fn score(&self, candidate: &ContentFingerprint, _reference: &ContentFingerprint) -> f32 {
        candidate.as_bytes()[0] as f32 / 100.0
    }
}

/// Crops with the same top-left red channel are duplicates, all others new
pub struct SameRedMatcher;

impl Matcher for SameRedMatcher {
    fn fingerprint(&self, crop: &Frame) -> ContentFingerprint {
        red_fingerprint(crop)
    }

    fn score(&self, candidate: &ContentFingerprint, reference: &ContentFingerprint) -> f32 {
        if candidate == reference {
            1.0
        } else {
            0.0
        }
    }
}

/// Oracle answering from queues; choice default is `[B]`, blank default
/// is `"default answer"`
pub struct ScriptedOracle {
    choices: Mutex<VecDeque<Option<Vec<Choice>>>>,
    blanks: Mutex<VecDeque<Option<String>>>,
    /// `(image dimensions, has_hint)` per call
    calls: Mutex<Vec<(Vec<(u32, u32)>, Option<bool>)>>,
}

impl Default for ScriptedOracle {
    fn default() -> Self {
        Self {
            choices: Mutex::new(VecDeque::new()),
            blanks: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl ScriptedOracle {
    pub fn queue_choice(&self, answer: Option<Vec<Choice>>) {
        self.choices.lock().unwrap().push_back(answer);
    }

    pub fn queue_blank(&self, answer: Option<String>) {
        self.blanks.lock().unwrap().push_back(answer);
    }

    pub fn calls(&self) -> Vec<(Vec<(u32, u32)>, Option<bool>)> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, images: &[Frame], has_hint: Option<bool>) {
        let dims = images.iter().map(|f| f.dimensions()).collect();
        self.calls.lock().unwrap().push((dims, has_hint));
    }
}

#[async_trait::async_trait]
impl Oracle for ScriptedOracle {
    async fn resolve_choice(&self, images: &[Frame]) -> Option<Vec<Choice>> {
        self.record(images, None);
        self.choices
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Some(vec![Choice::B]))
    }

    async fn resolve_blank(
        &self,
        images: &[Frame],
        has_hint: bool,
        _blank_count: Option<usize>,
    ) -> Option<String> {
        self.record(images, Some(has_hint));
        self.blanks
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Some("default answer".to_string()))
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    notifications: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: &Notification) {
        self.notifications.lock().unwrap().push(notification.clone());
    }
}

// ============================================================================
// Rig
// ============================================================================

/// All scripted collaborators wired to one journal
pub struct Rig {
    pub journal: Journal,
    pub controller: Arc<ScriptedController>,
    pub recognizer: Arc<ScriptedRecognizer>,
    pub detector: Arc<ScriptedDetector>,
    pub oracle: Arc<ScriptedOracle>,
    pub notifier: Arc<RecordingNotifier>,
    pub events: Arc<EventLog>,
}

impl Default for Rig {
    fn default() -> Self {
        Self::new()
    }
}

impl Rig {
    pub fn new() -> Self {
        let journal = Journal::default();
        Self {
            controller: Arc::new(ScriptedController::new(journal.clone())),
            recognizer: Arc::new(ScriptedRecognizer::new(journal.clone())),
            detector: Arc::new(ScriptedDetector::new(default_detections())),
            oracle: Arc::new(ScriptedOracle::default()),
            notifier: Arc::new(RecordingNotifier::default()),
            events: Arc::new(EventLog::new()),
            journal,
        }
    }

    pub fn device_info() -> DeviceInfo {
        DeviceInfo {
            serial: "emulator-5554".to_string(),
            name: Some("test device".to_string()),
        }
    }

    pub fn device_context(&self) -> DeviceContext {
        DeviceContext {
            device: Self::device_info(),
            controller: self.controller.clone(),
            recognizer: self.recognizer.clone(),
            detector: self.detector.clone(),
        }
    }

    pub fn services(&self, matcher: Arc<dyn Matcher>) -> StageServices {
        StageServices {
            events: self.events.clone(),
            matcher,
            oracle: Some(self.oracle.clone()),
            notifier: self.notifier.clone(),
        }
    }

    /// Stage context for driving one stage function directly
    pub fn stage_context(
        &self,
        stages: Vec<StageKind>,
        matcher: Arc<dyn Matcher>,
        settings: RunSettings,
    ) -> (Arc<SessionHandle>, Arc<StageContext>) {
        let handle = Arc::new(SessionHandle::new(stages));
        let ctx = StageContext::new(
            handle.clone(),
            Arc::new(self.device_context()),
            self.services(matcher),
            settings,
        );
        (handle, Arc::new(ctx))
    }

    /// Controller with no device bound
    pub fn session_controller(&self) -> Arc<SessionController> {
        self.session_controller_with(Arc::new(NeverSimilar))
    }

    pub fn session_controller_with(&self, matcher: Arc<dyn Matcher>) -> Arc<SessionController> {
        Arc::new(SessionController::new(
            self.events.clone(),
            matcher,
            self.notifier.clone(),
            Some(self.oracle.clone()),
            fast_settings(),
        ))
    }

    /// Controller with this rig's device attached
    pub async fn connected_controller(&self) -> Arc<SessionController> {
        let controller = self.session_controller();
        controller.attach(self.device_context()).await;
        controller
    }

    pub async fn connected_controller_with(
        &self,
        matcher: Arc<dyn Matcher>,
    ) -> Arc<SessionController> {
        let controller = self.session_controller_with(matcher);
        controller.attach(self.device_context()).await;
        controller
    }

    pub fn session_events(&self, handle: &SessionHandle) -> Vec<Event> {
        self.events.for_session(handle.id())
    }
}

// ============================================================================
// Connector
// ============================================================================

/// Connector that lists one device and binds it to a rig's collaborators
pub struct StaticConnector {
    context: DeviceContext,
    fail: bool,
}

impl StaticConnector {
    pub fn new(rig: &Rig) -> Self {
        Self {
            context: rig.device_context(),
            fail: false,
        }
    }

    pub fn failing(rig: &Rig) -> Self {
        Self {
            context: rig.device_context(),
            fail: true,
        }
    }
}

#[async_trait::async_trait]
impl DeviceConnector for StaticConnector {
    async fn list_devices(&self) -> CollaboratorResult<Vec<DeviceInfo>> {
        Ok(vec![self.context.device.clone()])
    }

    async fn connect(&self, device: &DeviceInfo) -> CollaboratorResult<DeviceContext> {
        if self.fail {
            return Err(CollaboratorError::Device(format!(
                "{} is offline",
                device.serial
            )));
        }
        Ok(self.context.clone())
    }
}

// ============================================================================
// Frames
// ============================================================================

/// Default-size frame with each `(region, red)` pair painted in
pub fn painted_frame(patches: &[(Region, u8)]) -> Frame {
    let mut frame = Frame::from_pixel(FRAME_WIDTH, FRAME_HEIGHT, Rgb([200, 200, 200]));
    for (region, red) in patches {
        for y in region.y..region.y + region.h {
            for x in region.x..region.x + region.w {
                frame.put_pixel(x as u32, y as u32, Rgb([*red, 0, 0]));
            }
        }
    }
    frame
}

/// Poll `cond` every millisecond for up to two seconds
pub async fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    for _ in 0..2000 {
        if cond() {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(1)).await;
    }
    cond()
}
