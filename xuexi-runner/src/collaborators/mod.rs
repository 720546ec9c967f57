//! Collaborator contracts for the session engine
//!
//! The engine never touches a device, a model or a network service directly.
//! Everything it needs from the outside world goes through the traits in
//! this module:
//! - **Controller:** screen capture and raw input on the bound device
//! - **Recognizer:** named pipeline nodes (locate + act, text extraction)
//! - **Detector:** content-region detection on a frame
//! - **Matcher:** perceptual fingerprints of crops and their similarity
//! - **Oracle:** assisted answering for quiz questions
//! - **Notifier:** operator notifications
//! - **DeviceConnector:** device discovery and binding
//!
//! Thin implementations ship alongside ([`adb`], [`remote_pipeline`],
//! [`matcher`], [`oracle`], [`notifier`]); tests substitute scripted ones.

pub mod adb;
pub mod frame;
pub mod matcher;
pub mod notifier;
pub mod oracle;
pub mod remote_pipeline;

pub use frame::{crop, encode_jpeg, stack_vertical};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// One captured screen, RGB
pub type Frame = image::RgbImage;

// ============================================================================
// Geometry
// ============================================================================

/// Screen coordinate in device pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned box `(x, y, w, h)` in device pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Region {
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    /// Point at a fixed offset from the top-left corner
    pub fn offset(&self, dx: i32, dy: i32) -> Point {
        Point::new(self.x + dx, self.y + dy)
    }

    pub fn is_empty(&self) -> bool {
        self.w <= 0 || self.h <= 0
    }
}

impl From<[i32; 4]> for Region {
    fn from([x, y, w, h]: [i32; 4]) -> Self {
        Self { x, y, w, h }
    }
}

// ============================================================================
// Detection & recognition results
// ============================================================================

/// Content class reported by the Detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentClass {
    Article,
    ArticleImage,
    Video,
    #[serde(other)]
    Other,
}

/// One detected region
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub region: Region,
    pub label: ContentClass,
    #[serde(default)]
    pub confidence: f32,
}

/// Outcome of running one pipeline node
///
/// Probe nodes are negative: the condition they watch for holds when
/// `matched` is false (see [`ActionId`]).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recognition {
    /// Whether the node found its target
    pub matched: bool,
    /// Best result box, when matched
    #[serde(default)]
    pub region: Option<Region>,
    /// All candidate boxes
    #[serde(default)]
    pub regions: Vec<Region>,
    /// Extracted text (text-extraction nodes only)
    #[serde(default)]
    pub text: Option<String>,
}

impl Recognition {
    /// A node that found nothing
    pub fn missed() -> Self {
        Self::default()
    }

    /// A node that found its target at `region`
    pub fn hit(region: Region) -> Self {
        Self {
            matched: true,
            region: Some(region),
            regions: vec![region],
            text: None,
        }
    }

    /// A text-extraction hit
    pub fn text(region: Region, text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::hit(region)
        }
    }
}

/// Per-call overrides for a pipeline node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionParams {
    /// Restrict recognition to this box
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roi: Option<Region>,
}

impl ActionParams {
    pub fn roi(region: Region) -> Self {
        Self { roi: Some(region) }
    }
}

// ============================================================================
// Actions
// ============================================================================

/// Quiz answer letter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Choice {
    A,
    B,
    C,
    D,
    E,
}

impl Choice {
    pub const ALL: [Choice; 5] = [Choice::A, Choice::B, Choice::C, Choice::D, Choice::E];

    pub fn from_letter(letter: char) -> Option<Self> {
        match letter {
            'A' => Some(Choice::A),
            'B' => Some(Choice::B),
            'C' => Some(Choice::C),
            'D' => Some(Choice::D),
            'E' => Some(Choice::E),
            _ => None,
        }
    }

    pub fn letter(self) -> char {
        match self {
            Choice::A => 'A',
            Choice::B => 'B',
            Choice::C => 'C',
            Choice::D => 'D',
            Choice::E => 'E',
        }
    }
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// Pipeline node the engine can run
///
/// Probes (`LoadCheck`, `FillBlankProbe`, `HintVideoProbe`, `AnomalyProbe`)
/// are negative nodes: the pipeline matches the *normal* screen, so the
/// condition of interest holds when the node does not match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionId {
    /// Open the article feed channel
    EnterFeed,
    /// Open the media channel
    EnterMediaChannel,
    /// Leave an opened article
    Back,
    /// Leave an opened media item
    BackFromMedia,
    /// Open the points page that hosts the daily quiz
    QuizEntry,
    /// Points page rendered (negative: load failed when not matched)
    LoadCheck,
    /// Daily quiz start control
    QuizStart,
    /// Choice layout (negative: fill-blank question when not matched)
    FillBlankProbe,
    /// No hint video (negative: video present when not matched)
    HintVideoProbe,
    /// Tap "view hint"
    ShowHint,
    /// Answer marker inside the hint overlay
    HintMarker,
    /// OCR inside the params' ROI
    ExtractText,
    /// Dismiss the hint overlay
    CloseHint,
    /// Tap the blank answer field
    AnswerField,
    /// Tap one choice
    Choose(Choice),
    /// Advance to the next question
    NextQuestion,
    /// Quiz result screen (negative: verification challenge when not matched)
    AnomalyProbe,
}

impl ActionId {
    /// Node name in the pipeline definition
    pub fn pipeline_name(self) -> &'static str {
        match self {
            ActionId::EnterFeed => "enter_feed",
            ActionId::EnterMediaChannel => "enter_media_channel",
            ActionId::Back => "back",
            ActionId::BackFromMedia => "back_from_media",
            ActionId::QuizEntry => "quiz_entry",
            ActionId::LoadCheck => "load_check",
            ActionId::QuizStart => "quiz_start",
            ActionId::FillBlankProbe => "fill_blank_probe",
            ActionId::HintVideoProbe => "hint_video_probe",
            ActionId::ShowHint => "show_hint",
            ActionId::HintMarker => "hint_marker",
            ActionId::ExtractText => "extract_text",
            ActionId::CloseHint => "close_hint",
            ActionId::AnswerField => "answer_field",
            ActionId::Choose(Choice::A) => "choose_a",
            ActionId::Choose(Choice::B) => "choose_b",
            ActionId::Choose(Choice::C) => "choose_c",
            ActionId::Choose(Choice::D) => "choose_d",
            ActionId::Choose(Choice::E) => "choose_e",
            ActionId::NextQuestion => "next_question",
            ActionId::AnomalyProbe => "anomaly_probe",
        }
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.pipeline_name())
    }
}

// ============================================================================
// Notifications
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// Operator-facing notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub message: String,
    pub severity: Severity,
    /// How long the notification should stay visible
    pub timeout_secs: u32,
}

// ============================================================================
// Errors
// ============================================================================

/// Failure reported by a collaborator
#[derive(Debug, Error)]
pub enum CollaboratorError {
    /// Device command failed
    #[error("Device error: {0}")]
    Device(String),

    /// Pipeline agent failed or answered garbage
    #[error("Pipeline error: {0}")]
    Pipeline(String),

    /// Assisted-answering service failure
    #[error("Oracle error: {0}")]
    Oracle(String),

    /// Frame decode/encode failure
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type CollaboratorResult<T> = Result<T, CollaboratorError>;

// ============================================================================
// Traits
// ============================================================================

/// Raw device input and capture
#[async_trait::async_trait]
pub trait Controller: Send + Sync {
    async fn capture(&self) -> CollaboratorResult<Frame>;

    async fn tap(&self, at: Point) -> CollaboratorResult<()>;

    async fn swipe(&self, from: Point, to: Point, duration_ms: u32) -> CollaboratorResult<()>;

    async fn input_text(&self, text: &str) -> CollaboratorResult<()>;

    /// Launch an app package; controllers without app control ignore it
    async fn start_app(&self, _package: &str) -> CollaboratorResult<()> {
        Ok(())
    }
}

/// Pipeline engine running named nodes against the live screen
#[async_trait::async_trait]
pub trait Recognizer: Send + Sync {
    async fn run(
        &self,
        action: ActionId,
        params: Option<ActionParams>,
    ) -> CollaboratorResult<Recognition>;
}

/// Content-region detector
#[async_trait::async_trait]
pub trait Detector: Send + Sync {
    async fn detect(&self, frame: &Frame) -> CollaboratorResult<Vec<Detection>>;
}

/// Immutable perceptual descriptor of one content item
///
/// Produced once per crop by [`Matcher::fingerprint`]; only the matcher that
/// produced it knows how to read the bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentFingerprint(Arc<[u8]>);

impl ContentFingerprint {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(Arc::from(bytes.into()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Perceptual similarity
///
/// `score(candidate, reference)` returns a similarity in `[0, 1]` between two
/// fingerprints produced by the same matcher.
pub trait Matcher: Send + Sync {
    fn fingerprint(&self, crop: &Frame) -> ContentFingerprint;

    fn score(&self, candidate: &ContentFingerprint, reference: &ContentFingerprint) -> f32;
}

/// Assisted answering
///
/// Both methods return `None` on any failure (transport, refusal, garbage
/// output); the caller escalates in that case.
#[async_trait::async_trait]
pub trait Oracle: Send + Sync {
    /// Letters of the correct choices, in answer order
    async fn resolve_choice(&self, images: &[Frame]) -> Option<Vec<Choice>>;

    /// Text for a fill-in-the-blank question
    async fn resolve_blank(
        &self,
        images: &[Frame],
        has_hint: bool,
        blank_count: Option<usize>,
    ) -> Option<String>;
}

/// Operator notification sink
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: &Notification);
}

/// A device that can be bound
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// ADB serial (`emulator-5554`, `127.0.0.1:16384`, ...)
    pub serial: String,
    /// Human-readable model name, when known
    #[serde(default)]
    pub name: Option<String>,
}

/// Collaborators bound to one device
///
/// Built once at bind time and handed to every stage; nothing device-bound
/// lives in globals.
#[derive(Clone)]
pub struct DeviceContext {
    pub device: DeviceInfo,
    pub controller: Arc<dyn Controller>,
    pub recognizer: Arc<dyn Recognizer>,
    pub detector: Arc<dyn Detector>,
}

impl fmt::Debug for DeviceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceContext")
            .field("device", &self.device)
            .finish_non_exhaustive()
    }
}

/// Device discovery and binding
#[async_trait::async_trait]
pub trait DeviceConnector: Send + Sync {
    async fn list_devices(&self) -> CollaboratorResult<Vec<DeviceInfo>>;

    async fn connect(&self, device: &DeviceInfo) -> CollaboratorResult<DeviceContext>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_choice_letters() {
        assert_eq!(Choice::from_letter('C'), Some(Choice::C));
        assert_eq!(Choice::from_letter('c'), None);
        assert_eq!(Choice::from_letter('F'), None);
        assert_eq!(Choice::E.to_string(), "E");
    }

    #[test]
    fn test_pipeline_names_are_unique() {
        let mut actions = vec![
            ActionId::EnterFeed,
            ActionId::EnterMediaChannel,
            ActionId::Back,
            ActionId::BackFromMedia,
            ActionId::QuizEntry,
            ActionId::LoadCheck,
            ActionId::QuizStart,
            ActionId::FillBlankProbe,
            ActionId::HintVideoProbe,
            ActionId::ShowHint,
            ActionId::HintMarker,
            ActionId::ExtractText,
            ActionId::CloseHint,
            ActionId::AnswerField,
            ActionId::NextQuestion,
            ActionId::AnomalyProbe,
        ];
        actions.extend(Choice::ALL.iter().map(|c| ActionId::Choose(*c)));

        let names: std::collections::HashSet<_> =
            actions.iter().map(|a| a.pipeline_name()).collect();
        assert_eq!(names.len(), actions.len());
    }

    #[test]
    fn test_unknown_detection_label() {
        let detection: Detection = serde_json::from_str(
            r#"{"region":{"x":1,"y":2,"w":3,"h":4},"label":"banner"}"#,
        )
        .unwrap();
        assert_eq!(detection.label, ContentClass::Other);
        assert_eq!(detection.region.offset(150, 10), Point::new(151, 12));
    }
}
