//! Session engine
//!
//! A session owns one background task that runs the requested stages in
//! order. Control requests (stop, pause, resume) never touch the task
//! directly: they flip the session's cancellation token or its status
//! channel, and the task observes them at its next safe point.
//!
//! Status lifecycle:
//! ```text
//! Idle → Running ⇄ Paused
//!          │         │
//!          ├─────────┴──→ Stopped
//!          ├─────────┴──→ Failed
//!          └──→ Completed
//! ```

mod context;
mod controller;
mod dedup;
mod escalation;
mod evidence;
mod handle;
mod pacing;

pub use context::{RunSettings, StageContext, StageServices};
pub use controller::SessionController;
pub use dedup::{is_new, DedupLedger, LedgerEntry, DUPLICATE_THRESHOLD};
pub use escalation::{ESCALATION_TIMEOUT_SECS, NOTIFICATION_TITLE};
pub use evidence::EvidenceStore;
pub use handle::SessionHandle;
pub use pacing::{Pacer, ScrollGesture};

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Session status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Idle,
    Running,
    Paused,
    Stopped,
    Completed,
    Failed,
}

impl Status {
    /// Running or Paused: a background task exists
    pub fn is_active(self) -> bool {
        matches!(self, Status::Running | Status::Paused)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Stopped | Status::Completed | Status::Failed)
    }

    /// Allowed status transitions
    ///
    /// Monotonic except Running ⇄ Paused; terminal states are final. A
    /// session paused after its last safe point may still complete.
    pub fn can_transition_to(self, next: Status) -> bool {
        use Status::*;
        matches!(
            (self, next),
            (Idle, Running)
                | (Running, Paused)
                | (Paused, Running)
                | (Running | Paused, Stopped | Failed)
                | (Running | Paused, Completed)
        )
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Idle => "idle",
            Status::Running => "running",
            Status::Paused => "paused",
            Status::Stopped => "stopped",
            Status::Completed => "completed",
            Status::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Stage requested in a tasklist
///
/// Wire names are snake_case; the Chinese UI labels are accepted as
/// aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageKind {
    #[serde(rename = "feed_reading", alias = "选读文章")]
    FeedReading,
    #[serde(rename = "media_watching", alias = "视听学习")]
    MediaWatching,
    #[serde(rename = "daily_quiz", alias = "每日答题")]
    DailyQuiz,
    /// Accepted on the wire, rejected at start
    #[serde(rename = "fun_quiz", alias = "趣味答题")]
    FunQuiz,
}

impl StageKind {
    pub fn is_supported(self) -> bool {
        !matches!(self, StageKind::FunQuiz)
    }

    pub fn label(self) -> &'static str {
        match self {
            StageKind::FeedReading => "feed reading",
            StageKind::MediaWatching => "media watching",
            StageKind::DailyQuiz => "daily quiz",
            StageKind::FunQuiz => "fun quiz",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Caller-visible session control errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("a session is already running")]
    AlreadyRunning,

    #[error("no session is running")]
    NotRunning,

    #[error("the session is not paused")]
    NotPaused,

    #[error("no device is connected")]
    NotConnected,

    #[error("device connection failed: {0}")]
    ConnectionFailure(String),

    #[error("invalid stage list: {0}")]
    InvalidStages(String),
}

/// Point-in-time view of the controller
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
    pub stages: Vec<StageKind>,
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
}
