//! Event types for the xuexi progress stream
//!
//! Every line an operator sees is an [`Event`]. Events are appended to an
//! [`EventLog`] and never removed, so a late observer can replay the full
//! history before following live output.

mod log;

pub use log::{EventLog, EventSubscription};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Classification of a progress event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Ordinary progress line
    Info,
    /// Operator handoff requested; the session is pausing
    Escalation,
    /// Every requested stage finished
    Completed,
    /// The run observed a stop request
    Stopped,
    /// The run aborted on an unrecovered error
    Failed,
}

impl EventKind {
    /// Terminal kinds mark the end of a run
    ///
    /// Downstream consumers use them as the "run has ended" sentinel.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            EventKind::Completed | EventKind::Stopped | EventKind::Failed
        )
    }

    /// Get kind as string for SSE event naming
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Info => "info",
            EventKind::Escalation => "escalation",
            EventKind::Completed => "completed",
            EventKind::Stopped => "stopped",
            EventKind::Failed => "failed",
        }
    }
}

/// One immutable progress record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Production index within the log (0-based, gap-free)
    pub seq: u64,
    /// When the event was appended
    pub timestamp: DateTime<Utc>,
    /// Human-readable progress line
    pub message: String,
    /// Event classification
    pub kind: EventKind,
    /// Session that produced the event (None for controller-level lines
    /// such as device binding)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
}

impl Event {
    /// Render as a plain log line: `<local timestamp> <message>`
    pub fn display_line(&self) -> String {
        format!(
            "{} {}",
            crate::time::format_log_timestamp(&self.timestamp),
            self.message
        )
    }

    /// Whether this event ends a run
    pub fn is_terminal(&self) -> bool {
        self.kind.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_kinds() {
        assert!(!EventKind::Info.is_terminal());
        assert!(!EventKind::Escalation.is_terminal());
        assert!(EventKind::Completed.is_terminal());
        assert!(EventKind::Stopped.is_terminal());
        assert!(EventKind::Failed.is_terminal());
    }

    #[test]
    fn test_event_serialization_omits_missing_session() {
        let event = Event {
            seq: 3,
            timestamp: Utc::now(),
            message: "device connected".to_string(),
            kind: EventKind::Info,
            session_id: None,
        };

        let json = serde_json::to_string(&event).expect("Serialization should succeed");
        assert!(json.contains("\"seq\":3"));
        assert!(json.contains("\"kind\":\"info\""));
        assert!(!json.contains("session_id"));

        let back: Event = serde_json::from_str(&json).expect("Deserialization should succeed");
        assert_eq!(back, event);
    }

    #[test]
    fn test_display_line_ends_with_message() {
        let event = Event {
            seq: 0,
            timestamp: Utc::now(),
            message: "stage started: feed reading".to_string(),
            kind: EventKind::Info,
            session_id: Some(Uuid::new_v4()),
        };
        assert!(event.display_line().ends_with(" stage started: feed reading"));
    }
}
