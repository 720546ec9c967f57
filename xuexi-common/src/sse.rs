//! Server-Sent Events (SSE) utilities
//!
//! Streams an [`EventLog`] to HTTP clients: full history first, then live
//! events, one SSE message per log entry.

use crate::events::{Event, EventLog};
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use futures::stream::{Stream, StreamExt};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Keep-alive interval for SSE connections
pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Convert a log entry into an SSE message
///
/// The SSE event name is `log`; the SSE id is the entry's sequence number so
/// clients can resume with `Last-Event-ID`.
pub fn to_sse_event(event: &Event) -> Option<SseEvent> {
    match serde_json::to_string(event) {
        Ok(json) => Some(
            SseEvent::default()
                .event("log")
                .id(event.seq.to_string())
                .data(json),
        ),
        Err(e) => {
            warn!("SSE: Failed to serialize event {}: {}", event.seq, e);
            None
        }
    }
}

/// Create a replay-then-follow SSE stream over `log`
///
/// # Arguments
/// * `log` - Event log to stream
/// * `from_seq` - First sequence number to send (0 replays everything)
/// * `service_name` - Name of the service for logging
pub fn create_event_log_sse_stream(
    log: Arc<EventLog>,
    from_seq: u64,
    service_name: &'static str,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    info!(
        from_seq,
        "New SSE client connected to {} event log", service_name
    );

    let stream = log
        .subscribe_from(from_seq)
        .into_stream()
        .filter_map(|event| async move {
            debug!(seq = event.seq, "SSE: Forwarding event");
            to_sse_event(&event).map(Ok)
        });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(KEEP_ALIVE_INTERVAL)
            .text("heartbeat"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    #[test]
    fn test_to_sse_event_serializes() {
        let log = EventLog::new();
        let event = log.append(EventKind::Info, "hello", None);
        assert!(to_sse_event(&event).is_some());
    }
}
