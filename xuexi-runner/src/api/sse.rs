//! Server-Sent Events (SSE) progress stream
//!
//! GET /api/events replays the full event history, then follows live
//! events. Clients resume with `?from=<seq>` or the `Last-Event-ID` header.

use crate::AppState;
use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::sse::{Event, Sse},
};
use futures::stream::Stream;
use serde::Deserialize;
use std::convert::Infallible;
use xuexi_common::sse::create_event_log_sse_stream;

#[derive(Debug, Default, Deserialize)]
pub struct EventQuery {
    /// First sequence number to send
    pub from: Option<u64>,
}

/// GET /api/events
pub async fn event_stream(
    State(state): State<AppState>,
    Query(query): Query<EventQuery>,
    headers: HeaderMap,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let resume_after = headers
        .get("last-event-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(|seq| seq + 1);
    let from = query.from.or(resume_after).unwrap_or(0);

    create_event_log_sse_stream(state.sessions.events().clone(), from, "xuexi-runner")
}
