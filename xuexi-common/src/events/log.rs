//! Append-only event log with replay-then-follow subscriptions

use super::{Event, EventKind};
use futures::stream::Stream;
use std::sync::{Arc, RwLock};
use tokio::sync::watch;
use uuid::Uuid;

/// Append-only, ordered event history
///
/// Appends take the write lock, assign the next sequence number and publish
/// the new length on a watch channel before releasing the lock, so the
/// length observed by subscribers never goes backwards and sequence order
/// equals storage order.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use xuexi_common::events::{EventKind, EventLog};
///
/// let log = Arc::new(EventLog::new());
/// log.append(EventKind::Info, "device connected", None);
///
/// let mut sub = log.subscribe();
/// let first = sub.try_next().expect("history is replayed");
/// assert_eq!(first.message, "device connected");
/// ```
pub struct EventLog {
    entries: RwLock<Vec<Event>>,
    len_tx: watch::Sender<u64>,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLog {
    /// Create an empty log
    pub fn new() -> Self {
        let (len_tx, _) = watch::channel(0);
        Self {
            entries: RwLock::new(Vec::new()),
            len_tx,
        }
    }

    /// Append an event and return a copy of it
    pub fn append(
        &self,
        kind: EventKind,
        message: impl Into<String>,
        session_id: Option<Uuid>,
    ) -> Event {
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let event = Event {
            seq: entries.len() as u64,
            timestamp: crate::time::now(),
            message: message.into(),
            kind,
            session_id,
        };
        entries.push(event.clone());
        self.len_tx.send_replace(entries.len() as u64);

        event
    }

    /// Number of events appended so far
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether nothing has been appended yet
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Copy of the full history
    pub fn snapshot(&self) -> Vec<Event> {
        self.read().clone()
    }

    /// Events with `seq >= from`
    pub fn since(&self, from: u64) -> Vec<Event> {
        let entries = self.read();
        let start = (from as usize).min(entries.len());
        entries[start..].to_vec()
    }

    /// Events produced by one session, in order
    pub fn for_session(&self, session_id: Uuid) -> Vec<Event> {
        self.read()
            .iter()
            .filter(|e| e.session_id == Some(session_id))
            .cloned()
            .collect()
    }

    /// Event at position `seq`, if it exists yet
    pub fn get(&self, seq: u64) -> Option<Event> {
        self.read().get(seq as usize).cloned()
    }

    /// Subscribe from the beginning of history
    ///
    /// The subscription yields every stored event first, then each newly
    /// appended one, in production order.
    pub fn subscribe(self: &Arc<Self>) -> EventSubscription {
        self.subscribe_from(0)
    }

    /// Subscribe starting at `seq` (resuming a previous subscription)
    pub fn subscribe_from(self: &Arc<Self>, seq: u64) -> EventSubscription {
        EventSubscription {
            log: Arc::clone(self),
            cursor: seq,
            len_rx: self.len_tx.subscribe(),
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<Event>> {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Cursor over an [`EventLog`]
///
/// Reads go straight to the stored history, so a slow consumer never skips
/// events; the watch channel is only used to wake up when the log grows.
pub struct EventSubscription {
    log: Arc<EventLog>,
    cursor: u64,
    len_rx: watch::Receiver<u64>,
}

impl EventSubscription {
    /// Sequence number of the next event this subscription will yield
    pub fn position(&self) -> u64 {
        self.cursor
    }

    /// Next event without waiting
    pub fn try_next(&mut self) -> Option<Event> {
        let event = self.log.get(self.cursor)?;
        self.cursor += 1;
        Some(event)
    }

    /// Next event, waiting for one to be appended if caught up
    ///
    /// Returns `None` only if the log's publisher is gone, which cannot
    /// happen while this subscription keeps the log alive.
    pub async fn next(&mut self) -> Option<Event> {
        loop {
            if let Some(event) = self.try_next() {
                return Some(event);
            }
            if self.len_rx.changed().await.is_err() {
                return self.try_next();
            }
        }
    }

    /// Convert into an endless stream of events
    pub fn into_stream(mut self) -> impl Stream<Item = Event> + Send + 'static {
        async_stream::stream! {
            while let Some(event) = self.next().await {
                yield event;
            }
        }
    }
}
