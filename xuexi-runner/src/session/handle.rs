//! Shared control surface of one session

use super::{SessionError, StageKind, Status};
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};
use uuid::Uuid;

/// Control state shared between the controller and the session task
///
/// Status lives on a watch channel so the task can await a change (the
/// pause gate) instead of polling.
#[derive(Debug)]
pub struct SessionHandle {
    id: Uuid,
    stages: Vec<StageKind>,
    started_at: DateTime<Utc>,
    status: watch::Sender<Status>,
    cancel: CancellationToken,
}

impl SessionHandle {
    /// A new session in `Running`
    pub fn new(stages: Vec<StageKind>) -> Self {
        let (status, _) = watch::channel(Status::Running);
        Self {
            id: Uuid::new_v4(),
            stages,
            started_at: Utc::now(),
            status,
            cancel: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn stages(&self) -> &[StageKind] {
        &self.stages
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn status(&self) -> Status {
        *self.status.borrow()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<Status> {
        self.status.subscribe()
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Apply `next` if the lifecycle allows it; returns whether it changed
    pub fn transition(&self, next: Status) -> bool {
        let mut from = None;
        let changed = self.status.send_if_modified(|current| {
            if current.can_transition_to(next) {
                from = Some(*current);
                *current = next;
                true
            } else {
                false
            }
        });
        if let Some(from) = from {
            debug!(session_id = %self.id, %from, to = %next, "Session status changed");
        }
        changed
    }

    /// Move to the terminal status for `outcome`; returns the status applied
    ///
    /// An accepted stop request turns `Completed` into `Stopped`. The check
    /// and the status change happen under the channel lock, so a stop can
    /// never be accepted after the session was marked finished.
    /// `on_terminal` runs under the same lock just before the change, so
    /// anything it records is visible before `finished()` returns.
    pub fn finish(&self, outcome: Status, on_terminal: impl FnOnce(Status)) -> Status {
        let mut applied = None;
        self.status.send_if_modified(|current| {
            let next = if outcome == Status::Completed && self.cancel.is_cancelled() {
                Status::Stopped
            } else {
                outcome
            };
            if !current.can_transition_to(next) {
                return false;
            }
            on_terminal(next);
            applied = Some((*current, next));
            *current = next;
            true
        });

        match applied {
            Some((from, to)) => {
                debug!(session_id = %self.id, %from, %to, "Session finished");
                to
            }
            None => {
                let stuck = self.status();
                error!(session_id = %self.id, status = %stuck, %outcome, "Terminal transition refused");
                stuck
            }
        }
    }

    /// Request a stop; the task observes it at its next safe point
    pub fn request_stop(&self) -> Result<(), SessionError> {
        let mut accepted = false;
        self.status.send_if_modified(|current| {
            if current.is_active() {
                self.cancel.cancel();
                accepted = true;
            }
            false
        });
        if accepted {
            Ok(())
        } else {
            Err(SessionError::NotRunning)
        }
    }

    /// Halt progress at the next safe point
    pub fn pause(&self) -> Result<(), SessionError> {
        if self.transition(Status::Paused) {
            Ok(())
        } else {
            Err(SessionError::NotRunning)
        }
    }

    /// Release a paused session
    pub fn resume(&self) -> Result<(), SessionError> {
        if self.status() != Status::Paused || self.is_cancelled() {
            return Err(SessionError::NotPaused);
        }
        if self.transition(Status::Running) {
            Ok(())
        } else {
            Err(SessionError::NotPaused)
        }
    }

    /// Wait until the session reaches a terminal status
    pub async fn finished(&self) -> Status {
        let mut rx = self.status.subscribe();
        let result = rx.wait_for(|s| s.is_terminal()).await.map(|s| *s);
        result.unwrap_or_else(|_| self.status())
    }
}
