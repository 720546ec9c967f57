//! Operator handoff
//!
//! Escalating notifies the operator, appends an `Escalation` event, flips
//! the session to `Paused` and blocks at the pause gate until the operator
//! resumes (the stage continues) or stops (the stage unwinds as cancelled).

use super::{StageContext, Status};
use crate::collaborators::Severity;
use crate::stages::StageError;
use tracing::warn;
use xuexi_common::events::EventKind;

/// Title carried by every operator notification
pub const NOTIFICATION_TITLE: &str = "xuexi";

/// How long an escalation notification should stay visible
pub const ESCALATION_TIMEOUT_SECS: u32 = 60;

pub(crate) async fn escalate(ctx: &StageContext, reason: &str) -> Result<(), StageError> {
    warn!(session_id = %ctx.session_id(), reason, "Escalating to operator");

    ctx.notify(Severity::Warning, reason, ESCALATION_TIMEOUT_SECS);
    ctx.emit(EventKind::Escalation, reason);

    // A stop already requested wins over the pause
    if !ctx.session().transition(Status::Paused) && ctx.session().is_cancelled() {
        return Err(StageError::Cancelled);
    }

    ctx.checkpoint().await?;
    ctx.log("operator resumed the session");
    Ok(())
}
