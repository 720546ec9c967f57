//! Stage algorithms
//!
//! - [`browse`]: feed reading and media watching, one algorithm selected by
//!   [`browse::BrowseStrategy`]
//! - [`quiz`]: the daily quiz state machine

pub mod browse;
pub mod quiz;

use crate::collaborators::{ActionId, CollaboratorError};
use crate::session::{StageContext, StageKind};
use thiserror::Error;

/// Why a stage stopped early
#[derive(Debug, Error)]
pub enum StageError {
    /// A stop request was observed at a safe point
    #[error("stopped by request")]
    Cancelled,

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    /// A node that must act found nothing to act on
    #[error("pipeline node {0} found no target")]
    MissingTarget(ActionId),

    #[error("{0} is not supported")]
    Unsupported(StageKind),
}

/// Run one stage to completion
pub async fn run_stage(ctx: &StageContext, kind: StageKind) -> Result<(), StageError> {
    match kind {
        StageKind::FeedReading => {
            browse::run(ctx, browse::BrowseStrategy::Feed).await?;
        }
        StageKind::MediaWatching => {
            browse::run(ctx, browse::BrowseStrategy::Media).await?;
        }
        StageKind::DailyQuiz => {
            quiz::run(ctx).await?;
        }
        StageKind::FunQuiz => return Err(StageError::Unsupported(kind)),
    }
    Ok(())
}
