//! Feed reading and media watching
//!
//! Both stages walk a scrolling list, open items they have not seen yet and
//! spend time inside each one until the dwell target is reached. They only
//! differ in the entry node, the wanted content classes and what happens
//! inside an opened item, which [`BrowseStrategy`] captures.

use crate::collaborators::{crop, ActionId, ContentClass, Region};
use crate::session::{DedupLedger, StageContext};
use crate::stages::StageError;
use tracing::debug;

/// Units of in-item time a browse stage accumulates before finishing
pub const DWELL_TARGET: f64 = 400.0;

/// Tap offset from an item's top-left corner
pub const OPEN_OFFSET: (i32, i32) = (150, 10);

/// Scroll rounds inside one article
pub const ARTICLE_SCROLL_ROUNDS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowseStrategy {
    /// Articles in the feed channel
    Feed,
    /// Videos in the media channel
    Media,
}

impl BrowseStrategy {
    pub fn entry_action(self) -> ActionId {
        match self {
            BrowseStrategy::Feed => ActionId::EnterFeed,
            BrowseStrategy::Media => ActionId::EnterMediaChannel,
        }
    }

    fn entry_wait(self) -> (u32, u32) {
        match self {
            BrowseStrategy::Feed => (4, 5),
            BrowseStrategy::Media => (3, 5),
        }
    }

    pub fn wants(self, class: ContentClass) -> bool {
        match self {
            BrowseStrategy::Feed => {
                matches!(class, ContentClass::Article | ContentClass::ArticleImage)
            }
            BrowseStrategy::Media => class == ContentClass::Video,
        }
    }

    fn evidence_prefix(self) -> &'static str {
        match self {
            BrowseStrategy::Feed => "read",
            BrowseStrategy::Media => "video",
        }
    }

    fn item_noun(self) -> &'static str {
        match self {
            BrowseStrategy::Feed => "article",
            BrowseStrategy::Media => "video",
        }
    }
}

/// Outcome of one browse run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrowseReport {
    /// Items opened (each one new to this run)
    pub opened: usize,
    /// Units spent inside opened items
    pub dwell: f64,
}

/// Run a browse stage until [`DWELL_TARGET`] is reached or a stop request
/// is observed
pub async fn run(ctx: &StageContext, strategy: BrowseStrategy) -> Result<BrowseReport, StageError> {
    ctx.run(strategy.entry_action()).await?;
    let (lo, hi) = strategy.entry_wait();
    ctx.wait_random(lo, hi).await?;

    let mut ledger = DedupLedger::new();
    let mut report = BrowseReport {
        opened: 0,
        dwell: 0.0,
    };

    while report.dwell < DWELL_TARGET {
        ctx.checkpoint().await?;

        let frame = ctx.capture().await?;
        let regions: Vec<Region> = ctx
            .detect(&frame)
            .await?
            .into_iter()
            .filter(|d| strategy.wants(d.label))
            .map(|d| d.region)
            .collect();

        if regions.is_empty() {
            ctx.log("nothing found, scrolling");
            ctx.scroll().await?;
            continue;
        }

        for region in regions {
            ctx.checkpoint().await?;
            if report.dwell >= DWELL_TARGET {
                break;
            }

            let Some(item) = crop(&frame, region) else {
                debug!(?region, "Region outside frame; skipped");
                continue;
            };
            let fingerprint = ctx.matcher().fingerprint(&item);
            if !ledger.is_new(ctx.matcher(), &fingerprint) {
                debug!(?region, "Already seen; skipped");
                continue;
            }

            report.opened += 1;
            ctx.evidence()
                .save(
                    &format!("{}_{}.jpg", strategy.evidence_prefix(), report.opened),
                    &item,
                )
                .await;
            ctx.log(format!("opening {} {}", strategy.item_noun(), report.opened));

            ctx.tap(region.offset(OPEN_OFFSET.0, OPEN_OFFSET.1)).await?;
            ctx.wait(3.0).await?;

            report.dwell += match strategy {
                BrowseStrategy::Feed => read_article(ctx, report.dwell).await?,
                BrowseStrategy::Media => watch_video(ctx).await?,
            };
            ledger.record(fingerprint);

            ctx.log(format!(
                "{} {} done, progress {:.0}/{:.0}",
                strategy.item_noun(),
                report.opened,
                report.dwell.min(DWELL_TARGET),
                DWELL_TARGET
            ));
        }

        ctx.scroll().await?;
    }

    Ok(report)
}

/// Scroll through an opened article; returns the dwell added
///
/// Stops scrolling as soon as the running total reaches the target, so the
/// overshoot is at most one scroll wait.
async fn read_article(ctx: &StageContext, dwell_before: f64) -> Result<f64, StageError> {
    let mut added = 0.0;
    for _ in 0..ARTICLE_SCROLL_ROUNDS {
        if dwell_before + added >= DWELL_TARGET {
            break;
        }
        ctx.scroll().await?;
        added += ctx.wait_random(8, 10).await?;
    }

    ctx.wait(1.0).await?;
    ctx.run(ActionId::Back).await?;
    ctx.wait_random(3, 5).await?;
    Ok(added)
}

/// Watch an opened video; returns the dwell added
async fn watch_video(ctx: &StageContext) -> Result<f64, StageError> {
    let watched = ctx.wait_random(50, 70).await?;
    ctx.run(ActionId::BackFromMedia).await?;
    ctx.wait_random(3, 5).await?;
    Ok(watched)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_content_filter() {
        assert!(BrowseStrategy::Feed.wants(ContentClass::Article));
        assert!(BrowseStrategy::Feed.wants(ContentClass::ArticleImage));
        assert!(!BrowseStrategy::Feed.wants(ContentClass::Video));
        assert!(BrowseStrategy::Media.wants(ContentClass::Video));
        assert!(!BrowseStrategy::Media.wants(ContentClass::Other));
    }

    #[test]
    fn test_strategy_entry_nodes() {
        assert_eq!(BrowseStrategy::Feed.entry_action(), ActionId::EnterFeed);
        assert_eq!(
            BrowseStrategy::Media.entry_action(),
            ActionId::EnterMediaChannel
        );
    }
}
