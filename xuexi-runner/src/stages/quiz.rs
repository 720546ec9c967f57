//! Daily quiz
//!
//! Entry (with unbounded load retries), exactly [`QUESTION_COUNT`]
//! questions, then a check for the verification challenge that usually
//! follows the last answer.
//!
//! Every probe here is a negative node: the pipeline matches the normal
//! screen, so the condition of interest holds when the node does **not**
//! match.

use crate::collaborators::{crop, stack_vertical, ActionId, ActionParams, Choice, Frame, Region};
use crate::session::StageContext;
use crate::stages::StageError;
use tracing::debug;

pub const QUESTION_COUNT: usize = 5;

/// Rows of the hint screenshot that hold the hint text
pub const HINT_BAND: Region = Region {
    x: 0,
    y: 500,
    w: 720,
    h: 780,
};

const ENTRY_SETTLE: f64 = 10.0;
const START_SETTLE: f64 = 5.0;
const CHOICE_SETTLE: f64 = 0.2;

const ORACLE_FAILED: &str = "assisted answer failed, operator takeover requested";
const HINT_UNREADABLE: &str = "hint answer not found, operator takeover requested";
const CHALLENGE_FOUND: &str = "verification challenge found, operator takeover requested";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionKind {
    Choice,
    FillBlank { with_hint_video: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    Text(String),
    Choices(Vec<Choice>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(Answer),
    /// Handed to the operator; nothing was submitted
    Escalated,
}

/// Per-question record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizItem {
    /// 1-based question number
    pub number: usize,
    pub kind: QuestionKind,
    pub resolution: Resolution,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizReport {
    pub items: Vec<QuizItem>,
    /// A verification challenge was shown after the last question
    pub challenged: bool,
}

pub async fn run(ctx: &StageContext) -> Result<QuizReport, StageError> {
    enter(ctx).await?;

    let mut items = Vec::with_capacity(QUESTION_COUNT);
    for number in 1..=QUESTION_COUNT {
        ctx.checkpoint().await?;
        let item = answer_question(ctx, number).await?;
        debug!(number, kind = ?item.kind, resolution = ?item.resolution, "Question handled");
        items.push(item);

        ctx.wait(0.5).await?;
        ctx.run(ActionId::NextQuestion).await?;
        ctx.wait_random(2, 3).await?;
    }

    ctx.wait(2.0).await?;
    let probe = ctx.run(ActionId::AnomalyProbe).await?;
    let challenged = !probe.matched;
    if challenged {
        ctx.escalate(CHALLENGE_FOUND).await?;
    }

    Ok(QuizReport { items, challenged })
}

/// Open the points page (retrying until it renders) and start the quiz
async fn enter(ctx: &StageContext) -> Result<(), StageError> {
    ctx.run(ActionId::QuizEntry).await?;
    ctx.wait(ENTRY_SETTLE).await?;

    while load_failed(ctx).await? {
        ctx.log("points page failed to load, retrying");
        ctx.run(ActionId::Back).await?;
        ctx.run(ActionId::QuizEntry).await?;
        ctx.wait(ENTRY_SETTLE).await?;
    }
    ctx.log("points page loaded");

    ctx.long_scroll().await?;
    ctx.wait_random(1, 2).await?;

    let start = ctx.require(ActionId::QuizStart).await?;
    let (dx, dy) = (ctx.random_in(10..=30), ctx.random_in(10..=30));
    ctx.tap(start.offset(dx, dy)).await?;
    ctx.log("quiz started");
    ctx.wait(START_SETTLE).await
}

async fn load_failed(ctx: &StageContext) -> Result<bool, StageError> {
    Ok(!ctx.run(ActionId::LoadCheck).await?.matched)
}

async fn answer_question(ctx: &StageContext, number: usize) -> Result<QuizItem, StageError> {
    // Choice layouts score about 0.75 against the fill-blank template, so
    // this probe misfires occasionally
    let fill_blank = !ctx.run(ActionId::FillBlankProbe).await?.matched;

    let (kind, resolution) = if fill_blank {
        let with_hint_video = !ctx.run(ActionId::HintVideoProbe).await?.matched;
        ctx.log(format!("question {}: fill in the blank", number));
        let resolution = answer_blank(ctx, with_hint_video).await?;
        (QuestionKind::FillBlank { with_hint_video }, resolution)
    } else {
        ctx.log(format!("question {}: multiple choice", number));
        (QuestionKind::Choice, answer_choice(ctx, number).await?)
    };

    Ok(QuizItem {
        number,
        kind,
        resolution,
    })
}

async fn answer_blank(ctx: &StageContext, with_hint_video: bool) -> Result<Resolution, StageError> {
    let answer = if with_hint_video {
        ctx.log("hint video found, requesting assisted answer");
        let frame = ctx.capture().await?;
        match ctx.oracle() {
            Some(oracle) => oracle.resolve_blank(&[frame], true, None).await,
            None => None,
        }
    } else {
        ctx.log("reading the hint");
        read_hint_text(ctx).await?
    };

    let Some(text) = answer else {
        ctx.escalate(if with_hint_video { ORACLE_FAILED } else { HINT_UNREADABLE })
            .await?;
        return Ok(Resolution::Escalated);
    };

    ctx.wait(1.0).await?;
    ctx.log(format!("entering {}", text));
    ctx.run(ActionId::AnswerField).await?;
    ctx.wait(0.5).await?;
    ctx.input_text(&text).await?;
    ctx.log("input done");
    Ok(Resolution::Resolved(Answer::Text(text)))
}

/// Open the hint, OCR the marked answer and close the hint again
async fn read_hint_text(ctx: &StageContext) -> Result<Option<String>, StageError> {
    reveal_hint(ctx, false).await?;
    ctx.wait(1.0).await?;

    let marker = ctx.run(ActionId::HintMarker).await?;
    let text = match marker.region {
        Some(roi) if marker.matched => ctx
            .run_with(ActionId::ExtractText, Some(ActionParams::roi(roi)))
            .await?
            .text
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty()),
        _ => None,
    };

    ctx.run(ActionId::CloseHint).await?;
    Ok(text)
}

async fn answer_choice(ctx: &StageContext, number: usize) -> Result<Resolution, StageError> {
    let mut frames = vec![ctx.capture().await?];
    if let Some(extra) = reveal_hint(ctx, true).await? {
        frames.push(extra);
    }
    ctx.wait(1.0).await?;

    let hint = ctx.capture().await?;
    ctx.run(ActionId::CloseHint).await?;
    frames.push(crop(&hint, HINT_BAND).unwrap_or(hint));
    ctx.wait(1.0).await?;

    let composite = stack_vertical(&frames);
    ctx.evidence()
        .save(&format!("quiz_{}.jpg", number), &composite)
        .await;

    let letters = match ctx.oracle() {
        Some(oracle) => oracle.resolve_choice(&[composite]).await,
        None => None,
    };

    let Some(letters) = letters.filter(|l| !l.is_empty()) else {
        ctx.escalate(ORACLE_FAILED).await?;
        return Ok(Resolution::Escalated);
    };

    let joined: String = letters.iter().map(|c| c.letter()).collect();
    ctx.log(format!("assisted answer: {}", joined));
    for &choice in &letters {
        ctx.run(ActionId::Choose(choice)).await?;
        ctx.wait(CHOICE_SETTLE).await?;
    }
    Ok(Resolution::Resolved(Answer::Choices(letters)))
}

/// Tap "view hint"; when the link is off screen, scroll it into view and
/// tap again
///
/// With `capture_scrolled` the screen after the scroll is returned so the
/// composite still shows the part of the question that scrolled away.
async fn reveal_hint(ctx: &StageContext, capture_scrolled: bool) -> Result<Option<Frame>, StageError> {
    if ctx.run(ActionId::ShowHint).await?.matched {
        return Ok(None);
    }

    ctx.log("hint link not visible, scrolling");
    ctx.long_scroll().await?;
    ctx.wait(1.0).await?;

    let scrolled = if capture_scrolled {
        Some(ctx.capture().await?)
    } else {
        None
    };
    ctx.require(ActionId::ShowHint).await?;
    Ok(scrolled)
}
