//! Perceptual deduplication of discovered content

use crate::collaborators::{ContentFingerprint, Matcher};

/// Similarity at or above which a candidate counts as already seen
pub const DUPLICATE_THRESHOLD: f32 = 0.7;

/// Whether `candidate` differs from every reference
///
/// A single reference scoring `>= DUPLICATE_THRESHOLD` makes it a duplicate.
pub fn is_new<'a>(
    matcher: &dyn Matcher,
    candidate: &ContentFingerprint,
    references: impl IntoIterator<Item = &'a ContentFingerprint>,
) -> bool {
    !references
        .into_iter()
        .any(|r| matcher.score(candidate, r) >= DUPLICATE_THRESHOLD)
}

#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub fingerprint: ContentFingerprint,
    /// Order in which the item was recorded (0-based)
    pub seq: usize,
}

/// Append-only record of items processed during one stage run
#[derive(Debug, Default)]
pub struct DedupLedger {
    entries: Vec<LedgerEntry>,
}

impl DedupLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_new(&self, matcher: &dyn Matcher, candidate: &ContentFingerprint) -> bool {
        is_new(matcher, candidate, self.entries.iter().map(|e| &e.fingerprint))
    }

    /// Record a processed item; returns its sequence index
    pub fn record(&mut self, fingerprint: ContentFingerprint) -> usize {
        let seq = self.entries.len();
        self.entries.push(LedgerEntry { fingerprint, seq });
        seq
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }
}
