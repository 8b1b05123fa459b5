use serde::Serialize;

/// Highest score any candidate can reach. Scanning stops at the first
/// candidate that reaches it.
pub const MAX_SCORE: f64 = 3.75;

/// Minimum score for a section candidate to be accepted.
pub const SECTION_THRESHOLD: f64 = 1.5;

/// Timestamps this close count as a partial match.
pub const CLOSE_TIMESTAMP_SECONDS: i64 = 60;

/// One piece of agreement between a candidate and the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Signal {
    Headline,
    OldestComment,
    Ancestors,
    Index,
    Level,
    Author,
    TimestampExact,
    TimestampClose,
    EnclosingHeadline,
    ParentId,
    IndentationChars,
}

impl Signal {
    pub fn weight(self) -> f64 {
        match self {
            Signal::Headline => 1.5,
            Signal::OldestComment => 1.0,
            Signal::Ancestors => 0.5,
            Signal::Index => 0.5,
            Signal::Level => 0.25,
            Signal::Author => 1.0,
            Signal::TimestampExact => 1.0,
            Signal::TimestampClose => 0.5,
            Signal::EnclosingHeadline => 0.5,
            Signal::ParentId => 0.5,
            Signal::IndentationChars => 0.25,
        }
    }
}

/// The signals a candidate matched and their weighted sum.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScoreCard {
    pub total: f64,
    pub matched: Vec<Signal>,
}

impl ScoreCard {
    pub fn from_signals(signals: impl IntoIterator<Item = (Signal, bool)>) -> Self {
        let matched: Vec<Signal> = signals
            .into_iter()
            .filter_map(|(signal, hit)| hit.then_some(signal))
            .collect();
        let total = matched.iter().map(|s| s.weight()).sum::<f64>().min(MAX_SCORE);
        Self { total, matched }
    }

    pub fn has(&self, signal: Signal) -> bool {
        self.matched.contains(&signal)
    }

    pub fn is_max(&self) -> bool {
        self.total >= MAX_SCORE
    }
}

/// Picks the best candidate in document order.
///
/// Only strictly higher scores replace the current best, so the leftmost of
/// equally scored candidates wins. Stops at the first maximal candidate.
pub fn best_candidate<T>(
    candidates: impl IntoIterator<Item = (T, ScoreCard)>,
    viable: impl Fn(&T, &ScoreCard) -> bool,
) -> Option<(T, ScoreCard)> {
    let mut best: Option<(T, ScoreCard)> = None;
    for (candidate, card) in candidates {
        if !viable(&candidate, &card) {
            continue;
        }
        if best.as_ref().is_none_or(|(_, b)| card.total > b.total) {
            let done = card.is_max();
            best = Some((candidate, card));
            if done {
                break;
            }
        }
    }
    best
}
