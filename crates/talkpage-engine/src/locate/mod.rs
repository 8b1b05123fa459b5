//! Reconciles in-memory sections and comments with current page code.
//!
//! Every locate call masks the code, scans it for heading or signature
//! lines, scores each candidate against the target and returns the best
//! one with byte offsets into the unmasked code. Offsets are only valid for
//! the exact code they were computed from; each [`SourceMatch`] carries a
//! fingerprint of that code so it cannot be applied to anything else.

pub mod comment;
pub mod scan;
pub mod score;
pub mod section;

use serde::Serialize;
use std::hash::{DefaultHasher, Hash, Hasher};

use crate::error::EngineError;
use crate::text::Span;

pub use comment::locate_comment;
pub use scan::{Heading, Signature, scan_headings, scan_signatures};
pub use score::{MAX_SCORE, ScoreCard, Signal};
pub use section::locate_section;

/// Identifies the exact code a match was computed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct CodeFingerprint {
    len: usize,
    hash: u64,
}

impl CodeFingerprint {
    pub fn of(code: &str) -> Self {
        let mut hasher = DefaultHasher::new();
        code.hash(&mut hasher);
        Self {
            len: code.len(),
            hash: hasher.finish(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum MatchDetail {
    #[serde(rename_all = "camelCase")]
    Section {
        headline: String,
        level: u8,
        /// End of the heading text, before its newline.
        heading_end: usize,
        /// Start of the line after the heading.
        content_start: usize,
        /// Start of the first subsection heading, or the section end.
        first_chunk_end: usize,
        closed: bool,
        /// Signatures anywhere in the section, subsections included.
        signature_count: usize,
        has_subsections: bool,
    },
    #[serde(rename_all = "camelCase")]
    Comment {
        comment_id: String,
        signature: Span,
        /// What deleting the comment removes: its own lines, or only its own
        /// text when another signature shares the line.
        removal: Span,
        /// Where a new reply is inserted.
        reply_point: usize,
        has_replies: bool,
    },
}

/// Where a section or comment sits in a particular revision of page code.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMatch {
    /// Start of the heading line, or of the comment text after its markers.
    pub start: usize,
    /// End of the whole section, or of the comment's signature.
    pub end: usize,
    pub heading_start: Option<usize>,
    /// The section's first chunk, or the comment up to its signature end.
    pub code: String,
    pub score: f64,
    pub matched: Vec<Signal>,
    pub indentation_chars: String,
    /// The prefix a new reply should use.
    pub reply_indentation_chars: String,
    pub fingerprint: CodeFingerprint,
    pub detail: MatchDetail,
}

impl SourceMatch {
    /// The locate error for this match's target.
    pub fn locate_error(&self) -> EngineError {
        match &self.detail {
            MatchDetail::Section { headline, .. } => EngineError::LocateSection {
                headline: headline.clone(),
            },
            MatchDetail::Comment { comment_id, .. } => EngineError::LocateComment {
                comment_id: comment_id.clone(),
            },
        }
    }

    /// Fails unless `code` is the code this match was computed from.
    pub fn verify(&self, code: &str) -> Result<(), EngineError> {
        if CodeFingerprint::of(code) == self.fingerprint {
            Ok(())
        } else {
            log::warn!("refusing to reuse a match computed against different code");
            Err(self.locate_error())
        }
    }

    pub fn span(&self) -> Span {
        Span::new(self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_tracks_content() {
        assert_eq!(CodeFingerprint::of("abc"), CodeFingerprint::of("abc"));
        assert_ne!(CodeFingerprint::of("abc"), CodeFingerprint::of("abd"));
    }
}
