use crate::context::SiteContext;
use crate::error::EngineError;
use crate::masking::{MaskOptions, MaskedCode};
use crate::models::{CommentId, Section};

use super::scan::{Heading, Signature, scan_headings, scan_signatures};
use super::score::{SECTION_THRESHOLD, ScoreCard, Signal, best_candidate};
use super::{CodeFingerprint, MatchDetail, SourceMatch};

/// The extent of one heading's section in masked text.
struct Outline {
    ancestors: Vec<String>,
    first_chunk_end: usize,
    end: usize,
}

fn outline(headings: &[Heading], text_len: usize) -> Vec<Outline> {
    let mut stack: Vec<&Heading> = Vec::new();
    headings
        .iter()
        .enumerate()
        .map(|(i, heading)| {
            while stack.last().is_some_and(|h| h.level >= heading.level) {
                stack.pop();
            }
            let ancestors = stack.iter().rev().map(|h| h.headline.clone()).collect();
            stack.push(heading);

            let first_chunk_end = headings
                .get(i + 1)
                .map_or(text_len, |next| next.masked_line.start);
            let end = headings[i + 1..]
                .iter()
                .find(|next| next.level <= heading.level)
                .map_or(text_len, |next| next.masked_line.start);
            Outline {
                ancestors,
                first_chunk_end,
                end,
            }
        })
        .collect()
}

fn oldest_comment(signatures: &[Signature], from: usize, to: usize) -> Option<CommentId> {
    signatures
        .iter()
        .filter(|s| s.masked.start >= from && s.masked.start < to && s.author.is_some())
        .min_by_key(|s| s.date)
        .and_then(Signature::id)
}

/// Finds the heading of `target` in `code`.
pub fn locate_section(
    code: &str,
    target: &Section,
    ctx: &SiteContext,
) -> Result<SourceMatch, EngineError> {
    let masked = ctx.masker.mask(code, MaskOptions::page());
    let headings = scan_headings(&masked);
    let outlines = outline(&headings, masked.text().len());
    let signatures = scan_signatures(&masked, ctx);

    let candidates = headings.iter().zip(&outlines).map(|(heading, outline)| {
        let oldest = target.oldest_comment_id.as_ref().and_then(|_| {
            oldest_comment(&signatures, heading.masked_line.end, outline.first_chunk_end)
        });
        let card = ScoreCard::from_signals([
            (Signal::Headline, heading.headline == target.headline),
            (
                Signal::OldestComment,
                target.oldest_comment_id.is_some() && oldest == target.oldest_comment_id,
            ),
            (Signal::Ancestors, outline.ancestors == target.ancestors),
            (Signal::Index, heading.index == target.index),
            (Signal::Level, heading.level == target.level),
        ]);
        log::debug!(
            "section candidate {:?} at {}: {} {:?}",
            heading.headline,
            heading.line.start,
            card.total,
            card.matched
        );
        ((heading, outline), card)
    });

    let best = best_candidate(candidates, |(heading, _), card| {
        card.total >= SECTION_THRESHOLD && !heading.headline.is_empty()
    });
    let Some(((heading, outline), card)) = best else {
        log::warn!("could not locate section {:?}", target.headline);
        return Err(EngineError::LocateSection {
            headline: target.headline.clone(),
        });
    };
    log::debug!(
        "located section {:?} at {} with score {}",
        target.headline,
        heading.line.start,
        card.total
    );

    Ok(build_match(code, &masked, heading, outline, &signatures, card, ctx))
}

fn build_match(
    code: &str,
    masked: &MaskedCode,
    heading: &Heading,
    outline: &Outline,
    signatures: &[Signature],
    card: ScoreCard,
    ctx: &SiteContext,
) -> SourceMatch {
    let start = heading.line.start;
    let content_start = masked.to_source(heading.masked_line.end);
    let first_chunk_end = masked.to_source(outline.first_chunk_end);
    let end = masked.to_source(outline.end);

    let signature_count = signatures
        .iter()
        .filter(|s| s.masked.start >= heading.masked_line.end && s.masked.start < outline.end)
        .count();

    SourceMatch {
        start,
        end,
        heading_start: Some(start),
        code: code[start..first_chunk_end].to_string(),
        score: card.total,
        matched: card.matched,
        indentation_chars: String::new(),
        reply_indentation_chars: String::new(),
        fingerprint: CodeFingerprint::of(code),
        detail: MatchDetail::Section {
            headline: heading.headline.clone(),
            level: heading.level,
            heading_end: heading.line.end,
            content_start,
            first_chunk_end,
            closed: is_closed(&code[content_start..first_chunk_end], ctx),
            signature_count,
            has_subsections: outline.first_chunk_end < outline.end,
        },
    }
}

/// Whether a closed-discussion start template is followed by its end template.
fn is_closed(chunk: &str, ctx: &SiteContext) -> bool {
    let lower = chunk.to_lowercase();
    ctx.config.closed_discussion_templates.iter().any(|pair| {
        template_call(&lower, &pair.start.to_lowercase(), 0)
            .and_then(|after| template_call(&lower, &pair.end.to_lowercase(), after))
            .is_some()
    })
}

/// Offset just past the name of the first `{{name` call at or after `from`.
fn template_call(haystack: &str, name: &str, from: usize) -> Option<usize> {
    let needle = format!("{{{{{}", name.trim());
    let mut pos = from;
    while let Some(found) = haystack.get(pos..)?.find(&needle) {
        let after = pos + found + needle.len();
        let terminated = haystack[after..]
            .chars()
            .next()
            .is_none_or(|c| c == '|' || c == '}' || c.is_whitespace());
        if terminated {
            return Some(after);
        }
        pos = after;
    }
    None
}
