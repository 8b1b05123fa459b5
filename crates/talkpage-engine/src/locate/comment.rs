use crate::context::SiteContext;
use crate::error::EngineError;
use crate::indentation::reply_indentation;
use crate::masking::MaskOptions;
use crate::models::{Comment, CommentId};
use crate::text::{Span, line_end, line_start, list_markers, next_line_start};

use super::scan::{Heading, Signature, clean_user_name, scan_headings, scan_signatures};
use super::score::{CLOSE_TIMESTAMP_SECONDS, ScoreCard, Signal, best_candidate};
use super::{CodeFingerprint, MatchDetail, SourceMatch};

/// The comment a signature replies to: the nearest earlier signature in the
/// same section with a shorter indentation prefix.
fn parent_of(signatures: &[Signature], headings: &[Heading], i: usize) -> Option<CommentId> {
    let sig = &signatures[i];
    let depth = sig.indentation_chars.len();
    if depth == 0 {
        return None;
    }
    signatures[..i]
        .iter()
        .rev()
        .take_while(|earlier| {
            !headings.iter().any(|h| {
                h.masked_line.start > earlier.masked.start && h.masked_line.start < sig.masked.start
            })
        })
        .find(|earlier| earlier.indentation_chars.len() < depth)
        .and_then(Signature::id)
}

fn enclosing_headline<'a>(headings: &'a [Heading], pos: usize) -> Option<&'a str> {
    headings
        .iter()
        .take_while(|h| h.masked_line.start < pos)
        .last()
        .map(|h| h.headline.as_str())
}

/// Finds the signature of `target` in `code` and works out where its
/// replies go.
pub fn locate_comment(
    code: &str,
    target: &Comment,
    ctx: &SiteContext,
) -> Result<SourceMatch, EngineError> {
    let comment_id = target.id().to_string();
    let masked = ctx.masker.mask(code, MaskOptions::page());
    let headings = scan_headings(&masked);
    let signatures = scan_signatures(&masked, ctx);
    let author = clean_user_name(&target.author);
    let literal = target.signature.trim();

    let candidates = signatures.iter().enumerate().map(|(i, sig)| {
        let line = &code[masked.span_to_source(sig.masked_line).range()];
        let author_matches = match &sig.author {
            Some(name) => *name == author,
            None => !literal.is_empty() && line.contains(literal),
        };
        let distance = (sig.date - target.date).num_seconds().abs();
        let headline_matches = target
            .section_headline
            .as_deref()
            .is_some_and(|h| enclosing_headline(&headings, sig.masked.start) == Some(h));
        let parent_matches = target.parent_id.is_some()
            && parent_of(&signatures, &headings, i) == target.parent_id;

        let card = ScoreCard::from_signals([
            (Signal::Author, author_matches),
            (Signal::TimestampExact, distance == 0),
            (
                Signal::TimestampClose,
                distance > 0 && distance <= CLOSE_TIMESTAMP_SECONDS,
            ),
            (Signal::EnclosingHeadline, headline_matches),
            (Signal::Index, sig.index == target.index),
            (Signal::ParentId, parent_matches),
            (Signal::IndentationChars, sig.indentation_chars == target.indentation_chars),
        ]);
        log::debug!(
            "comment candidate at {}: {} {:?}",
            sig.span.start,
            card.total,
            card.matched
        );
        (sig, card)
    });

    let best = best_candidate(candidates, |_, card| {
        card.has(Signal::Author)
            && (card.has(Signal::TimestampExact) || card.has(Signal::TimestampClose))
    });
    let Some((sig, card)) = best else {
        log::warn!("could not locate comment {comment_id}");
        return Err(EngineError::LocateComment { comment_id });
    };

    let text = masked.text();
    let is_heading = |line_start: usize| headings.iter().any(|h| h.masked_line.start == line_start);
    let has_signature = |line_start: usize, before: usize| {
        signatures
            .iter()
            .any(|s| s.masked_line.start == line_start && s.masked.start < before)
    };

    // Where the comment text starts: after an earlier signature on the same
    // line, or at the first of the lines above that continue it.
    let earlier_on_line = signatures
        .iter()
        .filter(|s| s.masked_line == sig.masked_line && s.masked.end <= sig.masked.start)
        .map(|s| s.masked.end)
        .last();
    let later_on_line = signatures
        .iter()
        .any(|s| s.masked_line == sig.masked_line && s.masked.start >= sig.masked.end);
    let (first_line, start) = match earlier_on_line {
        Some(end) => {
            let skipped = text[end..sig.masked.start].len() - text[end..sig.masked.start].trim_start().len();
            (sig.masked_line.start, end + skipped)
        }
        None => {
            let mut first = sig.masked_line.start;
            while first > 0 {
                let prev_start = line_start(text, first - 1);
                let prev = &text[prev_start..first - 1];
                if prev.trim().is_empty()
                    || is_heading(prev_start)
                    || list_markers(prev) != sig.indentation_chars
                    || has_signature(prev_start, usize::MAX)
                {
                    break;
                }
                first = prev_start;
            }
            (first, first + list_markers(&text[first..]).len())
        }
    };

    // Lines after the signature: unsigned continuation text of an
    // unindented comment, then deeper-indented replies.
    let mut pos = next_line_start(text, sig.masked.end);
    if sig.indentation_chars.is_empty() && earlier_on_line.is_none() && !later_on_line {
        while pos < text.len() {
            let line = &text[pos..line_end(text, pos)];
            if line.trim().is_empty()
                || !list_markers(line).is_empty()
                || is_heading(pos)
                || has_signature(pos, usize::MAX)
            {
                break;
            }
            pos = next_line_start(text, pos);
        }
    }
    let continuation_end = pos;

    // A comment sharing its line with another signature owns only its text:
    // from the end of the one before, or up to the text of the one after.
    let removal = match earlier_on_line {
        Some(end) => Span::new(end, sig.masked.end),
        None if later_on_line => {
            let rest = &text[sig.masked.end..line_end(text, sig.masked.end)];
            let blank = rest.len() - rest.trim_start().len();
            Span::new(start, sig.masked.end + blank)
        }
        None => Span::new(first_line, continuation_end),
    };

    let depth = sig.indentation_chars.len();
    let mut reply_markers: Option<String> = None;
    while pos < text.len() {
        let line = &text[pos..line_end(text, pos)];
        let markers = list_markers(line);
        if line.trim().is_empty() || markers.len() <= depth {
            break;
        }
        reply_markers.get_or_insert_with(|| markers.to_string());
        pos = next_line_start(text, pos);
    }
    let reply_point = pos;

    if headings
        .iter()
        .any(|h| h.masked_line.start >= first_line && h.masked_line.start < reply_point)
    {
        log::warn!("heading found between comment {comment_id} and its reply point");
        return Err(EngineError::LocateComment { comment_id });
    }

    let has_replies = reply_markers.is_some();
    let reply_indentation_chars = reply_markers.unwrap_or_else(|| {
        reply_indentation(
            &sig.indentation_chars,
            ctx.config.indentation_mode,
            ctx.config.indentation_char,
        )
    });
    let start = masked.to_source(start);
    log::debug!(
        "located comment {comment_id} at {start} with score {}",
        card.total
    );

    Ok(SourceMatch {
        start,
        end: sig.span.end,
        heading_start: None,
        code: code[start..sig.span.end].to_string(),
        score: card.total,
        matched: card.matched,
        indentation_chars: sig.indentation_chars.clone(),
        reply_indentation_chars,
        fingerprint: CodeFingerprint::of(code),
        detail: MatchDetail::Comment {
            comment_id,
            signature: sig.span,
            removal: masked.span_to_source(removal),
            reply_point: masked.to_source(reply_point),
            has_replies,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn ctx() -> SiteContext {
        SiteContext::english()
    }

    fn comment(author: &str, hour: u32, minute: u32, indentation: &str) -> Comment {
        let date = Utc.with_ymd_and_hms(2024, 1, 1, hour, minute, 0).unwrap();
        Comment::new(author, date, indentation)
    }

    fn reply_point(m: &SourceMatch) -> usize {
        match m.detail {
            MatchDetail::Comment { reply_point, .. } => reply_point,
            MatchDetail::Section { .. } => panic!("expected a comment match"),
        }
    }

    fn removal(m: &SourceMatch) -> Span {
        match m.detail {
            MatchDetail::Comment { removal, .. } => removal,
            MatchDetail::Section { .. } => panic!("expected a comment match"),
        }
    }

    const THREAD: &str = "== Topic ==\n\
Question? [[User:Ann|Ann]] 09:00, 1 January 2024 (UTC)\n\
:Answer. -- [[User:Alice|Alice]] 10:00, 1 January 2024 (UTC)\n\
::Follow-up [[User:Bob|Bob]] 11:00, 1 January 2024 (UTC)\n\
:Another [[User:Cy|Cy]] 12:00, 1 January 2024 (UTC)\n";

    #[test]
    fn reply_goes_after_deeper_replies() {
        let m = locate_comment(THREAD, &comment("Alice", 10, 0, ":"), &ctx()).unwrap();

        assert_eq!(&THREAD[m.start..m.end], "Answer. -- [[User:Alice|Alice]] 10:00, 1 January 2024 (UTC)");
        assert_eq!(m.indentation_chars, ":");
        assert_eq!(m.reply_indentation_chars, "::");
        assert_eq!(&THREAD[reply_point(&m)..], ":Another [[User:Cy|Cy]] 12:00, 1 January 2024 (UTC)\n");
    }

    #[test]
    fn deeper_existing_reply_sets_reply_indentation() {
        let code = "== T ==\n:Point -- [[User:Alice|Alice]] 10:00, 1 January 2024 (UTC)\n:::*Nested [[User:Bob|Bob]] 11:00, 1 January 2024 (UTC)\n";
        let m = locate_comment(code, &comment("Alice", 10, 0, ":"), &ctx()).unwrap();
        assert_eq!(m.reply_indentation_chars, ":::*");
        assert_eq!(reply_point(&m), code.len());
    }

    #[test]
    fn unlinked_signature_matches_by_literal() {
        let code = "== T ==\n:Hi -- Alice 10:00, 1 January 2024 (UTC)\n::Reply [[User:Bob|Bob]] 11:00, 1 January 2024 (UTC)\n";
        let mut target = comment("Alice", 10, 0, ":");
        target.signature = "-- Alice 10:00, 1 January 2024 (UTC)".into();

        let m = locate_comment(code, &target, &ctx()).unwrap();
        assert_eq!(m.reply_indentation_chars, "::");
    }

    #[test]
    fn unindented_comment_absorbs_continuation() {
        let code = "== T ==\nOpening [[User:Ann|Ann]] 09:00, 1 January 2024 (UTC)\nPS: one more thing\n\nNext paragraph\n";
        let m = locate_comment(code, &comment("Ann", 9, 0, ""), &ctx()).unwrap();

        assert_eq!(&code[reply_point(&m)..], "\nNext paragraph\n");
        assert_eq!(m.reply_indentation_chars, ":");
        assert_eq!(
            &code[removal(&m).range()],
            "Opening [[User:Ann|Ann]] 09:00, 1 January 2024 (UTC)\nPS: one more thing\n"
        );
    }

    #[test]
    fn multi_line_comment_starts_at_first_line() {
        let code = ":First line\n:second line [[User:Ann|Ann]] 09:00, 1 January 2024 (UTC)\n";
        let m = locate_comment(code, &comment("Ann", 9, 0, ":"), &ctx()).unwrap();
        assert_eq!(m.start, 1);
    }

    #[test]
    fn close_timestamp_still_matches() {
        let code = "x [[User:Ann|Ann]] 09:01, 1 January 2024 (UTC)\n";
        let m = locate_comment(code, &comment("Ann", 9, 0, ""), &ctx()).unwrap();
        assert!(m.matched.contains(&Signal::TimestampClose));
    }

    #[test]
    fn wrong_author_is_not_viable() {
        let code = "x [[User:Ann|Ann]] 09:00, 1 January 2024 (UTC)\n";
        let err = locate_comment(code, &comment("Bob", 9, 0, ""), &ctx()).unwrap_err();
        assert_eq!(err.code(), "locateComment");
    }

    #[test]
    fn parent_id_breaks_ties() {
        let code = "== T ==\n\
a [[User:P|P]] 08:00, 1 January 2024 (UTC)\n\
:x [[User:Ann|Ann]] 09:00, 1 January 2024 (UTC)\n\
b [[User:Q|Q]] 08:30, 1 January 2024 (UTC)\n\
:x [[User:Ann|Ann]] 09:00, 1 January 2024 (UTC)\n";
        let mut target = comment("Ann", 9, 0, ":");
        target.index = 99;
        target.parent_id = Some("202401010830_Q".into());

        let m = locate_comment(code, &target, &ctx()).unwrap();
        assert!(m.matched.contains(&Signal::ParentId));
        assert!(m.start > code.find("b [[User:Q").unwrap());
    }

    #[test]
    fn signature_inside_heading_is_refused() {
        let code = "== Re [[User:Ann|Ann]] 09:00, 1 January 2024 (UTC) ==\ntext\n";
        let err = locate_comment(code, &comment("Ann", 9, 0, ""), &ctx()).unwrap_err();
        assert_eq!(err.code(), "locateComment");
    }
}
