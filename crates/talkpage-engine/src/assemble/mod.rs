//! Computes new page code for an action on a located section or comment.
//!
//! Every function takes the full page code and a [`SourceMatch`] computed
//! from that same code, and returns the whole new page. Nothing is guessed:
//! a match from other code, a match of the wrong kind, or an unsafe delete
//! is refused with an error and no change.

pub mod compose;
pub mod splice;

use crate::context::SiteContext;
use crate::error::EngineError;
use crate::locate::scan::scan_headings;
use crate::locate::{MatchDetail, SourceMatch, locate_comment, locate_section};
use crate::masking::MaskOptions;
use crate::models::{Comment, Section};
use crate::text::{Span, line_start, list_markers};

pub use compose::{Message, Signing, compose, has_signature, heading_line};
pub use splice::Splice;

/// Something to do to a section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionAction {
    /// Add an unindented comment at the end of the first chunk.
    Reply(Message),
    AddSubsection { headline: String, message: Message },
    EditHeading { headline: String },
    Delete,
}

/// Something to do to a comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommentAction {
    /// Reply below the comment and its existing replies.
    Reply(Message),
    /// Replace the comment text, keeping its signature.
    Edit { body: String },
    Delete,
}

/// A complete edit request against a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    AddSection { headline: String, message: Message },
    Section { target: Section, action: SectionAction },
    Comment { target: Comment, action: CommentAction },
}

/// Locates the action's target in `code` and computes the new page code.
pub fn assemble(code: &str, action: &Action, ctx: &SiteContext) -> Result<String, EngineError> {
    match action {
        Action::AddSection { headline, message } => add_section(code, headline, message, ctx),
        Action::Section { target, action } => {
            let m = locate_section(code, target, ctx)?;
            match action {
                SectionAction::Reply(message) => reply_in_section(code, &m, message, ctx),
                SectionAction::AddSubsection { headline, message } => {
                    add_subsection(code, &m, headline, message, ctx)
                }
                SectionAction::EditHeading { headline } => edit_heading(code, &m, headline),
                SectionAction::Delete => delete_section(code, &m),
            }
        }
        Action::Comment { target, action } => {
            let m = locate_comment(code, target, ctx)?;
            match action {
                CommentAction::Reply(message) => reply_to_comment(code, &m, message, ctx),
                CommentAction::Edit { body } => edit_comment(code, &m, body, ctx),
                CommentAction::Delete => delete_comment(code, &m),
            }
        }
    }
}

struct SectionBounds {
    level: u8,
    heading_end: usize,
    content_start: usize,
    first_chunk_end: usize,
    signature_count: usize,
    has_subsections: bool,
    closed: bool,
}

fn section_bounds(code: &str, m: &SourceMatch) -> Result<SectionBounds, EngineError> {
    m.verify(code)?;
    match m.detail {
        MatchDetail::Section {
            level,
            heading_end,
            content_start,
            first_chunk_end,
            signature_count,
            has_subsections,
            closed,
            ..
        } => Ok(SectionBounds {
            level,
            heading_end,
            content_start,
            first_chunk_end,
            signature_count,
            has_subsections,
            closed,
        }),
        MatchDetail::Comment { .. } => Err(m.locate_error()),
    }
}

struct CommentBounds {
    signature: Span,
    removal: Span,
    reply_point: usize,
    has_replies: bool,
}

fn comment_bounds(code: &str, m: &SourceMatch) -> Result<CommentBounds, EngineError> {
    m.verify(code)?;
    match m.detail {
        MatchDetail::Comment {
            signature,
            removal,
            reply_point,
            has_replies,
            ..
        } => Ok(CommentBounds {
            signature,
            removal,
            reply_point,
            has_replies,
        }),
        MatchDetail::Section { .. } => Err(m.locate_error()),
    }
}

/// Inserts whole lines at a line boundary `at`, adding the newline a file
/// without a trailing one is missing.
fn insert_lines(code: &str, at: usize, text: &str) -> String {
    let mut insertion = String::new();
    if at > 0 && !code[..at].ends_with('\n') {
        insertion.push('\n');
    }
    insertion.push_str(text);
    insertion.push('\n');
    Splice::Insert { at, text: insertion }.apply(code)
}

pub fn reply_to_comment(
    code: &str,
    m: &SourceMatch,
    message: &Message,
    ctx: &SiteContext,
) -> Result<String, EngineError> {
    let bounds = comment_bounds(code, m)?;
    let text = compose(message, &m.reply_indentation_chars, ctx)?;
    Ok(insert_lines(code, bounds.reply_point, &text))
}

pub fn reply_in_section(
    code: &str,
    m: &SourceMatch,
    message: &Message,
    ctx: &SiteContext,
) -> Result<String, EngineError> {
    let bounds = section_bounds(code, m)?;
    if bounds.closed {
        log::warn!("replying in a closed discussion");
    }
    let text = compose(message, "", ctx)?;

    let chunk = &code[bounds.content_start..bounds.first_chunk_end];
    let at = bounds.content_start + chunk.trim_end().len();
    if at == bounds.content_start {
        return Ok(insert_lines(code, at, &text));
    }

    // An unindented comment right after plain text would join its paragraph.
    let last_line = &code[line_start(code, at)..at];
    let separator = if list_markers(last_line).is_empty() { "\n\n" } else { "\n" };
    let mut insertion = format!("{separator}{text}");
    if at == code.len() {
        insertion.push('\n');
    }
    Ok(Splice::Insert { at, text: insertion }.apply(code))
}

/// Replaces the whitespace at the end of `range` with a blank line and the
/// new section, keeping a blank line before whatever follows.
fn append_section(code: &str, range: Span, heading: &str, body: &str) -> String {
    let before = &code[range.range()];
    let at = range.start + before.trim_end().len();

    let mut text = String::new();
    if at > 0 {
        text.push_str("\n\n");
    }
    text.push_str(heading);
    text.push('\n');
    if !body.is_empty() {
        text.push_str(body);
        text.push('\n');
    }
    if range.end < code.len() {
        text.push('\n');
    }
    Splice::Replace {
        range: Span::new(at, range.end),
        text,
    }
    .apply(code)
}

pub fn add_subsection(
    code: &str,
    m: &SourceMatch,
    headline: &str,
    message: &Message,
    ctx: &SiteContext,
) -> Result<String, EngineError> {
    let bounds = section_bounds(code, m)?;
    let heading = heading_line(headline, (bounds.level + 1).min(6));
    let body = compose(message, "", ctx)?;
    Ok(append_section(code, m.span(), &heading, &body))
}

/// Adds a new level-2 topic, at the end of the page or before its first
/// heading when configured for top-of-page topics.
pub fn add_section(
    code: &str,
    headline: &str,
    message: &Message,
    ctx: &SiteContext,
) -> Result<String, EngineError> {
    let heading = heading_line(headline, 2);
    let body = compose(message, "", ctx)?;

    if ctx.config.new_topic_on_top {
        let masked = ctx.masker.mask(code, MaskOptions::comments_only());
        if let Some(first) = scan_headings(&masked).first() {
            let mut text = format!("{heading}\n");
            if !body.is_empty() {
                text.push_str(&body);
                text.push('\n');
            }
            text.push('\n');
            return Ok(Splice::Insert {
                at: first.line.start,
                text,
            }
            .apply(code));
        }
    }

    Ok(append_section(code, Span::new(0, code.len()), &heading, &body))
}

/// Replaces a comment's text up to its signature, keeping the signature.
pub fn edit_comment(
    code: &str,
    m: &SourceMatch,
    body: &str,
    ctx: &SiteContext,
) -> Result<String, EngineError> {
    let bounds = comment_bounds(code, m)?;
    let prefix = m.indentation_chars.as_str();
    let text = crate::indentation::normalize(body, prefix, ctx.config.indentation_mode, ctx)?;

    // The first line's markers stay in place before the match start.
    let collapsed = prefix.replace('*', ":");
    let text = text
        .strip_prefix(prefix)
        .or_else(|| text.strip_prefix(collapsed.as_str()))
        .unwrap_or(&text);
    let text = text.strip_prefix(' ').unwrap_or(text);

    let replacement = format!(
        "{}{}{}",
        text.trim_end(),
        ctx.config.signature_prefix,
        &code[bounds.signature.range()]
    );
    Ok(Splice::Replace {
        range: m.span(),
        text: replacement,
    }
    .apply(code))
}

/// Replaces a section's headline, keeping its level.
pub fn edit_heading(code: &str, m: &SourceMatch, headline: &str) -> Result<String, EngineError> {
    let bounds = section_bounds(code, m)?;
    Ok(Splice::Replace {
        range: Span::new(m.start, bounds.heading_end),
        text: heading_line(headline, bounds.level),
    }
    .apply(code))
}

/// Removes a comment's lines. Refused when it has replies.
pub fn delete_comment(code: &str, m: &SourceMatch) -> Result<String, EngineError> {
    let bounds = comment_bounds(code, m)?;
    if bounds.has_replies {
        log::warn!("refusing to delete a comment with replies");
        return Err(EngineError::HasReplies { target: "comment" });
    }
    Ok(Splice::Delete {
        range: bounds.removal,
    }
    .apply(code))
}

/// Removes a whole section. Refused unless it holds at most one comment and
/// no subsections.
pub fn delete_section(code: &str, m: &SourceMatch) -> Result<String, EngineError> {
    let bounds = section_bounds(code, m)?;
    if bounds.signature_count > 1 || bounds.has_subsections {
        log::warn!("refusing to delete a section with replies");
        return Err(EngineError::HasReplies { target: "section" });
    }
    Ok(Splice::Delete { range: m.span() }.apply(code))
}
