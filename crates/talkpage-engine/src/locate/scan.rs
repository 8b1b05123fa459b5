//! Line scanners for headings and signatures over masked page code.

use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::OnceLock;

use crate::context::SiteContext;
use crate::masking::{MaskKind, MaskedCode};
use crate::models::CommentId;
use crate::text::{LineRef, Span, lines_with_spans, list_markers, normalize_headline};

/// How far before a timestamp an author link may start.
const AUTHOR_LINK_WINDOW: usize = 250;

fn heading_regex() -> &'static Regex {
    static HEADING: OnceLock<Regex> = OnceLock::new();
    HEADING.get_or_init(|| Regex::new(r"^(=+)(.+?)(=+)$").expect("Invalid heading regex"))
}

fn trailing_placeholder_regex() -> &'static Regex {
    static TRAILING: OnceLock<Regex> = OnceLock::new();
    TRAILING.get_or_init(|| Regex::new(r"\x01\d+\x02$").expect("Invalid placeholder regex"))
}

fn inline_placeholder_regex() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| Regex::new(r"\x01\d+\x02").expect("Invalid placeholder regex"))
}

/// A heading line found in page code.
#[derive(Debug, Clone, PartialEq)]
pub struct Heading {
    /// Span of the line in masked text, including its newline.
    pub masked_line: Span,
    /// Span of the heading text in the source, without the newline.
    pub line: Span,
    pub level: u8,
    /// Normalized headline.
    pub headline: String,
    pub index: usize,
}

/// A signature (or unsigned-comment template) found in page code.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    /// Source span from the signature start through its ending.
    pub span: Span,
    /// The same span in masked text.
    pub masked: Span,
    /// Span of the containing line in masked text, including its newline.
    pub masked_line: Span,
    pub author: Option<String>,
    pub date: DateTime<Utc>,
    /// List markers of the line the signature is on.
    pub indentation_chars: String,
    pub index: usize,
}

impl Signature {
    pub fn id(&self) -> Option<CommentId> {
        self.author.as_deref().map(|a| CommentId::new(self.date, a))
    }
}

/// The line without trailing blanks and HTML comments, neither of which
/// stops it rendering as a heading.
fn heading_text<'a>(masked: &MaskedCode, line: &LineRef<'a>) -> &'a str {
    let mut text = line.text.trim_end_matches([' ', '\t']);
    while let Some(m) = trailing_placeholder_regex().find(text) {
        let is_comment = masked
            .fragment_at(line.span.start + m.start())
            .is_some_and(|f| f.kind == MaskKind::Comment);
        if !is_comment {
            break;
        }
        text = text[..m.start()].trim_end_matches([' ', '\t']);
    }
    text
}

pub fn scan_headings(masked: &MaskedCode) -> Vec<Heading> {
    let re = heading_regex();
    let mut headings = Vec::new();

    for line in lines_with_spans(masked.text()) {
        let text = heading_text(masked, &line);
        let Some(caps) = re.captures(text) else {
            continue;
        };
        let open = caps.get(1).map_or(0, |m| m.len());
        let close = caps.get(3).map_or(0, |m| m.len());
        let level = open.min(close).min(6);
        let inner = &text[level..text.len() - level];

        headings.push(Heading {
            masked_line: line.span,
            // Trailing comments stay outside, so a heading edit keeps them.
            line: masked.span_to_source(Span::new(line.span.start, line.span.start + text.len())),
            level: level as u8,
            headline: normalize_headline(&masked.unmask_str(inner)),
            index: headings.len(),
        });
    }
    headings
}

/// Finds every signature in document order.
///
/// A signature is a timestamp with the configured timezone label, preceded
/// on the same line by an author link no more than 250 bytes earlier. The
/// start is pulled back over the signature prefix and the end pushed forward
/// over the signature ending. Unsigned-comment templates count as well.
pub fn scan_signatures(masked: &MaskedCode, ctx: &SiteContext) -> Vec<Signature> {
    let mut signatures = Vec::new();

    for line in lines_with_spans(masked.text()) {
        let markers = list_markers(line.text);
        let mut floor = 0;

        for caps in ctx.timestamps.content_regex().captures_iter(line.text) {
            let Some(whole) = caps.get(0) else { continue };
            let Some(date) = ctx.timestamps.date_from_captures(&caps, None) else {
                continue;
            };

            let mut window_start = whole.start().saturating_sub(AUTHOR_LINK_WINDOW).max(floor);
            while !line.text.is_char_boundary(window_start) {
                window_start += 1;
            }
            let window = &line.text[window_start..whole.start()];
            let links: Vec<(usize, String)> = ctx
                .author_link
                .captures_iter(window)
                .filter_map(|link| {
                    let start = link.get(0)?.start();
                    let name = link.get(1).or_else(|| link.get(2))?;
                    Some((start, clean_user_name(name.as_str())))
                })
                .collect();

            // The signature starts at the earliest link to the same user as
            // the last one, so user and talk links are both covered.
            let signer = links.last().map(|(_, name)| name.clone());
            let first_link = signer
                .as_ref()
                .and_then(|signer| links.iter().find(|(_, name)| name == signer));

            let (start, author) = match first_link {
                Some((offset, name)) => {
                    let link_start = window_start + offset;
                    let name = Some(name.clone());
                    let start = ctx
                        .signature_prefix
                        .find(&line.text[window_start..link_start])
                        .filter(|m| !m.is_empty())
                        .map_or(link_start, |m| window_start + m.start());
                    (start, name)
                }
                None => (whole.start(), None),
            };

            let mut end = whole.end();
            if let Some(ending) = ctx.signature_ending.find(&line.text[end..]) {
                if ending.start() == 0 {
                    end += ending.end();
                }
            }
            floor = end;

            let masked_span = Span::new(line.span.start + start, line.span.start + end);
            signatures.push(Signature {
                span: masked.span_to_source(masked_span),
                masked: masked_span,
                masked_line: line.span,
                author,
                date,
                indentation_chars: markers.to_string(),
                index: 0,
            });
        }

        for m in inline_placeholder_regex().find_iter(line.text) {
            let masked_span = Span::new(line.span.start + m.start(), line.span.start + m.end());
            let Some(fragment) = masked.fragment_at(masked_span.start) else {
                continue;
            };
            if fragment.kind != MaskKind::Template {
                continue;
            }
            let Some((author, date)) = parse_unsigned(&masked.source()[fragment.source.range()], ctx)
            else {
                continue;
            };
            signatures.push(Signature {
                span: fragment.source,
                masked: masked_span,
                masked_line: line.span,
                author: Some(author),
                date,
                indentation_chars: markers.to_string(),
                index: 0,
            });
        }
    }

    signatures.sort_by_key(|s| s.masked.start);
    for (i, signature) in signatures.iter_mut().enumerate() {
        signature.index = i;
    }
    signatures
}

/// Reads `{{unsigned|Author|timestamp}}` style calls. Parameters may come in
/// either order: the one that parses as a timestamp is the date, the first
/// other positional one is the author.
fn parse_unsigned(call: &str, ctx: &SiteContext) -> Option<(String, DateTime<Utc>)> {
    let inner = call.strip_prefix("{{")?.strip_suffix("}}")?;
    let mut params = inner.split('|');
    let name = clean_user_name(params.next()?);
    if !ctx
        .config
        .unsigned_templates
        .iter()
        .any(|t| clean_user_name(t).eq_ignore_ascii_case(&name))
    {
        return None;
    }

    let mut author = None;
    let mut date = None;
    for param in params {
        let value = param.split_once('=').map_or(param, |(key, value)| {
            if key.trim().chars().all(|c| c.is_ascii_digit()) {
                value
            } else {
                ""
            }
        });
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        if date.is_none() {
            if let Some(parsed) = ctx.timestamps.parse(value, None) {
                date = Some(parsed.date);
                continue;
            }
        }
        if author.is_none() {
            author = Some(clean_user_name(value));
        }
    }
    Some((author?, date?))
}

/// User names compare with underscores as spaces.
pub fn clean_user_name(name: &str) -> String {
    name.trim().replace('_', " ")
}
