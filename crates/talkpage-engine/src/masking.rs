//! Reversible masking of markup that confuses line-based scanning.
//!
//! Templates, tables, verbatim tags and HTML comments are replaced with
//! placeholder tokens so heading, signature and list regexes only ever see
//! the structure around them. Every fragment keeps the span it came from, so
//! offsets found in masked text map back to the page code.
//!
//! Only non-nested templates are masked. In `{{a|{{b}}}}` the inner call is
//! masked and the outer one is left as text.

use regex::{Captures, Regex};
use std::fmt;
use std::sync::OnceLock;

use crate::context::ContextError;
use crate::text::Span;

const INLINE_OPEN: char = '\x01';
const INLINE_CLOSE: char = '\x02';
const BLOCK_OPEN: char = '\x03';
const BLOCK_CLOSE: char = '\x04';

/// Tags whose content renders as a block of its own.
const BLOCK_TAGS: &[&str] = &[
    "pre",
    "source",
    "syntaxhighlight",
    "gallery",
    "poem",
    "score",
    "graph",
    "templatedata",
    "timeline",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderFamily {
    /// `\x01N\x02`, for constructs that sit inside a line.
    Inline,
    /// `\x03N\x04`, for tables and block-level verbatim tags.
    Block,
}

/// A placeholder standing in for a masked fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaskedToken {
    pub family: PlaceholderFamily,
    pub id: usize,
}

impl fmt::Display for MaskedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (open, close) = match self.family {
            PlaceholderFamily::Inline => (INLINE_OPEN, INLINE_CLOSE),
            PlaceholderFamily::Block => (BLOCK_OPEN, BLOCK_CLOSE),
        };
        write!(f, "{open}{}{close}", self.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskKind {
    /// A control character from the input that collides with placeholder delimiters.
    Sentinel,
    Comment,
    Template,
    Table,
    Verbatim,
}

#[derive(Debug, Clone)]
pub struct Fragment {
    pub token: MaskedToken,
    pub kind: MaskKind,
    /// Replaced text as it stood when masked; may contain earlier placeholders.
    original: String,
    /// Where the fragment sits in the unmasked input.
    pub source: Span,
}

#[derive(Debug, Clone, Copy)]
struct Placeholder {
    masked: Span,
    source: Span,
    id: usize,
}

/// Which constructs to mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaskOptions {
    pub comments: bool,
    pub templates: bool,
    pub tables: bool,
    pub verbatim: bool,
    /// Whether the masked text will be placed at zero indentation.
    pub zero_level: bool,
}

impl MaskOptions {
    /// Everything, for scanning page code.
    pub fn page() -> Self {
        Self {
            comments: true,
            templates: true,
            tables: true,
            verbatim: true,
            zero_level: true,
        }
    }

    /// Everything, for a message about to be placed at the given level.
    pub fn message(zero_level: bool) -> Self {
        Self {
            zero_level,
            ..Self::page()
        }
    }

    /// HTML comments only.
    pub fn comments_only() -> Self {
        Self {
            comments: true,
            templates: false,
            tables: false,
            verbatim: false,
            zero_level: true,
        }
    }
}

/// Compiled masking patterns.
#[derive(Debug, Clone)]
pub struct Masker {
    verbatim: Vec<(Regex, PlaceholderFamily)>,
}

impl Masker {
    pub fn new(tags: &[String]) -> Result<Self, ContextError> {
        let verbatim = tags
            .iter()
            .map(|tag| {
                let tag = regex::escape(tag.trim());
                let regex = Regex::new(&format!(
                    r"(?is)<{tag}(?:\s[^>]*?)?(?:/>|>.*?</{tag}\s*>)"
                ))
                .map_err(|source| ContextError::InvalidPattern {
                    name: "verbatim tag",
                    source,
                })?;
                let family = if BLOCK_TAGS.iter().any(|b| b.eq_ignore_ascii_case(&tag)) {
                    PlaceholderFamily::Block
                } else {
                    PlaceholderFamily::Inline
                };
                Ok((regex, family))
            })
            .collect::<Result<_, ContextError>>()?;
        Ok(Self { verbatim })
    }

    /// Masks `code`. Passes run in a fixed order: colliding control
    /// characters, comments, templates, tables, verbatim tags.
    pub fn mask(&self, code: &str, options: MaskOptions) -> MaskedCode {
        let p = patterns();
        let mut masked = MaskedCode {
            source: code.to_string(),
            text: code.to_string(),
            fragments: Vec::new(),
            visible: Vec::new(),
            make_all_into_colons: false,
        };

        masked.pass(&p.sentinel, 0, |_| {
            Some((MaskKind::Sentinel, PlaceholderFamily::Inline))
        });
        if options.comments {
            masked.pass(&p.comment, 0, |_| {
                Some((MaskKind::Comment, PlaceholderFamily::Inline))
            });
        }
        if options.templates {
            masked.pass(&p.template, 0, |_| {
                Some((MaskKind::Template, PlaceholderFamily::Inline))
            });
        }
        if options.tables {
            let tables = masked.pass(&p.table, 1, |_| {
                Some((MaskKind::Table, PlaceholderFamily::Block))
            });
            if tables > 0 && !options.zero_level {
                masked.make_all_into_colons = true;
            }
        }
        if options.verbatim {
            for (regex, family) in &self.verbatim {
                let family = *family;
                masked.pass(regex, 0, |caps| {
                    let inline_attr = family == PlaceholderFamily::Block
                        && caps[0]
                            .split('>')
                            .next()
                            .is_some_and(|open| open.contains(" inline"));
                    let family = if inline_attr {
                        PlaceholderFamily::Inline
                    } else {
                        family
                    };
                    Some((MaskKind::Verbatim, family))
                });
            }
        }
        masked
    }
}

struct Patterns {
    sentinel: Regex,
    comment: Regex,
    template: Regex,
    table: Regex,
    placeholder: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        sentinel: Regex::new(r"[\x01-\x04]").expect("Invalid sentinel regex"),
        comment: Regex::new(r"(?s)<!--.*?(?:-->|\z)").expect("Invalid comment regex"),
        template: Regex::new(r"\{\{(?:[^{]|\{[^{])*?\}\}").expect("Invalid template regex"),
        table: Regex::new(r"(?ms)^[:*#]*(\{\|.*?\n\|\})").expect("Invalid table regex"),
        placeholder: Regex::new(r"\x01(\d+)\x02|\x03(\d+)\x04").expect("Invalid placeholder regex"),
    })
}

/// Code with masked fragments and the bookkeeping to undo it.
#[derive(Debug, Clone)]
pub struct MaskedCode {
    source: String,
    text: String,
    fragments: Vec<Fragment>,
    /// Placeholders present in `text`, in order.
    visible: Vec<Placeholder>,
    make_all_into_colons: bool,
}

impl MaskedCode {
    /// The masked text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The code that was masked.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    /// Set when a table was masked in a message headed for a non-zero
    /// indentation level. Tables cannot live inside `*` lists.
    pub fn make_all_into_colons(&self) -> bool {
        self.make_all_into_colons
    }

    /// Maps a masked offset to the corresponding source offset. An offset
    /// inside a placeholder maps to the start of its fragment.
    pub fn to_source(&self, pos: usize) -> usize {
        self.map(pos, |p| p.source.start)
    }

    /// Like [`Self::to_source`], but an offset inside a placeholder maps to
    /// the end of its fragment.
    pub fn to_source_end(&self, pos: usize) -> usize {
        self.map(pos, |p| p.source.end)
    }

    pub fn span_to_source(&self, span: Span) -> Span {
        Span::new(self.to_source(span.start), self.to_source_end(span.end))
    }

    /// The fragment whose placeholder covers masked offset `pos`.
    pub fn fragment_at(&self, pos: usize) -> Option<&Fragment> {
        self.visible
            .iter()
            .find(|p| p.masked.contains(pos))
            .map(|p| &self.fragments[p.id])
    }

    /// Restores the original code.
    pub fn unmask(&self) -> String {
        self.unmask_str(&self.text)
    }

    /// Restores every placeholder in `text`, which may be this code's masked
    /// text or anything derived from it. Fragments that were masked around
    /// earlier placeholders are expanded until none remain.
    pub fn unmask_str(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        self.expand(text, &mut out);
        out
    }

    fn expand(&self, text: &str, out: &mut String) {
        let mut last = 0;
        for caps in patterns().placeholder.captures_iter(text) {
            let whole = caps.get(0).map_or(Span::new(0, 0), |m| Span::new(m.start(), m.end()));
            out.push_str(&text[last..whole.start]);
            last = whole.end;

            match self.lookup(&caps) {
                Some(fragment) if fragment.kind == MaskKind::Sentinel => {
                    out.push_str(&fragment.original)
                }
                Some(fragment) => self.expand(&fragment.original, out),
                None => out.push_str(&text[whole.range()]),
            }
        }
        out.push_str(&text[last..]);
    }

    fn lookup(&self, caps: &Captures<'_>) -> Option<&Fragment> {
        let (id, family) = match (caps.get(1), caps.get(2)) {
            (Some(id), _) => (id, PlaceholderFamily::Inline),
            (None, Some(id)) => (id, PlaceholderFamily::Block),
            (None, None) => return None,
        };
        let fragment = self.fragments.get(id.as_str().parse::<usize>().ok()?)?;
        (fragment.token.family == family).then_some(fragment)
    }

    fn map(&self, pos: usize, inside: impl Fn(&Placeholder) -> usize) -> usize {
        let mut source_pos = pos;
        for p in &self.visible {
            if p.masked.end <= pos {
                source_pos = source_pos + p.source.len() - p.masked.len();
            } else if p.masked.start < pos {
                return inside(p);
            } else {
                break;
            }
        }
        source_pos
    }

    /// Runs one masking pass, replacing capture group `group` of every match
    /// that `decide` accepts. Returns the number of fragments created.
    fn pass(
        &mut self,
        regex: &Regex,
        group: usize,
        decide: impl Fn(&Captures<'_>) -> Option<(MaskKind, PlaceholderFamily)>,
    ) -> usize {
        let matches: Vec<(Span, MaskKind, PlaceholderFamily)> = regex
            .captures_iter(&self.text)
            .filter_map(|caps| {
                let m = caps.get(group)?;
                let (kind, family) = decide(&caps)?;
                Some((Span::new(m.start(), m.end()), kind, family))
            })
            .collect();
        if matches.is_empty() {
            return 0;
        }

        let mut text = String::with_capacity(self.text.len());
        let mut visible = Vec::with_capacity(self.visible.len() + matches.len());
        let mut old = self.visible.iter().copied().peekable();
        let mut cursor = 0;

        for (span, kind, family) in &matches {
            self.copy_plain(cursor, span.start, &mut text, &mut visible, &mut old);
            while old.next_if(|p| p.masked.start < span.end).is_some() {}

            let id = self.fragments.len();
            let token = MaskedToken { family: *family, id };
            let source = self.span_to_source(*span);
            self.fragments.push(Fragment {
                token,
                kind: *kind,
                original: self.text[span.range()].to_string(),
                source,
            });

            let start = text.len();
            text.push_str(&token.to_string());
            visible.push(Placeholder {
                masked: Span::new(start, text.len()),
                source,
                id,
            });
            cursor = span.end;
        }
        self.copy_plain(cursor, self.text.len(), &mut text, &mut visible, &mut old);

        self.text = text;
        self.visible = visible;
        matches.len()
    }

    /// Copies `self.text[from..to]` and re-bases the placeholders inside it.
    fn copy_plain(
        &self,
        from: usize,
        to: usize,
        text: &mut String,
        visible: &mut Vec<Placeholder>,
        old: &mut std::iter::Peekable<impl Iterator<Item = Placeholder>>,
    ) {
        let base = text.len();
        while let Some(p) = old.next_if(|p| p.masked.end <= to) {
            visible.push(Placeholder {
                masked: Span::new(base + p.masked.start - from, base + p.masked.end - from),
                ..p
            });
        }
        text.push_str(&self.text[from..to]);
    }
}
