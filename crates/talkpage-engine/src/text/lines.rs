use super::span::Span;

/// A reference to a single line of text with its byte span.
#[derive(Debug, Clone, Copy)]
pub struct LineRef<'a> {
    /// Byte span of this line (includes the newline if present).
    pub span: Span,
    /// The line text without its trailing newline.
    pub text: &'a str,
}

impl LineRef<'_> {
    /// Byte offset just past the line content, before the newline.
    pub fn content_end(&self) -> usize {
        self.span.start + self.text.len()
    }
}

/// Returns an iterator over lines with their byte spans.
///
/// Spans keep the newline so that consecutive spans tile the input exactly,
/// which the matcher relies on when it converts line positions to offsets.
pub fn lines_with_spans(text: &str) -> impl Iterator<Item = LineRef<'_>> + '_ {
    let mut offset = 0usize;
    text.split_inclusive('\n').map(move |raw| {
        let start = offset;
        offset += raw.len();
        LineRef {
            span: Span { start, end: offset },
            text: raw.strip_suffix('\n').unwrap_or(raw),
        }
    })
}

/// Byte offset of the start of the line containing `pos`.
pub fn line_start(text: &str, pos: usize) -> usize {
    text[..pos].rfind('\n').map_or(0, |i| i + 1)
}

/// Byte offset of the end of the line containing `pos`, before its newline.
pub fn line_end(text: &str, pos: usize) -> usize {
    text[pos..].find('\n').map_or(text.len(), |i| pos + i)
}

/// Byte offset of the start of the line after the one containing `pos`.
pub fn next_line_start(text: &str, pos: usize) -> usize {
    text[pos..].find('\n').map_or(text.len(), |i| pos + i + 1)
}

/// The leading `:`/`*`/`#` run of a line.
pub fn list_markers(line: &str) -> &str {
    let len = line
        .bytes()
        .take_while(|b| matches!(b, b':' | b'*' | b'#'))
        .count();
    &line[..len]
}
