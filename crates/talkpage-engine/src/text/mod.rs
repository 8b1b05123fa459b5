pub mod headline;
pub mod lines;
pub mod span;

pub use headline::normalize_headline;
pub use lines::{LineRef, line_end, line_start, lines_with_spans, list_markers, next_line_start};
pub use span::Span;
