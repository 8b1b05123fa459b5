use xi_rope::delta::Builder;
use xi_rope::{Delta, Rope, RopeInfo};

use crate::text::Span;

/// A single change to page code, compiled to a rope delta.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Splice {
    Insert { at: usize, text: String },
    Replace { range: Span, text: String },
    Delete { range: Span },
}

impl Splice {
    /// The source range this splice replaces.
    pub fn range(&self) -> Span {
        match self {
            Splice::Insert { at, .. } => Span::new(*at, *at),
            Splice::Replace { range, .. } | Splice::Delete { range } => *range,
        }
    }

    pub fn compile(&self, base_len: usize) -> Delta<RopeInfo> {
        let mut builder = Builder::new(base_len);
        match self {
            Splice::Insert { at, text } => builder.replace(*at..*at, Rope::from(text.as_str())),
            Splice::Replace { range, text } => builder.replace(range.range(), Rope::from(text.as_str())),
            Splice::Delete { range } => builder.delete(range.range()),
        }
        builder.build()
    }

    /// Applies the splice to `code`.
    pub fn apply(&self, code: &str) -> String {
        let rope = Rope::from(code);
        let delta = self.compile(rope.len());
        delta.apply(&rope).to_string()
    }
}
