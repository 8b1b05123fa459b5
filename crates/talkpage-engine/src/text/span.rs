/// A byte range `[start, end)` into page code.
///
/// Matches and masked fragments store spans rather than copied text, so slicing
/// the page code with any span reproduces the exact source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
pub struct Span {
    /// Inclusive start byte offset.
    pub start: usize,
    /// Exclusive end byte offset.
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Returns the length in bytes. Uses saturating subtraction for safety.
    #[must_use]
    pub fn len(self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Returns true if the span is empty (start >= end).
    #[must_use]
    pub fn is_empty(self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn contains(self, pos: usize) -> bool {
        self.start <= pos && pos < self.end
    }

    pub fn range(self) -> std::ops::Range<usize> {
        self.start..self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn len_saturates_for_inverted_span() {
        let sp = Span::new(5, 3);
        assert_eq!(sp.len(), 0);
        assert!(sp.is_empty());
    }

    #[test]
    fn contains_is_half_open() {
        let sp = Span::new(2, 4);
        assert!(!sp.contains(1));
        assert!(sp.contains(2));
        assert!(sp.contains(3));
        assert!(!sp.contains(4));
    }
}
