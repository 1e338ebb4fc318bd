//! Source location tracking

/// A span represents a range in the source code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    /// Start offset (in chars)
    pub start: usize,
    /// End offset (exclusive)
    pub end: usize,
    /// 1-based line of the first character
    pub line: usize,
    /// 1-based column of the first character
    pub column: usize,
}

impl Span {
    /// Create a new span
    pub fn new(start: usize, end: usize, line: usize, column: usize) -> Self {
        Self { start, end, line, column }
    }

    /// Create a dummy span for synthesized nodes
    pub fn dummy() -> Self {
        Self { start: 0, end: 0, line: 0, column: 0 }
    }

    /// Merge two spans. Line and column come from whichever starts first.
    pub fn merge(&self, other: &Span) -> Span {
        let (line, column) = if other.start < self.start {
            (other.line, other.column)
        } else {
            (self.line, self.column)
        };
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
            line,
            column,
        }
    }
}

impl Default for Span {
    fn default() -> Self {
        Self::dummy()
    }
}
