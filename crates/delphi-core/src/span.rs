//! Source location tracking for diagnostics and positional queries.
//!
//! Provides [`Span`] to track where tokens, nodes and diagnostics occur in
//! source code. Spans are also ordered, which the directive sweep relies on to
//! find the compiler switches lexically active at a node.

use std::cmp::Ordering;
use std::fmt;

/// A span of source code, represented by its starting position.
///
/// We track the line:column where a token starts plus its length in bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    /// Line number (1-indexed).
    pub line: u32,
    /// Column number (1-indexed, byte-based).
    pub col: u32,
    /// Length in bytes (for additional context).
    pub len: u32,
}

impl Span {
    /// Create a new span from a line, column, and length.
    #[inline]
    pub fn new(line: u32, col: u32, len: u32) -> Self {
        Self { line, col, len }
    }

    /// Create a zero-length span at a position.
    #[inline]
    pub fn point(line: u32, col: u32) -> Self {
        Self { line, col, len: 0 }
    }

    /// Whether this span is empty (zero length).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The length of this span in bytes.
    #[inline]
    pub fn len(&self) -> u32 {
        self.len
    }

    /// The zero-length span at the start of this span.
    #[inline]
    pub fn start(self) -> Span {
        Span::point(self.line, self.col)
    }

    /// Merge two spans into one that starts at the first span and extends to cover both.
    ///
    /// The resulting span starts at `self` and extends to include `other`.
    #[inline]
    pub fn merge(self, other: Span) -> Span {
        if self.line == other.line {
            let start_col = self.col.min(other.col);
            let end_col = (other.col + other.len).max(self.col + self.len);
            Span {
                line: self.line,
                col: start_col,
                len: end_col - start_col,
            }
        } else {
            // Multi-line spans keep the first position and approximate the length.
            Span {
                line: self.line,
                col: self.col,
                len: self.len + other.len,
            }
        }
    }

    /// Whether `self` starts at or before `other`.
    #[inline]
    pub fn starts_before_or_at(&self, other: &Span) -> bool {
        (self.line, self.col) <= (other.line, other.col)
    }
}

impl PartialOrd for Span {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Span {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.line, self.col, self.len).cmp(&(other.line, other.col, other.len))
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_basics() {
        let span = Span::new(1, 5, 10);
        assert_eq!(span.len(), 10);
        assert!(!span.is_empty());

        let empty = Span::point(1, 5);
        assert!(empty.is_empty());
        assert_eq!(span.start(), empty);
    }

    #[test]
    fn span_display() {
        let span = Span::new(3, 15, 5);
        assert_eq!(format!("{}", span), "3:15");
    }

    #[test]
    fn span_merge_same_line() {
        let span1 = Span::new(1, 5, 3);
        let span2 = Span::new(1, 10, 3);
        let merged = span1.merge(span2);

        assert_eq!(merged.line, 1);
        assert_eq!(merged.col, 5);
        assert_eq!(merged.len, 8);
    }

    #[test]
    fn span_merge_reverse_order() {
        let merged = Span::new(1, 10, 3).merge(Span::new(1, 5, 3));
        assert_eq!(merged.col, 5);
        assert_eq!(merged.len, 8);
    }

    #[test]
    fn span_merge_different_lines() {
        let merged = Span::new(1, 5, 10).merge(Span::new(3, 10, 5));
        assert_eq!(merged.line, 1);
        assert_eq!(merged.col, 5);
        assert_eq!(merged.len, 15);
    }

    #[test]
    fn span_ordering_follows_position() {
        let a = Span::new(2, 1, 4);
        let b = Span::new(2, 9, 1);
        let c = Span::new(3, 1, 1);
        assert!(a < b);
        assert!(b < c);
        assert!(a.starts_before_or_at(&b));
        assert!(!c.starts_before_or_at(&a));
    }
}
