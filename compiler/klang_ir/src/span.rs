//! Source location spans and positions.
//!
//! A [`Span`] is a compact pair of byte offsets into the source text. Every
//! AST node carries one, and diagnostics resolve spans back to line/column
//! positions on demand by scanning the source. There is no global cursor or
//! line table: positions are recomputed from the offset each time, so they
//! stay consistent no matter which parser consumed the input.

use std::fmt;

/// Source location span, as byte offsets into the source text.
///
/// `start` is inclusive, `end` exclusive.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    /// Create a new span.
    #[inline]
    pub const fn new(start: u32, end: u32) -> Self {
        Span { start, end }
    }

    /// Create a zero-length span at an offset.
    #[inline]
    pub const fn point(offset: u32) -> Self {
        Span {
            start: offset,
            end: offset,
        }
    }

    /// Length of the span in bytes.
    #[inline]
    pub const fn len(&self) -> u32 {
        self.end - self.start
    }

    /// Check if the span is empty.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Merge two spans to create one covering both.
    #[inline]
    #[must_use]
    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Convert to a `std::ops::Range` for slicing the source.
    #[inline]
    pub fn to_range(&self) -> std::ops::Range<usize> {
        self.start as usize..self.end as usize
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// A 1-based line/column position, as the parser reports it.
///
/// External diagnostics consumers use the 0-based `Range` from
/// `klang_diagnostic` instead; this type is the parser-facing view.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct Position {
    /// 1-based line number.
    pub row: u32,
    /// 1-based column number, in bytes since the last newline.
    pub column: u32,
}

impl Position {
    /// Compute the position of a byte offset by scanning the source.
    ///
    /// Row is the newline count before `offset` plus one; column is the
    /// byte distance since the last newline plus one.
    pub fn at(source: &str, offset: usize) -> Position {
        let offset = offset.min(source.len());
        let consumed = &source.as_bytes()[..offset];
        let row = consumed.iter().filter(|&&b| b == b'\n').count() as u32 + 1;
        let line_start = consumed
            .iter()
            .rposition(|&b| b == b'\n')
            .map_or(0, |i| i + 1);
        Position {
            row,
            column: (offset - line_start) as u32 + 1,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.row, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_basic() {
        let span = Span::new(10, 20);
        assert_eq!(span.len(), 10);
        assert!(!span.is_empty());
        assert_eq!(span.to_range(), 10..20);
    }

    #[test]
    fn test_span_merge() {
        let a = Span::new(10, 20);
        let b = Span::new(15, 30);
        assert_eq!(a.merge(b), Span::new(10, 30));
        assert_eq!(b.merge(a), Span::new(10, 30));
    }

    #[test]
    fn test_position_first_line() {
        let src = "int a = 0;";
        assert_eq!(Position::at(src, 0), Position { row: 1, column: 1 });
        assert_eq!(Position::at(src, 4), Position { row: 1, column: 5 });
    }

    #[test]
    fn test_position_after_newlines() {
        let src = "int a = 0;\nfloat b;\n";
        assert_eq!(Position::at(src, 11), Position { row: 2, column: 1 });
        assert_eq!(Position::at(src, 17), Position { row: 2, column: 7 });
        assert_eq!(Position::at(src, 20), Position { row: 3, column: 1 });
    }

    #[test]
    fn test_position_clamps_past_end() {
        let src = "x";
        assert_eq!(Position::at(src, 100), Position { row: 1, column: 2 });
    }
}
