//! Positioned parse errors.

use std::fmt;

use klang_diagnostic::{Diagnostic, Range};
use klang_ir::{Position, Span};

use crate::combinator::Failure;

/// A syntax error: the byte offset the parse got stuck at, plus the token
/// descriptions that were expected there.
///
/// Unlike semantic diagnostics, a parse error is fatal — no AST exists, so
/// validation never runs.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ParseError {
    pub offset: usize,
    pub expected: Vec<&'static str>,
}

impl ParseError {
    /// Describe the failure against its source, with a 1-based position.
    pub fn describe(&self, source: &str) -> String {
        let position = Position::at(source, self.offset);
        format!("syntax error at {position}: expected {}", self.expected_list())
    }

    /// Resolve into the external diagnostic shape, with a point range at
    /// the failure offset.
    pub fn to_diagnostic(&self, source: &str) -> Diagnostic {
        let span = Span::point(self.offset as u32);
        Diagnostic::new(
            Some(Range::from_span(source, span)),
            format!("syntax error: expected {}", self.expected_list()),
        )
    }

    fn expected_list(&self) -> String {
        self.expected
            .iter()
            .map(|e| format!("`{e}`"))
            .collect::<Vec<_>>()
            .join(" or ")
    }
}

impl From<Failure> for ParseError {
    fn from(failure: Failure) -> Self {
        ParseError {
            offset: failure.offset,
            expected: failure.expected,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "syntax error at offset {}: expected {}",
            self.offset,
            self.expected_list()
        )
    }
}

impl std::error::Error for ParseError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_uses_position() {
        let err = ParseError {
            offset: 12,
            expected: vec![";"],
        };
        let msg = err.describe("int a = 0;\nx$\n");
        assert!(msg.contains("2:2"), "got: {msg}");
        assert!(msg.contains("`;`"));
    }

    #[test]
    fn test_to_diagnostic_point_range() {
        let err = ParseError {
            offset: 4,
            expected: vec!["identifier", "("],
        };
        let diag = err.to_diagnostic("int $");
        let Some(range) = diag.range else {
            panic!("expected range");
        };
        assert_eq!(range.start.character, 4);
        assert!(diag.message.contains("`identifier` or `(`"));
    }
}
