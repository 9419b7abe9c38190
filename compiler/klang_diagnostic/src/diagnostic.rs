//! The diagnostic data model.
//!
//! A [`Diagnostic`] is what the CLI and editor collaborators consume: a
//! message plus an optional 0-based source range. The parser's 1-based
//! positions are normalized here.

use std::fmt;

use klang_ir::{Position, Span};

/// A 0-based (row, character) position for external consumers.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct Location {
    pub row: u32,
    pub character: u32,
}

impl From<Position> for Location {
    fn from(pos: Position) -> Self {
        Location {
            row: pos.row - 1,
            character: pos.column - 1,
        }
    }
}

/// A half-open range of 0-based positions.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct Range {
    pub start: Location,
    pub end: Location,
}

impl Range {
    /// Resolve a byte span against its source text.
    pub fn from_span(source: &str, span: Span) -> Range {
        Range {
            start: Position::at(source, span.start as usize).into(),
            end: Position::at(source, span.end as usize).into(),
        }
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}..{}:{}",
            self.start.row, self.start.character, self.end.row, self.end.character
        )
    }
}

/// One user-facing compile error.
///
/// `range` is `None` only for errors that cannot be pinned to user source,
/// such as a missing imported module.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
#[must_use = "diagnostics should be reported or returned, not silently dropped"]
pub struct Diagnostic {
    pub range: Option<Range>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(range: Option<Range>, message: impl Into<String>) -> Self {
        Diagnostic {
            range,
            message: message.into(),
        }
    }

    /// A diagnostic with no source location.
    pub fn global(message: impl Into<String>) -> Self {
        Diagnostic {
            range: None,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.range {
            Some(range) => write!(f, "{}: {}", range, self.message),
            None => f.write_str(&self.message),
        }
    }
}
