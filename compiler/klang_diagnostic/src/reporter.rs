//! Plain-text diagnostic rendering.
//!
//! Renders a diagnostic as the message followed by the offending source
//! line with a caret/underline. Terminal detection and output-path policy
//! stay with the CLI collaborator; this helper just writes to any
//! `io::Write`.

use std::io::{self, Write};

use crate::diagnostic::Diagnostic;

/// ANSI color codes for terminal output.
mod colors {
    pub const ERROR: &str = "\x1b[1;31m";
    pub const BOLD: &str = "\x1b[1m";
    pub const CARET: &str = "\x1b[1;36m";
    pub const RESET: &str = "\x1b[0m";
}

/// Diagnostic reporter writing human-readable output.
pub struct Reporter<W: Write> {
    writer: W,
    colors: bool,
}

impl<W: Write> Reporter<W> {
    pub fn new(writer: W) -> Self {
        Reporter {
            writer,
            colors: false,
        }
    }

    /// Enable ANSI color output. The caller decides whether the target is
    /// a terminal.
    pub fn with_colors(writer: W) -> Self {
        Reporter {
            writer,
            colors: true,
        }
    }

    /// Consume the reporter and return the writer.
    pub fn into_writer(self) -> W {
        self.writer
    }

    fn paint(&self, code: &'static str) -> &'static str {
        if self.colors {
            code
        } else {
            ""
        }
    }

    /// Render one diagnostic against its source text.
    pub fn report(&mut self, source: &str, diagnostic: &Diagnostic) -> io::Result<()> {
        writeln!(
            self.writer,
            "{}error{}: {}{}{}",
            self.paint(colors::ERROR),
            self.paint(colors::RESET),
            self.paint(colors::BOLD),
            diagnostic.message,
            self.paint(colors::RESET),
        )?;

        let Some(range) = diagnostic.range else {
            return Ok(());
        };

        let Some(line) = source.lines().nth(range.start.row as usize) else {
            return Ok(());
        };

        let line_no = range.start.row + 1;
        let gutter = line_no.to_string().len();
        writeln!(self.writer, "{:gutter$} |", "")?;
        writeln!(self.writer, "{line_no} | {line}")?;

        // Underline to the end of the range on the same line, or to the end
        // of the line for multi-line ranges.
        let start = range.start.character as usize;
        let end = if range.end.row == range.start.row {
            (range.end.character as usize).max(start + 1)
        } else {
            line.len().max(start + 1)
        };
        let underline = "^".repeat(end.min(line.len().max(start + 1)) - start);
        writeln!(
            self.writer,
            "{:gutter$} | {:start$}{}{}{}",
            "",
            "",
            self.paint(colors::CARET),
            underline,
            self.paint(colors::RESET),
        )?;
        Ok(())
    }

    /// Render a batch of diagnostics.
    pub fn report_all(&mut self, source: &str, diagnostics: &[Diagnostic]) -> io::Result<()> {
        for diagnostic in diagnostics {
            self.report(source, diagnostic)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::diagnostic::{Location, Range};

    use super::*;

    fn render(source: &str, diagnostic: &Diagnostic) -> String {
        let mut reporter = Reporter::new(Vec::new());
        let Ok(()) = reporter.report(source, diagnostic) else {
            panic!("report failed");
        };
        String::from_utf8_lossy(&reporter.into_writer()).into_owned()
    }

    #[test]
    fn test_report_with_caret() {
        let src = "int a = 0;\nint a = 1;\n";
        let diag = Diagnostic::new(
            Some(Range {
                start: Location { row: 1, character: 4 },
                end: Location { row: 1, character: 5 },
            }),
            "name `a` is already declared in this scope",
        );
        let out = render(src, &diag);
        assert!(out.contains("error: name `a` is already declared"));
        assert!(out.contains("2 | int a = 1;"));
        assert!(out.contains("    ^"));
    }

    #[test]
    fn test_report_without_range() {
        let diag = Diagnostic::global("imported module `dsp` not found");
        let out = render("", &diag);
        assert_eq!(out, "error: imported module `dsp` not found\n");
    }

    #[test]
    fn test_report_colors_wrap_message() {
        let mut reporter = Reporter::with_colors(Vec::new());
        let Ok(()) = reporter.report("", &Diagnostic::global("boom")) else {
            panic!("report failed");
        };
        let out = String::from_utf8_lossy(&reporter.into_writer()).into_owned();
        assert!(out.contains("\x1b[1;31m"));
        assert!(out.contains("\x1b[0m"));
    }
}
