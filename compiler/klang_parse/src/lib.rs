//! Combinator parser for Klang.
//!
//! Turns source text into a span-annotated [`Module`]. The grammar is
//! built from the backtracking combinators in [`combinator`]; offsets are
//! threaded explicitly so there is no shared parser state of any kind.
//!
//! A failed parse is fatal (there is no AST to validate) and reports the
//! furthest offset reached together with what was expected there.

pub mod combinator;
mod error;
mod grammar;

use klang_ir::ast::{Import, Module};
use tracing::debug;

pub use error::ParseError;
pub use grammar::{expression, statement};

use combinator::skip_ws;

/// The built-in modules every Klang program implicitly imports. There is
/// no surface import syntax; the parser synthesizes these.
pub const IMPLICIT_IMPORTS: [&str; 3] = ["builtin", "math", "util"];

/// Parse a whole source file into a [`Module`].
pub fn parse(source: &str) -> Result<Module, ParseError> {
    let (statements, at, failure) = combinator::many0(source, 0, statement);
    if skip_ws(source, at) < source.len() {
        return Err(failure.into());
    }
    debug!(statements = statements.len(), "parsed module");
    Ok(Module {
        imports: IMPLICIT_IMPORTS
            .iter()
            .map(|m| Import::synthesized(*m))
            .collect(),
        statements,
    })
}

/// Parse a single statement, requiring the whole input to be consumed.
/// Exposed for tests and tooling.
pub fn parse_statement(source: &str) -> Result<klang_ir::ast::Stmt, ParseError> {
    let (stmt, at) = statement(source, 0)?;
    expect_end(source, at)?;
    Ok(stmt)
}

/// Parse a single expression, requiring the whole input to be consumed.
/// Exposed for tests and tooling.
pub fn parse_expression(source: &str) -> Result<klang_ir::ast::Expr, ParseError> {
    let (expr, at) = expression(source, 0)?;
    expect_end(source, at)?;
    Ok(expr)
}

fn expect_end(source: &str, at: usize) -> Result<(), ParseError> {
    let at = skip_ws(source, at);
    if at < source.len() {
        return Err(ParseError {
            offset: at,
            expected: vec!["end of input"],
        });
    }
    Ok(())
}
