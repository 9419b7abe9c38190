//! The Klang grammar, composed from the combinator library.

pub mod expr;
pub mod stmt;

pub use expr::expression;
pub use stmt::statement;
