//! Klang diagnostics.
//!
//! User-level compile errors are values, accumulated and returned — never
//! panics. This crate holds the external diagnostic shape
//! (`{range, message}` with 0-based positions), the closed [`ErrorKind`]
//! enum the validator produces, and a small plain-text [`Reporter`] for CLI
//! collaborators. Colorized terminal policy stays outside the core.

mod diagnostic;
mod errors;
mod reporter;

pub use diagnostic::{Diagnostic, Location, Range};
pub use errors::{ErrorKind, SemanticError};
pub use reporter::Reporter;
