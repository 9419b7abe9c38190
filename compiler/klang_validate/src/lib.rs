//! Semantic analysis for Klang.
//!
//! Takes the parsed [`Module`](klang_ir::ast::Module), resolves names
//! against scope chains and the built-in module registry, checks types,
//! folds compile-time constants, assigns the static memory layout, and
//! lowers everything to the typed IR consumed by the code generator.
//!
//! All user-level mistakes are accumulated as diagnostics; validation
//! never aborts early on them.

pub mod binop;
pub mod builtins;
pub mod data;
pub mod scope;
mod validator;

pub use validator::{validate, ValidateOptions, Validation};

#[cfg(test)]
mod tests;
