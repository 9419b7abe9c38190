//! Klang IR - shared data model of the compiler pipeline.
//!
//! This crate contains the types every stage agrees on:
//! - [`Span`]/[`Position`] for source locations
//! - the surface AST ([`ast`]) produced by the parser
//! - resolved types and constants ([`types`])
//! - the typed IR ([`ir`]) produced by the validator
//! - declaration lists and the validated-module value ([`decl`])
//!
//! The AST is an owned tree rooted at [`ast::Module`]; it lives for one
//! parse-and-validate pass. The IR and declaration lists live for one
//! compile-and-emit cycle, owned by the [`ValidatedModule`] returned to the
//! caller. Nothing here is shared between compilations.

pub mod ast;
mod decl;
mod ir;
mod span;
mod types;

pub use decl::{FunctionDecl, GlobalDecl, ImportDecl, ParamInfo, ValidatedModule};
pub use ir::{ArrayRef, BinOpKind, IntrinsicOp, IrExpr, IrStmt, LoopStmt};
pub use span::{Position, Span};
pub use types::{ArrayType, Constant, FunctionType, Primitive, StructField, StructType, Type};
