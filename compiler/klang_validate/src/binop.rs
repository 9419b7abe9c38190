//! Binary operator resolution and constant folding.
//!
//! One table, two views: [`resolve`] maps a surface operator and its
//! operand types to a concrete opcode (the result type hangs off the
//! opcode), and [`fold`] evaluates that opcode over constants with the
//! exact runtime semantics: wrapping two's-complement for `int`,
//! IEEE-754 single precision for `float`.
//!
//! No combination outside the table is legal. In particular `/` is
//! float-only, `%` is int-only, and mixed `int`/`float` operands always
//! require an explicit cast.

use klang_ir::ast::BinaryOp;
use klang_ir::{BinOpKind, Constant, Primitive};

/// Resolve an operator over its operand types to a concrete opcode.
/// Returns `None` for combinations outside the table.
pub fn resolve(op: BinaryOp, lhs: Primitive, rhs: Primitive) -> Option<BinOpKind> {
    use Primitive::{Float32, Int32};
    let kind = match (op, lhs, rhs) {
        (BinaryOp::Add, Int32, Int32) => BinOpKind::Int32Add,
        (BinaryOp::Sub, Int32, Int32) => BinOpKind::Int32Sub,
        (BinaryOp::Mul, Int32, Int32) => BinOpKind::Int32Mul,
        (BinaryOp::Rem, Int32, Int32) => BinOpKind::Int32Rem,
        (BinaryOp::Lt, Int32, Int32) => BinOpKind::Int32Lt,
        (BinaryOp::Le, Int32, Int32) => BinOpKind::Int32Le,
        (BinaryOp::Gt, Int32, Int32) => BinOpKind::Int32Gt,
        (BinaryOp::Ge, Int32, Int32) => BinOpKind::Int32Ge,
        (BinaryOp::Eq, Int32, Int32) => BinOpKind::Int32Eq,
        (BinaryOp::Ne, Int32, Int32) => BinOpKind::Int32Ne,
        (BinaryOp::Add, Float32, Float32) => BinOpKind::Float32Add,
        (BinaryOp::Sub, Float32, Float32) => BinOpKind::Float32Sub,
        (BinaryOp::Mul, Float32, Float32) => BinOpKind::Float32Mul,
        (BinaryOp::Div, Float32, Float32) => BinOpKind::Float32Div,
        (BinaryOp::Lt, Float32, Float32) => BinOpKind::Float32Lt,
        (BinaryOp::Le, Float32, Float32) => BinOpKind::Float32Le,
        (BinaryOp::Gt, Float32, Float32) => BinOpKind::Float32Gt,
        (BinaryOp::Ge, Float32, Float32) => BinOpKind::Float32Ge,
        (BinaryOp::Eq, Float32, Float32) => BinOpKind::Float32Eq,
        (BinaryOp::Ne, Float32, Float32) => BinOpKind::Float32Ne,
        _ => return None,
    };
    Some(kind)
}

/// A folding failure over otherwise well-typed constants.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum FoldError {
    RemainderByZero,
}

/// Evaluate an opcode over two constants.
///
/// The operands must already match the opcode's types; [`resolve`]
/// guarantees that, so a mismatch here is a resolver bug.
pub fn fold(op: BinOpKind, lhs: Constant, rhs: Constant) -> Result<Constant, FoldError> {
    use Constant::{Bool, Float32, Int32};
    let value = match (op, lhs, rhs) {
        (BinOpKind::Int32Add, Int32(a), Int32(b)) => Int32(a.wrapping_add(b)),
        (BinOpKind::Int32Sub, Int32(a), Int32(b)) => Int32(a.wrapping_sub(b)),
        (BinOpKind::Int32Mul, Int32(a), Int32(b)) => Int32(a.wrapping_mul(b)),
        (BinOpKind::Int32Rem, Int32(_), Int32(0)) => return Err(FoldError::RemainderByZero),
        (BinOpKind::Int32Rem, Int32(a), Int32(b)) => Int32(a.wrapping_rem(b)),
        (BinOpKind::Int32Lt, Int32(a), Int32(b)) => Bool(a < b),
        (BinOpKind::Int32Le, Int32(a), Int32(b)) => Bool(a <= b),
        (BinOpKind::Int32Gt, Int32(a), Int32(b)) => Bool(a > b),
        (BinOpKind::Int32Ge, Int32(a), Int32(b)) => Bool(a >= b),
        (BinOpKind::Int32Eq, Int32(a), Int32(b)) => Bool(a == b),
        (BinOpKind::Int32Ne, Int32(a), Int32(b)) => Bool(a != b),
        (BinOpKind::Float32Add, Float32(a), Float32(b)) => Float32(a + b),
        (BinOpKind::Float32Sub, Float32(a), Float32(b)) => Float32(a - b),
        (BinOpKind::Float32Mul, Float32(a), Float32(b)) => Float32(a * b),
        (BinOpKind::Float32Div, Float32(a), Float32(b)) => Float32(a / b),
        (BinOpKind::Float32Lt, Float32(a), Float32(b)) => Bool(a < b),
        (BinOpKind::Float32Le, Float32(a), Float32(b)) => Bool(a <= b),
        (BinOpKind::Float32Gt, Float32(a), Float32(b)) => Bool(a > b),
        (BinOpKind::Float32Ge, Float32(a), Float32(b)) => Bool(a >= b),
        (BinOpKind::Float32Eq, Float32(a), Float32(b)) => Bool(a == b),
        (BinOpKind::Float32Ne, Float32(a), Float32(b)) => Bool(a != b),
        (op, lhs, rhs) => unreachable!("fold of {op:?} over {lhs:?} and {rhs:?}"),
    };
    Ok(value)
}
