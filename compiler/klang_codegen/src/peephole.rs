//! Small IR simplifications applied right before encoding.
//!
//! Three rules: arithmetic identities on `int` (`x + 0`, `x * 1`),
//! selects with a constant condition, and numeric casts of constants.
//! Float identities are left alone (NaN and signed-zero behavior), and a
//! select is only collapsed when the dropped branch performs no calls.

use klang_ir::{BinOpKind, Constant, IntrinsicOp, IrExpr, IrStmt, LoopStmt};

pub fn stmt(s: &IrStmt) -> IrStmt {
    match s {
        IrStmt::LocalSet { index, value } => IrStmt::LocalSet {
            index: *index,
            value: expr(value),
        },
        IrStmt::GlobalSet { name, value } => IrStmt::GlobalSet {
            name: name.clone(),
            value: expr(value),
        },
        IrStmt::ItemSet {
            array,
            index,
            value,
        } => IrStmt::ItemSet {
            array: *array,
            index: expr(index),
            value: expr(value),
        },
        IrStmt::Call(call) => IrStmt::Call(expr(call)),
        IrStmt::Loop(inner) => IrStmt::Loop(LoopStmt {
            counter: inner.counter,
            length: inner.length,
            body: inner.body.iter().map(stmt).collect(),
        }),
        IrStmt::Return(value) => IrStmt::Return(value.as_ref().map(expr)),
    }
}

pub fn expr(e: &IrExpr) -> IrExpr {
    match e {
        IrExpr::Binary { op, lhs, rhs } => {
            let lhs = expr(lhs);
            let rhs = expr(rhs);
            match (*op, &lhs, &rhs) {
                (BinOpKind::Int32Add, IrExpr::Const(Constant::Int32(0)), other)
                | (BinOpKind::Int32Add, other, IrExpr::Const(Constant::Int32(0)))
                | (BinOpKind::Int32Mul, IrExpr::Const(Constant::Int32(1)), other)
                | (BinOpKind::Int32Mul, other, IrExpr::Const(Constant::Int32(1))) => {
                    other.clone()
                }
                _ => IrExpr::Binary {
                    op: *op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
            }
        }
        IrExpr::Select {
            cond,
            then,
            otherwise,
            ty,
        } => {
            let cond = expr(cond);
            let then = expr(then);
            let otherwise = expr(otherwise);
            if let IrExpr::Const(Constant::Bool(flag)) = cond {
                let (taken, dropped) = if flag {
                    (&then, &otherwise)
                } else {
                    (&otherwise, &then)
                };
                if !has_call(dropped) {
                    return taken.clone();
                }
            }
            IrExpr::Select {
                cond: Box::new(cond),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
                ty: *ty,
            }
        }
        IrExpr::Intrinsic { op, arg } => {
            let arg = expr(arg);
            match (*op, &arg) {
                (IntrinsicOp::TruncFloatToInt, IrExpr::Const(Constant::Float32(v))) => {
                    IrExpr::Const(Constant::Int32(*v as i32))
                }
                (IntrinsicOp::ConvertIntToFloat, IrExpr::Const(Constant::Int32(v))) => {
                    IrExpr::Const(Constant::Float32(*v as f32))
                }
                _ => IrExpr::Intrinsic {
                    op: *op,
                    arg: Box::new(arg),
                },
            }
        }
        IrExpr::ItemGet { array, index } => IrExpr::ItemGet {
            array: *array,
            index: Box::new(expr(index)),
        },
        IrExpr::CallImport { index, args, ret } => IrExpr::CallImport {
            index: *index,
            args: args.iter().map(expr).collect(),
            ret: *ret,
        },
        IrExpr::CallFunction { index, args, ret } => IrExpr::CallFunction {
            index: *index,
            args: args.iter().map(expr).collect(),
            ret: *ret,
        },
        leaf => leaf.clone(),
    }
}

fn has_call(e: &IrExpr) -> bool {
    match e {
        IrExpr::CallImport { .. } | IrExpr::CallFunction { .. } => true,
        IrExpr::Binary { lhs, rhs, .. } => has_call(lhs) || has_call(rhs),
        IrExpr::Select {
            cond,
            then,
            otherwise,
            ..
        } => has_call(cond) || has_call(then) || has_call(otherwise),
        IrExpr::ItemGet { index, .. } => has_call(index),
        IrExpr::Intrinsic { arg, .. } => has_call(arg),
        IrExpr::Const(_)
        | IrExpr::StaticString { .. }
        | IrExpr::GlobalGet { .. }
        | IrExpr::LocalGet { .. } => false,
    }
}
