//! Expression grammar.
//!
//! Precedence, low to high: ternary conditional (right-associative),
//! comparison, additive, multiplicative, postfix chain (index/call),
//! primary. Same-precedence binary operators chain left-associatively.

use klang_ir::ast::{BinaryOp, Expr, ExprKind};

use crate::combinator::{
    alt, comma_separated, float, ident, integer, string_literal, token, PResult,
};

/// Parse one expression at the given offset.
pub fn expression(src: &str, at: usize) -> PResult<Expr> {
    conditional(src, at)
}

/// `cond ? a : b`, greedy right recursion on both branches.
fn conditional(src: &str, at: usize) -> PResult<Expr> {
    let (cond, at) = comparison(src, at)?;
    let Ok((_, after_q)) = token(src, at, "?") else {
        return Ok((cond, at));
    };
    let (then, at) = conditional(src, after_q)?;
    let (_, at) = token(src, at, ":")?;
    let (otherwise, at) = conditional(src, at)?;
    let span = cond.span.merge(otherwise.span);
    Ok((
        Expr::new(
            ExprKind::Cond {
                cond: Box::new(cond),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            },
            span,
        ),
        at,
    ))
}

/// Left-associative chain of same-precedence binary operators.
///
/// Multi-character operators are listed before their prefixes so `<=`
/// never half-matches as `<`.
fn binary_chain(
    src: &str,
    at: usize,
    next: fn(&str, usize) -> PResult<Expr>,
    ops: &[(&'static str, BinaryOp)],
) -> PResult<Expr> {
    let (mut lhs, mut at) = next(src, at)?;
    'chain: loop {
        for &(symbol, op) in ops {
            let Ok((_, after_op)) = token(src, at, symbol) else {
                continue;
            };
            let (rhs, after_rhs) = next(src, after_op)?;
            let span = lhs.span.merge(rhs.span);
            lhs = Expr::new(
                ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                span,
            );
            at = after_rhs;
            continue 'chain;
        }
        return Ok((lhs, at));
    }
}

fn comparison(src: &str, at: usize) -> PResult<Expr> {
    binary_chain(
        src,
        at,
        additive,
        &[
            ("<=", BinaryOp::Le),
            (">=", BinaryOp::Ge),
            ("==", BinaryOp::Eq),
            ("!=", BinaryOp::Ne),
            ("<", BinaryOp::Lt),
            (">", BinaryOp::Gt),
        ],
    )
}

fn additive(src: &str, at: usize) -> PResult<Expr> {
    binary_chain(
        src,
        at,
        multiplicative,
        &[("+", BinaryOp::Add), ("-", BinaryOp::Sub)],
    )
}

fn multiplicative(src: &str, at: usize) -> PResult<Expr> {
    binary_chain(
        src,
        at,
        postfix,
        &[
            ("*", BinaryOp::Mul),
            ("/", BinaryOp::Div),
            ("%", BinaryOp::Rem),
        ],
    )
}

/// Postfix chain: array index and call, left to right, freely mixed
/// (`f()[0]`, `a[i](x)`).
fn postfix(src: &str, at: usize) -> PResult<Expr> {
    let (mut expr, mut at) = primary(src, at)?;
    loop {
        if let Ok((_, after)) = token(src, at, "[") {
            let (index, after_index) = expression(src, after)?;
            let (bracket, after_bracket) = token(src, after_index, "]")?;
            let span = expr.span.merge(bracket);
            expr = Expr::new(
                ExprKind::Index {
                    base: Box::new(expr),
                    index: Box::new(index),
                },
                span,
            );
            at = after_bracket;
            continue;
        }
        if let Ok((_, after)) = token(src, at, "(") {
            let (args, after_args) = comma_separated(src, after, expression)?;
            let (paren, after_paren) = token(src, after_args, ")")?;
            let span = expr.span.merge(paren);
            expr = Expr::new(
                ExprKind::Call {
                    callee: Box::new(expr),
                    args,
                },
                span,
            );
            at = after_paren;
            continue;
        }
        return Ok((expr, at));
    }
}

fn primary(src: &str, at: usize) -> PResult<Expr> {
    alt(
        src,
        at,
        &[
            paren_expr,
            float_literal,
            int_literal,
            str_literal,
            array_literal,
            ident_expr,
        ],
    )
}

fn paren_expr(src: &str, at: usize) -> PResult<Expr> {
    let (open, at) = token(src, at, "(")?;
    let (inner, at) = expression(src, at)?;
    let (close, at) = token(src, at, ")")?;
    // The node keeps its own kind but widens to cover the parentheses.
    Ok((Expr::new(inner.kind, open.merge(close)), at))
}

fn float_literal(src: &str, at: usize) -> PResult<Expr> {
    let ((value, span), at) = float(src, at)?;
    Ok((Expr::new(ExprKind::Float(value), span), at))
}

fn int_literal(src: &str, at: usize) -> PResult<Expr> {
    let ((value, span), at) = integer(src, at)?;
    Ok((Expr::new(ExprKind::Int(value), span), at))
}

fn str_literal(src: &str, at: usize) -> PResult<Expr> {
    let ((value, span), at) = string_literal(src, at)?;
    Ok((Expr::new(ExprKind::Str(value), span), at))
}

/// `[ a, b, ... ]`. Accepted by the grammar, rejected by the validator.
fn array_literal(src: &str, at: usize) -> PResult<Expr> {
    let (open, at) = token(src, at, "[")?;
    let (items, at) = comma_separated(src, at, expression)?;
    let (close, at) = token(src, at, "]")?;
    Ok((Expr::new(ExprKind::Array(items), open.merge(close)), at))
}

fn ident_expr(src: &str, at: usize) -> PResult<Expr> {
    let ((name, span), at) = ident(src, at)?;
    Ok((Expr::new(ExprKind::Ident(name), span), at))
}
