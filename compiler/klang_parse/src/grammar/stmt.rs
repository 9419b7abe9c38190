//! Statement grammar.
//!
//! Statements are tried in a fixed order and the first match wins; the
//! ordering is part of the language contract (a `loop` keyword must never
//! reach the expression rule, a plain declaration must be tried before
//! assignment, and so on).

use klang_ir::ast::{
    Assign, Expr, ExprKind, FunctionDecl, Ident, ParamDecl, ParamField, ParamSig, PrimitiveName,
    Stmt, StmtKind, TypeExpr, TypeExprKind, VariableDecl,
};
use klang_ir::Span;

use crate::combinator::{
    alt, comma_separated, ident, keyword, many0, opt, skip_ws, token, Failure, PResult,
};
use crate::grammar::expr::expression;

/// Parse one statement at the given offset.
pub fn statement(src: &str, at: usize) -> PResult<Stmt> {
    alt(
        src,
        at,
        &[
            comment,
            var_decl,
            param_decl,
            plain_decl,
            loop_stmt,
            return_stmt,
            assign_or_call,
        ],
    )
}

/// `// ...` to end of line. The newline is not part of the span.
fn comment(src: &str, at: usize) -> PResult<Stmt> {
    let at = skip_ws(src, at);
    let (open, at) = crate::combinator::tag(src, at, "//")?;
    let rest = &src[at..];
    let len = rest.find('\n').unwrap_or(rest.len());
    let end = at + len;
    let span = Span::new(open.start, end as u32);
    Ok((
        Stmt::new(StmtKind::Comment(rest[..len].to_string()), span),
        end,
    ))
}

/// A primitive type name, optionally suffixed `[]` for an array.
pub fn type_expr(src: &str, at: usize) -> PResult<TypeExpr> {
    let primitives: &[(&'static str, PrimitiveName)] = &[
        ("int", PrimitiveName::Int),
        ("float", PrimitiveName::Float),
        ("bool", PrimitiveName::Bool),
        ("void", PrimitiveName::Void),
    ];
    let mut failure: Option<Failure> = None;
    for &(word, name) in primitives {
        match keyword(src, at, word) {
            Ok((span, next)) => {
                if let Ok((_, after_open)) = token(src, next, "[") {
                    let (close, after_close) = token(src, after_open, "]")?;
                    return Ok((
                        TypeExpr {
                            kind: TypeExprKind::Array(name),
                            span: span.merge(close),
                        },
                        after_close,
                    ));
                }
                return Ok((
                    TypeExpr {
                        kind: TypeExprKind::Primitive(name),
                        span,
                    },
                    next,
                ));
            }
            Err(f) => {
                failure = Some(match failure {
                    Some(prev) => prev.merge(f),
                    None => f,
                });
            }
        }
    }
    Err(failure.unwrap_or_else(|| Failure::new(at, "type")))
}

fn identifier(src: &str, at: usize) -> PResult<Ident> {
    let ((name, span), at) = ident(src, at)?;
    Ok((Ident::new(name, span), at))
}

/// `var <type> <name> (= <expr>)? ;`
fn var_decl(src: &str, at: usize) -> PResult<Stmt> {
    let (open, at) = keyword(src, at, "var")?;
    let (ty, at) = type_expr(src, at)?;
    let (name, at) = identifier(src, at)?;
    let (init, at) = initializer(src, at)?;
    let (semi, at) = token(src, at, ";")?;
    Ok((
        Stmt::new(
            StmtKind::Variable(VariableDecl {
                ty,
                name,
                init,
                mutable: true,
            }),
            open.merge(semi),
        ),
        at,
    ))
}

fn initializer(src: &str, at: usize) -> PResult<Option<Expr>> {
    let Ok((_, after_eq)) = token(src, at, "=") else {
        return Ok((None, at));
    };
    let (value, at) = expression(src, after_eq)?;
    Ok((Some(value), at))
}

/// `param <type> <name> { <field> = <expr>; ... }`
fn param_decl(src: &str, at: usize) -> PResult<Stmt> {
    let (open, at) = keyword(src, at, "param")?;
    let (ty, at) = type_expr(src, at)?;
    let (name, at) = identifier(src, at)?;
    let (_, at) = token(src, at, "{")?;
    let (fields, at, trailing) = many0(src, at, param_field);
    let (close, at) = match token(src, at, "}") {
        Ok(ok) => ok,
        Err(f) => return Err(f.merge(trailing)),
    };
    Ok((
        Stmt::new(
            StmtKind::Param(ParamDecl { ty, name, fields }),
            open.merge(close),
        ),
        at,
    ))
}

fn param_field(src: &str, at: usize) -> PResult<ParamField> {
    let (name, at) = identifier(src, at)?;
    let (_, at) = token(src, at, "=")?;
    let (value, at) = expression(src, at)?;
    let (_, at) = token(src, at, ";")?;
    Ok((ParamField { name, value }, at))
}

/// `<type> <id>` followed by `;` (constant, zero-initialized), `= <expr> ;`
/// (constant with initializer), or `( <params> ) { <body> }` (function).
/// What follows the identifier disambiguates.
fn plain_decl(src: &str, at: usize) -> PResult<Stmt> {
    let (ty, at) = type_expr(src, at)?;
    let (name, at) = identifier(src, at)?;
    let start = ty.span;

    if let Ok((semi, after)) = token(src, at, ";") {
        return Ok((
            Stmt::new(
                StmtKind::Variable(VariableDecl {
                    ty,
                    name,
                    init: None,
                    mutable: false,
                }),
                start.merge(semi),
            ),
            after,
        ));
    }

    if let Ok((_, after_open)) = token(src, at, "(") {
        let (params, at) = comma_separated(src, after_open, param_sig)?;
        let (_, at) = token(src, at, ")")?;
        let (_, at) = token(src, at, "{")?;
        let (body, at, trailing) = many0(src, at, statement);
        let (close, at) = match token(src, at, "}") {
            Ok(ok) => ok,
            Err(f) => return Err(f.merge(trailing)),
        };
        return Ok((
            Stmt::new(
                StmtKind::Function(FunctionDecl {
                    return_type: ty,
                    name,
                    params,
                    body,
                }),
                start.merge(close),
            ),
            at,
        ));
    }

    let (_, at) = token(src, at, "=")?;
    let (value, at) = expression(src, at)?;
    let (semi, at) = token(src, at, ";")?;
    Ok((
        Stmt::new(
            StmtKind::Variable(VariableDecl {
                ty,
                name,
                init: Some(value),
                mutable: false,
            }),
            start.merge(semi),
        ),
        at,
    ))
}

fn param_sig(src: &str, at: usize) -> PResult<ParamSig> {
    let (ty, at) = type_expr(src, at)?;
    let (name, at) = identifier(src, at)?;
    Ok((ParamSig { ty, name }, at))
}

/// `loop { <body> }`
fn loop_stmt(src: &str, at: usize) -> PResult<Stmt> {
    let (open, at) = keyword(src, at, "loop")?;
    let (_, at) = token(src, at, "{")?;
    let (body, at, trailing) = many0(src, at, statement);
    let (close, at) = match token(src, at, "}") {
        Ok(ok) => ok,
        Err(f) => return Err(f.merge(trailing)),
    };
    Ok((Stmt::new(StmtKind::Loop(body), open.merge(close)), at))
}

/// `return (<expr>)? ;`
fn return_stmt(src: &str, at: usize) -> PResult<Stmt> {
    let (open, at) = keyword(src, at, "return")?;
    let (value, at) = opt(src, at, expression);
    let (semi, at) = token(src, at, ";")?;
    Ok((
        Stmt::new(StmtKind::Return(value), open.merge(semi)),
        at,
    ))
}

/// `<expr> (= <expr>)? ;` — an assignment, or a bare call statement.
fn assign_or_call(src: &str, at: usize) -> PResult<Stmt> {
    let (target, at) = expression(src, at)?;
    if let Ok((_, after_eq)) = token(src, at, "=") {
        let (value, at) = expression(src, after_eq)?;
        let (semi, at) = token(src, at, ";")?;
        let span = target.span.merge(semi);
        return Ok((
            Stmt::new(StmtKind::Assign(Assign { target, value }), span),
            at,
        ));
    }
    if !matches!(target.kind, ExprKind::Call { .. }) {
        return Err(Failure::new(skip_ws(src, at), "="));
    }
    let (semi, at) = token(src, at, ";")?;
    let span = target.span.merge(semi);
    Ok((Stmt::new(StmtKind::Call(target), span), at))
}
