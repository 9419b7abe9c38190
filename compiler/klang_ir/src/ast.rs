//! Surface syntax tree.
//!
//! The parser produces one [`Module`] per source text. Every node carries
//! the byte span it was parsed from; the validator consumes the tree
//! read-only and drops it after lowering to the typed IR.

use std::fmt;

use crate::span::Span;

/// A parsed source file: the implicit import list plus the top-level
/// statements in source order.
#[derive(Clone, PartialEq, Debug)]
pub struct Module {
    pub imports: Vec<Import>,
    pub statements: Vec<Stmt>,
}

/// An imported built-in module.
///
/// Klang has no surface import syntax; the parser synthesizes the fixed
/// registry imports, so the span is `None` for all of them today.
#[derive(Clone, PartialEq, Debug)]
pub struct Import {
    pub module: String,
    pub span: Option<Span>,
}

impl Import {
    pub fn synthesized(module: impl Into<String>) -> Self {
        Import {
            module: module.into(),
            span: None,
        }
    }
}

/// An identifier with its source span.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

impl Ident {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Ident {
            name: name.into(),
            span,
        }
    }
}

/// A primitive type name as written in source.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum PrimitiveName {
    Int,
    Float,
    Bool,
    Void,
}

impl fmt::Display for PrimitiveName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PrimitiveName::Int => "int",
            PrimitiveName::Float => "float",
            PrimitiveName::Bool => "bool",
            PrimitiveName::Void => "void",
        };
        f.write_str(name)
    }
}

/// A type expression as written in source: a primitive, or a fixed-length
/// array of a primitive (`float[]`, length supplied by the module's sample
/// count).
#[derive(Clone, PartialEq, Debug)]
pub struct TypeExpr {
    pub kind: TypeExprKind,
    pub span: Span,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum TypeExprKind {
    Primitive(PrimitiveName),
    Array(PrimitiveName),
}

impl fmt::Display for TypeExprKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExprKind::Primitive(p) => write!(f, "{p}"),
            TypeExprKind::Array(p) => write!(f, "{p}[]"),
        }
    }
}

/// Binary operator symbols as they appear in source.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Expression node.
#[derive(Clone, PartialEq, Debug)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Expr { kind, span }
    }
}

#[derive(Clone, PartialEq, Debug)]
pub enum ExprKind {
    /// Integer literal (`-?(0|[1-9][0-9]*)`).
    Int(i32),
    /// Float literal; requires a decimal point with at least one digit.
    Float(f32),
    /// String literal with escapes already resolved.
    Str(String),
    /// Array literal. Parsed but rejected by the validator.
    Array(Vec<Expr>),
    /// Identifier reference.
    Ident(String),
    /// Array element access `base[index]`.
    Index { base: Box<Expr>, index: Box<Expr> },
    /// Function call `callee(args...)`.
    Call { callee: Box<Expr>, args: Vec<Expr> },
    /// Binary operation. Resolved to a concrete opcode during validation.
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// Ternary conditional `cond ? a : b`, right-associative.
    Cond {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
}

/// Statement node.
#[derive(Clone, PartialEq, Debug)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

impl Stmt {
    pub fn new(kind: StmtKind, span: Span) -> Self {
        Stmt { kind, span }
    }
}

#[derive(Clone, PartialEq, Debug)]
pub enum StmtKind {
    Variable(VariableDecl),
    Function(FunctionDecl),
    Param(ParamDecl),
    Assign(Assign),
    /// A function call in statement position. The parser only accepts call
    /// expressions here; anything else is a syntax error.
    Call(Expr),
    Loop(Vec<Stmt>),
    Return(Option<Expr>),
    /// `// ...` line comment. Kept in the tree, skipped by the validator.
    Comment(String),
}

/// `var <type> <name> (= <expr>)? ;` when `mutable`, or the immutable
/// `<type> <name> (= <expr>)? ;` form.
#[derive(Clone, PartialEq, Debug)]
pub struct VariableDecl {
    pub ty: TypeExpr,
    pub name: Ident,
    pub init: Option<Expr>,
    pub mutable: bool,
}

/// `<type> <name> ( <params> ) { <body> }`.
#[derive(Clone, PartialEq, Debug)]
pub struct FunctionDecl {
    pub return_type: TypeExpr,
    pub name: Ident,
    pub params: Vec<ParamSig>,
    pub body: Vec<Stmt>,
}

/// One formal parameter in a function declaration.
#[derive(Clone, PartialEq, Debug)]
pub struct ParamSig {
    pub ty: TypeExpr,
    pub name: Ident,
}

/// `param <type> <name> { <field> = <expr>; ... }`.
#[derive(Clone, PartialEq, Debug)]
pub struct ParamDecl {
    pub ty: TypeExpr,
    pub name: Ident,
    pub fields: Vec<ParamField>,
}

/// One `name = value;` entry in a `param` block.
#[derive(Clone, PartialEq, Debug)]
pub struct ParamField {
    pub name: Ident,
    pub value: Expr,
}

/// `<target> = <value> ;` where the target is an identifier or an array
/// element.
#[derive(Clone, PartialEq, Debug)]
pub struct Assign {
    pub target: Expr,
    pub value: Expr,
}
