//! Typed intermediate representation.
//!
//! The validator lowers the surface AST into these nodes. Everything is
//! fully resolved: names became indices, generic binary operators became
//! concrete opcodes, arrays became byte offsets. The code generator maps
//! each node one-to-one onto WebAssembly instructions.

use crate::types::{Constant, Primitive};

/// A concrete, type-resolved binary opcode.
///
/// Produced by the operator resolution table; no generic `BinOp` survives
/// into the IR.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum BinOpKind {
    Int32Add,
    Int32Sub,
    Int32Mul,
    Int32Rem,
    Int32Lt,
    Int32Le,
    Int32Gt,
    Int32Ge,
    Int32Eq,
    Int32Ne,
    Float32Add,
    Float32Sub,
    Float32Mul,
    Float32Div,
    Float32Lt,
    Float32Le,
    Float32Gt,
    Float32Ge,
    Float32Eq,
    Float32Ne,
}

impl BinOpKind {
    /// The type this opcode leaves on the stack.
    pub fn result(self) -> Primitive {
        match self {
            BinOpKind::Int32Add
            | BinOpKind::Int32Sub
            | BinOpKind::Int32Mul
            | BinOpKind::Int32Rem => Primitive::Int32,
            BinOpKind::Float32Add
            | BinOpKind::Float32Sub
            | BinOpKind::Float32Mul
            | BinOpKind::Float32Div => Primitive::Float32,
            BinOpKind::Int32Lt
            | BinOpKind::Int32Le
            | BinOpKind::Int32Gt
            | BinOpKind::Int32Ge
            | BinOpKind::Int32Eq
            | BinOpKind::Int32Ne
            | BinOpKind::Float32Lt
            | BinOpKind::Float32Le
            | BinOpKind::Float32Gt
            | BinOpKind::Float32Ge
            | BinOpKind::Float32Eq
            | BinOpKind::Float32Ne => Primitive::Bool,
        }
    }
}

/// A built-in operation lowered inline rather than via an import.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum IntrinsicOp {
    /// `int(float)`: truncating float-to-int cast.
    TruncFloatToInt,
    /// `float(int)`: signed int-to-float conversion.
    ConvertIntToFloat,
}

impl IntrinsicOp {
    pub fn result(self) -> Primitive {
        match self {
            IntrinsicOp::TruncFloatToInt => Primitive::Int32,
            IntrinsicOp::ConvertIntToFloat => Primitive::Float32,
        }
    }
}

/// A reference to an array's storage: base byte offset plus element type.
/// Length checks happened during validation; none exist here.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct ArrayRef {
    pub offset: u32,
    pub elem: Primitive,
}

/// A fully resolved expression.
#[derive(Clone, PartialEq, Debug)]
pub enum IrExpr {
    Const(Constant),
    /// Address of a string in the static data segment, relative to the
    /// segment start. Lowered to an absolute `i32.const`.
    StaticString { offset: u32 },
    GlobalGet { name: String, ty: Primitive },
    LocalGet { index: u32, ty: Primitive },
    /// Load of one array element: `base_offset + index * elem_size`.
    ItemGet {
        array: ArrayRef,
        index: Box<IrExpr>,
    },
    /// Call of an imported host function, by import index.
    CallImport {
        index: u32,
        args: Vec<IrExpr>,
        ret: Primitive,
    },
    /// Call of a user-declared function, by declaration index.
    CallFunction {
        index: u32,
        args: Vec<IrExpr>,
        ret: Primitive,
    },
    /// Inline built-in (numeric cast).
    Intrinsic {
        op: IntrinsicOp,
        arg: Box<IrExpr>,
    },
    Binary {
        op: BinOpKind,
        lhs: Box<IrExpr>,
        rhs: Box<IrExpr>,
    },
    /// Ternary conditional; both branches are evaluated and `select`
    /// picks one.
    Select {
        cond: Box<IrExpr>,
        then: Box<IrExpr>,
        otherwise: Box<IrExpr>,
        ty: Primitive,
    },
}

impl IrExpr {
    /// The resolved type of this expression.
    pub fn ty(&self) -> Primitive {
        match self {
            IrExpr::Const(c) => c.ty(),
            IrExpr::StaticString { .. } => Primitive::Int32,
            IrExpr::GlobalGet { ty, .. } | IrExpr::LocalGet { ty, .. } => *ty,
            IrExpr::ItemGet { array, .. } => array.elem,
            IrExpr::CallImport { ret, .. } | IrExpr::CallFunction { ret, .. } => *ret,
            IrExpr::Intrinsic { op, .. } => op.result(),
            IrExpr::Binary { op, .. } => op.result(),
            IrExpr::Select { ty, .. } => *ty,
        }
    }
}

/// A fully resolved statement.
#[derive(Clone, PartialEq, Debug)]
pub enum IrStmt {
    LocalSet { index: u32, value: IrExpr },
    GlobalSet { name: String, value: IrExpr },
    /// Store of one array element.
    ItemSet {
        array: ArrayRef,
        index: IrExpr,
        value: IrExpr,
    },
    /// Call in statement position. The validator only admits void callees.
    Call(IrExpr),
    Loop(LoopStmt),
    Return(Option<IrExpr>),
}

/// The desugared form of `loop { ... }`.
///
/// The validator prepends `counter = 0; length = sample_count;` as plain
/// `LocalSet`s and appends the `counter + 1` increment to `body`; the
/// generator emits a backward branch taken while `counter < length`.
#[derive(Clone, PartialEq, Debug)]
pub struct LoopStmt {
    /// Local slot of the iteration counter (`i` inside the body).
    pub counter: u32,
    /// Local slot of the iteration bound (`length` inside the body).
    pub length: u32,
    pub body: Vec<IrStmt>,
}
