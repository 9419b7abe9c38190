//! Validated declaration lists and the validator's output value.
//!
//! Insertion order is emission order: the code generator walks these lists
//! verbatim, so the ordering contract documented on [`ValidatedModule`] is
//! part of the binary ABI consumed by the audio runtime.

use crate::ir::IrStmt;
use crate::types::{Constant, Primitive};

/// One imported host function.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ImportDecl {
    /// External module name (`math`, `util`, ...).
    pub module: String,
    /// Exported base name within that module.
    pub name: String,
    pub params: Vec<Primitive>,
    pub ret: Primitive,
}

/// One module-level scalar global.
#[derive(Clone, PartialEq, Debug)]
pub struct GlobalDecl {
    pub name: String,
    pub ty: Primitive,
    pub mutable: bool,
    pub init: Constant,
    pub export: bool,
}

impl GlobalDecl {
    /// An exported immutable i32 global, the shape of every synthesized
    /// layout constant.
    pub fn constant_i32(name: impl Into<String>, value: u32) -> Self {
        GlobalDecl {
            name: name.into(),
            ty: Primitive::Int32,
            mutable: false,
            init: Constant::Int32(value as i32),
            export: true,
        }
    }
}

/// One user-declared function, fully lowered.
#[derive(Clone, PartialEq, Debug)]
pub struct FunctionDecl {
    pub name: String,
    pub params: Vec<Primitive>,
    pub ret: Primitive,
    /// Extra local slots beyond the parameters, in slot order.
    pub locals: Vec<Primitive>,
    pub body: Vec<IrStmt>,
    pub export: bool,
}

/// Runtime-facing metadata for one `param` declaration.
#[derive(Clone, PartialEq, Debug)]
pub struct ParamInfo {
    pub name: String,
    pub default_value: f32,
    pub min_value: f32,
    pub max_value: f32,
    /// True for array (a-rate) parameters, false for scalar (k-rate) ones.
    pub a_rate: bool,
    /// Offset of this parameter's info struct, relative to the static
    /// segment start.
    pub struct_offset: u32,
}

impl ParamInfo {
    pub fn rate_name(&self) -> &'static str {
        if self.a_rate {
            "a-rate"
        } else {
            "k-rate"
        }
    }
}

/// Everything the validator hands to the code generator.
///
/// The `globals` list already carries the fixed ordering contract:
/// channel-count/pointer globals, user scalars in source order, per-array
/// base offsets, then the static-segment layout globals.
#[derive(Clone, PartialEq, Debug)]
pub struct ValidatedModule {
    pub imports: Vec<ImportDecl>,
    pub globals: Vec<GlobalDecl>,
    pub functions: Vec<FunctionDecl>,
    /// The accumulated static data bytes (strings and param-info structs).
    pub static_data: Vec<u8>,
    /// Absolute byte offset where the static segment is placed, right
    /// after the last allocated array.
    pub static_data_offset: u32,
    pub params: Vec<ParamInfo>,
    /// Absolute offset of the first param-info struct; `None` when the
    /// module declares no parameters.
    pub param_info_offset: Option<u32>,
    /// The fixed per-loop iteration count and array length.
    pub sample_count: u32,
}
