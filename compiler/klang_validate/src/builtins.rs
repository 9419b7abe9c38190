//! The built-in module registry.
//!
//! A fixed catalog of host-provided function signatures and constants,
//! preloaded with the `builtin`, `math` and `util` modules before
//! validation. The registry itself is immutable once built and can be
//! shared read-only across concurrent compilations of different sources.

use klang_ir::{Constant, IntrinsicOp, Primitive};
use rustc_hash::FxHashMap;
use smallvec::{smallvec, SmallVec};

/// Compile-time evaluator for a foldable built-in. Returns `None` when the
/// arguments do not match the signature (an internal error, checked by the
/// caller beforehand).
pub type FoldFn = fn(&[Constant]) -> Option<Constant>;

/// Signature of one host-provided function.
#[derive(Clone, Debug)]
pub struct BuiltinFn {
    pub params: SmallVec<[Primitive; 2]>,
    pub ret: Primitive,
    /// When set, calls lower to an inline instruction instead of an import.
    pub intrinsic: Option<IntrinsicOp>,
    /// When set, the function is whitelisted for compile-time evaluation.
    pub fold: Option<FoldFn>,
}

impl BuiltinFn {
    fn import(params: SmallVec<[Primitive; 2]>, ret: Primitive) -> Self {
        BuiltinFn {
            params,
            ret,
            intrinsic: None,
            fold: None,
        }
    }

    fn foldable(params: SmallVec<[Primitive; 2]>, ret: Primitive, fold: FoldFn) -> Self {
        BuiltinFn {
            params,
            ret,
            intrinsic: None,
            fold: Some(fold),
        }
    }
}

/// One exported name of a built-in module.
#[derive(Clone, Debug)]
pub enum HostExport {
    Function(BuiltinFn),
    Constant(Constant),
}

/// The exports of one built-in module, in declaration order.
#[derive(Clone, Debug, Default)]
pub struct ModuleHeader {
    exports: Vec<(String, HostExport)>,
}

impl ModuleHeader {
    pub fn new() -> Self {
        ModuleHeader::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, export: HostExport) {
        self.exports.push((name.into(), export));
    }

    pub fn export(&self, name: &str) -> Option<&HostExport> {
        self.exports
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, e)| e)
    }

    pub fn exports(&self) -> impl Iterator<Item = (&str, &HostExport)> {
        self.exports.iter().map(|(n, e)| (n.as_str(), e))
    }
}

/// The registry consulted during resolution.
#[derive(Clone, Debug, Default)]
pub struct ModuleRegistry {
    modules: FxHashMap<String, ModuleHeader>,
}

impl ModuleRegistry {
    /// An empty registry; useful for tests that build their own modules.
    pub fn new() -> Self {
        ModuleRegistry::default()
    }

    /// The standard registry: `builtin` casts, `math` intrinsics and `PI`,
    /// `util` logging.
    pub fn with_builtins() -> Self {
        let mut registry = ModuleRegistry::new();

        let mut builtin = ModuleHeader::new();
        builtin.insert(
            "int",
            HostExport::Function(BuiltinFn {
                params: smallvec![Primitive::Float32],
                ret: Primitive::Int32,
                intrinsic: Some(IntrinsicOp::TruncFloatToInt),
                fold: Some(fold_trunc),
            }),
        );
        builtin.insert(
            "float",
            HostExport::Function(BuiltinFn {
                params: smallvec![Primitive::Int32],
                ret: Primitive::Float32,
                intrinsic: Some(IntrinsicOp::ConvertIntToFloat),
                fold: Some(fold_convert),
            }),
        );
        registry.insert("builtin", builtin);

        let mut math = ModuleHeader::new();
        for (name, fold) in UNARY_MATH {
            math.insert(
                *name,
                HostExport::Function(BuiltinFn::foldable(
                    smallvec![Primitive::Float32],
                    Primitive::Float32,
                    *fold,
                )),
            );
        }
        math.insert(
            "pow",
            HostExport::Function(BuiltinFn::import(
                smallvec![Primitive::Float32, Primitive::Float32],
                Primitive::Float32,
            )),
        );
        math.insert(
            "PI",
            HostExport::Constant(Constant::Float32(std::f32::consts::PI)),
        );
        registry.insert("math", math);

        let mut util = ModuleHeader::new();
        for (name, param) in [
            ("log_i", Primitive::Int32),
            ("log_f", Primitive::Float32),
            ("log_b", Primitive::Bool),
            // The int is a pointer into the static string segment.
            ("log_s", Primitive::Int32),
        ] {
            util.insert(
                name,
                HostExport::Function(BuiltinFn::import(smallvec![param], Primitive::Void)),
            );
        }
        registry.insert("util", util);

        registry
    }

    pub fn insert(&mut self, name: impl Into<String>, header: ModuleHeader) {
        self.modules.insert(name.into(), header);
    }

    pub fn has(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&ModuleHeader> {
        self.modules.get(name)
    }
}

/// The unary float intrinsics of the `math` module, all foldable at
/// compile time.
static UNARY_MATH: &[(&str, FoldFn)] = &[
    ("sin", |args| fold_unary(args, f32::sin)),
    ("cos", |args| fold_unary(args, f32::cos)),
    ("tan", |args| fold_unary(args, f32::tan)),
    ("exp", |args| fold_unary(args, f32::exp)),
    ("log", |args| fold_unary(args, f32::ln)),
    ("sqrt", |args| fold_unary(args, f32::sqrt)),
];

fn fold_unary(args: &[Constant], f: fn(f32) -> f32) -> Option<Constant> {
    match args {
        [Constant::Float32(x)] => Some(Constant::Float32(f(*x))),
        _ => None,
    }
}

fn fold_trunc(args: &[Constant]) -> Option<Constant> {
    match args {
        [Constant::Float32(x)] => Some(Constant::Int32(*x as i32)),
        _ => None,
    }
}

fn fold_convert(args: &[Constant]) -> Option<Constant> {
    match args {
        [Constant::Int32(x)] => Some(Constant::Float32(*x as f32)),
        _ => None,
    }
}
