//! The validator: resolves names, checks types, folds constants, assigns
//! static layout, and lowers the AST to typed IR.
//!
//! User-level mistakes never abort validation; every semantic error is
//! accumulated and the walk continues on a best-effort basis so one bad
//! expression does not hide the rest of the module's problems. Internal
//! invariant violations are fatal assertions instead — they mean the
//! resolver itself is broken.

mod consts;
mod expr;
mod stmt;

use klang_diagnostic::{ErrorKind, SemanticError};
use klang_ir::ast::{self, Module, PrimitiveName, StmtKind};
use klang_ir::{
    ArrayType, Constant, FunctionType, GlobalDecl, ImportDecl, ParamInfo, Primitive, Span, Type,
    ValidatedModule,
};
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::builtins::{HostExport, ModuleRegistry};
use crate::data::DataBuilder;
use crate::scope::{Binding, ImportName, ImportTable, ScopeArena, ScopeId};

/// Compilation knobs that shape the synthesized module layout.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct ValidateOptions {
    /// Array length and fixed loop iteration count.
    pub sample_count: u32,
    pub in_channels: u32,
    pub out_channels: u32,
}

impl Default for ValidateOptions {
    fn default() -> Self {
        ValidateOptions {
            sample_count: 128,
            in_channels: 2,
            out_channels: 2,
        }
    }
}

/// The validator's output: the lowered module plus every semantic error
/// found along the way. The module is only meaningful when `errors` is
/// empty.
#[derive(Clone, Debug)]
pub struct Validation {
    pub module: ValidatedModule,
    pub errors: Vec<SemanticError>,
}

/// Validate a parsed module against the built-in registry.
pub fn validate(
    module: &Module,
    registry: &ModuleRegistry,
    options: &ValidateOptions,
) -> Validation {
    Validator::new(registry, options).run(module)
}

/// A name resolved through the scope chain or the import table. Owned so
/// callers can keep mutating the validator while holding one.
pub(crate) enum Resolved {
    Binding(Binding),
    Import {
        module: String,
        name: String,
        export: HostExport,
    },
    Ambiguous(Vec<String>),
    NotFound,
}

pub(crate) struct Validator<'a> {
    registry: &'a ModuleRegistry,
    pub(crate) options: &'a ValidateOptions,
    pub(crate) scopes: ScopeArena,
    imports_table: ImportTable,
    pub(crate) errors: Vec<SemanticError>,
    pub(crate) data: DataBuilder,
    /// User scalar globals, in source order.
    globals: Vec<GlobalDecl>,
    /// User and parameter arrays, in allocation order. Each contributes
    /// an exported base-offset constant after the user globals.
    arrays: Vec<(String, ArrayType)>,
    functions: Vec<klang_ir::FunctionDecl>,
    pub(crate) imports: Vec<ImportDecl>,
    import_indices: FxHashMap<(String, String), u32>,
    params: Vec<ParamInfo>,
    /// Linear-memory allocation watermark; arrays first, static data last.
    next_offset: u32,
}

impl<'a> Validator<'a> {
    fn new(registry: &'a ModuleRegistry, options: &'a ValidateOptions) -> Self {
        Validator {
            registry,
            options,
            scopes: ScopeArena::new(),
            imports_table: ImportTable::new(),
            errors: Vec::new(),
            data: DataBuilder::new(),
            globals: Vec::new(),
            arrays: Vec::new(),
            functions: Vec::new(),
            imports: Vec::new(),
            import_indices: FxHashMap::default(),
            params: Vec::new(),
            next_offset: 0,
        }
    }

    fn run(mut self, module: &Module) -> Validation {
        for import in &module.imports {
            match self.registry.get(&import.module) {
                Some(header) => self.imports_table.add_module(&import.module, header),
                None => self.errors.push(SemanticError::unpositioned(
                    ErrorKind::ImportedModuleNotFound {
                        module: import.module.clone(),
                    },
                )),
            }
        }

        let mut globals = Vec::new();
        self.channel_arrays(
            &mut globals,
            "in",
            self.options.in_channels,
            "number_of_in_channels",
            "pointer_of_in_channels",
        );
        self.channel_arrays(
            &mut globals,
            "out",
            self.options.out_channels,
            "number_of_out_channels",
            "pointer_of_out_channels",
        );

        for stmt in &module.statements {
            self.global_stmt(stmt);
        }

        // User scalars in source order, then every declared array's
        // exported base offset.
        globals.append(&mut self.globals);
        for (name, array) in &self.arrays {
            globals.push(GlobalDecl::constant_i32(name.clone(), array.offset));
        }

        // The static segment lands right after the last allocated array.
        let static_data_offset = self.next_offset;
        let param_info_offset = self
            .params
            .first()
            .map(|p| static_data_offset + p.struct_offset);
        globals.push(GlobalDecl::constant_i32(
            "pointer_of_static_data",
            static_data_offset,
        ));
        globals.push(GlobalDecl::constant_i32(
            "number_of_params",
            self.params.len() as u32,
        ));
        if let Some(offset) = param_info_offset {
            globals.push(GlobalDecl::constant_i32("offset_of_param_info", offset));
        }
        globals.push(GlobalDecl::constant_i32("size_of_static_data", self.data.len()));

        debug!(
            globals = globals.len(),
            functions = self.functions.len(),
            imports = self.imports.len(),
            params = self.params.len(),
            errors = self.errors.len(),
            "validated module"
        );

        Validation {
            module: ValidatedModule {
                imports: self.imports,
                globals,
                functions: self.functions,
                static_data: self.data.into_bytes(),
                static_data_offset,
                params: self.params,
                param_info_offset,
                sample_count: self.options.sample_count,
            },
            errors: self.errors,
        }
    }

    /// Synthesize one channel trio: the channel-count constant, the
    /// per-channel arrays, and the pointer to the first array. Nothing is
    /// emitted for a zero channel count.
    fn channel_arrays(
        &mut self,
        globals: &mut Vec<GlobalDecl>,
        prefix: &str,
        count: u32,
        count_name: &str,
        pointer_name: &str,
    ) {
        if count == 0 {
            return;
        }
        globals.push(GlobalDecl::constant_i32(count_name, count));
        let first = self.next_offset;
        for k in 0..count {
            let name = format!("{prefix}_{k}");
            let array = self.alloc_array(Primitive::Float32, self.options.sample_count);
            // Synthesized first, so these can never conflict.
            let _ = self
                .scopes
                .declare(self.scopes.global(), &name, Binding::Array(array));
            globals.push(GlobalDecl::constant_i32(name, array.offset));
        }
        globals.push(GlobalDecl::constant_i32(pointer_name, first));
    }

    fn global_stmt(&mut self, stmt: &ast::Stmt) {
        match &stmt.kind {
            StmtKind::Comment(_) => {}
            StmtKind::Variable(decl) => self.global_variable(decl),
            StmtKind::Function(decl) => self.function(decl),
            StmtKind::Param(decl) => self.param(decl, stmt.span),
            StmtKind::Assign(_) => self.err(
                ErrorKind::StatementNotAllowedAtGlobal { what: "assignment" },
                stmt.span,
            ),
            StmtKind::Call(_) => self.err(
                ErrorKind::StatementNotAllowedAtGlobal {
                    what: "a function call",
                },
                stmt.span,
            ),
            StmtKind::Loop(_) => self.err(
                ErrorKind::StatementNotAllowedAtGlobal { what: "a loop" },
                stmt.span,
            ),
            StmtKind::Return(_) => self.err(
                ErrorKind::StatementNotAllowedAtGlobal { what: "`return`" },
                stmt.span,
            ),
        }
    }

    fn global_variable(&mut self, decl: &ast::VariableDecl) {
        match decl.ty.kind {
            ast::TypeExprKind::Array(elem) => self.global_array(decl, elem),
            ast::TypeExprKind::Primitive(PrimitiveName::Void) => self.err(
                ErrorKind::VoidVariable {
                    name: decl.name.name.clone(),
                },
                decl.name.span,
            ),
            ast::TypeExprKind::Primitive(name) => self.global_scalar(decl, primitive(name)),
        }
    }

    fn global_array(&mut self, decl: &ast::VariableDecl, elem: PrimitiveName) {
        if elem == PrimitiveName::Void {
            self.err(
                ErrorKind::VoidVariable {
                    name: decl.name.name.clone(),
                },
                decl.name.span,
            );
            return;
        }
        if let Some(init) = &decl.init {
            self.err(ErrorKind::ArrayInitializer, init.span);
        }
        if decl.mutable {
            self.err(ErrorKind::MutableArray, decl.ty.span);
        }
        let array = self.alloc_array(primitive(elem), self.options.sample_count);
        self.declare(&decl.name, Binding::Array(array));
        self.arrays.push((decl.name.name.clone(), array));
    }

    fn global_scalar(&mut self, decl: &ast::VariableDecl, ty: Primitive) {
        let init = match &decl.init {
            Some(expr) => self.eval_const(expr).map(|value| {
                if value.ty() == ty {
                    value
                } else {
                    self.err(
                        ErrorKind::TypeMismatch {
                            expected: Type::Primitive(ty),
                            actual: Type::Primitive(value.ty()),
                        },
                        expr.span,
                    );
                    zero(ty)
                }
            }),
            None => None,
        }
        .unwrap_or_else(|| zero(ty));

        self.declare(
            &decl.name,
            Binding::Global {
                ty,
                mutable: decl.mutable,
                value: (!decl.mutable).then_some(init),
            },
        );
        self.globals.push(GlobalDecl {
            name: decl.name.name.clone(),
            ty,
            mutable: decl.mutable,
            init,
            export: true,
        });
    }

    fn param(&mut self, decl: &ast::ParamDecl, span: Span) {
        let (elem_name, a_rate) = match decl.ty.kind {
            ast::TypeExprKind::Primitive(p) => (p, false),
            ast::TypeExprKind::Array(p) => (p, true),
        };
        if !matches!(elem_name, PrimitiveName::Int | PrimitiveName::Float) {
            self.err(
                ErrorKind::ParamTypeInvalid {
                    ty: decl.ty.kind.to_string(),
                },
                decl.ty.span,
            );
            return;
        }
        let elem = primitive(elem_name);

        let mut values: [Option<Constant>; 3] = [None, None, None];
        let mut seen = [false; 3];
        for field in &decl.fields {
            let Some(slot) = PARAM_FIELDS
                .iter()
                .position(|n| *n == field.name.name.as_str())
            else {
                self.err(
                    ErrorKind::ParamUnknownField {
                        name: field.name.name.clone(),
                    },
                    field.name.span,
                );
                continue;
            };
            seen[slot] = true;
            let Some(value) = self.eval_const(&field.value) else {
                continue;
            };
            if value.ty() != elem {
                self.err(
                    ErrorKind::ParamFieldType {
                        name: field.name.name.clone(),
                        expected: Type::Primitive(elem),
                        actual: Type::Primitive(value.ty()),
                    },
                    field.value.span,
                );
                continue;
            }
            values[slot] = Some(value);
        }
        let missing: Vec<String> = PARAM_FIELDS
            .iter()
            .zip(seen)
            .filter(|(_, seen)| !seen)
            .map(|(name, _)| (*name).to_string())
            .collect();
        if !missing.is_empty() {
            self.err(ErrorKind::ParamMissingFields { names: missing }, span);
        }

        let length = if a_rate { self.options.sample_count } else { 1 };
        let array = self.alloc_array(elem, length);
        let binding = if a_rate {
            Binding::Array(array)
        } else {
            Binding::ParamCell(array)
        };
        self.declare(&decl.name, binding);
        self.arrays.push((decl.name.name.clone(), array));

        let name_offset = self.data.string(&decl.name.name);
        let rate = if a_rate { "a-rate" } else { "k-rate" };
        let rate_offset = self.data.string(rate);
        let [default_value, min_value, max_value] =
            values.map(|v| v.map_or(0.0, constant_as_f32));
        let struct_offset =
            self.data
                .param_info(name_offset, default_value, min_value, max_value, rate_offset);
        self.params.push(ParamInfo {
            name: decl.name.name.clone(),
            default_value,
            min_value,
            max_value,
            a_rate,
            struct_offset,
        });
    }

    // Shared helpers

    pub(crate) fn err(&mut self, kind: ErrorKind, span: Span) {
        self.errors.push(SemanticError::new(kind, span));
    }

    /// Declare at global scope, reporting a conflict against the name's
    /// span.
    fn declare(&mut self, name: &ast::Ident, binding: Binding) {
        self.declare_in(self.scopes.global(), name, binding);
    }

    pub(crate) fn declare_in(&mut self, scope: ScopeId, name: &ast::Ident, binding: Binding) {
        if self.scopes.declare(scope, &name.name, binding).is_err() {
            self.err(
                ErrorKind::AlreadyDeclared {
                    name: name.name.clone(),
                },
                name.span,
            );
        }
    }

    fn alloc_array(&mut self, elem: Primitive, length: u32) -> ArrayType {
        let array = ArrayType {
            elem,
            length,
            offset: self.next_offset,
        };
        self.next_offset += array.byte_size();
        array
    }

    /// Resolve a name: scope chain first, then the import table.
    pub(crate) fn lookup(&self, scope: ScopeId, name: &str) -> Resolved {
        if let Some(binding) = self.scopes.resolve(scope, name) {
            return Resolved::Binding(binding.clone());
        }
        match self.imports_table.resolve(name) {
            Some(ImportName::Unique { module, name }) => {
                let Some(export) = self.registry.get(module).and_then(|h| h.export(name)) else {
                    unreachable!("import table references unknown export {module}.{name}");
                };
                Resolved::Import {
                    module: module.clone(),
                    name: name.clone(),
                    export: export.clone(),
                }
            }
            Some(ImportName::Ambiguous { modules }) => Resolved::Ambiguous(modules.clone()),
            None => Resolved::NotFound,
        }
    }

    /// The import index for a referenced built-in, assigned on first use.
    pub(crate) fn import_index(
        &mut self,
        module: &str,
        name: &str,
        params: &[Primitive],
        ret: Primitive,
    ) -> u32 {
        let key = (module.to_string(), name.to_string());
        if let Some(&index) = self.import_indices.get(&key) {
            return index;
        }
        let index = self.imports.len() as u32;
        self.imports.push(ImportDecl {
            module: module.to_string(),
            name: name.to_string(),
            params: params.to_vec(),
            ret,
        });
        self.import_indices.insert(key, index);
        index
    }

    pub(crate) fn push_function_decl(&mut self, decl: klang_ir::FunctionDecl) {
        self.functions.push(decl);
    }

    pub(crate) fn next_function_index(&self) -> u32 {
        self.functions.len() as u32
    }

    /// The type a binding presents in an expression position, for error
    /// messages.
    pub(crate) fn binding_type(binding: &Binding) -> Type {
        match binding {
            Binding::Global { ty, .. } | Binding::Local { ty, .. } => Type::Primitive(*ty),
            Binding::Array(array) => Type::Array(*array),
            Binding::ParamCell(array) => Type::Primitive(array.elem),
            Binding::Function { sig, .. } => Type::Function(sig.clone()),
        }
    }

    pub(crate) fn export_type(export: &HostExport) -> Type {
        match export {
            HostExport::Function(f) => Type::Function(FunctionType {
                params: f.params.to_vec(),
                ret: f.ret,
            }),
            HostExport::Constant(c) => Type::Primitive(c.ty()),
        }
    }
}

const PARAM_FIELDS: [&str; 3] = ["defaultValue", "minValue", "maxValue"];

pub(crate) fn primitive(name: PrimitiveName) -> Primitive {
    match name {
        PrimitiveName::Int => Primitive::Int32,
        PrimitiveName::Float => Primitive::Float32,
        PrimitiveName::Bool => Primitive::Bool,
        PrimitiveName::Void => Primitive::Void,
    }
}

/// The implicit value of a declaration without an initializer. Only
/// called for storable types.
pub(crate) fn zero(ty: Primitive) -> Constant {
    let Some(value) = ty.zero() else {
        unreachable!("zero value requested for void");
    };
    value
}

fn constant_as_f32(value: Constant) -> f32 {
    match value {
        Constant::Int32(v) => v as f32,
        Constant::Float32(v) => v,
        Constant::Bool(v) => {
            if v {
                1.0
            } else {
                0.0
            }
        }
    }
}
