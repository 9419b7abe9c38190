//! Scope chains and name resolution state.
//!
//! Scopes live in one arena and point at their parent by index; lookups
//! walk the chain iteratively from the innermost scope outwards. Function
//! scopes own the local slot allocator, so block scopes nested inside a
//! function delegate slot allocation upwards.

use klang_ir::{ArrayType, Constant, FunctionType, Primitive};
use rustc_hash::FxHashMap;

use crate::builtins::ModuleHeader;

/// What a resolved name stands for.
#[derive(Clone, PartialEq, Debug)]
pub enum Binding {
    /// A module-level scalar. Immutable globals carry their folded value
    /// for use in compile-time contexts.
    Global {
        ty: Primitive,
        mutable: bool,
        value: Option<Constant>,
    },
    /// A global array (user-declared, channel, or a-rate parameter).
    Array(ArrayType),
    /// A scalar `param`: a length-1 array behind a transparent element
    /// accessor, so reads and writes lower to item-get/item-set.
    ParamCell(ArrayType),
    /// A function parameter or local variable slot.
    Local {
        index: u32,
        ty: Primitive,
        mutable: bool,
        /// Loop counters are visible but never assignable.
        loop_var: bool,
    },
    /// A user-declared function, by declaration index.
    Function { index: u32, sig: FunctionType },
}

/// Index of a scope in its arena.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct ScopeId(usize);

/// Per-function validation state, owned by the function's scope.
#[derive(Clone, PartialEq, Debug)]
pub struct FunctionFrame {
    pub ret: Primitive,
    param_count: u32,
    /// Local slots beyond the parameters, in slot order.
    pub extra_locals: Vec<Primitive>,
    /// Set by any `return` statement anywhere in the body.
    pub return_covered: bool,
}

#[derive(Clone, Debug)]
enum ScopeKind {
    Global,
    Function(FunctionFrame),
    Block,
}

#[derive(Clone, Debug)]
struct Scope {
    parent: Option<ScopeId>,
    kind: ScopeKind,
    names: FxHashMap<String, Binding>,
}

/// The arena of all scopes created while validating one module.
#[derive(Clone, Debug)]
pub struct ScopeArena {
    scopes: Vec<Scope>,
}

impl ScopeArena {
    /// A fresh arena containing only the global scope.
    pub fn new() -> Self {
        ScopeArena {
            scopes: vec![Scope {
                parent: None,
                kind: ScopeKind::Global,
                names: FxHashMap::default(),
            }],
        }
    }

    pub fn global(&self) -> ScopeId {
        ScopeId(0)
    }

    pub fn push_function(&mut self, parent: ScopeId, ret: Primitive, param_count: u32) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(Scope {
            parent: Some(parent),
            kind: ScopeKind::Function(FunctionFrame {
                ret,
                param_count,
                extra_locals: Vec::new(),
                return_covered: false,
            }),
            names: FxHashMap::default(),
        });
        id
    }

    pub fn push_block(&mut self, parent: ScopeId) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(Scope {
            parent: Some(parent),
            kind: ScopeKind::Block,
            names: FxHashMap::default(),
        });
        id
    }

    /// Bind `name` in exactly the given scope. Fails if the scope already
    /// holds that name; shadowing an outer scope is allowed.
    pub fn declare(&mut self, scope: ScopeId, name: &str, binding: Binding) -> Result<(), ()> {
        let names = &mut self.scopes[scope.0].names;
        if names.contains_key(name) {
            return Err(());
        }
        names.insert(name.to_string(), binding);
        Ok(())
    }

    /// Resolve `name` from the given scope outwards.
    pub fn resolve(&self, scope: ScopeId, name: &str) -> Option<&Binding> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let scope = &self.scopes[id.0];
            if let Some(binding) = scope.names.get(name) {
                return Some(binding);
            }
            current = scope.parent;
        }
        None
    }

    /// Allocate a new local slot in the nearest enclosing function.
    pub fn alloc_local(&mut self, scope: ScopeId, ty: Primitive) -> u32 {
        let id = self.enclosing_function(scope);
        let ScopeKind::Function(frame) = &mut self.scopes[id.0].kind else {
            unreachable!("enclosing_function returned a non-function scope");
        };
        let index = frame.param_count + frame.extra_locals.len() as u32;
        frame.extra_locals.push(ty);
        index
    }

    /// The frame of the nearest enclosing function, if any.
    pub fn frame(&self, scope: ScopeId) -> Option<&FunctionFrame> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let scope = &self.scopes[id.0];
            if let ScopeKind::Function(frame) = &scope.kind {
                return Some(frame);
            }
            current = scope.parent;
        }
        None
    }

    pub fn mark_return_covered(&mut self, scope: ScopeId) {
        let id = self.enclosing_function(scope);
        if let ScopeKind::Function(frame) = &mut self.scopes[id.0].kind {
            frame.return_covered = true;
        }
    }

    fn enclosing_function(&self, scope: ScopeId) -> ScopeId {
        let mut current = Some(scope);
        while let Some(id) = current {
            if matches!(self.scopes[id.0].kind, ScopeKind::Function(_)) {
                return id;
            }
            current = self.scopes[id.0].parent;
        }
        unreachable!("no enclosing function scope");
    }
}

impl Default for ScopeArena {
    fn default() -> Self {
        ScopeArena::new()
    }
}

/// One name made visible by the implicit imports.
#[derive(Clone, PartialEq, Debug)]
pub enum ImportName {
    Unique { module: String, name: String },
    /// Exported by more than one module; only the qualified form resolves.
    Ambiguous { modules: Vec<String> },
}

/// Names contributed by the imported built-in modules.
///
/// Every export is reachable under its qualified `module.name` key; the
/// bare name resolves only while a single module exports it. Scope
/// bindings are consulted before this table, so user declarations shadow
/// imports.
#[derive(Clone, Debug, Default)]
pub struct ImportTable {
    names: FxHashMap<String, ImportName>,
}

impl ImportTable {
    pub fn new() -> Self {
        ImportTable::default()
    }

    pub fn add_module(&mut self, module: &str, header: &ModuleHeader) {
        for (name, _) in header.exports() {
            self.names.insert(
                format!("{module}.{name}"),
                ImportName::Unique {
                    module: module.to_string(),
                    name: name.to_string(),
                },
            );
            let bare = match self.names.get(name) {
                None => Some(ImportName::Unique {
                    module: module.to_string(),
                    name: name.to_string(),
                }),
                Some(ImportName::Unique { module: first, .. }) if first != module => {
                    Some(ImportName::Ambiguous {
                        modules: vec![first.clone(), module.to_string()],
                    })
                }
                Some(ImportName::Ambiguous { modules })
                    if !modules.iter().any(|m| m == module) =>
                {
                    let mut modules = modules.clone();
                    modules.push(module.to_string());
                    Some(ImportName::Ambiguous { modules })
                }
                Some(_) => None,
            };
            if let Some(entry) = bare {
                self.names.insert(name.to_string(), entry);
            }
        }
    }

    pub fn resolve(&self, name: &str) -> Option<&ImportName> {
        self.names.get(name)
    }
}
