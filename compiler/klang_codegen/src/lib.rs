//! WebAssembly code generation.
//!
//! Walks the typed IR one-to-one onto instructions and serializes the
//! module sections. The emitted binary is immediately re-validated; a
//! validation failure at that point is a generator bug and aborts.
//!
//! Layout contract: function indices are import-count-biased, every
//! global keeps its declaration order (the runtime reads them
//! positionally via exports), linear memory is a single fixed-size
//! region, and the static data segment lands at the offset the validator
//! computed.

pub mod peephole;

use klang_ir::{
    ArrayRef, BinOpKind, Constant, FunctionDecl, IntrinsicOp, IrExpr, IrStmt, Primitive,
    ValidatedModule,
};
use rustc_hash::FxHashMap;
use tracing::debug;
use wasm_encoder::{
    BlockType, CodeSection, ConstExpr, DataSection, EntityType, ExportKind, ExportSection,
    Function, FunctionSection, GlobalSection, GlobalType, ImportSection, Instruction, MemArg,
    MemorySection, MemoryType, Module, TypeSection, ValType,
};

const PAGE_SIZE: u32 = 65536;

/// Serialize a validated module to WebAssembly bytes.
///
/// # Panics
///
/// Panics if the emitted binary fails re-validation; the IR handed in by
/// the validator is trusted, so that indicates a bug here.
pub fn generate(module: &ValidatedModule) -> Vec<u8> {
    let bytes = Emitter::new(module).emit();
    if let Err(error) = wasmparser::validate(&bytes) {
        panic!("generated module failed validation: {error}");
    }
    debug!(bytes = bytes.len(), "generated module");
    bytes
}

struct Emitter<'a> {
    module: &'a ValidatedModule,
    /// Deduplicated function types, in first-use order.
    types: Vec<(Vec<ValType>, Vec<ValType>)>,
    global_indices: FxHashMap<&'a str, u32>,
}

impl<'a> Emitter<'a> {
    fn new(module: &'a ValidatedModule) -> Self {
        let global_indices = module
            .globals
            .iter()
            .enumerate()
            .map(|(i, g)| (g.name.as_str(), i as u32))
            .collect();
        Emitter {
            module,
            types: Vec::new(),
            global_indices,
        }
    }

    fn emit(mut self) -> Vec<u8> {
        let mut imports = ImportSection::new();
        for import in &self.module.imports {
            let ty = self.type_index(&import.params, import.ret);
            imports.import(&import.module, &import.name, EntityType::Function(ty));
        }

        let mut functions = FunctionSection::new();
        let mut exports = ExportSection::new();
        let import_count = self.module.imports.len() as u32;
        for (i, func) in self.module.functions.iter().enumerate() {
            let ty = self.type_index(&func.params, func.ret);
            functions.function(ty);
            if func.export {
                exports.export(&func.name, ExportKind::Func, import_count + i as u32);
            }
        }

        let mut memories = MemorySection::new();
        let pages = self.memory_pages();
        memories.memory(MemoryType {
            minimum: pages,
            maximum: Some(pages),
            memory64: false,
            shared: false,
        });
        exports.export("memory", ExportKind::Memory, 0);

        let mut globals = GlobalSection::new();
        for (i, global) in self.module.globals.iter().enumerate() {
            globals.global(
                GlobalType {
                    val_type: valtype(global.ty),
                    mutable: global.mutable,
                },
                &const_expr(global.init),
            );
            if global.export {
                exports.export(&global.name, ExportKind::Global, i as u32);
            }
        }

        let mut code = CodeSection::new();
        for func in &self.module.functions {
            code.function(&self.function(func));
        }

        let mut type_section = TypeSection::new();
        for (params, results) in &self.types {
            type_section.function(params.iter().copied(), results.iter().copied());
        }

        let mut out = Module::new();
        out.section(&type_section);
        out.section(&imports);
        out.section(&functions);
        out.section(&memories);
        out.section(&globals);
        out.section(&exports);
        out.section(&code);
        if !self.module.static_data.is_empty() {
            let mut data = DataSection::new();
            data.active(
                0,
                &ConstExpr::i32_const(self.module.static_data_offset as i32),
                self.module.static_data.iter().copied(),
            );
            out.section(&data);
        }
        out.finish()
    }

    fn type_index(&mut self, params: &[Primitive], ret: Primitive) -> u32 {
        let params: Vec<ValType> = params.iter().map(|p| valtype(*p)).collect();
        let results: Vec<ValType> = match ret {
            Primitive::Void => vec![],
            ty => vec![valtype(ty)],
        };
        let entry = (params, results);
        if let Some(at) = self.types.iter().position(|t| *t == entry) {
            return at as u32;
        }
        self.types.push(entry);
        self.types.len() as u32 - 1
    }

    /// One fixed-size memory region covering the arrays and the static
    /// segment, in whole pages.
    fn memory_pages(&self) -> u64 {
        let total = self.module.static_data_offset + self.module.static_data.len() as u32;
        u64::from(total.div_ceil(PAGE_SIZE).max(1))
    }

    fn function(&self, decl: &FunctionDecl) -> Function {
        // Run-length encode the extra local slots.
        let mut locals: Vec<(u32, ValType)> = Vec::new();
        for ty in &decl.locals {
            let vt = valtype(*ty);
            match locals.last_mut() {
                Some((count, last)) if *last == vt => *count += 1,
                _ => locals.push((1, vt)),
            }
        }
        let mut f = Function::new(locals);
        for stmt in &decl.body {
            let stmt = peephole::stmt(stmt);
            self.stmt(&mut f, &stmt);
        }
        if decl.ret != Primitive::Void
            && !matches!(decl.body.last(), Some(IrStmt::Return(Some(_))))
        {
            // The fall-through path is only reachable on a coverage bug;
            // trap instead of fabricating a value.
            f.instruction(&Instruction::Unreachable);
        }
        f.instruction(&Instruction::End);
        f
    }

    fn stmt(&self, f: &mut Function, stmt: &IrStmt) {
        match stmt {
            IrStmt::LocalSet { index, value } => {
                self.expr(f, value);
                f.instruction(&Instruction::LocalSet(*index));
            }
            IrStmt::GlobalSet { name, value } => {
                self.expr(f, value);
                f.instruction(&Instruction::GlobalSet(self.global_index(name)));
            }
            IrStmt::ItemSet {
                array,
                index,
                value,
            } => {
                self.address(f, index);
                self.expr(f, value);
                f.instruction(&store(array));
            }
            // Only void calls reach statement position.
            IrStmt::Call(call) => self.expr(f, call),
            IrStmt::Loop(inner) => {
                f.instruction(&Instruction::Loop(BlockType::Empty));
                for stmt in &inner.body {
                    self.stmt(f, stmt);
                }
                f.instruction(&Instruction::LocalGet(inner.counter));
                f.instruction(&Instruction::LocalGet(inner.length));
                f.instruction(&Instruction::I32LtS);
                f.instruction(&Instruction::BrIf(0));
                f.instruction(&Instruction::End);
            }
            IrStmt::Return(value) => {
                if let Some(value) = value {
                    self.expr(f, value);
                }
                f.instruction(&Instruction::Return);
            }
        }
    }

    fn expr(&self, f: &mut Function, expr: &IrExpr) {
        match expr {
            IrExpr::Const(value) => {
                f.instruction(&const_instruction(*value));
            }
            IrExpr::StaticString { offset } => {
                f.instruction(&Instruction::I32Const(
                    (self.module.static_data_offset + offset) as i32,
                ));
            }
            IrExpr::GlobalGet { name, .. } => {
                f.instruction(&Instruction::GlobalGet(self.global_index(name)));
            }
            IrExpr::LocalGet { index, .. } => {
                f.instruction(&Instruction::LocalGet(*index));
            }
            IrExpr::ItemGet { array, index } => {
                self.address(f, index);
                f.instruction(&load(array));
            }
            IrExpr::CallImport { index, args, .. } => {
                for arg in args {
                    self.expr(f, arg);
                }
                f.instruction(&Instruction::Call(*index));
            }
            IrExpr::CallFunction { index, args, .. } => {
                for arg in args {
                    self.expr(f, arg);
                }
                f.instruction(&Instruction::Call(
                    self.module.imports.len() as u32 + index,
                ));
            }
            IrExpr::Intrinsic { op, arg } => {
                self.expr(f, arg);
                f.instruction(&match op {
                    IntrinsicOp::TruncFloatToInt => Instruction::I32TruncF32S,
                    IntrinsicOp::ConvertIntToFloat => Instruction::F32ConvertI32S,
                });
            }
            IrExpr::Binary { op, lhs, rhs } => {
                self.expr(f, lhs);
                self.expr(f, rhs);
                f.instruction(&binary_instruction(*op));
            }
            IrExpr::Select {
                cond,
                then,
                otherwise,
                ..
            } => {
                self.expr(f, then);
                self.expr(f, otherwise);
                self.expr(f, cond);
                f.instruction(&Instruction::Select);
            }
        }
    }

    /// Scale an element index to a byte address; the array's base offset
    /// rides in the load/store memarg.
    fn address(&self, f: &mut Function, index: &IrExpr) {
        self.expr(f, index);
        f.instruction(&Instruction::I32Const(4));
        f.instruction(&Instruction::I32Mul);
    }

    fn global_index(&self, name: &str) -> u32 {
        let Some(&index) = self.global_indices.get(name) else {
            unreachable!("IR references unknown global `{name}`");
        };
        index
    }
}

fn valtype(ty: Primitive) -> ValType {
    match ty {
        Primitive::Int32 | Primitive::Bool => ValType::I32,
        Primitive::Float32 => ValType::F32,
        Primitive::Void => unreachable!("void has no value type"),
    }
}

fn const_expr(value: Constant) -> ConstExpr {
    match value {
        Constant::Int32(v) => ConstExpr::i32_const(v),
        Constant::Float32(v) => ConstExpr::f32_const(v),
        Constant::Bool(v) => ConstExpr::i32_const(i32::from(v)),
    }
}

fn const_instruction(value: Constant) -> Instruction<'static> {
    match value {
        Constant::Int32(v) => Instruction::I32Const(v),
        Constant::Float32(v) => Instruction::F32Const(v),
        Constant::Bool(v) => Instruction::I32Const(i32::from(v)),
    }
}

fn memarg(array: &ArrayRef) -> MemArg {
    MemArg {
        offset: u64::from(array.offset),
        align: 2,
        memory_index: 0,
    }
}

fn load(array: &ArrayRef) -> Instruction<'static> {
    match array.elem {
        Primitive::Float32 => Instruction::F32Load(memarg(array)),
        Primitive::Int32 | Primitive::Bool => Instruction::I32Load(memarg(array)),
        Primitive::Void => unreachable!("void array element"),
    }
}

fn store(array: &ArrayRef) -> Instruction<'static> {
    match array.elem {
        Primitive::Float32 => Instruction::F32Store(memarg(array)),
        Primitive::Int32 | Primitive::Bool => Instruction::I32Store(memarg(array)),
        Primitive::Void => unreachable!("void array element"),
    }
}

fn binary_instruction(op: BinOpKind) -> Instruction<'static> {
    match op {
        BinOpKind::Int32Add => Instruction::I32Add,
        BinOpKind::Int32Sub => Instruction::I32Sub,
        BinOpKind::Int32Mul => Instruction::I32Mul,
        BinOpKind::Int32Rem => Instruction::I32RemS,
        BinOpKind::Int32Lt => Instruction::I32LtS,
        BinOpKind::Int32Le => Instruction::I32LeS,
        BinOpKind::Int32Gt => Instruction::I32GtS,
        BinOpKind::Int32Ge => Instruction::I32GeS,
        BinOpKind::Int32Eq => Instruction::I32Eq,
        BinOpKind::Int32Ne => Instruction::I32Ne,
        BinOpKind::Float32Add => Instruction::F32Add,
        BinOpKind::Float32Sub => Instruction::F32Sub,
        BinOpKind::Float32Mul => Instruction::F32Mul,
        BinOpKind::Float32Div => Instruction::F32Div,
        BinOpKind::Float32Lt => Instruction::F32Lt,
        BinOpKind::Float32Le => Instruction::F32Le,
        BinOpKind::Float32Gt => Instruction::F32Gt,
        BinOpKind::Float32Ge => Instruction::F32Ge,
        BinOpKind::Float32Eq => Instruction::F32Eq,
        BinOpKind::Float32Ne => Instruction::F32Ne,
    }
}

#[cfg(test)]
mod tests;
