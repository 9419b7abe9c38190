use klang_ir::{
    ArrayRef, BinOpKind, Constant, FunctionDecl, GlobalDecl, ImportDecl, IrExpr, IrStmt, LoopStmt,
    Primitive, ValidatedModule,
};
use pretty_assertions::assert_eq;
use wasmparser::{ExternalKind, Operator, Parser, Payload};

use crate::generate;

fn empty_module() -> ValidatedModule {
    ValidatedModule {
        imports: vec![],
        globals: vec![],
        functions: vec![],
        static_data: vec![],
        static_data_offset: 2048,
        params: vec![],
        param_info_offset: None,
        sample_count: 128,
    }
}

fn void_function(name: &str, body: Vec<IrStmt>, locals: Vec<Primitive>) -> FunctionDecl {
    FunctionDecl {
        name: name.to_string(),
        params: vec![],
        ret: Primitive::Void,
        locals,
        body,
        export: true,
    }
}

fn exports(bytes: &[u8]) -> Vec<(String, ExternalKind, u32)> {
    let mut out = Vec::new();
    for payload in Parser::new(0).parse_all(bytes) {
        let Ok(payload) = payload else {
            panic!("emitted module did not parse");
        };
        if let Payload::ExportSection(reader) = payload {
            for export in reader {
                let Ok(export) = export else {
                    panic!("export entry did not parse");
                };
                out.push((export.name.to_string(), export.kind, export.index));
            }
        }
    }
    out
}

#[derive(PartialEq, Debug)]
enum Init {
    I32(i32),
    F32(u32),
}

fn global_inits(bytes: &[u8]) -> Vec<(bool, Init)> {
    let mut out = Vec::new();
    for payload in Parser::new(0).parse_all(bytes) {
        let Ok(payload) = payload else {
            panic!("emitted module did not parse");
        };
        if let Payload::GlobalSection(reader) = payload {
            for global in reader {
                let Ok(global) = global else {
                    panic!("global entry did not parse");
                };
                let mut ops = global.init_expr.get_operators_reader();
                let init = match ops.read() {
                    Ok(Operator::I32Const { value }) => Init::I32(value),
                    Ok(Operator::F32Const { value }) => Init::F32(value.bits()),
                    other => panic!("unexpected init operator {other:?}"),
                };
                out.push((global.ty.mutable, init));
            }
        }
    }
    out
}

#[test]
fn test_emits_wasm_header() {
    let mut module = empty_module();
    module.functions.push(void_function("process", vec![], vec![]));
    let bytes = generate(&module);
    assert_eq!(&bytes[..4], b"\0asm");
}

#[test]
fn test_exports_memory_and_functions() {
    let mut module = empty_module();
    module.functions.push(void_function("process", vec![], vec![]));
    let bytes = generate(&module);
    let exports = exports(&bytes);
    assert!(exports.contains(&("memory".to_string(), ExternalKind::Memory, 0)));
    assert!(exports.contains(&("process".to_string(), ExternalKind::Func, 0)));
}

#[test]
fn test_globals_keep_declaration_order() {
    let mut module = empty_module();
    module.globals.push(GlobalDecl::constant_i32("number_of_in_channels", 2));
    module.globals.push(GlobalDecl {
        name: "gain".to_string(),
        ty: Primitive::Float32,
        mutable: true,
        init: Constant::Float32(0.5),
        export: true,
    });
    let bytes = generate(&module);
    assert_eq!(
        global_inits(&bytes),
        vec![
            (false, Init::I32(2)),
            (true, Init::F32(0.5f32.to_bits())),
        ]
    );
    let exports = exports(&bytes);
    assert!(exports.contains(&("number_of_in_channels".to_string(), ExternalKind::Global, 0)));
    assert!(exports.contains(&("gain".to_string(), ExternalKind::Global, 1)));
}

#[test]
fn test_bool_global_lowers_to_i32() {
    let mut module = empty_module();
    module.globals.push(GlobalDecl {
        name: "flag".to_string(),
        ty: Primitive::Bool,
        mutable: false,
        init: Constant::Bool(true),
        export: true,
    });
    let bytes = generate(&module);
    assert_eq!(global_inits(&bytes), vec![(false, Init::I32(1))]);
}

#[test]
fn test_data_segment_lands_at_static_offset() {
    let mut module = empty_module();
    module.static_data = b"\x05hello".to_vec();
    module.static_data_offset = 2048;
    let bytes = generate(&module);
    let mut seen = false;
    for payload in Parser::new(0).parse_all(&bytes) {
        let Ok(payload) = payload else {
            panic!("emitted module did not parse");
        };
        if let Payload::DataSection(reader) = payload {
            for segment in reader {
                let Ok(segment) = segment else {
                    panic!("data segment did not parse");
                };
                let wasmparser::DataKind::Active { memory_index, offset_expr } = segment.kind
                else {
                    panic!("expected an active segment");
                };
                assert_eq!(memory_index, 0);
                let mut ops = offset_expr.get_operators_reader();
                let Ok(op) = ops.read() else {
                    panic!("offset expression did not parse");
                };
                assert!(matches!(op, Operator::I32Const { value: 2048 }));
                assert_eq!(segment.data, b"\x05hello");
                seen = true;
            }
        }
    }
    assert!(seen, "no data section emitted");
}

#[test]
fn test_no_data_section_when_segment_empty() {
    let mut module = empty_module();
    module.functions.push(void_function("process", vec![], vec![]));
    let bytes = generate(&module);
    for payload in Parser::new(0).parse_all(&bytes) {
        let Ok(payload) = payload else {
            panic!("emitted module did not parse");
        };
        assert!(!matches!(payload, Payload::DataSection(_)));
    }
}

#[test]
fn test_memory_covers_arrays_and_static_data() {
    let mut module = empty_module();
    module.static_data_offset = 2 * 65536 - 4;
    module.static_data = vec![0; 8];
    let bytes = generate(&module);
    for payload in Parser::new(0).parse_all(&bytes) {
        let Ok(payload) = payload else {
            panic!("emitted module did not parse");
        };
        if let Payload::MemorySection(reader) = payload {
            for memory in reader {
                let Ok(memory) = memory else {
                    panic!("memory entry did not parse");
                };
                assert_eq!(memory.initial, 3);
                assert_eq!(memory.maximum, Some(3));
            }
        }
    }
}

#[test]
fn test_loop_with_array_traffic_validates() {
    // Passthrough body: out_0[i] = in_0[i] over sample_count items. The
    // internal re-validation inside generate is the real assertion here.
    let input = ArrayRef { offset: 0, elem: Primitive::Float32 };
    let output = ArrayRef { offset: 1024, elem: Primitive::Float32 };
    let counter_get = IrExpr::LocalGet { index: 0, ty: Primitive::Int32 };
    let body = vec![
        IrStmt::LocalSet { index: 0, value: IrExpr::Const(Constant::Int32(0)) },
        IrStmt::LocalSet { index: 1, value: IrExpr::Const(Constant::Int32(128)) },
        IrStmt::Loop(LoopStmt {
            counter: 0,
            length: 1,
            body: vec![
                IrStmt::ItemSet {
                    array: output,
                    index: counter_get.clone(),
                    value: IrExpr::ItemGet {
                        array: input,
                        index: Box::new(counter_get.clone()),
                    },
                },
                IrStmt::LocalSet {
                    index: 0,
                    value: IrExpr::Binary {
                        op: BinOpKind::Int32Add,
                        lhs: Box::new(counter_get),
                        rhs: Box::new(IrExpr::Const(Constant::Int32(1))),
                    },
                },
            ],
        }),
    ];
    let mut module = empty_module();
    module.functions.push(void_function(
        "process",
        body,
        vec![Primitive::Int32, Primitive::Int32],
    ));
    let bytes = generate(&module);
    assert!(!bytes.is_empty());
}

#[test]
fn test_import_and_user_calls_share_one_index_space() {
    let mut module = empty_module();
    module.imports.push(ImportDecl {
        module: "math".to_string(),
        name: "sin".to_string(),
        params: vec![Primitive::Float32],
        ret: Primitive::Float32,
    });
    // f() calls the import; g() calls f. User function indices are biased
    // past the imports, so a miscount fails the internal re-validation.
    module.functions.push(FunctionDecl {
        name: "f".to_string(),
        params: vec![],
        ret: Primitive::Float32,
        locals: vec![],
        body: vec![IrStmt::Return(Some(IrExpr::CallImport {
            index: 0,
            args: vec![IrExpr::Const(Constant::Float32(1.0))],
            ret: Primitive::Float32,
        }))],
        export: true,
    });
    module.functions.push(FunctionDecl {
        name: "g".to_string(),
        params: vec![],
        ret: Primitive::Float32,
        locals: vec![],
        body: vec![IrStmt::Return(Some(IrExpr::CallFunction {
            index: 0,
            args: vec![],
            ret: Primitive::Float32,
        }))],
        export: true,
    });
    let bytes = generate(&module);
    let exports = exports(&bytes);
    assert!(exports.contains(&("f".to_string(), ExternalKind::Func, 1)));
    assert!(exports.contains(&("g".to_string(), ExternalKind::Func, 2)));
}

#[test]
fn test_select_and_comparison_validate() {
    let mut module = empty_module();
    module.functions.push(FunctionDecl {
        name: "clamp01".to_string(),
        params: vec![Primitive::Int32],
        ret: Primitive::Int32,
        locals: vec![],
        body: vec![IrStmt::Return(Some(IrExpr::Select {
            cond: Box::new(IrExpr::Binary {
                op: BinOpKind::Int32Lt,
                lhs: Box::new(IrExpr::LocalGet { index: 0, ty: Primitive::Int32 }),
                rhs: Box::new(IrExpr::Const(Constant::Int32(1))),
            }),
            then: Box::new(IrExpr::Const(Constant::Int32(0))),
            otherwise: Box::new(IrExpr::Const(Constant::Int32(1))),
            ty: Primitive::Int32,
        }))],
        export: true,
    });
    let bytes = generate(&module);
    assert!(!bytes.is_empty());
}

#[test]
fn test_nonvoid_body_without_trailing_return_still_validates() {
    // Return coverage was proven during validation; the fall-through path
    // gets an unreachable so the function still type-checks.
    let mut module = empty_module();
    module.functions.push(FunctionDecl {
        name: "f".to_string(),
        params: vec![],
        ret: Primitive::Int32,
        locals: vec![Primitive::Int32, Primitive::Int32],
        body: vec![IrStmt::Loop(LoopStmt {
            counter: 0,
            length: 1,
            body: vec![IrStmt::Return(Some(IrExpr::Const(Constant::Int32(1))))],
        })],
        export: true,
    });
    let bytes = generate(&module);
    assert!(!bytes.is_empty());
}

#[test]
fn test_static_string_address_is_absolute() {
    // A util.log_s call takes the string's absolute address; validation of
    // the call signature inside generate covers the lowering.
    let mut module = empty_module();
    module.imports.push(ImportDecl {
        module: "util".to_string(),
        name: "log_s".to_string(),
        params: vec![Primitive::Int32],
        ret: Primitive::Void,
    });
    module.static_data = b"\x02hi".to_vec();
    module.static_data_offset = 1024;
    module.functions.push(void_function(
        "process",
        vec![IrStmt::Call(IrExpr::CallImport {
            index: 0,
            args: vec![IrExpr::StaticString { offset: 0 }],
            ret: Primitive::Void,
        })],
        vec![],
    ));
    let bytes = generate(&module);
    assert!(!bytes.is_empty());
}
