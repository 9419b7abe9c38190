//! Validator tests: resolution, typing, folding, layout, lowering.

use klang_diagnostic::ErrorKind;
use klang_ir::ast::Import;
use klang_ir::{
    Constant, GlobalDecl, IrExpr, IrStmt, Primitive, Type, ValidatedModule,
};
use pretty_assertions::assert_eq;

use crate::builtins::{HostExport, ModuleHeader, ModuleRegistry};
use crate::{validate, ValidateOptions, Validation};

fn check(source: &str) -> Validation {
    let module = klang_parse::parse(source)
        .unwrap_or_else(|e| panic!("parse failed: {}", e.describe(source)));
    validate(
        &module,
        &ModuleRegistry::with_builtins(),
        &ValidateOptions::default(),
    )
}

fn check_ok(source: &str) -> ValidatedModule {
    let validation = check(source);
    assert_eq!(
        validation.errors,
        vec![],
        "expected clean validation of {source:?}"
    );
    validation.module
}

fn first_error(source: &str) -> ErrorKind {
    let validation = check(source);
    let Some(error) = validation.errors.into_iter().next() else {
        panic!("expected an error for {source:?}");
    };
    error.kind
}

fn global<'a>(module: &'a ValidatedModule, name: &str) -> &'a GlobalDecl {
    let Some(decl) = module.globals.iter().find(|g| g.name == name) else {
        panic!("global `{name}` missing");
    };
    decl
}

#[test]
fn test_duplicate_declaration() {
    assert_eq!(
        first_error("int a = 0; int a = 1;"),
        ErrorKind::AlreadyDeclared {
            name: "a".to_string()
        }
    );
}

#[test]
fn test_declaration_type_must_match_exactly() {
    check_ok("int a = 0; float b = 0.5;");
    assert_eq!(
        first_error("int a = 0.5;"),
        ErrorKind::TypeMismatch {
            expected: Type::Primitive(Primitive::Int32),
            actual: Type::Primitive(Primitive::Float32),
        }
    );
    assert_eq!(
        first_error("float a = 1;"),
        ErrorKind::TypeMismatch {
            expected: Type::Primitive(Primitive::Float32),
            actual: Type::Primitive(Primitive::Int32),
        }
    );
}

#[test]
fn test_void_variable() {
    assert!(matches!(
        first_error("void v;"),
        ErrorKind::VoidVariable { .. }
    ));
}

#[test]
fn test_return_coverage() {
    assert!(matches!(
        first_error("int f() { }"),
        ErrorKind::MissingReturn { .. }
    ));
    assert_eq!(
        first_error("void f() { return 1; }"),
        ErrorKind::ReturnValueFromVoid
    );
    check_ok("int f() { return 1; }");
    // A return inside a loop body covers the function.
    check_ok("int f() { loop { return 1; } }");
}

#[test]
fn test_operator_table_int() {
    for op in ["+", "-", "*", "%"] {
        check_ok(&format!("int r = 1 {op} 2;"));
    }
    for op in ["<", "<=", ">", ">=", "==", "!="] {
        check_ok(&format!("bool r = 1 {op} 2;"));
    }
    assert!(matches!(
        first_error("int r = 1 / 2;"),
        ErrorKind::InvalidBinaryOp { .. }
    ));
}

#[test]
fn test_operator_table_float() {
    for op in ["+", "-", "*", "/"] {
        check_ok(&format!("float r = 1.0 {op} 2.0;"));
    }
    for op in ["<", "<=", ">", ">=", "==", "!="] {
        check_ok(&format!("bool r = 1.0 {op} 2.0;"));
    }
    assert!(matches!(
        first_error("float r = 1.0 % 2.0;"),
        ErrorKind::InvalidBinaryOp { .. }
    ));
}

#[test]
fn test_no_implicit_numeric_coercion() {
    assert!(matches!(
        first_error("float r = 1 + 2.0;"),
        ErrorKind::InvalidBinaryOp { .. }
    ));
    // The explicit cast makes it legal.
    check_ok("float r = float(1) + 2.0;");
}

#[test]
fn test_constant_folding() {
    let module = check_ok("float a = 1.5 + 2.0; int b = 6 % 4;");
    assert_eq!(global(&module, "a").init, Constant::Float32(3.5));
    assert_eq!(global(&module, "b").init, Constant::Int32(2));
}

#[test]
fn test_constant_ternary_folds_taken_branch() {
    let module = check_ok("bool c = 1 < 2; int d = c ? 10 : 20;");
    assert_eq!(global(&module, "d").init, Constant::Int32(10));
}

#[test]
fn test_untaken_branch_is_type_checked_but_not_evaluated() {
    // `2 % 0` would fail folding, but the branch is never taken.
    let module = check_ok("bool c = 1 < 2; int d = c ? 1 : 2 % 0;");
    assert_eq!(global(&module, "d").init, Constant::Int32(1));
    // It is still type-checked.
    assert!(matches!(
        first_error("bool c = 1 < 2; int d = c ? 1 : 2.0;"),
        ErrorKind::BranchTypeMismatch { .. }
    ));
}

#[test]
fn test_untaken_branch_call_arguments_not_evaluated() {
    // `1 % 0` sits inside a call in the dead branch; it must only be
    // type-checked.
    check_ok("bool c = 1 < 2; float r = c ? 1.0 : float(1 % 0);");
    assert_eq!(
        first_error("bool c = 1 < 2; float r = c ? float(1 % 0) : 1.0;"),
        ErrorKind::RemainderByZeroInConstant
    );
    // Argument types are still enforced in the dead branch.
    assert!(matches!(
        first_error("bool c = 1 < 2; int r = c ? 1 : int(1 % 0);"),
        ErrorKind::ArgumentTypeMismatch { .. }
    ));
    assert!(matches!(
        first_error("bool c = 1 < 2; float r = c ? 1.0 : float(1, 2);"),
        ErrorKind::TooManyArguments { .. }
    ));
}

#[test]
fn test_remainder_by_zero_in_constant() {
    assert_eq!(
        first_error("int a = 1 % 0;"),
        ErrorKind::RemainderByZeroInConstant
    );
}

#[test]
fn test_mutable_global_in_constant_context() {
    assert_eq!(
        first_error("var int a = 1; int b = a;"),
        ErrorKind::MutableGlobalInConstant {
            name: "a".to_string()
        }
    );
    // Immutable constants chain.
    let module = check_ok("int a = 2; int b = a * 3;");
    assert_eq!(global(&module, "b").init, Constant::Int32(6));
}

#[test]
fn test_const_call_whitelist() {
    let module = check_ok("float s = sin(0.0); int t = int(1.9); float pi = PI;");
    assert_eq!(global(&module, "s").init, Constant::Float32(0.0));
    assert_eq!(global(&module, "t").init, Constant::Int32(1));
    assert_eq!(
        global(&module, "pi").init,
        Constant::Float32(std::f32::consts::PI)
    );
    assert_eq!(
        first_error("float p = pow(2.0, 3.0);"),
        ErrorKind::CallNotConstEvaluable {
            name: "pow".to_string()
        }
    );
    assert_eq!(
        first_error("int g() { return 1; } int x = g();"),
        ErrorKind::CallNotConstEvaluable {
            name: "g".to_string()
        }
    );
}

#[test]
fn test_string_not_storable() {
    assert_eq!(first_error("int a = \"x\";"), ErrorKind::StringNotStorable);
    assert!(matches!(
        first_error("void f() { int a = \"x\"; }"),
        ErrorKind::TypeMismatch { .. }
    ));
}

#[test]
fn test_string_literal_over_prefix_limit_rejected() {
    // The 1-byte length prefix caps literals at 255 bytes.
    let source = format!("void f() {{ log_s(\"{}\"); }}", "x".repeat(256));
    assert!(matches!(
        first_error(&source),
        ErrorKind::StringTooLong { len: 256 }
    ));
    let source = format!("void f() {{ log_s(\"{}\"); }}", "x".repeat(255));
    check_ok(&source);
}

#[test]
fn test_string_literal_passes_where_int_expected() {
    let module = check_ok("void f() { log_s(\"hi\"); log_s(\"hi\"); }");
    assert_eq!(module.imports.len(), 1);
    assert_eq!(module.imports[0].module, "util");
    assert_eq!(module.imports[0].name, "log_s");
    // Identical literals share one static slot.
    let body = &module.functions[0].body;
    let offsets: Vec<u32> = body
        .iter()
        .filter_map(|stmt| match stmt {
            IrStmt::Call(IrExpr::CallImport { args, .. }) => match args.as_slice() {
                [IrExpr::StaticString { offset }] => Some(*offset),
                _ => None,
            },
            _ => None,
        })
        .collect();
    assert_eq!(offsets.len(), 2);
    assert_eq!(offsets[0], offsets[1]);
}

#[test]
fn test_param_declaration_completeness() {
    let module = check_ok("param int a { defaultValue = 0; minValue = 0; maxValue = 0; }");
    assert_eq!(module.params.len(), 1);
    assert_eq!(module.params[0].rate_name(), "k-rate");
    assert_eq!(global(&module, "number_of_params").init, Constant::Int32(1));
    assert!(module.param_info_offset.is_some());

    assert_eq!(
        first_error("param int a { defaultValue = 0; maxValue = 0; }"),
        ErrorKind::ParamMissingFields {
            names: vec!["minValue".to_string()]
        }
    );
}

#[test]
fn test_array_param_is_a_rate() {
    let module = check_ok(
        "param float[] level { defaultValue = 0.0; minValue = 0.0; maxValue = 1.0; }",
    );
    assert_eq!(module.params.len(), 1);
    assert_eq!(module.params[0].rate_name(), "a-rate");
    // Backed by a full-length array placed after the channel arrays.
    assert_eq!(global(&module, "level").init, Constant::Int32(2048));
    assert_eq!(module.static_data_offset, 2048 + 128 * 4);
}

#[test]
fn test_param_field_type_and_unknown_field() {
    assert!(matches!(
        first_error("param float g { defaultValue = 0; minValue = 0.0; maxValue = 1.0; }"),
        ErrorKind::ParamFieldType { .. }
    ));
    assert_eq!(
        first_error(
            "param float g { defaultValue = 0.0; minValue = 0.0; maxValue = 1.0; step = 0.1; }"
        ),
        ErrorKind::ParamUnknownField {
            name: "step".to_string()
        }
    );
    assert!(matches!(
        first_error("param bool b { defaultValue = 0; minValue = 0; maxValue = 0; }"),
        ErrorKind::ParamTypeInvalid { .. }
    ));
}

#[test]
fn test_scalar_param_reads_and_writes_as_cell() {
    let module = check_ok(
        "param float gain { defaultValue = 0.5; minValue = 0.0; maxValue = 1.0; }\n\
         float f() { return gain; }\n\
         void g() { gain = 0.25; }",
    );
    let IrStmt::Return(Some(IrExpr::ItemGet { array, index })) = &module.functions[0].body[0]
    else {
        panic!("scalar param read should lower to item-get");
    };
    assert_eq!(array.offset, 2048);
    assert_eq!(**index, IrExpr::Const(Constant::Int32(0)));
    let IrStmt::ItemSet { array, index, .. } = &module.functions[1].body[0] else {
        panic!("scalar param write should lower to item-set");
    };
    assert_eq!(array.offset, 2048);
    assert_eq!(*index, IrExpr::Const(Constant::Int32(0)));
}

#[test]
fn test_loop_desugars_to_fixed_sample_count() {
    let module = check_ok("void f() { loop { } }");
    let body = &module.functions[0].body;
    assert_eq!(body.len(), 3);
    assert_eq!(
        body[0],
        IrStmt::LocalSet {
            index: 0,
            value: IrExpr::Const(Constant::Int32(0)),
        }
    );
    // The bound is the configured sample count, never user-supplied.
    assert_eq!(
        body[1],
        IrStmt::LocalSet {
            index: 1,
            value: IrExpr::Const(Constant::Int32(128)),
        }
    );
    let IrStmt::Loop(loop_stmt) = &body[2] else {
        panic!("expected loop, got {:?}", body[2]);
    };
    assert_eq!((loop_stmt.counter, loop_stmt.length), (0, 1));
    // Empty body still carries the counter increment.
    assert_eq!(loop_stmt.body.len(), 1);
    assert!(matches!(
        loop_stmt.body[0],
        IrStmt::LocalSet { index: 0, .. }
    ));
}

#[test]
fn test_loop_counter_is_visible_and_readonly() {
    let module = check_ok("void f() { loop { out_0[i] = in_0[i]; } }");
    let IrStmt::Loop(loop_stmt) = &module.functions[0].body[2] else {
        panic!("expected loop");
    };
    let IrStmt::ItemSet { array, .. } = &loop_stmt.body[0] else {
        panic!("expected item-set");
    };
    assert_eq!(array.offset, 1024); // out_0 follows the two input arrays

    assert_eq!(
        first_error("void f() { loop { i = 1; } }"),
        ErrorKind::AssignToReadonly {
            name: "i".to_string()
        }
    );
    assert_eq!(
        first_error("void f() { loop { length = 1; } }"),
        ErrorKind::AssignToReadonly {
            name: "length".to_string()
        }
    );
}

#[test]
fn test_global_scope_restrictions() {
    assert_eq!(
        first_error("loop {}"),
        ErrorKind::StatementNotAllowedAtGlobal { what: "a loop" }
    );
    assert_eq!(
        first_error("void f(){} f();"),
        ErrorKind::StatementNotAllowedAtGlobal {
            what: "a function call"
        }
    );
    assert_eq!(
        first_error("var int a = 0; a = 1;"),
        ErrorKind::StatementNotAllowedAtGlobal { what: "assignment" }
    );
    assert_eq!(
        first_error("return;"),
        ErrorKind::StatementNotAllowedAtGlobal { what: "`return`" }
    );
}

#[test]
fn test_array_rules() {
    assert_eq!(
        first_error("void f() { float[] b; }"),
        ErrorKind::ArrayNotGlobal
    );
    assert_eq!(
        first_error("float[] b = 0.0;"),
        ErrorKind::ArrayInitializer
    );
    assert_eq!(first_error("var float[] b;"), ErrorKind::MutableArray);
    assert!(matches!(
        first_error("float[] b; void f() { b[0.5] = 1.0; }"),
        ErrorKind::IndexNotInt { .. }
    ));
    assert!(matches!(
        first_error("void f() { var int x = 0; x[0] = 1; }"),
        ErrorKind::NotIndexable { .. }
    ));
    assert_eq!(
        first_error("int a = 0; void f() { float[] g; }"),
        ErrorKind::ArrayNotGlobal
    );
}

#[test]
fn test_array_read_in_constant_context() {
    assert_eq!(
        first_error("float[] b; float x = b[0];"),
        ErrorKind::ArrayReadInConstant
    );
}

#[test]
fn test_call_arity_and_argument_types() {
    check_ok("void f(int a) {} void g() { f(1); }");
    assert!(matches!(
        first_error("void f(int a) {} void g() { f(); }"),
        ErrorKind::TooFewArguments { expected: 1, given: 0, .. }
    ));
    assert!(matches!(
        first_error("void f(int a) {} void g() { f(1, 2); }"),
        ErrorKind::TooManyArguments { expected: 1, given: 2, .. }
    ));
    assert!(matches!(
        first_error("void f(int a) {} void g() { f(1.0); }"),
        ErrorKind::ArgumentTypeMismatch { index: 0, .. }
    ));
}

#[test]
fn test_calling_a_non_function() {
    assert!(matches!(
        first_error("int a = 0; void f() { a(); }"),
        ErrorKind::NotCallable { .. }
    ));
}

#[test]
fn test_non_void_call_statement_rejected() {
    assert!(matches!(
        first_error("int f() { return 1; } void g() { f(); }"),
        ErrorKind::TypeMismatch { .. }
    ));
}

#[test]
fn test_ternary_typing() {
    assert!(matches!(
        first_error("void f() { int x = 1 ? 2 : 3; }"),
        ErrorKind::ConditionNotBool { .. }
    ));
    assert!(matches!(
        first_error("void f() { float x = (1 < 2) ? 2 : 3.0; }"),
        ErrorKind::BranchTypeMismatch { .. }
    ));
    check_ok("void f() { int x = (1 < 2) ? 2 : 3; }");
}

#[test]
fn test_recursion_resolves() {
    check_ok("int f(int n) { return (n < 1) ? 0 : f(n - 1); }");
}

#[test]
fn test_locals_shadow_globals() {
    let module = check_ok("int a = 1; int f() { int a = 2; return a; }");
    let IrStmt::Return(Some(IrExpr::LocalGet { index: 0, .. })) = &module.functions[0].body[1]
    else {
        panic!("inner `a` should resolve to the local slot");
    };
}

#[test]
fn test_assign_to_constant() {
    assert_eq!(
        first_error("void f() { int a = 1; a = 2; }"),
        ErrorKind::AssignToConstant {
            name: "a".to_string()
        }
    );
    check_ok("void f() { var int a = 1; a = 2; }");
}

#[test]
fn test_nested_function_and_param() {
    assert_eq!(
        first_error("void f() { void g() { } }"),
        ErrorKind::NestedFunction
    );
    assert_eq!(
        first_error(
            "void f() { param float g { defaultValue = 0.0; minValue = 0.0; maxValue = 1.0; } }"
        ),
        ErrorKind::ParamNotGlobal
    );
}

#[test]
fn test_synthesized_global_order_and_layout() {
    let module = check_ok("void process() {}");
    let names: Vec<&str> = module.globals.iter().map(|g| g.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "number_of_in_channels",
            "in_0",
            "in_1",
            "pointer_of_in_channels",
            "number_of_out_channels",
            "out_0",
            "out_1",
            "pointer_of_out_channels",
            "pointer_of_static_data",
            "number_of_params",
            "size_of_static_data",
        ]
    );
    assert_eq!(global(&module, "number_of_in_channels").init, Constant::Int32(2));
    assert_eq!(global(&module, "in_0").init, Constant::Int32(0));
    assert_eq!(global(&module, "in_1").init, Constant::Int32(512));
    assert_eq!(global(&module, "pointer_of_in_channels").init, Constant::Int32(0));
    assert_eq!(global(&module, "out_0").init, Constant::Int32(1024));
    assert_eq!(global(&module, "pointer_of_out_channels").init, Constant::Int32(1024));
    assert_eq!(global(&module, "pointer_of_static_data").init, Constant::Int32(2048));
    assert_eq!(global(&module, "number_of_params").init, Constant::Int32(0));
    assert_eq!(global(&module, "size_of_static_data").init, Constant::Int32(0));
    assert_eq!(module.param_info_offset, None);
    assert_eq!(module.functions[0].name, "process");
    assert!(module.functions[0].export);
}

#[test]
fn test_user_globals_precede_array_offsets() {
    let module = check_ok("float[] buf; int n = 3;");
    let names: Vec<&str> = module.globals.iter().map(|g| g.name.as_str()).collect();
    let Some(n_at) = names.iter().position(|n| *n == "n") else {
        panic!("global `n` missing");
    };
    let Some(buf_at) = names.iter().position(|n| *n == "buf") else {
        panic!("global `buf` missing");
    };
    assert!(n_at < buf_at, "scalars come before array offsets: {names:?}");
    assert_eq!(global(&module, "buf").init, Constant::Int32(2048));
}

#[test]
fn test_channel_counts_follow_options() {
    let module = klang_parse::parse("void process() {}")
        .unwrap_or_else(|e| panic!("parse failed: {e}"));
    let options = ValidateOptions {
        sample_count: 64,
        in_channels: 0,
        out_channels: 1,
    };
    let validation = validate(&module, &ModuleRegistry::with_builtins(), &options);
    assert_eq!(validation.errors, vec![]);
    let names: Vec<&str> = validation
        .module
        .globals
        .iter()
        .map(|g| g.name.as_str())
        .collect();
    assert!(!names.contains(&"number_of_in_channels"));
    assert!(!names.contains(&"pointer_of_in_channels"));
    assert_eq!(
        global(&validation.module, "number_of_out_channels").init,
        Constant::Int32(1)
    );
    // One 64-sample output channel only.
    assert_eq!(validation.module.static_data_offset, 64 * 4);
    assert_eq!(validation.module.sample_count, 64);
}

#[test]
fn test_ambiguous_import_requires_qualification() {
    let mut alpha = ModuleHeader::new();
    alpha.insert("foo", HostExport::Constant(Constant::Int32(1)));
    let mut beta = ModuleHeader::new();
    beta.insert("foo", HostExport::Constant(Constant::Int32(2)));
    let mut registry = ModuleRegistry::new();
    registry.insert("alpha", alpha);
    registry.insert("beta", beta);

    let mut module = klang_parse::parse("int a = foo;")
        .unwrap_or_else(|e| panic!("parse failed: {e}"));
    module.imports = vec![Import::synthesized("alpha"), Import::synthesized("beta")];

    let validation = validate(&module, &registry, &ValidateOptions::default());
    let Some(error) = validation.errors.first() else {
        panic!("expected an ambiguity error");
    };
    assert_eq!(
        error.kind,
        ErrorKind::AmbiguousName {
            name: "foo".to_string(),
            modules: vec!["alpha".to_string(), "beta".to_string()],
        }
    );
}

#[test]
fn test_unknown_import_module() {
    let mut module = klang_parse::parse("").unwrap_or_else(|e| panic!("parse failed: {e}"));
    module.imports = vec![Import::synthesized("dsp")];
    let validation = validate(
        &module,
        &ModuleRegistry::with_builtins(),
        &ValidateOptions::default(),
    );
    assert_eq!(validation.errors.len(), 1);
    assert_eq!(
        validation.errors[0].kind,
        ErrorKind::ImportedModuleNotFound {
            module: "dsp".to_string()
        }
    );
    assert_eq!(validation.errors[0].span, None);
}

#[test]
fn test_errors_accumulate_across_statements() {
    let validation = check("int a = 0.5; int a = 1; void f() { b = 1; }");
    assert!(
        validation.errors.len() >= 3,
        "expected several errors, got {:?}",
        validation.errors
    );
}

#[test]
fn test_param_backing_cell_sits_before_static_data() {
    let module = check_ok(
        "param float gain { defaultValue = 0.5; minValue = 0.0; maxValue = 1.0; }",
    );
    // Four channel arrays, then the single backing cell.
    assert_eq!(module.static_data_offset, 2048 + 4);
    // name + rate strings + one 20-byte struct
    assert_eq!(module.static_data.len(), 5 + 7 + 20);
    let Some(offset) = module.param_info_offset else {
        panic!("param info offset missing");
    };
    assert_eq!(offset, module.static_data_offset + module.params[0].struct_offset);
}
