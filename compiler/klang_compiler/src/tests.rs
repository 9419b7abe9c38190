use pretty_assertions::assert_eq;
use wasmparser::{ExternalKind, Operator, Parser, Payload};

use crate::{compile, CompileError, CompileOptions, CompiledModule};

fn check(source: &str) -> CompiledModule {
    match compile(source, &CompileOptions::default()) {
        Ok(compiled) => compiled,
        Err(error) => panic!("compile failed: {error}"),
    }
}

fn exports(bytes: &[u8]) -> Vec<(String, ExternalKind, u32)> {
    let mut out = Vec::new();
    for payload in Parser::new(0).parse_all(bytes) {
        let Ok(payload) = payload else {
            panic!("binary did not parse");
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

/// Read the i32 initializer of an exported global.
fn exported_i32(bytes: &[u8], name: &str) -> i32 {
    let Some(&(_, _, index)) = exports(bytes)
        .iter()
        .find(|(n, kind, _)| n.as_str() == name && *kind == ExternalKind::Global)
    else {
        panic!("global `{name}` not exported");
    };
    let mut inits = Vec::new();
    for payload in Parser::new(0).parse_all(bytes) {
        let Ok(payload) = payload else {
            panic!("binary did not parse");
        };
        if let Payload::GlobalSection(reader) = payload {
            for global in reader {
                let Ok(global) = global else {
                    panic!("global entry did not parse");
                };
                let mut ops = global.init_expr.get_operators_reader();
                match ops.read() {
                    Ok(Operator::I32Const { value }) => inits.push(Some(value)),
                    Ok(_) => inits.push(None),
                    Err(error) => panic!("init expression did not parse: {error}"),
                }
            }
        }
    }
    let Some(Some(value)) = inits.get(index as usize) else {
        panic!("global `{name}` has no i32 initializer");
    };
    *value
}

#[test]
fn test_empty_process_compiles() {
    let compiled = check("void process() {}");
    assert_eq!(&compiled.bytes[..4], b"\0asm");
    assert!(compiled.params.is_empty());
    assert_eq!(compiled.sample_count, 128);
}

#[test]
fn test_runtime_layout_exports() {
    let compiled = check("void process() { loop { out_0[i] = in_0[i]; } }");
    let exports = exports(&compiled.bytes);
    assert!(exports.contains(&("memory".to_string(), ExternalKind::Memory, 0)));
    assert!(exports
        .iter()
        .any(|(n, kind, _)| n == "process" && *kind == ExternalKind::Func));
    assert_eq!(exported_i32(&compiled.bytes, "number_of_in_channels"), 2);
    assert_eq!(exported_i32(&compiled.bytes, "number_of_out_channels"), 2);
    assert_eq!(exported_i32(&compiled.bytes, "number_of_params"), 0);
    assert_eq!(exported_i32(&compiled.bytes, "out_0"), 1024);
}

#[test]
fn test_gain_param_program() {
    let compiled = check(
        "param float gain { defaultValue = 0.5; minValue = 0.0; maxValue = 1.0; }\n\
         void process() {\n\
           loop {\n\
             out_0[i] = in_0[i] * gain;\n\
             out_1[i] = in_1[i] * gain;\n\
           }\n\
         }",
    );
    assert_eq!(compiled.params.len(), 1);
    assert_eq!(compiled.params[0].name, "gain");
    assert_eq!(compiled.params[0].default_value, 0.5);
    assert_eq!(compiled.params[0].rate_name(), "k-rate");
    assert_eq!(exported_i32(&compiled.bytes, "number_of_params"), 1);
    // Four channel arrays, then the one-slot backing cell, then the
    // segment: name and rate strings followed by the 20-byte struct.
    assert_eq!(compiled.static_data_offset, 2048 + 4);
    assert_eq!(compiled.static_data_len, 5 + 7 + 20);
    assert_eq!(compiled.param_info_offset, Some(2052 + 5 + 7));
    assert_eq!(
        exported_i32(&compiled.bytes, "offset_of_param_info"),
        2052 + 5 + 7
    );
}

#[test]
fn test_channel_options_shape_the_module() {
    let options = CompileOptions {
        sample_count: 64,
        in_channels: 0,
        out_channels: 1,
    };
    let Ok(compiled) = compile("void process() { loop { out_0[i] = 0.0; } }", &options)
    else {
        panic!("compile failed");
    };
    let exports = exports(&compiled.bytes);
    // A zero-channel side contributes no globals at all.
    assert!(!exports.iter().any(|(n, _, _)| n == "in_0"));
    assert!(!exports.iter().any(|(n, _, _)| n == "number_of_in_channels"));
    assert_eq!(exported_i32(&compiled.bytes, "number_of_out_channels"), 1);
    assert_eq!(compiled.sample_count, 64);
}

#[test]
fn test_math_and_util_imports_compile() {
    let compiled = check(
        "float two_pi = 2.0 * PI;\n\
         void process() {\n\
           log_s(\"render\");\n\
           loop { out_0[i] = sin(two_pi * float(i) / float(length)); }\n\
         }",
    );
    assert!(!compiled.bytes.is_empty());
}

#[test]
fn test_parse_error_is_fatal() {
    let result = compile("int = ;", &CompileOptions::default());
    let Err(error) = result else {
        panic!("expected a parse error");
    };
    assert!(matches!(error, CompileError::Parse(_)));
    let diagnostics = error.diagnostics("int = ;");
    assert_eq!(diagnostics.len(), 1);
    assert!(diagnostics[0].message.contains("syntax error"));
}

#[test]
fn test_semantic_errors_become_diagnostics() {
    let source = "int a = 0;\nint a = 1;\nvoid process() {}";
    let Err(error) = compile(source, &CompileOptions::default()) else {
        panic!("expected a validation failure");
    };
    let CompileError::Invalid { ref diagnostics } = error else {
        panic!("expected semantic diagnostics");
    };
    assert_eq!(diagnostics.len(), 1);
    assert!(diagnostics[0].message.contains("already declared"));
    assert_eq!(error.to_string(), "validation failed with 1 diagnostic(s)");
    assert_eq!(error.diagnostics(source), *diagnostics);
}

#[test]
fn test_multiple_errors_accumulate() {
    let source = "int a = b;\nfloat c = 1;\nvoid process() { d = 2; }";
    let Err(CompileError::Invalid { diagnostics }) =
        compile(source, &CompileOptions::default())
    else {
        panic!("expected semantic diagnostics");
    };
    assert!(diagnostics.len() >= 3, "got {diagnostics:?}");
}
