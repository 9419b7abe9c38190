//! The Klang compiler pipeline.
//!
//! Glues the stages together: parse source text, validate and lower it,
//! then emit a WebAssembly binary. This is the crate embedders depend on;
//! the stage crates stay independent.
//!
//! ```
//! let compiled = klang_compiler::compile(
//!     "void process() { loop { out_0[i] = in_0[i]; } }",
//!     &klang_compiler::CompileOptions::default(),
//! );
//! assert!(compiled.is_ok());
//! ```

use klang_validate::builtins::ModuleRegistry;
use klang_validate::ValidateOptions;
use thiserror::Error;
use tracing::debug;

pub use klang_diagnostic::{Diagnostic, Reporter};
pub use klang_ir::ParamInfo;
pub use klang_parse::ParseError;

/// Host-side compilation knobs. The defaults match the audio-worklet
/// runtime: 128-sample render quanta on stereo channels.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct CompileOptions {
    /// Channel-array length and fixed loop iteration count.
    pub sample_count: u32,
    pub in_channels: u32,
    pub out_channels: u32,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            sample_count: 128,
            in_channels: 2,
            out_channels: 2,
        }
    }
}

impl CompileOptions {
    fn validate_options(&self) -> ValidateOptions {
        ValidateOptions {
            sample_count: self.sample_count,
            in_channels: self.in_channels,
            out_channels: self.out_channels,
        }
    }
}

/// A successful compilation: the binary plus the layout metadata the
/// audio runtime reads without instantiating the module.
#[derive(Clone, PartialEq, Debug)]
pub struct CompiledModule {
    /// The WebAssembly binary, ready to instantiate.
    pub bytes: Vec<u8>,
    /// Runtime-facing metadata for each `param` declaration, in source
    /// order. Mirrors the param-info structs in the binary's data segment.
    pub params: Vec<ParamInfo>,
    pub sample_count: u32,
    /// Absolute byte offset of the static data segment in linear memory.
    pub static_data_offset: u32,
    pub static_data_len: u32,
    /// Absolute offset of the first param-info struct; `None` when the
    /// module declares no parameters.
    pub param_info_offset: Option<u32>,
}

#[derive(Clone, PartialEq, Error, Debug)]
pub enum CompileError {
    /// The source did not parse; nothing was validated.
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// The source parsed but failed validation.
    #[error("validation failed with {} diagnostic(s)", .diagnostics.len())]
    Invalid { diagnostics: Vec<Diagnostic> },
}

impl CompileError {
    /// Every failure as external diagnostics, resolved against `source`.
    pub fn diagnostics(&self, source: &str) -> Vec<Diagnostic> {
        match self {
            CompileError::Parse(error) => vec![error.to_diagnostic(source)],
            CompileError::Invalid { diagnostics } => diagnostics.clone(),
        }
    }
}

/// Compile Klang source to a WebAssembly module.
pub fn compile(source: &str, options: &CompileOptions) -> Result<CompiledModule, CompileError> {
    let registry = ModuleRegistry::with_builtins();
    compile_with_registry(source, options, &registry)
}

/// Compile against a caller-supplied registry of host modules. Embedders
/// that extend the built-in set go through this entry point.
pub fn compile_with_registry(
    source: &str,
    options: &CompileOptions,
    registry: &ModuleRegistry,
) -> Result<CompiledModule, CompileError> {
    let module = klang_parse::parse(source)?;
    let validation = klang_validate::validate(&module, registry, &options.validate_options());
    if !validation.errors.is_empty() {
        return Err(CompileError::Invalid {
            diagnostics: validation
                .errors
                .iter()
                .map(|e| e.to_diagnostic(source))
                .collect(),
        });
    }
    let validated = validation.module;
    let bytes = klang_codegen::generate(&validated);
    debug!(
        bytes = bytes.len(),
        params = validated.params.len(),
        "compiled module"
    );
    Ok(CompiledModule {
        bytes,
        params: validated.params,
        sample_count: validated.sample_count,
        static_data_offset: validated.static_data_offset,
        static_data_len: validated.static_data.len() as u32,
        param_info_offset: validated.param_info_offset,
    })
}

#[cfg(test)]
mod tests;
