//! Every semantic error the validator can produce.
//!
//! One closed enum, one variant per error kind, each carrying the
//! structured payload its message needs. Formatting lives in
//! [`ErrorKind::message`] so storage stays decoupled from presentation.

use klang_ir::ast::BinaryOp;
use klang_ir::{Span, Type};

use crate::diagnostic::{Diagnostic, Range};

/// The kind and payload of one semantic error.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum ErrorKind {
    // Name resolution
    AlreadyDeclared { name: String },
    NotDeclared { name: String },
    AmbiguousName { name: String, modules: Vec<String> },
    ImportedModuleNotFound { module: String },

    // Types
    TypeMismatch { expected: Type, actual: Type },
    InvalidBinaryOp { op: BinaryOp, lhs: Type, rhs: Type },
    ConditionNotBool { actual: Type },
    BranchTypeMismatch { then: Type, otherwise: Type },
    BranchNotValue { actual: Type },
    VoidVariable { name: String },
    StringNotStorable,
    StringTooLong { len: usize },

    // Calls
    NotCallable { actual: Type },
    TooFewArguments { name: String, expected: usize, given: usize },
    TooManyArguments { name: String, expected: usize, given: usize },
    ArgumentTypeMismatch {
        name: String,
        index: usize,
        expected: Type,
        actual: Type,
    },

    // Returns
    ReturnTypeMismatch { expected: Type, actual: Type },
    ReturnValueFromVoid,
    MissingReturnValue { expected: Type },
    MissingReturn { name: String },

    // Arrays
    ArrayNotGlobal,
    ArrayInitializer,
    MutableArray,
    ArrayLiteralUnsupported,
    NotIndexable { actual: Type },
    IndexNotInt { actual: Type },

    // Assignment
    AssignToConstant { name: String },
    AssignToReadonly { name: String },
    InvalidAssignTarget,

    // Scope restrictions
    StatementNotAllowedAtGlobal { what: &'static str },
    NestedFunction,
    ParamNotGlobal,
    ArrayInSignature,

    // Compile-time evaluation
    NotCompileTimeConstant,
    MutableGlobalInConstant { name: String },
    ArrayReadInConstant,
    CallNotConstEvaluable { name: String },
    RemainderByZeroInConstant,

    // Parameters
    ParamTypeInvalid { ty: String },
    ParamMissingFields { names: Vec<String> },
    ParamUnknownField { name: String },
    ParamFieldType { name: String, expected: Type, actual: Type },
}

impl ErrorKind {
    /// Format the user-facing message for this error.
    pub fn message(&self) -> String {
        match self {
            ErrorKind::AlreadyDeclared { name } => {
                format!("name `{name}` is already declared in this scope")
            }
            ErrorKind::NotDeclared { name } => format!("name `{name}` is not declared"),
            ErrorKind::AmbiguousName { name, modules } => format!(
                "name `{name}` is ambiguous: exported by modules {}",
                modules
                    .iter()
                    .map(|m| format!("`{m}`"))
                    .collect::<Vec<_>>()
                    .join(" and ")
            ),
            ErrorKind::ImportedModuleNotFound { module } => {
                format!("imported module `{module}` not found")
            }
            ErrorKind::TypeMismatch { expected, actual } => {
                format!("type mismatch: expected `{expected}`, found `{actual}`")
            }
            ErrorKind::InvalidBinaryOp { op, lhs, rhs } => {
                format!("operator `{op}` is not defined for `{lhs}` and `{rhs}`")
            }
            ErrorKind::ConditionNotBool { actual } => {
                format!("condition must be `bool`, found `{actual}`")
            }
            ErrorKind::BranchTypeMismatch { then, otherwise } => format!(
                "conditional branches have mismatched types: `{then}` and `{otherwise}`"
            ),
            ErrorKind::BranchNotValue { actual } => format!(
                "conditional branches must produce a value, found `{actual}`"
            ),
            ErrorKind::VoidVariable { name } => {
                format!("variable `{name}` cannot have type `void`")
            }
            ErrorKind::StringNotStorable => {
                "a string cannot be stored in a variable".to_string()
            }
            ErrorKind::StringTooLong { len } => {
                format!("string literal is {len} bytes; the limit is 255")
            }
            ErrorKind::NotCallable { actual } => {
                format!("expression of type `{actual}` is not callable")
            }
            ErrorKind::TooFewArguments {
                name,
                expected,
                given,
            } => format!(
                "too few arguments to `{name}`: expected {expected}, got {given}"
            ),
            ErrorKind::TooManyArguments {
                name,
                expected,
                given,
            } => format!(
                "too many arguments to `{name}`: expected {expected}, got {given}"
            ),
            ErrorKind::ArgumentTypeMismatch {
                name,
                index,
                expected,
                actual,
            } => format!(
                "argument {} to `{name}` has type `{actual}`, expected `{expected}`",
                index + 1
            ),
            ErrorKind::ReturnTypeMismatch { expected, actual } => {
                format!("return type mismatch: expected `{expected}`, found `{actual}`")
            }
            ErrorKind::ReturnValueFromVoid => {
                "cannot return a value from a `void` function".to_string()
            }
            ErrorKind::MissingReturnValue { expected } => {
                format!("`return` without a value in a function returning `{expected}`")
            }
            ErrorKind::MissingReturn { name } => {
                format!("function `{name}` must return a value")
            }
            ErrorKind::ArrayNotGlobal => {
                "arrays can only be declared at global scope".to_string()
            }
            ErrorKind::ArrayInitializer => {
                "an array declaration cannot have an initializer".to_string()
            }
            ErrorKind::MutableArray => {
                "an array cannot be declared with `var`".to_string()
            }
            ErrorKind::ArrayLiteralUnsupported => {
                "array literals are not supported".to_string()
            }
            ErrorKind::NotIndexable { actual } => {
                format!("expression of type `{actual}` cannot be indexed")
            }
            ErrorKind::IndexNotInt { actual } => {
                format!("array index must be `int`, found `{actual}`")
            }
            ErrorKind::AssignToConstant { name } => {
                format!("cannot assign to constant `{name}`")
            }
            ErrorKind::AssignToReadonly { name } => {
                format!("cannot assign to read-only loop variable `{name}`")
            }
            ErrorKind::InvalidAssignTarget => {
                "assignment target must be a variable or an array element".to_string()
            }
            ErrorKind::StatementNotAllowedAtGlobal { what } => {
                format!("{what} is not allowed at global scope")
            }
            ErrorKind::NestedFunction => {
                "function declarations are only allowed at global scope".to_string()
            }
            ErrorKind::ParamNotGlobal => {
                "parameter declarations are only allowed at global scope".to_string()
            }
            ErrorKind::ArrayInSignature => {
                "function parameters and return types cannot be arrays".to_string()
            }
            ErrorKind::NotCompileTimeConstant => {
                "expression is not evaluable at compile time".to_string()
            }
            ErrorKind::MutableGlobalInConstant { name } => format!(
                "mutable global `{name}` cannot be used in a compile-time expression"
            ),
            ErrorKind::ArrayReadInConstant => {
                "array elements cannot be read in a compile-time expression".to_string()
            }
            ErrorKind::CallNotConstEvaluable { name } => {
                format!("function `{name}` cannot be called in a compile-time expression")
            }
            ErrorKind::RemainderByZeroInConstant => {
                "remainder by zero in a compile-time expression".to_string()
            }
            ErrorKind::ParamTypeInvalid { ty } => format!(
                "parameter type must be numeric, found `{ty}`"
            ),
            ErrorKind::ParamMissingFields { names } => format!(
                "parameter declaration is missing {}",
                names
                    .iter()
                    .map(|n| format!("`{n}`"))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            ErrorKind::ParamUnknownField { name } => {
                format!("unknown parameter field `{name}`")
            }
            ErrorKind::ParamFieldType {
                name,
                expected,
                actual,
            } => {
                format!("parameter field `{name}` must be `{expected}`, found `{actual}`")
            }
        }
    }
}

/// A semantic error pinned to a source span.
///
/// The span is `None` for errors that have no user-source anchor.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct SemanticError {
    pub kind: ErrorKind,
    pub span: Option<Span>,
}

impl SemanticError {
    pub fn new(kind: ErrorKind, span: Span) -> Self {
        SemanticError {
            kind,
            span: Some(span),
        }
    }

    pub fn unpositioned(kind: ErrorKind) -> Self {
        SemanticError { kind, span: None }
    }

    /// Resolve into the external diagnostic shape.
    pub fn to_diagnostic(&self, source: &str) -> Diagnostic {
        Diagnostic::new(
            self.span.map(|s| Range::from_span(source, s)),
            self.kind.message(),
        )
    }
}

#[cfg(test)]
mod tests {
    use klang_ir::Primitive;

    use super::*;

    #[test]
    fn test_message_formatting() {
        let kind = ErrorKind::TypeMismatch {
            expected: Type::Primitive(Primitive::Int32),
            actual: Type::Primitive(Primitive::Float32),
        };
        assert_eq!(kind.message(), "type mismatch: expected `int`, found `float`");
    }

    #[test]
    fn test_ambiguous_name_lists_modules() {
        let kind = ErrorKind::AmbiguousName {
            name: "foo".to_string(),
            modules: vec!["math".to_string(), "util".to_string()],
        };
        let msg = kind.message();
        assert!(msg.contains("`math`"));
        assert!(msg.contains("`util`"));
    }

    #[test]
    fn test_missing_fields_lists_names() {
        let kind = ErrorKind::ParamMissingFields {
            names: vec!["minValue".to_string(), "maxValue".to_string()],
        };
        let msg = kind.message();
        assert!(msg.contains("`minValue`"));
        assert!(msg.contains("`maxValue`"));
    }

    #[test]
    fn test_to_diagnostic_resolves_range() {
        let src = "int a = 0;";
        let err = SemanticError::new(
            ErrorKind::AlreadyDeclared {
                name: "a".to_string(),
            },
            Span::new(4, 5),
        );
        let diag = err.to_diagnostic(src);
        let Some(range) = diag.range else {
            panic!("expected a range");
        };
        assert_eq!(range.start.row, 0);
        assert_eq!(range.start.character, 4);
        assert!(diag.message.contains("already declared"));
    }

    #[test]
    fn test_unpositioned_has_no_range() {
        let err = SemanticError::unpositioned(ErrorKind::ImportedModuleNotFound {
            module: "dsp".to_string(),
        });
        let diag = err.to_diagnostic("");
        assert_eq!(diag.range, None);
    }
}
