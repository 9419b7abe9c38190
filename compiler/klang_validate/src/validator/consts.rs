//! Compile-time expression evaluation.
//!
//! Global constant initializers and `param` option fields are folded
//! here, against literal and constant operands only. Mutable globals,
//! array reads, and calls outside the foldable built-in whitelist are
//! all errors in this context.

use klang_diagnostic::ErrorKind;
use klang_ir::ast::{Expr, ExprKind};
use klang_ir::{Constant, Primitive, Span, Type};

use crate::binop::{self, FoldError};
use crate::builtins::{BuiltinFn, HostExport};
use crate::scope::Binding;

use super::{Resolved, Validator};

impl Validator<'_> {
    /// Fold a compile-time expression to a constant. Errors are
    /// accumulated and `None` returned on failure.
    pub(crate) fn eval_const(&mut self, expr: &Expr) -> Option<Constant> {
        match &expr.kind {
            ExprKind::Int(v) => Some(Constant::Int32(*v)),
            ExprKind::Float(v) => Some(Constant::Float32(*v)),
            ExprKind::Str(_) => {
                self.err(ErrorKind::StringNotStorable, expr.span);
                None
            }
            ExprKind::Array(_) => {
                self.err(ErrorKind::ArrayLiteralUnsupported, expr.span);
                None
            }
            ExprKind::Ident(name) => self.const_ident(name, expr),
            ExprKind::Index { .. } => {
                self.err(ErrorKind::ArrayReadInConstant, expr.span);
                None
            }
            ExprKind::Call { callee, args } => self.const_call(callee, args, expr),
            ExprKind::Binary { op, lhs, rhs } => {
                // Evaluate both sides before giving up, for error coverage.
                let lhs_value = self.eval_const(lhs);
                let rhs_value = self.eval_const(rhs);
                let (lhs_value, rhs_value) = (lhs_value?, rhs_value?);
                let Some(kind) = binop::resolve(*op, lhs_value.ty(), rhs_value.ty()) else {
                    self.err(
                        ErrorKind::InvalidBinaryOp {
                            op: *op,
                            lhs: Type::Primitive(lhs_value.ty()),
                            rhs: Type::Primitive(rhs_value.ty()),
                        },
                        expr.span,
                    );
                    return None;
                };
                match binop::fold(kind, lhs_value, rhs_value) {
                    Ok(value) => Some(value),
                    Err(FoldError::RemainderByZero) => {
                        self.err(ErrorKind::RemainderByZeroInConstant, expr.span);
                        None
                    }
                }
            }
            ExprKind::Cond {
                cond,
                then,
                otherwise,
            } => {
                let cond_value = self.eval_const(cond)?;
                let Constant::Bool(flag) = cond_value else {
                    self.err(
                        ErrorKind::ConditionNotBool {
                            actual: Type::Primitive(cond_value.ty()),
                        },
                        cond.span,
                    );
                    return None;
                };
                // The untaken branch is type-checked but never evaluated.
                let (taken, untaken) = if flag { (then, otherwise) } else { (otherwise, then) };
                let value = self.eval_const(taken);
                let untaken_ty = self.const_type(untaken);
                let (value, untaken_ty) = (value?, untaken_ty?);
                if untaken_ty != value.ty() {
                    let (then_ty, otherwise_ty) = if flag {
                        (value.ty(), untaken_ty)
                    } else {
                        (untaken_ty, value.ty())
                    };
                    self.err(
                        ErrorKind::BranchTypeMismatch {
                            then: Type::Primitive(then_ty),
                            otherwise: Type::Primitive(otherwise_ty),
                        },
                        expr.span,
                    );
                    return None;
                }
                Some(value)
            }
        }
    }

    fn const_ident(&mut self, name: &str, expr: &Expr) -> Option<Constant> {
        match self.lookup(self.scopes.global(), name) {
            Resolved::Binding(Binding::Global { mutable: true, .. }) => {
                self.err(
                    ErrorKind::MutableGlobalInConstant {
                        name: name.to_string(),
                    },
                    expr.span,
                );
                None
            }
            // A missing value means the initializer already failed; that
            // error is on record.
            Resolved::Binding(Binding::Global { value, .. }) => value,
            Resolved::Binding(Binding::Array(_) | Binding::ParamCell(_)) => {
                self.err(ErrorKind::ArrayReadInConstant, expr.span);
                None
            }
            Resolved::Binding(Binding::Local { .. } | Binding::Function { .. }) => {
                self.err(ErrorKind::NotCompileTimeConstant, expr.span);
                None
            }
            Resolved::Import { export, .. } => match export {
                HostExport::Constant(value) => Some(value),
                HostExport::Function(_) => {
                    self.err(ErrorKind::NotCompileTimeConstant, expr.span);
                    None
                }
            },
            Resolved::Ambiguous(modules) => {
                self.err(
                    ErrorKind::AmbiguousName {
                        name: name.to_string(),
                        modules,
                    },
                    expr.span,
                );
                None
            }
            Resolved::NotFound => {
                self.err(
                    ErrorKind::NotDeclared {
                        name: name.to_string(),
                    },
                    expr.span,
                );
                None
            }
        }
    }

    fn const_call(&mut self, callee: &Expr, args: &[Expr], expr: &Expr) -> Option<Constant> {
        let (name, f) = self.const_callee(callee, expr)?;
        let values = self.const_call_args(&name, &f.params, args, expr)?;
        let Some(fold) = f.fold else {
            unreachable!("const callee resolved without a fold");
        };
        let Some(value) = fold(&values) else {
            unreachable!("fold of `{name}` rejected type-checked arguments");
        };
        Some(value)
    }

    /// Resolve the callee of a compile-time call to a foldable built-in.
    fn const_callee(&mut self, callee: &Expr, expr: &Expr) -> Option<(String, BuiltinFn)> {
        let ExprKind::Ident(name) = &callee.kind else {
            self.err(ErrorKind::NotCompileTimeConstant, callee.span);
            return None;
        };
        match self.lookup(self.scopes.global(), name) {
            Resolved::Import { export, .. } => match export {
                HostExport::Function(f) => {
                    if f.fold.is_none() {
                        self.err(
                            ErrorKind::CallNotConstEvaluable {
                                name: name.to_string(),
                            },
                            expr.span,
                        );
                        return None;
                    }
                    Some((name.to_string(), f))
                }
                HostExport::Constant(value) => {
                    self.err(
                        ErrorKind::NotCallable {
                            actual: Type::Primitive(value.ty()),
                        },
                        callee.span,
                    );
                    None
                }
            },
            Resolved::Binding(Binding::Function { .. }) => {
                self.err(
                    ErrorKind::CallNotConstEvaluable {
                        name: name.to_string(),
                    },
                    expr.span,
                );
                None
            }
            Resolved::Binding(binding) => {
                self.err(
                    ErrorKind::NotCallable {
                        actual: Self::binding_type(&binding),
                    },
                    callee.span,
                );
                None
            }
            Resolved::Ambiguous(modules) => {
                self.err(
                    ErrorKind::AmbiguousName {
                        name: name.to_string(),
                        modules,
                    },
                    callee.span,
                );
                None
            }
            Resolved::NotFound => {
                self.err(
                    ErrorKind::NotDeclared {
                        name: name.to_string(),
                    },
                    callee.span,
                );
                None
            }
        }
    }

    fn const_call_args(
        &mut self,
        name: &str,
        params: &[Primitive],
        args: &[Expr],
        expr: &Expr,
    ) -> Option<Vec<Constant>> {
        let mut ok = self.const_arity(name, params.len(), args.len(), expr.span);
        let mut values = Vec::with_capacity(args.len());
        for (index, (arg, &param)) in args.iter().zip(params).enumerate() {
            let Some(value) = self.eval_const(arg) else {
                ok = false;
                continue;
            };
            if value.ty() != param {
                self.err(
                    ErrorKind::ArgumentTypeMismatch {
                        name: name.to_string(),
                        index,
                        expected: Type::Primitive(param),
                        actual: Type::Primitive(value.ty()),
                    },
                    arg.span,
                );
                ok = false;
                continue;
            }
            values.push(value);
        }
        ok.then_some(values)
    }

    fn const_arity(&mut self, name: &str, expected: usize, given: usize, span: Span) -> bool {
        if given < expected {
            self.err(
                ErrorKind::TooFewArguments {
                    name: name.to_string(),
                    expected,
                    given,
                },
                span,
            );
            false
        } else if given > expected {
            self.err(
                ErrorKind::TooManyArguments {
                    name: name.to_string(),
                    expected,
                    given,
                },
                span,
            );
            false
        } else {
            true
        }
    }

    /// Type-check a compile-time expression without evaluating it; used
    /// for the untaken branch of a constant ternary.
    pub(crate) fn const_type(&mut self, expr: &Expr) -> Option<Primitive> {
        match &expr.kind {
            ExprKind::Binary { op, lhs, rhs } => {
                let lhs_ty = self.const_type(lhs);
                let rhs_ty = self.const_type(rhs);
                let (lhs_ty, rhs_ty) = (lhs_ty?, rhs_ty?);
                let Some(kind) = binop::resolve(*op, lhs_ty, rhs_ty) else {
                    self.err(
                        ErrorKind::InvalidBinaryOp {
                            op: *op,
                            lhs: Type::Primitive(lhs_ty),
                            rhs: Type::Primitive(rhs_ty),
                        },
                        expr.span,
                    );
                    return None;
                };
                Some(kind.result())
            }
            ExprKind::Cond {
                cond,
                then,
                otherwise,
            } => {
                let cond_ty = self.const_type(cond)?;
                if cond_ty != Primitive::Bool {
                    self.err(
                        ErrorKind::ConditionNotBool {
                            actual: Type::Primitive(cond_ty),
                        },
                        cond.span,
                    );
                    return None;
                }
                let then_ty = self.const_type(then);
                let otherwise_ty = self.const_type(otherwise);
                let (then_ty, otherwise_ty) = (then_ty?, otherwise_ty?);
                if then_ty != otherwise_ty {
                    self.err(
                        ErrorKind::BranchTypeMismatch {
                            then: Type::Primitive(then_ty),
                            otherwise: Type::Primitive(otherwise_ty),
                        },
                        expr.span,
                    );
                    return None;
                }
                Some(then_ty)
            }
            // The arguments may hold fold hazards of their own; type-check
            // them without evaluating.
            ExprKind::Call { callee, args } => {
                let (name, f) = self.const_callee(callee, expr)?;
                self.const_type_args(&name, &f.params, args, expr)
                    .then_some(f.ret)
            }
            // The remaining leaves have no evaluation hazards; reuse the
            // evaluator for them.
            _ => self.eval_const(expr).map(Constant::ty),
        }
    }

    fn const_type_args(
        &mut self,
        name: &str,
        params: &[Primitive],
        args: &[Expr],
        expr: &Expr,
    ) -> bool {
        let mut ok = self.const_arity(name, params.len(), args.len(), expr.span);
        for (index, (arg, &param)) in args.iter().zip(params).enumerate() {
            let Some(ty) = self.const_type(arg) else {
                ok = false;
                continue;
            };
            if ty != param {
                self.err(
                    ErrorKind::ArgumentTypeMismatch {
                        name: name.to_string(),
                        index,
                        expected: Type::Primitive(param),
                        actual: Type::Primitive(ty),
                    },
                    arg.span,
                );
                ok = false;
            }
        }
        ok
    }
}
