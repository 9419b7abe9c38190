//! Runtime expression checking and lowering.
//!
//! Each checked expression yields its lowered IR node together with its
//! resolved type. String literals carry the transient `string` type: they
//! lower to an address into the static segment and may be passed where a
//! built-in expects an `int`, but can never be stored.

use klang_diagnostic::ErrorKind;
use klang_ir::ast::{Expr, ExprKind};
use klang_ir::{ArrayRef, Constant, IrExpr, Primitive, Type};

use crate::binop;
use crate::builtins::HostExport;
use crate::scope::{Binding, ScopeId};

use super::{Resolved, Validator};

impl Validator<'_> {
    /// Check and lower one expression. Errors are accumulated and `None`
    /// returned on failure.
    pub(crate) fn expr(&mut self, scope: ScopeId, expr: &Expr) -> Option<(IrExpr, Type)> {
        match &expr.kind {
            ExprKind::Int(v) => Some((
                IrExpr::Const(Constant::Int32(*v)),
                Type::Primitive(Primitive::Int32),
            )),
            ExprKind::Float(v) => Some((
                IrExpr::Const(Constant::Float32(*v)),
                Type::Primitive(Primitive::Float32),
            )),
            ExprKind::Str(s) => {
                if s.len() > crate::data::MAX_STRING_LEN {
                    self.err(ErrorKind::StringTooLong { len: s.len() }, expr.span);
                    return None;
                }
                let offset = self.data.string(s);
                Some((IrExpr::StaticString { offset }, Type::String))
            }
            ExprKind::Array(_) => {
                self.err(ErrorKind::ArrayLiteralUnsupported, expr.span);
                None
            }
            ExprKind::Ident(name) => self.ident(scope, name, expr),
            ExprKind::Index { base, index } => {
                let (array, index) = self.array_index(scope, base, index)?;
                let elem = array.elem;
                Some((
                    IrExpr::ItemGet {
                        array,
                        index: Box::new(index),
                    },
                    Type::Primitive(elem),
                ))
            }
            ExprKind::Call { callee, args } => self.call(scope, callee, args, expr),
            ExprKind::Binary { op, lhs, rhs } => {
                let lhs_out = self.expr(scope, lhs);
                let rhs_out = self.expr(scope, rhs);
                let ((lhs_ir, lhs_ty), (rhs_ir, rhs_ty)) = (lhs_out?, rhs_out?);
                let kind = match (&lhs_ty, &rhs_ty) {
                    (Type::Primitive(l), Type::Primitive(r)) => binop::resolve(*op, *l, *r),
                    _ => None,
                };
                let Some(kind) = kind else {
                    self.err(
                        ErrorKind::InvalidBinaryOp {
                            op: *op,
                            lhs: lhs_ty,
                            rhs: rhs_ty,
                        },
                        expr.span,
                    );
                    return None;
                };
                Some((
                    IrExpr::Binary {
                        op: kind,
                        lhs: Box::new(lhs_ir),
                        rhs: Box::new(rhs_ir),
                    },
                    Type::Primitive(kind.result()),
                ))
            }
            ExprKind::Cond {
                cond,
                then,
                otherwise,
            } => self.cond(scope, cond, then, otherwise, expr),
        }
    }

    /// Check an expression against an expected primitive type.
    pub(crate) fn expr_expecting(
        &mut self,
        scope: ScopeId,
        expr: &Expr,
        expected: Primitive,
    ) -> Option<IrExpr> {
        let (ir, ty) = self.expr(scope, expr)?;
        if ty != Type::Primitive(expected) {
            self.err(
                ErrorKind::TypeMismatch {
                    expected: Type::Primitive(expected),
                    actual: ty,
                },
                expr.span,
            );
            return None;
        }
        Some(ir)
    }

    fn ident(&mut self, scope: ScopeId, name: &str, expr: &Expr) -> Option<(IrExpr, Type)> {
        match self.lookup(scope, name) {
            Resolved::Binding(Binding::Local { index, ty, .. }) => {
                Some((IrExpr::LocalGet { index, ty }, Type::Primitive(ty)))
            }
            Resolved::Binding(Binding::Global { ty, .. }) => Some((
                IrExpr::GlobalGet {
                    name: name.to_string(),
                    ty,
                },
                Type::Primitive(ty),
            )),
            Resolved::Binding(Binding::ParamCell(array)) => Some((
                IrExpr::ItemGet {
                    array: ArrayRef {
                        offset: array.offset,
                        elem: array.elem,
                    },
                    index: Box::new(IrExpr::Const(Constant::Int32(0))),
                },
                Type::Primitive(array.elem),
            )),
            // An array in value position is its base address; only
            // indexing and error reporting ever consume this.
            Resolved::Binding(Binding::Array(array)) => Some((
                IrExpr::Const(Constant::Int32(array.offset as i32)),
                Type::Array(array),
            )),
            Resolved::Binding(binding @ Binding::Function { .. }) => Some((
                IrExpr::Const(Constant::Int32(0)),
                Self::binding_type(&binding),
            )),
            Resolved::Import { export, .. } => match export {
                HostExport::Constant(value) => {
                    Some((IrExpr::Const(value), Type::Primitive(value.ty())))
                }
                HostExport::Function(_) => Some((
                    IrExpr::Const(Constant::Int32(0)),
                    Self::export_type(&export),
                )),
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

    /// Resolve an indexing expression to the array's storage plus the
    /// lowered index. Only identifiers naming an array may be indexed.
    pub(crate) fn array_index(
        &mut self,
        scope: ScopeId,
        base: &Expr,
        index: &Expr,
    ) -> Option<(ArrayRef, IrExpr)> {
        let array = match &base.kind {
            ExprKind::Ident(name) => match self.lookup(scope, name) {
                Resolved::Binding(Binding::Array(array)) => array,
                Resolved::Binding(binding) => {
                    self.err(
                        ErrorKind::NotIndexable {
                            actual: Self::binding_type(&binding),
                        },
                        base.span,
                    );
                    return None;
                }
                Resolved::Import { export, .. } => {
                    self.err(
                        ErrorKind::NotIndexable {
                            actual: Self::export_type(&export),
                        },
                        base.span,
                    );
                    return None;
                }
                Resolved::Ambiguous(modules) => {
                    self.err(
                        ErrorKind::AmbiguousName {
                            name: name.to_string(),
                            modules,
                        },
                        base.span,
                    );
                    return None;
                }
                Resolved::NotFound => {
                    self.err(
                        ErrorKind::NotDeclared {
                            name: name.to_string(),
                        },
                        base.span,
                    );
                    return None;
                }
            },
            _ => {
                let (_, ty) = self.expr(scope, base)?;
                self.err(ErrorKind::NotIndexable { actual: ty }, base.span);
                return None;
            }
        };
        let (index_ir, index_ty) = self.expr(scope, index)?;
        if index_ty != Type::Primitive(Primitive::Int32) {
            self.err(ErrorKind::IndexNotInt { actual: index_ty }, index.span);
            return None;
        }
        Some((
            ArrayRef {
                offset: array.offset,
                elem: array.elem,
            },
            index_ir,
        ))
    }

    fn call(
        &mut self,
        scope: ScopeId,
        callee: &Expr,
        args: &[Expr],
        expr: &Expr,
    ) -> Option<(IrExpr, Type)> {
        let ExprKind::Ident(name) = &callee.kind else {
            let (_, ty) = self.expr(scope, callee)?;
            self.err(ErrorKind::NotCallable { actual: ty }, callee.span);
            return None;
        };
        match self.lookup(scope, name) {
            Resolved::Binding(Binding::Function { index, sig }) => {
                let args = self.call_args(scope, name, &sig.params, args, expr)?;
                Some((
                    IrExpr::CallFunction {
                        index,
                        args,
                        ret: sig.ret,
                    },
                    Type::Primitive(sig.ret),
                ))
            }
            Resolved::Import {
                module,
                name: base,
                export,
            } => match export {
                HostExport::Function(f) => {
                    let args = self.call_args(scope, name, &f.params, args, expr)?;
                    if let Some(op) = f.intrinsic {
                        // Intrinsics are unary; arity was checked above.
                        let Some(arg) = args.into_iter().next() else {
                            unreachable!("intrinsic `{name}` with no argument");
                        };
                        Some((
                            IrExpr::Intrinsic {
                                op,
                                arg: Box::new(arg),
                            },
                            Type::Primitive(op.result()),
                        ))
                    } else {
                        let index = self.import_index(&module, &base, &f.params, f.ret);
                        Some((
                            IrExpr::CallImport {
                                index,
                                args,
                                ret: f.ret,
                            },
                            Type::Primitive(f.ret),
                        ))
                    }
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

    /// Check a call's arguments against the declared parameter list.
    /// Arity and per-position type errors are all reported before giving
    /// up on the call.
    fn call_args(
        &mut self,
        scope: ScopeId,
        name: &str,
        params: &[Primitive],
        args: &[Expr],
        expr: &Expr,
    ) -> Option<Vec<IrExpr>> {
        let mut ok = args.len() == params.len();
        if args.len() < params.len() {
            self.err(
                ErrorKind::TooFewArguments {
                    name: name.to_string(),
                    expected: params.len(),
                    given: args.len(),
                },
                expr.span,
            );
        } else if args.len() > params.len() {
            self.err(
                ErrorKind::TooManyArguments {
                    name: name.to_string(),
                    expected: params.len(),
                    given: args.len(),
                },
                expr.span,
            );
        }
        let mut lowered = Vec::with_capacity(args.len());
        for (index, (arg, &param)) in args.iter().zip(params).enumerate() {
            let Some((ir, ty)) = self.expr(scope, arg) else {
                ok = false;
                continue;
            };
            if !argument_compatible(param, &ty) {
                self.err(
                    ErrorKind::ArgumentTypeMismatch {
                        name: name.to_string(),
                        index,
                        expected: Type::Primitive(param),
                        actual: ty,
                    },
                    arg.span,
                );
                ok = false;
                continue;
            }
            lowered.push(ir);
        }
        ok.then_some(lowered)
    }

    fn cond(
        &mut self,
        scope: ScopeId,
        cond: &Expr,
        then: &Expr,
        otherwise: &Expr,
        expr: &Expr,
    ) -> Option<(IrExpr, Type)> {
        let cond_out = self.expr(scope, cond);
        let then_out = self.expr(scope, then);
        let otherwise_out = self.expr(scope, otherwise);
        let ((cond_ir, cond_ty), (then_ir, then_ty), (otherwise_ir, otherwise_ty)) =
            (cond_out?, then_out?, otherwise_out?);
        if cond_ty != Type::Primitive(Primitive::Bool) {
            self.err(ErrorKind::ConditionNotBool { actual: cond_ty }, cond.span);
            return None;
        }
        if then_ty != otherwise_ty {
            self.err(
                ErrorKind::BranchTypeMismatch {
                    then: then_ty,
                    otherwise: otherwise_ty,
                },
                expr.span,
            );
            return None;
        }
        // Both branches are evaluated; `select` picks one value.
        let select_ty = match &then_ty {
            Type::Primitive(p) if *p != Primitive::Void => *p,
            Type::String => Primitive::Int32,
            _ => {
                self.err(ErrorKind::BranchNotValue { actual: then_ty }, expr.span);
                return None;
            }
        };
        Some((
            IrExpr::Select {
                cond: Box::new(cond_ir),
                then: Box::new(then_ir),
                otherwise: Box::new(otherwise_ir),
                ty: select_ty,
            },
            then_ty,
        ))
    }
}

/// Exact type equality, with one carve-out: a string literal lowers to an
/// `int` address and is accepted where a built-in declares `int`.
fn argument_compatible(expected: Primitive, actual: &Type) -> bool {
    match actual {
        Type::Primitive(p) => *p == expected,
        Type::String => expected == Primitive::Int32,
        _ => false,
    }
}
