//! Function bodies: statement checking and lowering.

use klang_diagnostic::ErrorKind;
use klang_ir::ast::{self, ExprKind, PrimitiveName, Stmt, StmtKind};
use klang_ir::{
    BinOpKind, Constant, FunctionType, IrExpr, IrStmt, LoopStmt, Primitive, Span, Type,
};

use crate::scope::{Binding, ScopeId};

use super::{primitive, zero, Resolved, Validator};

impl Validator<'_> {
    pub(crate) fn function(&mut self, decl: &ast::FunctionDecl) {
        let ret = match decl.return_type.kind {
            ast::TypeExprKind::Primitive(name) => primitive(name),
            ast::TypeExprKind::Array(_) => {
                self.err(ErrorKind::ArrayInSignature, decl.return_type.span);
                Primitive::Void
            }
        };

        let mut params = Vec::with_capacity(decl.params.len());
        for sig in &decl.params {
            let ty = match sig.ty.kind {
                ast::TypeExprKind::Primitive(PrimitiveName::Void) => {
                    self.err(
                        ErrorKind::VoidVariable {
                            name: sig.name.name.clone(),
                        },
                        sig.name.span,
                    );
                    Primitive::Int32
                }
                ast::TypeExprKind::Primitive(name) => primitive(name),
                ast::TypeExprKind::Array(_) => {
                    self.err(ErrorKind::ArrayInSignature, sig.ty.span);
                    Primitive::Int32
                }
            };
            params.push(ty);
        }

        // Bound before the body so recursive calls resolve.
        let index = self.next_function_index();
        let sig = FunctionType {
            params: params.clone(),
            ret,
        };
        self.declare_in(
            self.scopes.global(),
            &decl.name,
            Binding::Function { index, sig },
        );

        let scope = self
            .scopes
            .push_function(self.scopes.global(), ret, params.len() as u32);
        for (slot, (sig, ty)) in decl.params.iter().zip(&params).enumerate() {
            self.declare_in(
                scope,
                &sig.name,
                Binding::Local {
                    index: slot as u32,
                    ty: *ty,
                    mutable: true,
                    loop_var: false,
                },
            );
        }

        let mut body = Vec::new();
        for stmt in &decl.body {
            self.stmt(scope, stmt, &mut body);
        }

        let (return_covered, locals) = {
            let Some(frame) = self.scopes.frame(scope) else {
                unreachable!("function scope without a frame");
            };
            (frame.return_covered, frame.extra_locals.clone())
        };
        if ret != Primitive::Void && !return_covered {
            self.err(
                ErrorKind::MissingReturn {
                    name: decl.name.name.clone(),
                },
                decl.name.span,
            );
        }
        self.push_function_decl(klang_ir::FunctionDecl {
            name: decl.name.name.clone(),
            params,
            ret,
            locals,
            body,
            export: true,
        });
    }

    fn stmt(&mut self, scope: ScopeId, stmt: &Stmt, out: &mut Vec<IrStmt>) {
        match &stmt.kind {
            StmtKind::Comment(_) => {}
            StmtKind::Variable(decl) => self.local_variable(scope, decl, out),
            StmtKind::Function(_) => self.err(ErrorKind::NestedFunction, stmt.span),
            StmtKind::Param(_) => self.err(ErrorKind::ParamNotGlobal, stmt.span),
            StmtKind::Assign(assign) => self.assign(scope, assign, out),
            StmtKind::Call(expr) => {
                let Some((ir, ty)) = self.expr(scope, expr) else {
                    return;
                };
                // Statement position admits only void calls; a discarded
                // value would unbalance the stack.
                if ty != Type::Primitive(Primitive::Void) {
                    self.err(
                        ErrorKind::TypeMismatch {
                            expected: Type::Primitive(Primitive::Void),
                            actual: ty,
                        },
                        expr.span,
                    );
                    return;
                }
                out.push(IrStmt::Call(ir));
            }
            StmtKind::Loop(body) => self.loop_stmt(scope, body, out),
            StmtKind::Return(value) => self.return_stmt(scope, value.as_ref(), stmt.span, out),
        }
    }

    fn local_variable(&mut self, scope: ScopeId, decl: &ast::VariableDecl, out: &mut Vec<IrStmt>) {
        let ty = match decl.ty.kind {
            ast::TypeExprKind::Array(_) => {
                self.err(ErrorKind::ArrayNotGlobal, decl.ty.span);
                return;
            }
            ast::TypeExprKind::Primitive(PrimitiveName::Void) => {
                self.err(
                    ErrorKind::VoidVariable {
                        name: decl.name.name.clone(),
                    },
                    decl.name.span,
                );
                return;
            }
            ast::TypeExprKind::Primitive(name) => primitive(name),
        };
        let value = match &decl.init {
            Some(expr) => self
                .expr_expecting(scope, expr, ty)
                .unwrap_or(IrExpr::Const(zero(ty))),
            None => IrExpr::Const(zero(ty)),
        };
        let index = self.scopes.alloc_local(scope, ty);
        self.declare_in(
            scope,
            &decl.name,
            Binding::Local {
                index,
                ty,
                mutable: decl.mutable,
                loop_var: false,
            },
        );
        out.push(IrStmt::LocalSet { index, value });
    }

    fn assign(&mut self, scope: ScopeId, assign: &ast::Assign, out: &mut Vec<IrStmt>) {
        match &assign.target.kind {
            ExprKind::Ident(name) => match self.lookup(scope, name) {
                Resolved::Binding(Binding::Local {
                    index,
                    ty,
                    mutable,
                    loop_var,
                }) => {
                    let value = self.expr_expecting(scope, &assign.value, ty);
                    if loop_var {
                        self.err(
                            ErrorKind::AssignToReadonly {
                                name: name.to_string(),
                            },
                            assign.target.span,
                        );
                        return;
                    }
                    if !mutable {
                        self.err(
                            ErrorKind::AssignToConstant {
                                name: name.to_string(),
                            },
                            assign.target.span,
                        );
                        return;
                    }
                    let Some(value) = value else { return };
                    out.push(IrStmt::LocalSet { index, value });
                }
                Resolved::Binding(Binding::Global { ty, mutable, .. }) => {
                    let value = self.expr_expecting(scope, &assign.value, ty);
                    if !mutable {
                        self.err(
                            ErrorKind::AssignToConstant {
                                name: name.to_string(),
                            },
                            assign.target.span,
                        );
                        return;
                    }
                    let Some(value) = value else { return };
                    out.push(IrStmt::GlobalSet {
                        name: name.to_string(),
                        value,
                    });
                }
                Resolved::Binding(Binding::ParamCell(array)) => {
                    let Some(value) = self.expr_expecting(scope, &assign.value, array.elem) else {
                        return;
                    };
                    out.push(IrStmt::ItemSet {
                        array: klang_ir::ArrayRef {
                            offset: array.offset,
                            elem: array.elem,
                        },
                        index: IrExpr::Const(Constant::Int32(0)),
                        value,
                    });
                }
                Resolved::Binding(Binding::Array(_) | Binding::Function { .. })
                | Resolved::Import { .. } => {
                    self.err(ErrorKind::InvalidAssignTarget, assign.target.span);
                }
                Resolved::Ambiguous(modules) => {
                    self.err(
                        ErrorKind::AmbiguousName {
                            name: name.to_string(),
                            modules,
                        },
                        assign.target.span,
                    );
                }
                Resolved::NotFound => {
                    self.err(
                        ErrorKind::NotDeclared {
                            name: name.to_string(),
                        },
                        assign.target.span,
                    );
                }
            },
            ExprKind::Index { base, index } => {
                let target = self.array_index(scope, base, index);
                let Some((array, index)) = target else { return };
                let Some(value) = self.expr_expecting(scope, &assign.value, array.elem) else {
                    return;
                };
                out.push(IrStmt::ItemSet {
                    array,
                    index,
                    value,
                });
            }
            _ => {
                self.err(ErrorKind::InvalidAssignTarget, assign.target.span);
            }
        }
    }

    /// Desugar `loop { body }` into counter initialization, the checked
    /// body with read-only `i`/`length` in scope, and the increment, all
    /// bounded by the module's fixed sample count.
    fn loop_stmt(&mut self, scope: ScopeId, body: &[Stmt], out: &mut Vec<IrStmt>) {
        let counter = self.scopes.alloc_local(scope, Primitive::Int32);
        let length = self.scopes.alloc_local(scope, Primitive::Int32);
        out.push(IrStmt::LocalSet {
            index: counter,
            value: IrExpr::Const(Constant::Int32(0)),
        });
        out.push(IrStmt::LocalSet {
            index: length,
            value: IrExpr::Const(Constant::Int32(self.options.sample_count as i32)),
        });

        let inner = self.scopes.push_block(scope);
        for (name, index) in [("i", counter), ("length", length)] {
            // A fresh block scope; these cannot conflict.
            let _ = self.scopes.declare(
                inner,
                name,
                Binding::Local {
                    index,
                    ty: Primitive::Int32,
                    mutable: false,
                    loop_var: true,
                },
            );
        }

        let mut ir_body = Vec::new();
        for stmt in body {
            self.stmt(inner, stmt, &mut ir_body);
        }
        ir_body.push(IrStmt::LocalSet {
            index: counter,
            value: IrExpr::Binary {
                op: BinOpKind::Int32Add,
                lhs: Box::new(IrExpr::LocalGet {
                    index: counter,
                    ty: Primitive::Int32,
                }),
                rhs: Box::new(IrExpr::Const(Constant::Int32(1))),
            },
        });
        out.push(IrStmt::Loop(LoopStmt {
            counter,
            length,
            body: ir_body,
        }));
    }

    fn return_stmt(
        &mut self,
        scope: ScopeId,
        value: Option<&ast::Expr>,
        span: Span,
        out: &mut Vec<IrStmt>,
    ) {
        let Some(frame) = self.scopes.frame(scope) else {
            unreachable!("return statement outside a function");
        };
        let ret = frame.ret;
        self.scopes.mark_return_covered(scope);
        match (ret, value) {
            (Primitive::Void, None) => out.push(IrStmt::Return(None)),
            (Primitive::Void, Some(expr)) => {
                // Check the expression anyway for error coverage.
                let _ = self.expr(scope, expr);
                self.err(ErrorKind::ReturnValueFromVoid, span);
            }
            (_, None) => {
                self.err(
                    ErrorKind::MissingReturnValue {
                        expected: Type::Primitive(ret),
                    },
                    span,
                );
            }
            (_, Some(expr)) => {
                let Some((ir, ty)) = self.expr(scope, expr) else {
                    return;
                };
                if ty != Type::Primitive(ret) {
                    self.err(
                        ErrorKind::ReturnTypeMismatch {
                            expected: Type::Primitive(ret),
                            actual: ty,
                        },
                        expr.span,
                    );
                    return;
                }
                out.push(IrStmt::Return(Some(ir)));
            }
        }
    }
}
