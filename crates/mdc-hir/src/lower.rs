//! AST to HIR lowering.
//!
//! A structural walk with a diagnostic sink and no other mutable state
//! beyond the scope map. Grouping nodes are folded away, the ternary
//! becomes an `If` expression, error-recovery nodes disappear (they were
//! already reported), and named call arguments are resolved against the
//! callee's declared parameters so everything downstream sees positional
//! argument lists.
//!
//! Undefined variable reads are reported here and lowered to `Empty`, which
//! keeps every later pass total.

use mdc_par::ast;
use mdc_util::diagnostic::codes;
use mdc_util::{FxHashMap, Handler, Span, Symbol};

use crate::hir::{
    HirBinOp, HirExpr, HirExprKind, HirMethod, HirParam, HirProgram, HirStmt, HirVisibility,
    TyHint, UnOp,
};

/// Lower a parsed program.
pub fn lower_program(program: &ast::Program, handler: &Handler) -> HirProgram {
    let mut ctx = LowerCtx::new(handler);
    ctx.collect_signatures(program);

    let mut hir = HirProgram::default();
    for stmt in &program.statements {
        match stmt {
            ast::Stmt::Action(def) | ast::Stmt::Interaction(def) => {
                hir.methods.push(ctx.lower_method(def));
            }
            _ => {}
        }
    }
    ctx.scope.clear();
    for stmt in &program.statements {
        if matches!(stmt, ast::Stmt::Action(_) | ast::Stmt::Interaction(_)) {
            continue;
        }
        if let Some(stmt) = ctx.lower_stmt(stmt) {
            hir.main.push(stmt);
        }
    }
    hir
}

/// A method's callable surface, used to resolve named arguments.
struct MethodSig {
    params: Vec<(Symbol, TyHint)>,
    ret_hint: TyHint,
}

struct LowerCtx<'a> {
    handler: &'a Handler,
    methods: FxHashMap<Symbol, MethodSig>,
    /// Names defined so far in the current function, with their last hint.
    scope: FxHashMap<Symbol, TyHint>,
}

impl<'a> LowerCtx<'a> {
    fn new(handler: &'a Handler) -> Self {
        Self {
            handler,
            methods: FxHashMap::default(),
            scope: FxHashMap::default(),
        }
    }

    fn collect_signatures(&mut self, program: &ast::Program) {
        for stmt in &program.statements {
            let (ast::Stmt::Action(def) | ast::Stmt::Interaction(def)) = stmt else {
                continue;
            };
            let sig = MethodSig {
                params: def
                    .params
                    .iter()
                    .map(|p| (p.name.name, hint_of_type_name(p.ty)))
                    .collect(),
                ret_hint: hint_of_type_name(def.output),
            };
            if self.methods.insert(def.name.name, sig).is_some() {
                self.handler.error(
                    codes::E_DUPLICATE_DEFINITION,
                    format!("method `{}` is defined more than once", def.name.name),
                    def.name.span(),
                );
            }
        }
    }

    fn lower_method(&mut self, def: &ast::MethodDef) -> HirMethod {
        self.scope.clear();
        let mut params = Vec::new();
        for param in &def.params {
            let hint = hint_of_type_name(param.ty);
            self.scope.insert(param.name.name, hint);
            params.push(HirParam {
                name: param.name.name,
                hint,
                span: param.name.span(),
            });
        }

        let body = self.lower_stmts(&def.body.statements);
        HirMethod {
            name: def.name.name,
            visibility: match def.visibility {
                ast::Visibility::Private => HirVisibility::Private,
                ast::Visibility::Public => HirVisibility::Public,
            },
            params,
            ret_hint: hint_of_type_name(def.output),
            body,
            span: def.token.span,
        }
    }

    fn lower_stmts(&mut self, stmts: &[ast::Stmt]) -> Vec<HirStmt> {
        stmts.iter().filter_map(|s| self.lower_stmt(s)).collect()
    }

    fn lower_stmt(&mut self, stmt: &ast::Stmt) -> Option<HirStmt> {
        match stmt {
            ast::Stmt::Set(set) => {
                let value = self.lower_expr(&set.value);
                let hint = match self.scope.get(&set.name.name) {
                    Some(old) => old.unify(value.hint),
                    None => value.hint,
                };
                self.scope.insert(set.name.name, hint);
                Some(HirStmt::Set {
                    name: set.name.name,
                    value,
                    span: set.token.span,
                })
            }
            ast::Stmt::Return(ret) => Some(HirStmt::Return {
                value: ret.value.as_ref().map(|v| self.lower_expr(v)),
                span: ret.token.span,
            }),
            ast::Stmt::Say(say) => Some(HirStmt::Say {
                value: self.lower_expr(&say.value),
                span: say.token.span,
            }),
            ast::Stmt::Call(call) => {
                let args = self.resolve_args(call.callee.name, &call.args, call.token.span);
                Some(HirStmt::Call {
                    callee: call.callee.name,
                    args,
                    span: call.token.span,
                })
            }
            ast::Stmt::If(ifs) => {
                let cond = self.lower_expr(&ifs.condition);
                let before: Vec<Symbol> = self.scope.keys().copied().collect();
                let then_branch = self.lower_stmts(&ifs.consequence.statements);
                let else_branch = match &ifs.alternative {
                    Some(block) => self.lower_stmts(&block.statements),
                    None => Vec::new(),
                };
                // A name first written inside a branch may be Empty on the
                // other path; its hint cannot be trusted afterwards.
                for (name, hint) in self.scope.iter_mut() {
                    if !before.contains(name) {
                        *hint = TyHint::Unknown;
                    }
                }
                Some(HirStmt::If {
                    cond,
                    then_branch,
                    else_branch,
                    span: ifs.token.span,
                })
            }
            ast::Stmt::Expr(expr) => Some(HirStmt::Expr {
                expr: self.lower_expr(&expr.expr),
                span: expr.token.span,
            }),
            // Recovery nodes were reported by the parser; they lower to
            // nothing so the rest of the program still runs.
            ast::Stmt::Error(_) => None,
            ast::Stmt::Action(_) | ast::Stmt::Interaction(_) => None,
        }
    }

    fn lower_expr(&mut self, expr: &ast::Expr) -> HirExpr {
        let span = expr.span();
        match expr {
            ast::Expr::Int(lit) => HirExpr {
                kind: HirExprKind::Int(lit.value),
                hint: TyHint::Int,
                span,
            },
            ast::Expr::Float(lit) => HirExpr {
                kind: HirExprKind::Float(lit.value),
                hint: TyHint::Float,
                span,
            },
            ast::Expr::Str(lit) => HirExpr {
                kind: HirExprKind::Str(lit.value),
                hint: TyHint::Str,
                span,
            },
            ast::Expr::Url(lit) => HirExpr {
                kind: HirExprKind::Url(lit.value),
                hint: TyHint::Url,
                span,
            },
            ast::Expr::Bool(lit) => HirExpr {
                kind: HirExprKind::Bool(lit.value),
                hint: TyHint::Bool,
                span,
            },
            ast::Expr::Empty(_) => HirExpr {
                kind: HirExprKind::Empty,
                hint: TyHint::Empty,
                span,
            },
            ast::Expr::Ident(ident) => match self.scope.get(&ident.name) {
                Some(hint) => HirExpr {
                    kind: HirExprKind::Var(ident.name),
                    hint: *hint,
                    span,
                },
                None => {
                    self.handler.error(
                        codes::E_UNDEFINED_VARIABLE,
                        format!("`{}` is read before it is set", ident.name),
                        span,
                    );
                    HirExpr {
                        kind: HirExprKind::Empty,
                        hint: TyHint::Empty,
                        span,
                    }
                }
            },
            ast::Expr::Prefix(prefix) => {
                let operand = self.lower_expr(&prefix.operand);
                let (op, hint) = match prefix.op {
                    ast::PrefixOp::Neg => {
                        let hint = if operand.hint.is_numeric() {
                            operand.hint
                        } else {
                            TyHint::Unknown
                        };
                        (UnOp::Neg, hint)
                    }
                    ast::PrefixOp::Not => (UnOp::Not, TyHint::Bool),
                };
                HirExpr {
                    kind: HirExprKind::Unary {
                        op,
                        operand: Box::new(operand),
                    },
                    hint,
                    span,
                }
            }
            ast::Expr::Infix(infix) => {
                let lhs = self.lower_expr(&infix.left);
                let rhs = self.lower_expr(&infix.right);
                let op = binop_of(infix.op);
                let hint = if op.is_comparison() {
                    TyHint::Bool
                } else if op.is_logical() {
                    // `and`/`or` yield one of their operands.
                    lhs.hint.unify(rhs.hint)
                } else if op == HirBinOp::Add
                    && lhs.hint == TyHint::Str
                    && rhs.hint == TyHint::Str
                {
                    // `+` doubles as string concatenation.
                    TyHint::Str
                } else {
                    TyHint::arithmetic(lhs.hint, rhs.hint)
                };
                HirExpr {
                    kind: HirExprKind::Binary {
                        op,
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    },
                    hint,
                    span,
                }
            }
            ast::Expr::Conditional(cond) => {
                let condition = self.lower_expr(&cond.condition);
                let then_value = self.lower_expr(&cond.then_value);
                let else_value = self.lower_expr(&cond.else_value);
                let hint = then_value.hint.unify(else_value.hint);
                HirExpr {
                    kind: HirExprKind::If {
                        cond: Box::new(condition),
                        then_value: Box::new(then_value),
                        else_value: Box::new(else_value),
                    },
                    hint,
                    span,
                }
            }
            ast::Expr::Call(call) => {
                let args = self.resolve_args(call.callee.name, &call.args, span);
                let hint = self
                    .methods
                    .get(&call.callee.name)
                    .map(|sig| sig.ret_hint)
                    .unwrap_or(TyHint::Unknown);
                HirExpr {
                    kind: HirExprKind::Call {
                        callee: call.callee.name,
                        args,
                    },
                    hint,
                    span,
                }
            }
            ast::Expr::Group(group) => self.lower_expr(&group.inner),
            // Already reported by the parser.
            ast::Expr::Error(_) => HirExpr {
                kind: HirExprKind::Empty,
                hint: TyHint::Empty,
                span,
            },
        }
    }

    /// Flatten positional + named arguments into the callee's parameter
    /// order. For callees without a declared signature (built-ins, or names
    /// resolved at runtime) the values are passed through in written order.
    fn resolve_args(
        &mut self,
        callee: Symbol,
        args: &ast::CallArgs,
        span: Span,
    ) -> Vec<HirExpr> {
        let Some(sig) = self.methods.get(&callee) else {
            let mut lowered: Vec<HirExpr> =
                args.positional.iter().map(|a| self.lower_expr(a)).collect();
            lowered.extend(args.named.iter().map(|(_, v)| self.lower_expr(v)));
            return lowered;
        };

        let params: Vec<(Symbol, TyHint)> = sig.params.clone();
        let mut slots: Vec<Option<HirExpr>> = vec![None; params.len()];

        for (i, arg) in args.positional.iter().enumerate() {
            let lowered = self.lower_expr(arg);
            if i < slots.len() {
                slots[i] = Some(lowered);
            } else {
                self.handler.error(
                    codes::E_TOO_MANY_ARGUMENTS,
                    format!(
                        "`{callee}` takes {} argument(s) but more were given",
                        params.len()
                    ),
                    lowered.span,
                );
            }
        }

        for (name, value) in &args.named {
            let lowered = self.lower_expr(value);
            match params.iter().position(|(p, _)| *p == name.name) {
                Some(index) => slots[index] = Some(lowered),
                None => {
                    self.handler.error(
                        codes::E_UNKNOWN_ARGUMENT,
                        format!("`{}` has no parameter named `{}`", callee, name.name),
                        name.span(),
                    );
                }
            }
        }

        // Unfilled parameters default to Empty.
        slots
            .into_iter()
            .map(|slot| {
                slot.unwrap_or(HirExpr {
                    kind: HirExprKind::Empty,
                    hint: TyHint::Empty,
                    span,
                })
            })
            .collect()
    }
}

fn binop_of(op: ast::BinOp) -> HirBinOp {
    match op {
        ast::BinOp::Add => HirBinOp::Add,
        ast::BinOp::Sub => HirBinOp::Sub,
        ast::BinOp::Mul => HirBinOp::Mul,
        ast::BinOp::Div => HirBinOp::Div,
        ast::BinOp::Mod => HirBinOp::Mod,
        ast::BinOp::Pow => HirBinOp::Pow,
        ast::BinOp::Eq => HirBinOp::Eq,
        ast::BinOp::NotEq => HirBinOp::NotEq,
        ast::BinOp::StrictEq => HirBinOp::StrictEq,
        ast::BinOp::StrictNotEq => HirBinOp::StrictNotEq,
        ast::BinOp::Lt => HirBinOp::Lt,
        ast::BinOp::Gt => HirBinOp::Gt,
        ast::BinOp::LtEq => HirBinOp::LtEq,
        ast::BinOp::GtEq => HirBinOp::GtEq,
        ast::BinOp::And => HirBinOp::And,
        ast::BinOp::Or => HirBinOp::Or,
    }
}

fn hint_of_type_name(ty: Option<ast::TypeName>) -> TyHint {
    match ty {
        Some(ast::TypeName::WholeNumber) => TyHint::Int,
        Some(ast::TypeName::Float) => TyHint::Float,
        Some(ast::TypeName::Text) => TyHint::Str,
        Some(ast::TypeName::YesNo) => TyHint::Bool,
        Some(ast::TypeName::Url) => TyHint::Url,
        None => TyHint::Unknown,
    }
}
