//! HIR to MIR lowering.
//!
//! Each method becomes a function; the top-level statements become an
//! implicit `main` whose result is the value of its trailing expression
//! statement, or `Empty`. Expressions lower left-to-right into SSA temps.
//!
//! Control flow:
//! - an `If` statement produces `then`/`else`/`join` blocks; at the join a
//!   `Phi` merges each variable written in either arm, with `Empty` flowing
//!   in from an arm that never wrote it and had no prior definition;
//! - the value-bearing `If` expression merges its arm values with a `Phi`;
//! - `and`/`or` lower to control flow so the right-hand side is only
//!   evaluated when it can affect the result, even though the language is
//!   otherwise eager.

use mdc_hir::{HirBinOp, HirExpr, HirExprKind, HirProgram, HirStmt, TyHint, UnOp as HirUnOp};
use mdc_util::diagnostic::codes;
use mdc_util::{FxHashMap, FxHashSet, Handler, IndexVec, Span, Symbol};

use crate::mir::{
    BasicBlock, BinOp, BlockId, Callee, CmpOp, Constant, FuncId, Function, Inst, InstKind,
    Local, LocalId, Module, TempId, Terminator, Value,
};

/// Lower a HIR program to a MIR module.
pub fn lower_program(hir: &HirProgram, handler: &Handler) -> Module {
    let mut func_ids: FxHashMap<Symbol, FuncId> = FxHashMap::default();
    for (index, method) in hir.methods.iter().enumerate() {
        func_ids.insert(method.name, FuncId(index as u32));
    }

    let mut functions: IndexVec<FuncId, Function> = IndexVec::new();
    for method in &hir.methods {
        let mut builder = FuncBuilder::new(method.name, method.span, &func_ids, handler);
        for param in &method.params {
            builder.declare_param(param.name, param.hint, param.span);
        }
        builder.lower_body(&method.body, false);
        functions.push(builder.finish());
    }

    let main_name = Symbol::intern("main");
    let mut builder = FuncBuilder::new(main_name, Span::DUMMY, &func_ids, handler);
    builder.lower_body(&hir.main, true);
    let main = functions.push(builder.finish());

    Module { functions, main }
}

struct FuncBuilder<'a> {
    func: Function,
    current: BlockId,
    /// Whether the current block already has its real terminator.
    terminated: bool,
    vars: FxHashMap<Symbol, LocalId>,
    func_ids: &'a FxHashMap<Symbol, FuncId>,
    handler: &'a Handler,
    /// Active write collectors; every `StoreVar` registers in all of them.
    written: Vec<FxHashSet<LocalId>>,
}

impl<'a> FuncBuilder<'a> {
    fn new(
        name: Symbol,
        span: Span,
        func_ids: &'a FxHashMap<Symbol, FuncId>,
        handler: &'a Handler,
    ) -> Self {
        let mut blocks = IndexVec::new();
        let entry = blocks.push(BasicBlock {
            instrs: Vec::new(),
            term: Terminator::Return(None),
        });
        Self {
            func: Function {
                name,
                params: 0,
                locals: IndexVec::new(),
                blocks,
                entry,
                temps: 0,
                span,
            },
            current: entry,
            terminated: false,
            vars: FxHashMap::default(),
            func_ids,
            handler,
            written: Vec::new(),
        }
    }

    fn finish(self) -> Function {
        self.func
    }

    fn declare_param(&mut self, name: Symbol, hint: TyHint, span: Span) {
        let local = self.func.locals.push(Local {
            name,
            ty: hint,
            span,
        });
        self.vars.insert(name, local);
        self.func.params += 1;
    }

    // Plumbing -----------------------------------------------------------

    fn temp(&mut self) -> TempId {
        let id = TempId(self.func.temps);
        self.func.temps += 1;
        id
    }

    fn new_block(&mut self) -> BlockId {
        self.func.blocks.push(BasicBlock {
            instrs: Vec::new(),
            term: Terminator::Return(None),
        })
    }

    fn switch_to(&mut self, block: BlockId) {
        self.current = block;
        self.terminated = false;
    }

    fn push(&mut self, kind: InstKind, span: Span) {
        if self.terminated {
            // Code after a `give back` is unreachable; park it in a fresh
            // block for dead-code elimination to discard.
            let orphan = self.new_block();
            self.switch_to(orphan);
        }
        self.func.blocks[self.current].instrs.push(Inst { kind, span });
    }

    fn set_term(&mut self, term: Terminator) {
        if !self.terminated {
            self.func.blocks[self.current].term = term;
            self.terminated = true;
        }
    }

    fn ensure_local(&mut self, name: Symbol, hint: TyHint, span: Span) -> LocalId {
        if let Some(&local) = self.vars.get(&name) {
            return local;
        }
        let local = self.func.locals.push(Local {
            name,
            ty: hint,
            span,
        });
        self.vars.insert(name, local);
        local
    }

    fn record_write(&mut self, local: LocalId) {
        for set in &mut self.written {
            set.insert(local);
        }
    }

    // Statements ---------------------------------------------------------

    fn lower_body(&mut self, body: &[HirStmt], is_main: bool) {
        let mut result: Option<Value> = None;
        for (index, stmt) in body.iter().enumerate() {
            let is_last = index + 1 == body.len();
            match stmt {
                HirStmt::Expr { expr, span: _ } if is_main && is_last => {
                    result = Some(self.lower_expr(expr));
                }
                _ => self.lower_stmt(stmt),
            }
        }
        self.set_term(Terminator::Return(result));
    }

    fn lower_stmt(&mut self, stmt: &HirStmt) {
        match stmt {
            HirStmt::Set { name, value, span } => {
                let v = self.lower_expr(value);
                let local = self.ensure_local(*name, value.hint, *span);
                self.push(InstKind::StoreVar { var: local, value: v }, *span);
                self.record_write(local);
            }
            HirStmt::Return { value, .. } => {
                let v = value.as_ref().map(|v| self.lower_expr(v));
                self.set_term(Terminator::Return(v));
            }
            HirStmt::Say { value, span } => {
                let v = self.lower_expr(value);
                self.push(InstKind::Print { value: v }, *span);
            }
            HirStmt::Call { callee, args, span } => {
                let args: Vec<Value> = args.iter().map(|a| self.lower_expr(a)).collect();
                let callee = self.resolve_callee(*callee);
                self.push(
                    InstKind::Call {
                        dest: None,
                        callee,
                        args,
                    },
                    *span,
                );
            }
            HirStmt::If {
                cond,
                then_branch,
                else_branch,
                span,
            } => self.lower_if(cond, then_branch, else_branch, *span),
            HirStmt::Expr { expr, .. } => {
                let _ = self.lower_expr(expr);
            }
        }
    }

    fn lower_if(
        &mut self,
        cond: &HirExpr,
        then_branch: &[HirStmt],
        else_branch: &[HirStmt],
        span: Span,
    ) {
        let cond_value = self.lower_expr(cond);

        // Locals that already exist carry their value across an arm that
        // does not write them; anything else merges with Empty.
        let pre_vars: FxHashSet<LocalId> = self.vars.values().copied().collect();

        let then_block = self.new_block();
        let else_block = self.new_block();
        let join_block = self.new_block();

        self.set_term(Terminator::CondJump {
            cond: cond_value,
            then_block,
            else_block,
        });

        let then_arm = self.lower_arm(then_block, then_branch);
        let else_arm = self.lower_arm(else_block, else_branch);

        let mut merged: Vec<LocalId> = then_arm
            .written
            .union(&else_arm.written)
            .copied()
            .collect();
        merged.sort();

        let then_flow = self.finish_arm(&then_arm, &merged, &pre_vars, join_block, span);
        let else_flow = self.finish_arm(&else_arm, &merged, &pre_vars, join_block, span);

        self.switch_to(join_block);
        for (index, &var) in merged.iter().enumerate() {
            let mut incoming = Vec::new();
            if let Some((block, values)) = &then_flow {
                incoming.push((*block, values[index]));
            }
            if let Some((block, values)) = &else_flow {
                incoming.push((*block, values[index]));
            }
            if incoming.is_empty() {
                // Both arms returned; the join is unreachable.
                continue;
            }
            let dest = self.temp();
            self.push(InstKind::Phi { dest, incoming }, span);
            self.push(
                InstKind::StoreVar {
                    var,
                    value: Value::Temp(dest),
                },
                span,
            );
            self.record_write(var);
        }
    }

    /// Lower one arm into its block, collecting which locals it wrote.
    fn lower_arm(&mut self, block: BlockId, stmts: &[HirStmt]) -> ArmState {
        self.switch_to(block);
        self.written.push(FxHashSet::default());
        for stmt in stmts {
            self.lower_stmt(stmt);
        }
        let written = self.written.pop().expect("pushed above");
        ArmState {
            end_block: self.current,
            terminated: self.terminated,
            written,
        }
    }

    /// Close an arm: load the merge set's reaching values at the arm's end
    /// and jump to the join. Returns `None` when the arm never reaches the
    /// join (it returned).
    fn finish_arm(
        &mut self,
        arm: &ArmState,
        merged: &[LocalId],
        pre_vars: &FxHashSet<LocalId>,
        join_block: BlockId,
        span: Span,
    ) -> Option<(BlockId, Vec<Value>)> {
        if arm.terminated {
            return None;
        }
        self.switch_to(arm.end_block);
        let mut values = Vec::with_capacity(merged.len());
        for &var in merged {
            if arm.written.contains(&var) || pre_vars.contains(&var) {
                let dest = self.temp();
                self.push(InstKind::LoadVar { dest, var }, span);
                values.push(Value::Temp(dest));
            } else {
                values.push(Value::Const(Constant::Empty));
            }
        }
        self.set_term(Terminator::Jump(join_block));
        Some((arm.end_block, values))
    }

    // Expressions --------------------------------------------------------

    fn lower_expr(&mut self, expr: &HirExpr) -> Value {
        let span = expr.span;
        match &expr.kind {
            HirExprKind::Int(v) => self.load_const(Constant::Int(*v), span),
            HirExprKind::Float(v) => self.load_const(Constant::Float(*v), span),
            HirExprKind::Str(s) => self.load_const(Constant::Str(*s), span),
            HirExprKind::Url(s) => self.load_const(Constant::Url(*s), span),
            HirExprKind::Bool(b) => self.load_const(Constant::Bool(*b), span),
            HirExprKind::Empty => self.load_const(Constant::Empty, span),
            HirExprKind::Var(name) => match self.vars.get(name) {
                Some(&var) => {
                    let dest = self.temp();
                    self.push(InstKind::LoadVar { dest, var }, span);
                    Value::Temp(dest)
                }
                // HIR normally catches undefined reads; lowering stays
                // total either way.
                None => {
                    self.handler.error(
                        codes::E_UNDEFINED_VARIABLE,
                        format!("`{name}` is read before it is set"),
                        span,
                    );
                    Value::Const(Constant::Empty)
                }
            },
            HirExprKind::Unary { op, operand } => {
                let operand = self.lower_expr(operand);
                let dest = self.temp();
                let op = match op {
                    HirUnOp::Neg => crate::mir::UnOp::Neg,
                    HirUnOp::Not => crate::mir::UnOp::Not,
                };
                self.push(InstKind::UnaryOp { dest, op, operand }, span);
                Value::Temp(dest)
            }
            HirExprKind::Binary { op, lhs, rhs } => match op {
                HirBinOp::And => self.lower_short_circuit(lhs, rhs, true, span),
                HirBinOp::Or => self.lower_short_circuit(lhs, rhs, false, span),
                _ => {
                    let lhs = self.lower_expr(lhs);
                    let rhs = self.lower_expr(rhs);
                    let dest = self.temp();
                    let kind = match binop_kind(*op) {
                        BinOpKind::Arith(op) => InstKind::BinaryOp { dest, op, lhs, rhs },
                        BinOpKind::Cmp(op) => InstKind::Compare { dest, op, lhs, rhs },
                    };
                    self.push(kind, span);
                    Value::Temp(dest)
                }
            },
            HirExprKind::If {
                cond,
                then_value,
                else_value,
            } => {
                let cond_value = self.lower_expr(cond);
                let then_block = self.new_block();
                let else_block = self.new_block();
                let join_block = self.new_block();
                self.set_term(Terminator::CondJump {
                    cond: cond_value,
                    then_block,
                    else_block,
                });

                self.switch_to(then_block);
                let then_result = self.lower_expr(then_value);
                let then_end = self.current;
                self.set_term(Terminator::Jump(join_block));

                self.switch_to(else_block);
                let else_result = self.lower_expr(else_value);
                let else_end = self.current;
                self.set_term(Terminator::Jump(join_block));

                self.switch_to(join_block);
                let dest = self.temp();
                self.push(
                    InstKind::Phi {
                        dest,
                        incoming: vec![(then_end, then_result), (else_end, else_result)],
                    },
                    span,
                );
                Value::Temp(dest)
            }
            HirExprKind::Call { callee, args } => {
                let args: Vec<Value> = args.iter().map(|a| self.lower_expr(a)).collect();
                let callee = self.resolve_callee(*callee);
                let dest = self.temp();
                self.push(
                    InstKind::Call {
                        dest: Some(dest),
                        callee,
                        args,
                    },
                    span,
                );
                Value::Temp(dest)
            }
        }
    }

    /// `and`/`or` with the right-hand side evaluated only when needed.
    /// The result is one of the operands, selected by truthiness.
    fn lower_short_circuit(
        &mut self,
        lhs: &HirExpr,
        rhs: &HirExpr,
        is_and: bool,
        span: Span,
    ) -> Value {
        let lhs_value = self.lower_expr(lhs);
        let lhs_end = self.current;

        let rhs_block = self.new_block();
        let join_block = self.new_block();

        let term = if is_and {
            // Truthy left: the right side decides. Falsy left: keep it.
            Terminator::CondJump {
                cond: lhs_value,
                then_block: rhs_block,
                else_block: join_block,
            }
        } else {
            Terminator::CondJump {
                cond: lhs_value,
                then_block: join_block,
                else_block: rhs_block,
            }
        };
        self.set_term(term);

        self.switch_to(rhs_block);
        let rhs_value = self.lower_expr(rhs);
        let rhs_end = self.current;
        self.set_term(Terminator::Jump(join_block));

        self.switch_to(join_block);
        let dest = self.temp();
        self.push(
            InstKind::Phi {
                dest,
                incoming: vec![(lhs_end, lhs_value), (rhs_end, rhs_value)],
            },
            span,
        );
        Value::Temp(dest)
    }

    fn load_const(&mut self, value: Constant, span: Span) -> Value {
        let dest = self.temp();
        self.push(InstKind::LoadConst { dest, value }, span);
        Value::Temp(dest)
    }

    fn resolve_callee(&self, name: Symbol) -> Callee {
        match self.func_ids.get(&name) {
            Some(&func) => Callee::Func(func),
            None => Callee::Name(name),
        }
    }
}

struct ArmState {
    end_block: BlockId,
    terminated: bool,
    written: FxHashSet<LocalId>,
}

enum BinOpKind {
    Arith(BinOp),
    Cmp(CmpOp),
}

fn binop_kind(op: HirBinOp) -> BinOpKind {
    match op {
        HirBinOp::Add => BinOpKind::Arith(BinOp::Add),
        HirBinOp::Sub => BinOpKind::Arith(BinOp::Sub),
        HirBinOp::Mul => BinOpKind::Arith(BinOp::Mul),
        HirBinOp::Div => BinOpKind::Arith(BinOp::Div),
        HirBinOp::Mod => BinOpKind::Arith(BinOp::Mod),
        HirBinOp::Pow => BinOpKind::Arith(BinOp::Pow),
        HirBinOp::Eq => BinOpKind::Cmp(CmpOp::Eq),
        HirBinOp::NotEq => BinOpKind::Cmp(CmpOp::NotEq),
        HirBinOp::StrictEq => BinOpKind::Cmp(CmpOp::StrictEq),
        HirBinOp::StrictNotEq => BinOpKind::Cmp(CmpOp::StrictNotEq),
        HirBinOp::Lt => BinOpKind::Cmp(CmpOp::Lt),
        HirBinOp::Gt => BinOpKind::Cmp(CmpOp::Gt),
        HirBinOp::LtEq => BinOpKind::Cmp(CmpOp::LtEq),
        HirBinOp::GtEq => BinOpKind::Cmp(CmpOp::GtEq),
        HirBinOp::And | HirBinOp::Or => unreachable!("short-circuit ops lower to control flow"),
    }
}
