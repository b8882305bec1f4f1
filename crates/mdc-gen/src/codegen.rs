//! MIR to bytecode lowering.
//!
//! Blocks are laid out in reverse postorder, which keeps forward jumps
//! short and lets the peephole drop jumps to the next block. Named locals
//! get the low frame slots (parameters first); SSA temps share the
//! remaining slots via live-interval reuse. Phis vanish here: every
//! predecessor stores its incoming value into the phi's slot before
//! branching, which is safe because phi slots are never read before the
//! join point on any path.

use mdc_bc::{BcConst, Chunk, ModuleBuilder, Op};
use mdc_mir::analysis::reverse_postorder;
use mdc_mir::{
    BinOp, BlockId, Callee, CmpOp, Constant, Function, InstKind, Module as MirModule, TempId,
    Terminator, UnOp, Value,
};
use mdc_mir::optimize::OptLevel;
use mdc_util::{FxHashMap, Idx, Span};

use crate::asm::{AsmCode, AsmInst, AsmOperand};
use crate::error::CodegenError;
use crate::peephole;

/// Frame slot budget: the VM gives every frame 256 registers.
pub const MAX_SLOTS: usize = 256;

/// Lower an optimised MIR module to a bytecode module.
pub fn generate_module(
    mir: &MirModule,
    name: &str,
    level: OptLevel,
) -> Result<mdc_bc::Module, CodegenError> {
    let mut builder = ModuleBuilder::new(name);

    // Function chunk indices skip main, which gets its own chunk.
    let mut next_chunk: u16 = 0;
    for (func_id, func) in mir.functions.iter_enumerated() {
        if func_id == mir.main {
            continue;
        }
        let func_const = builder.add_const(BcConst::FuncRef(next_chunk));
        builder.define_global(func.name.as_str(), func_const);
        next_chunk += 1;
    }

    let mut main_chunk = None;
    let mut function_chunks = Vec::new();
    for (func_id, func) in mir.functions.iter_enumerated() {
        let chunk = generate_function(func, mir, &mut builder, level)?;
        if func_id == mir.main {
            main_chunk = Some(chunk);
        } else {
            function_chunks.push(chunk);
        }
    }

    let module = builder.finish(
        main_chunk.expect("module always has a main function"),
        function_chunks,
    );
    if module.constants.len() > u16::MAX as usize {
        return Err(CodegenError::TooManyConstants {
            count: module.constants.len(),
        });
    }
    Ok(module)
}

fn generate_function(
    func: &Function,
    mir: &MirModule,
    builder: &mut ModuleBuilder,
    level: OptLevel,
) -> Result<Chunk, CodegenError> {
    if func.params > u8::MAX as usize {
        return Err(CodegenError::TooManyParams {
            name: func.name.as_str().to_owned(),
            count: func.params,
        });
    }

    let layout = reverse_postorder(func);
    let slots = Slots::assign(func, &layout)?;

    let mut ctx = FuncCtx {
        func,
        mir,
        builder,
        slots: &slots,
        instrs: Vec::new(),
    };

    let mut blocks = Vec::with_capacity(layout.len());
    for &block_id in &layout {
        ctx.instrs = Vec::new();
        let block = &func.blocks[block_id];
        for inst in &block.instrs {
            ctx.emit_inst(&inst.kind, inst.span)?;
        }
        ctx.emit_phi_moves(block_id, &block.term)?;
        ctx.emit_terminator(&block.term)?;
        blocks.push((block_id, std::mem::take(&mut ctx.instrs)));
    }

    let mut code = AsmCode { blocks };
    if level >= OptLevel::Basic {
        peephole::run(&mut code);
    }
    code.assemble(func.params as u8, slots.total as u16)
}

struct FuncCtx<'a> {
    func: &'a Function,
    mir: &'a MirModule,
    builder: &'a mut ModuleBuilder,
    slots: &'a Slots,
    instrs: Vec<AsmInst>,
}

impl FuncCtx<'_> {
    fn emit(&mut self, op: Op, operand: AsmOperand, span: Span) {
        self.instrs
            .push(AsmInst::new(op, operand, (span.line, span.column)));
    }

    fn emit_inst(&mut self, kind: &InstKind, span: Span) -> Result<(), CodegenError> {
        match kind {
            InstKind::LoadConst { dest, value } => {
                self.emit_const(*value, span);
                self.store_temp(*dest, span);
            }
            InstKind::LoadVar { dest, var } => {
                self.emit(
                    Op::LoadLocal,
                    AsmOperand::U16(var.index() as u16),
                    span,
                );
                self.store_temp(*dest, span);
            }
            InstKind::StoreVar { var, value } => {
                self.emit_value(*value, span);
                self.emit(
                    Op::StoreLocal,
                    AsmOperand::U16(var.index() as u16),
                    span,
                );
            }
            InstKind::UnaryOp { dest, op, operand } => {
                self.emit_value(*operand, span);
                let op = match op {
                    UnOp::Neg => Op::Neg,
                    UnOp::Not => Op::Not,
                };
                self.emit(op, AsmOperand::None, span);
                self.store_temp(*dest, span);
            }
            InstKind::BinaryOp { dest, op, lhs, rhs } => {
                self.emit_value(*lhs, span);
                self.emit_value(*rhs, span);
                let op = match op {
                    BinOp::Add => Op::Add,
                    BinOp::Sub => Op::Sub,
                    BinOp::Mul => Op::Mul,
                    BinOp::Div => Op::Div,
                    BinOp::Mod => Op::Mod,
                    BinOp::Pow => Op::Pow,
                    BinOp::And => Op::And,
                    BinOp::Or => Op::Or,
                };
                self.emit(op, AsmOperand::None, span);
                self.store_temp(*dest, span);
            }
            InstKind::Compare { dest, op, lhs, rhs } => {
                self.emit_value(*lhs, span);
                self.emit_value(*rhs, span);
                let op = match op {
                    CmpOp::Eq => Op::Eq,
                    CmpOp::NotEq => Op::Neq,
                    CmpOp::StrictEq => Op::StrictEq,
                    CmpOp::StrictNotEq => Op::StrictNeq,
                    CmpOp::Lt => Op::Lt,
                    CmpOp::Gt => Op::Gt,
                    CmpOp::LtEq => Op::Lte,
                    CmpOp::GtEq => Op::Gte,
                };
                self.emit(op, AsmOperand::None, span);
                self.store_temp(*dest, span);
            }
            InstKind::Call { dest, callee, args } => {
                if args.len() > u8::MAX as usize {
                    return Err(CodegenError::TooManyParams {
                        name: self.callee_name(*callee),
                        count: args.len(),
                    });
                }
                let name = self.callee_name(*callee);
                let name_const = self.builder.add_str_const(&name);
                self.emit(Op::LoadGlobal, AsmOperand::U16(name_const), span);
                for arg in args {
                    self.emit_value(*arg, span);
                }
                self.emit(Op::Call, AsmOperand::U8(args.len() as u8), span);
                match dest {
                    Some(dest) => self.store_temp(*dest, span),
                    None => self.emit(Op::Pop, AsmOperand::None, span),
                }
            }
            InstKind::Print { value } => {
                self.emit_value(*value, span);
                self.emit(Op::Print, AsmOperand::None, span);
            }
            // Eliminated via predecessor moves.
            InstKind::Phi { .. } => {}
        }
        Ok(())
    }

    /// Store each successor phi's incoming value from this block into the
    /// phi's slot, ahead of the branch.
    fn emit_phi_moves(
        &mut self,
        block: BlockId,
        term: &Terminator,
    ) -> Result<(), CodegenError> {
        for succ in term.successors() {
            for inst in &self.func.blocks[succ].instrs {
                if let InstKind::Phi { dest, incoming } = &inst.kind {
                    for (pred, value) in incoming {
                        if *pred == block {
                            self.emit_value(*value, inst.span);
                            self.store_temp(*dest, inst.span);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn emit_terminator(&mut self, term: &Terminator) -> Result<(), CodegenError> {
        match term {
            Terminator::Jump(target) => {
                self.emit(Op::Jump, AsmOperand::Target(*target), Span::DUMMY);
            }
            Terminator::CondJump {
                cond,
                then_block,
                else_block,
            } => {
                self.emit_value(*cond, Span::DUMMY);
                self.emit(Op::JumpIfFalse, AsmOperand::Target(*else_block), Span::DUMMY);
                self.emit(Op::Jump, AsmOperand::Target(*then_block), Span::DUMMY);
            }
            Terminator::Return(value) => {
                match value {
                    Some(value) => self.emit_value(*value, Span::DUMMY),
                    None => self.emit(Op::LoadEmpty, AsmOperand::None, Span::DUMMY),
                }
                self.emit(Op::Return, AsmOperand::None, Span::DUMMY);
            }
        }
        Ok(())
    }

    fn emit_value(&mut self, value: Value, span: Span) {
        match value {
            Value::Const(c) => self.emit_const(c, span),
            Value::Local(local) => {
                self.emit(Op::LoadLocal, AsmOperand::U16(local.index() as u16), span)
            }
            Value::Temp(temp) => {
                let slot = self.slots.temp_slot(temp);
                self.emit(Op::LoadLocal, AsmOperand::U16(slot), span)
            }
        }
    }

    fn emit_const(&mut self, constant: Constant, span: Span) {
        match constant {
            Constant::Empty => self.emit(Op::LoadEmpty, AsmOperand::None, span),
            Constant::Bool(true) => self.emit(Op::LoadTrue, AsmOperand::None, span),
            Constant::Bool(false) => self.emit(Op::LoadFalse, AsmOperand::None, span),
            Constant::Int(i) => {
                let index = self.builder.add_const(BcConst::Int(i));
                self.emit(Op::LoadConst, AsmOperand::U16(index), span);
            }
            Constant::Float(f) => {
                let index = self.builder.add_const(BcConst::Float(f));
                self.emit(Op::LoadConst, AsmOperand::U16(index), span);
            }
            Constant::Str(s) => {
                let index = self.builder.add_str_const(s.as_str());
                self.emit(Op::LoadConst, AsmOperand::U16(index), span);
            }
            Constant::Url(s) => {
                let index = self.builder.add_str_const(s.as_str());
                self.emit(Op::LoadUrl, AsmOperand::U16(index), span);
            }
        }
    }

    fn store_temp(&mut self, temp: TempId, span: Span) {
        let slot = self.slots.temp_slot(temp);
        self.emit(Op::StoreLocal, AsmOperand::U16(slot), span);
    }

    fn callee_name(&self, callee: Callee) -> String {
        match callee {
            Callee::Func(func) => self.mir.functions[func].name.as_str().to_owned(),
            Callee::Name(name) => name.as_str().to_owned(),
        }
    }
}

/// Slot assignment: named locals first, then temps with live-interval
/// reuse over the layout order.
struct Slots {
    temp_slots: FxHashMap<TempId, u16>,
    total: usize,
}

impl Slots {
    fn temp_slot(&self, temp: TempId) -> u16 {
        self.temp_slots[&temp]
    }

    fn assign(func: &Function, layout: &[BlockId]) -> Result<Slots, CodegenError> {
        // Linear positions: instructions first, the terminator after them.
        let mut term_pos: FxHashMap<BlockId, usize> = FxHashMap::default();
        let mut inst_pos: FxHashMap<(BlockId, usize), usize> = FxHashMap::default();
        let mut next = 0usize;
        for &block in layout {
            for index in 0..func.blocks[block].instrs.len() {
                inst_pos.insert((block, index), next);
                next += 1;
            }
            term_pos.insert(block, next);
            next += 1;
        }

        // Live intervals over those positions.
        let mut intervals: FxHashMap<TempId, (usize, usize)> = FxHashMap::default();
        let mut touch = |temp: TempId, pos: usize, intervals: &mut FxHashMap<TempId, (usize, usize)>| {
            let entry = intervals.entry(temp).or_insert((pos, pos));
            entry.0 = entry.0.min(pos);
            entry.1 = entry.1.max(pos);
        };

        for &block in layout {
            let data = &func.blocks[block];
            for (index, inst) in data.instrs.iter().enumerate() {
                let pos = inst_pos[&(block, index)];
                if let Some(dest) = inst.kind.dest() {
                    touch(dest, pos, &mut intervals);
                }
                inst.kind.for_each_operand(|value| {
                    if let Value::Temp(t) = value {
                        touch(*t, pos, &mut intervals);
                    }
                });
                // A phi's slot is written at each predecessor's terminator
                // and its incoming values are read there.
                if let InstKind::Phi { dest, incoming } = &inst.kind {
                    for (pred, value) in incoming {
                        if let Some(&pred_pos) = term_pos.get(pred) {
                            touch(*dest, pred_pos, &mut intervals);
                            if let Value::Temp(t) = value {
                                touch(*t, pred_pos, &mut intervals);
                            }
                        }
                    }
                }
            }
            let pos = term_pos[&block];
            data.term.for_each_operand(|value| {
                if let Value::Temp(t) = value {
                    touch(*t, pos, &mut intervals);
                }
            });
        }

        // Linear scan with slot reuse.
        let mut ordered: Vec<(TempId, (usize, usize))> = intervals.into_iter().collect();
        ordered.sort_by_key(|&(temp, (start, _))| (start, temp));

        let locals = func.locals.len();
        let mut temp_slots = FxHashMap::default();
        let mut active: Vec<(usize, u16)> = Vec::new(); // (end, slot)
        let mut free: Vec<u16> = Vec::new();
        let mut high_water: u16 = 0;

        for (temp, (start, end)) in ordered {
            active.retain(|&(active_end, slot)| {
                if active_end < start {
                    free.push(slot);
                    false
                } else {
                    true
                }
            });
            let slot = free.pop().unwrap_or_else(|| {
                let slot = high_water;
                high_water += 1;
                slot
            });
            active.push((end, slot));
            temp_slots.insert(temp, locals as u16 + slot);
        }

        let total = locals + high_water as usize;
        if total > MAX_SLOTS {
            return Err(CodegenError::TooManySlots {
                name: func.name.as_str().to_owned(),
                needed: total,
                limit: MAX_SLOTS,
            });
        }

        Ok(Slots { temp_slots, total })
    }
}
