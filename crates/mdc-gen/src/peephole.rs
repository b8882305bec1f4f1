//! Bytecode peephole patterns.
//!
//! Runs on the assembly-level instruction list, where jumps still name
//! blocks, so deleting instructions cannot corrupt encoded offsets:
//!
//! - a constant load immediately popped disappears,
//! - a conditional jump on a constant condition becomes unconditional
//!   (or nothing), and the dead tail of the block is dropped,
//! - a jump to the block laid out next disappears.

use mdc_bc::Op;

use crate::asm::{AsmCode, AsmInst, AsmOperand};

pub fn run(code: &mut AsmCode) {
    for (_, instrs) in &mut code.blocks {
        remove_pushed_then_popped(instrs);
        fold_constant_branches(instrs);
        drop_unreachable_tail(instrs);
    }
    remove_jumps_to_next(code);
}

fn is_const_load(inst: &AsmInst) -> bool {
    matches!(
        inst.op,
        Op::LoadConst | Op::LoadTrue | Op::LoadFalse | Op::LoadEmpty | Op::LoadUrl
    )
}

/// `LOAD_CONST x; POP` has no effect.
fn remove_pushed_then_popped(instrs: &mut Vec<AsmInst>) {
    let mut index = 0;
    while index + 1 < instrs.len() {
        if is_const_load(&instrs[index]) && instrs[index + 1].op == Op::Pop {
            instrs.drain(index..index + 2);
            index = index.saturating_sub(1);
        } else {
            index += 1;
        }
    }
}

/// `LOAD_TRUE; JUMP_IF_FALSE t` never branches; `LOAD_FALSE;
/// JUMP_IF_FALSE t` always does.
fn fold_constant_branches(instrs: &mut Vec<AsmInst>) {
    let mut index = 0;
    while index + 1 < instrs.len() {
        let pair = (instrs[index].op, instrs[index + 1].op);
        match pair {
            (Op::LoadTrue, Op::JumpIfFalse) => {
                instrs.drain(index..index + 2);
            }
            (Op::LoadFalse, Op::JumpIfFalse) => {
                let target = instrs[index + 1].operand;
                let line = instrs[index].line;
                instrs.splice(
                    index..index + 2,
                    [AsmInst {
                        op: Op::Jump,
                        operand: target,
                        line,
                    }],
                );
                index += 1;
            }
            _ => index += 1,
        }
    }
}

/// Nothing after an unconditional jump or return in the same block can
/// execute.
fn drop_unreachable_tail(instrs: &mut Vec<AsmInst>) {
    if let Some(position) = instrs
        .iter()
        .position(|inst| matches!(inst.op, Op::Jump | Op::Return | Op::Halt))
    {
        instrs.truncate(position + 1);
    }
}

/// A jump to the block laid out immediately after is a no-op.
fn remove_jumps_to_next(code: &mut AsmCode) {
    for index in 0..code.blocks.len().saturating_sub(1) {
        let next_id = code.blocks[index + 1].0;
        let instrs = &mut code.blocks[index].1;
        if let Some(last) = instrs.last() {
            if last.op == Op::Jump && last.operand == AsmOperand::Target(next_id) {
                instrs.pop();
            }
        }
    }
}
