//! MIR optimisation passes: constant folding and dead-code elimination.
//!
//! Passes are conservative: folding only rewrites an operation it can fully
//! evaluate without changing behaviour (division by zero stays in place for
//! the runtime to report), and DCE only removes instructions that can
//! neither trap nor be observed. Both preserve SSA form.
//!
//! Functions are independent, so a module optimises them in parallel;
//! results are deterministic either way.

use rayon::prelude::*;

use mdc_util::{FxHashMap, FxHashSet, Symbol};

use crate::analysis::{predecessors, reachable_blocks, reverse_postorder};
use crate::mir::{
    BinOp, CmpOp, Constant, Function, InstKind, Module, TempId, Terminator, UnOp, Value,
};

/// Optimisation level, selected on the command line as 0..=3.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum OptLevel {
    None,
    Basic,
    Aggressive,
}

impl OptLevel {
    /// Map a CLI `--opt-level` number. 0 is off, 1 folds once, 2 and 3
    /// iterate to a fixpoint.
    pub fn from_cli(level: u8) -> Self {
        match level {
            0 => OptLevel::None,
            1 => OptLevel::Basic,
            _ => OptLevel::Aggressive,
        }
    }
}

/// Run the configured passes over every function in the module.
pub fn optimize_module(module: &mut Module, level: OptLevel) {
    if level == OptLevel::None {
        return;
    }
    module
        .functions
        .as_mut_slice()
        .par_iter_mut()
        .for_each(|func| match level {
            OptLevel::None => {}
            OptLevel::Basic => {
                constant_folding(func);
                dead_code_elimination(func);
            }
            OptLevel::Aggressive => {
                // Folding exposes dead code and vice versa; iterate until
                // neither finds anything, with a bound for safety.
                for _ in 0..8 {
                    let folded = constant_folding(func);
                    let removed = dead_code_elimination(func);
                    if !folded && !removed {
                        break;
                    }
                }
            }
        });
}

/// Replace operations on known constants with `LoadConst`, and conditional
/// jumps on known conditions with plain jumps. Returns whether anything
/// changed. Applying the pass twice never finds more than applying it once.
pub fn constant_folding(func: &mut Function) -> bool {
    let mut changed = false;

    // SSA gives every temp one def, so a map from temp to known constant is
    // valid function-wide; defs dominate uses and RPO visits them first.
    let mut known: FxHashMap<TempId, Constant> = FxHashMap::default();
    for block in func.blocks.iter() {
        for inst in &block.instrs {
            if let InstKind::LoadConst { dest, value } = inst.kind {
                known.insert(dest, value);
            }
        }
    }

    let resolve = |value: &Value, known: &FxHashMap<TempId, Constant>| match value {
        Value::Const(c) => Some(*c),
        Value::Temp(t) => known.get(t).copied(),
        Value::Local(_) => None,
    };

    for block_id in reverse_postorder(func) {
        let block = &mut func.blocks[block_id];
        for inst in &mut block.instrs {
            let folded = match &inst.kind {
                InstKind::UnaryOp { dest, op, operand } => resolve(operand, &known)
                    .and_then(|c| eval_unary(*op, c))
                    .map(|c| (*dest, c)),
                InstKind::BinaryOp { dest, op, lhs, rhs } => {
                    match (resolve(lhs, &known), resolve(rhs, &known)) {
                        (Some(a), Some(b)) => eval_binary(*op, a, b).map(|c| (*dest, c)),
                        _ => None,
                    }
                }
                InstKind::Compare { dest, op, lhs, rhs } => {
                    match (resolve(lhs, &known), resolve(rhs, &known)) {
                        (Some(a), Some(b)) => eval_compare(*op, a, b).map(|c| (*dest, c)),
                        _ => None,
                    }
                }
                InstKind::Phi { dest, incoming } => {
                    let consts: Vec<Option<Constant>> =
                        incoming.iter().map(|(_, v)| resolve(v, &known)).collect();
                    match consts.split_first() {
                        Some((Some(first), rest))
                            if rest.iter().all(|c| c.as_ref() == Some(first)) =>
                        {
                            Some((*dest, *first))
                        }
                        _ => None,
                    }
                }
                _ => None,
            };

            if let Some((dest, value)) = folded {
                inst.kind = InstKind::LoadConst { dest, value };
                known.insert(dest, value);
                changed = true;
            }
        }

        let folded_target = match &block.term {
            Terminator::CondJump {
                cond,
                then_block,
                else_block,
            } => resolve(cond, &known)
                .map(|c| if c.is_truthy() { *then_block } else { *else_block }),
            _ => None,
        };
        if let Some(target) = folded_target {
            block.term = Terminator::Jump(target);
            changed = true;
        }
    }

    changed
}

/// Remove unreachable blocks' contents, phi edges from non-predecessors,
/// and pure instructions whose result is never used. Calls, stores and
/// prints always survive; so does anything that could raise a runtime
/// error. Returns whether anything changed.
pub fn dead_code_elimination(func: &mut Function) -> bool {
    let mut changed = false;

    // Clear unreachable blocks. They stay in place (ids are stable) but
    // carry nothing and point nowhere.
    let reachable = reachable_blocks(func);
    for (block_id, block) in func.blocks.iter_enumerated_mut() {
        if reachable.contains(&block_id) {
            continue;
        }
        if !block.instrs.is_empty() || block.term != Terminator::Return(None) {
            block.instrs.clear();
            block.term = Terminator::Return(None);
            changed = true;
        }
    }

    // Folding a CondJump removes CFG edges; phis must drop the stale ones.
    let preds = predecessors(func);
    for (block_id, block) in func.blocks.iter_enumerated_mut() {
        for inst in &mut block.instrs {
            if let InstKind::Phi { incoming, .. } = &mut inst.kind {
                let before = incoming.len();
                incoming.retain(|(pred, _)| preds[block_id].contains(pred));
                if incoming.len() != before {
                    changed = true;
                }
            }
        }
    }

    // Sweep unused pure defs until nothing budges.
    loop {
        let mut used: FxHashSet<TempId> = FxHashSet::default();
        let mut mark = |value: &Value| {
            if let Value::Temp(t) = value {
                used.insert(*t);
            }
        };
        for block in func.blocks.iter() {
            for inst in &block.instrs {
                inst.kind.for_each_operand(&mut mark);
            }
            block.term.for_each_operand(&mut mark);
        }

        let mut removed = false;
        for block in func.blocks.iter_mut() {
            block.instrs.retain(|inst| {
                let dead = match inst.kind {
                    // These can neither trap nor be observed.
                    InstKind::LoadConst { dest, .. }
                    | InstKind::LoadVar { dest, .. }
                    | InstKind::Phi { dest, .. }
                    | InstKind::UnaryOp {
                        dest,
                        op: UnOp::Not,
                        ..
                    } => !used.contains(&dest),
                    // Arithmetic can raise (type mismatch, division by
                    // zero); calls, stores and prints are observable.
                    _ => false,
                };
                if dead {
                    removed = true;
                }
                !dead
            });
        }

        if !removed {
            break;
        }
        changed = true;
    }

    changed
}

// Evaluation helpers. These mirror the virtual machine's semantics exactly;
// a fold must produce the value the program would have produced.

pub(crate) fn eval_unary(op: UnOp, operand: Constant) -> Option<Constant> {
    match op {
        UnOp::Neg => match operand {
            Constant::Int(i) => Some(Constant::Int(i.wrapping_neg())),
            Constant::Float(f) => Some(Constant::Float(-f)),
            _ => None,
        },
        UnOp::Not => Some(Constant::Bool(!operand.is_truthy())),
    }
}

pub(crate) fn eval_binary(op: BinOp, lhs: Constant, rhs: Constant) -> Option<Constant> {
    use Constant::*;
    match op {
        BinOp::Add => match (lhs, rhs) {
            (Int(a), Int(b)) => Some(Int(a.wrapping_add(b))),
            (Str(a), Str(b)) => {
                let mut joined = a.as_str().to_owned();
                joined.push_str(b.as_str());
                Some(Str(Symbol::intern(&joined)))
            }
            _ => float_pair(lhs, rhs).map(|(a, b)| Float(a + b)),
        },
        BinOp::Sub => match (lhs, rhs) {
            (Int(a), Int(b)) => Some(Int(a.wrapping_sub(b))),
            _ => float_pair(lhs, rhs).map(|(a, b)| Float(a - b)),
        },
        BinOp::Mul => match (lhs, rhs) {
            (Int(a), Int(b)) => Some(Int(a.wrapping_mul(b))),
            _ => float_pair(lhs, rhs).map(|(a, b)| Float(a * b)),
        },
        // Division by zero folds to nothing; the runtime reports it.
        BinOp::Div => match (lhs, rhs) {
            (Int(_), Int(0)) => None,
            (Int(a), Int(b)) => Some(Int(a.wrapping_div(b))),
            _ => match float_pair(lhs, rhs) {
                Some((_, b)) if b == 0.0 => None,
                Some((a, b)) => Some(Float(a / b)),
                None => None,
            },
        },
        BinOp::Mod => match (lhs, rhs) {
            (Int(_), Int(0)) => None,
            (Int(a), Int(b)) => Some(Int(a.wrapping_rem(b))),
            _ => match float_pair(lhs, rhs) {
                Some((_, b)) if b == 0.0 => None,
                Some((a, b)) => Some(Float(a % b)),
                None => None,
            },
        },
        BinOp::Pow => match (lhs, rhs) {
            (Int(a), Int(b)) if b >= 0 => Some(Int(wrapping_pow_i64(a, b as u64))),
            (Int(a), Int(b)) => Some(Float((a as f64).powf(b as f64))),
            _ => float_pair(lhs, rhs).map(|(a, b)| Float(a.powf(b))),
        },
        // Eager select-by-truthiness forms.
        BinOp::And => Some(if lhs.is_truthy() { rhs } else { lhs }),
        BinOp::Or => Some(if lhs.is_truthy() { lhs } else { rhs }),
    }
}

pub(crate) fn eval_compare(op: CmpOp, lhs: Constant, rhs: Constant) -> Option<Constant> {
    use Constant::*;
    let result = match op {
        CmpOp::Eq => value_eq(lhs, rhs),
        CmpOp::NotEq => !value_eq(lhs, rhs),
        CmpOp::StrictEq => strict_eq(lhs, rhs),
        CmpOp::StrictNotEq => !strict_eq(lhs, rhs),
        CmpOp::Lt | CmpOp::Gt | CmpOp::LtEq | CmpOp::GtEq => {
            let ordering = match (lhs, rhs) {
                (Str(a), Str(b)) => a.as_str().cmp(b.as_str()),
                _ => {
                    let (a, b) = float_pair(lhs, rhs)?;
                    a.partial_cmp(&b)?
                }
            };
            match op {
                CmpOp::Lt => ordering.is_lt(),
                CmpOp::Gt => ordering.is_gt(),
                CmpOp::LtEq => ordering.is_le(),
                CmpOp::GtEq => ordering.is_ge(),
                _ => unreachable!(),
            }
        }
    };
    Some(Bool(result))
}

/// Value equality: numerics compare across Int/Float; other types must
/// match exactly; `Empty` only equals `Empty`. Never an error.
fn value_eq(lhs: Constant, rhs: Constant) -> bool {
    use Constant::*;
    match (lhs, rhs) {
        (Empty, Empty) => true,
        (Bool(a), Bool(b)) => a == b,
        (Int(a), Int(b)) => a == b,
        (Str(a), Str(b)) | (Url(a), Url(b)) => a == b,
        (Float(a), Float(b)) => a == b,
        (Int(a), Float(b)) | (Float(b), Int(a)) => a as f64 == b,
        _ => false,
    }
}

/// Strict equality additionally requires the same type tag.
fn strict_eq(lhs: Constant, rhs: Constant) -> bool {
    use Constant::*;
    match (lhs, rhs) {
        (Int(a), Int(b)) => a == b,
        (Float(a), Float(b)) => a == b,
        (Bool(a), Bool(b)) => a == b,
        (Str(a), Str(b)) | (Url(a), Url(b)) => a == b,
        (Empty, Empty) => true,
        _ => false,
    }
}

/// Both operands as floats, if both are numeric.
fn float_pair(lhs: Constant, rhs: Constant) -> Option<(f64, f64)> {
    let widen = |c: Constant| match c {
        Constant::Int(i) => Some(i as f64),
        Constant::Float(f) => Some(f),
        _ => None,
    };
    Some((widen(lhs)?, widen(rhs)?))
}

/// Exponentiation by squaring with wrapping multiplication.
pub(crate) fn wrapping_pow_i64(base: i64, mut exp: u64) -> i64 {
    let mut result: i64 = 1;
    let mut base = base;
    while exp > 0 {
        if exp & 1 == 1 {
            result = result.wrapping_mul(base);
        }
        base = base.wrapping_mul(base);
        exp >>= 1;
    }
    result
}
