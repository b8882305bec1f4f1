//! Structural MIR checks.
//!
//! Used by tests and debug assertions to catch lowering and pass bugs:
//! every temp has exactly one defining instruction, every used temp has a
//! def, and every phi edge names an actual predecessor. (One terminator
//! per block holds by construction; the block type stores exactly one.)

use mdc_util::{FxHashMap, FxHashSet};

use crate::analysis::{predecessors, reachable_blocks};
use crate::mir::{Function, InstKind, Module, TempId, Value};

/// Check one function, returning the first violation found.
pub fn verify_function(func: &Function) -> Result<(), String> {
    let mut defs: FxHashMap<TempId, usize> = FxHashMap::default();
    for block in func.blocks.iter() {
        for inst in &block.instrs {
            if let Some(dest) = inst.kind.dest() {
                *defs.entry(dest).or_insert(0) += 1;
            }
        }
    }

    for (temp, count) in &defs {
        if *count > 1 {
            return Err(format!(
                "{}: temp %t{} has {count} defining instructions",
                func.name, temp.0
            ));
        }
    }

    let mut check_use = |value: &Value| -> Result<(), String> {
        if let Value::Temp(t) = value {
            if !defs.contains_key(t) {
                return Err(format!("{}: temp %t{} is used but never defined", func.name, t.0));
            }
        }
        Ok(())
    };
    for block in func.blocks.iter() {
        for inst in &block.instrs {
            let mut failure = None;
            inst.kind.for_each_operand(|v| {
                if failure.is_none() {
                    failure = check_use(v).err();
                }
            });
            if let Some(message) = failure {
                return Err(message);
            }
        }
        let mut failure = None;
        block.term.for_each_operand(|v| {
            if failure.is_none() {
                failure = check_use(v).err();
            }
        });
        if let Some(message) = failure {
            return Err(message);
        }
    }

    // Phi edges must come from actual predecessors.
    let preds = predecessors(func);
    let reachable: FxHashSet<_> = reachable_blocks(func);
    for (block_id, block) in func.blocks.iter_enumerated() {
        if !reachable.contains(&block_id) {
            continue;
        }
        for inst in &block.instrs {
            if let InstKind::Phi { incoming, .. } = &inst.kind {
                for (pred, _) in incoming {
                    if !preds[block_id].contains(pred) {
                        return Err(format!(
                            "{}: phi in block {} names non-predecessor {}",
                            func.name, block_id.0, pred.0
                        ));
                    }
                }
            }
        }
    }

    Ok(())
}

/// Check every function in a module.
pub fn verify_module(module: &Module) -> Result<(), String> {
    for func in module.functions.iter() {
        verify_function(func)?;
    }
    Ok(())
}
