//! CFG analysis helpers: reachability, predecessors, reverse postorder.

use mdc_util::{FxHashSet, IndexVec};

use crate::mir::{BlockId, Function};

/// Blocks reachable from the entry.
pub fn reachable_blocks(func: &Function) -> FxHashSet<BlockId> {
    let mut seen = FxHashSet::default();
    let mut stack = vec![func.entry];
    while let Some(block) = stack.pop() {
        if !seen.insert(block) {
            continue;
        }
        for succ in func.blocks[block].term.successors() {
            stack.push(succ);
        }
    }
    seen
}

/// Predecessors of every block, reachable or not.
pub fn predecessors(func: &Function) -> IndexVec<BlockId, Vec<BlockId>> {
    let mut preds: IndexVec<BlockId, Vec<BlockId>> = IndexVec::new();
    for _ in 0..func.blocks.len() {
        preds.push(Vec::new());
    }
    for (block, data) in func.blocks.iter_enumerated() {
        for succ in data.term.successors() {
            preds[succ].push(block);
        }
    }
    preds
}

/// Reverse postorder over the reachable part of the CFG, starting at the
/// entry. This is the layout order used by codegen: a block's forward
/// successors tend to follow it closely, keeping jump distances short.
pub fn reverse_postorder(func: &Function) -> Vec<BlockId> {
    let mut postorder = Vec::with_capacity(func.blocks.len());
    let mut seen = FxHashSet::default();
    // Iterative DFS; the explicit stack carries the successor cursor.
    let mut stack: Vec<(BlockId, usize)> = vec![(func.entry, 0)];
    seen.insert(func.entry);

    while let Some((block, cursor)) = stack.last().copied() {
        let succs = func.blocks[block].term.successors();
        if cursor < succs.len() {
            stack.last_mut().expect("stack is non-empty").1 += 1;
            let next = succs[cursor];
            if seen.insert(next) {
                stack.push((next, 0));
            }
        } else {
            postorder.push(block);
            stack.pop();
        }
    }

    postorder.reverse();
    postorder
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mir::*;
    use mdc_util::{IndexVec, Span, Symbol};

    fn diamond() -> Function {
        // entry -> (then, else) -> join
        let mut blocks: IndexVec<BlockId, BasicBlock> = IndexVec::new();
        let entry = BlockId(0);
        blocks.push(BasicBlock {
            instrs: Vec::new(),
            term: Terminator::CondJump {
                cond: Value::Const(Constant::Bool(true)),
                then_block: BlockId(1),
                else_block: BlockId(2),
            },
        });
        blocks.push(BasicBlock {
            instrs: Vec::new(),
            term: Terminator::Jump(BlockId(3)),
        });
        blocks.push(BasicBlock {
            instrs: Vec::new(),
            term: Terminator::Jump(BlockId(3)),
        });
        blocks.push(BasicBlock {
            instrs: Vec::new(),
            term: Terminator::Return(None),
        });
        Function {
            name: Symbol::intern("diamond"),
            params: 0,
            locals: IndexVec::new(),
            blocks,
            entry,
            temps: 0,
            span: Span::DUMMY,
        }
    }

    #[test]
    fn test_reachable_all() {
        let func = diamond();
        assert_eq!(reachable_blocks(&func).len(), 4);
    }

    #[test]
    fn test_unreachable_block() {
        let mut func = diamond();
        func.blocks.push(BasicBlock {
            instrs: Vec::new(),
            term: Terminator::Return(None),
        });
        let reachable = reachable_blocks(&func);
        assert_eq!(reachable.len(), 4);
        assert!(!reachable.contains(&BlockId(4)));
    }

    #[test]
    fn test_predecessors() {
        let func = diamond();
        let preds = predecessors(&func);
        assert!(preds[BlockId(0)].is_empty());
        assert_eq!(preds[BlockId(1)], vec![BlockId(0)]);
        assert_eq!(preds[BlockId(2)], vec![BlockId(0)]);
        let mut join_preds = preds[BlockId(3)].clone();
        join_preds.sort();
        assert_eq!(join_preds, vec![BlockId(1), BlockId(2)]);
    }

    #[test]
    fn test_rpo_starts_at_entry_and_covers_reachable() {
        let func = diamond();
        let rpo = reverse_postorder(&func);
        assert_eq!(rpo[0], func.entry);
        assert_eq!(rpo.len(), 4);
        // The join comes after both arms.
        let pos = |b: BlockId| rpo.iter().position(|&x| x == b).unwrap();
        assert!(pos(BlockId(3)) > pos(BlockId(1)));
        assert!(pos(BlockId(3)) > pos(BlockId(2)));
    }
}
