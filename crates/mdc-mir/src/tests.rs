//! MIR lowering and optimisation tests. Inputs go through the real parser
//! and HIR lowering so the tests exercise what the pipeline produces.

use crate::analysis::reachable_blocks;
use crate::mir::*;
use crate::optimize::{constant_folding, dead_code_elimination, optimize_module, OptLevel};
use crate::verify::{verify_function, verify_module};
use crate::lower_program;
use mdc_util::{Handler, IndexVec, Span, Symbol};

fn lower(source: &str) -> Module {
    let handler = Handler::new();
    let ast = mdc_par::parse(source, &handler);
    let hir = mdc_hir::lower_program(&ast, &handler);
    assert!(
        !handler.has_errors(),
        "unexpected diagnostics: {:?}",
        handler.diagnostics()
    );
    let module = lower_program(&hir, &handler);
    verify_module(&module).expect("lowering must produce well-formed MIR");
    module
}

fn main_func(module: &Module) -> &Function {
    &module.functions[module.main]
}

fn all_instrs(func: &Function) -> Vec<&InstKind> {
    func.blocks
        .iter()
        .flat_map(|b| b.instrs.iter().map(|i| &i.kind))
        .collect()
}

#[test]
fn straight_line_lowering() {
    let module = lower("Set `x` to _2_ + _3_. Give back `x`.");
    let main = main_func(&module);
    let instrs = all_instrs(main);
    assert!(instrs
        .iter()
        .any(|i| matches!(i, InstKind::BinaryOp { op: BinOp::Add, .. })));
    assert!(instrs.iter().any(|i| matches!(i, InstKind::StoreVar { .. })));
    // give back lowers to a Return terminator carrying a value.
    assert!(main
        .blocks
        .iter()
        .any(|b| matches!(b.term, Terminator::Return(Some(_)))));
}

#[test]
fn main_returns_trailing_expression_value() {
    let module = lower("Set `x` to _1_. `x` + _1_.");
    let main = main_func(&module);
    assert!(main
        .blocks
        .iter()
        .any(|b| matches!(b.term, Terminator::Return(Some(Value::Temp(_))))));
}

#[test]
fn empty_main_returns_nothing() {
    let module = lower("");
    let main = main_func(&module);
    assert_eq!(main.blocks[main.entry].term, Terminator::Return(None));
}

#[test]
fn if_statement_builds_diamond_with_phi() {
    let module = lower(
        "Set `x` to _15_.\n\
         If `x` is greater than _10_ then:\n\
         > Set `y` to _\"big\"_.\n\
         else:\n\
         > Set `y` to _\"small\"_.\n\
         Give back `y`.",
    );
    let main = main_func(&module);
    assert!(main.block_count() >= 4);
    let phis: Vec<_> = all_instrs(main)
        .into_iter()
        .filter(|i| matches!(i, InstKind::Phi { .. }))
        .collect();
    assert_eq!(phis.len(), 1, "one variable merges at the join");
    let InstKind::Phi { incoming, .. } = phis[0] else {
        unreachable!()
    };
    assert_eq!(incoming.len(), 2);
}

#[test]
fn one_armed_write_merges_empty() {
    let module = lower(
        "Set `c` to _Yes_.\n\
         If `c` then:\n\
         > Set `x` to _1_.\n\
         Give back `x`.",
    );
    let main = main_func(&module);
    let phis: Vec<_> = all_instrs(main)
        .into_iter()
        .filter_map(|i| match i {
            InstKind::Phi { incoming, .. } => Some(incoming),
            _ => None,
        })
        .collect();
    assert_eq!(phis.len(), 1);
    assert!(
        phis[0]
            .iter()
            .any(|(_, v)| matches!(v, Value::Const(Constant::Empty))),
        "the arm that never writes `x` must flow Empty into the phi"
    );
}

#[test]
fn short_circuit_and_splits_control_flow() {
    let module = lower("Give back _No_ and _1_ / _0_ equals _0_.");
    let main = main_func(&module);
    // The division lives in a block only reached when the left side is
    // truthy.
    assert!(main.block_count() >= 3);
    let entry_instrs: Vec<_> = main.blocks[main.entry]
        .instrs
        .iter()
        .map(|i| &i.kind)
        .collect();
    assert!(
        !entry_instrs
            .iter()
            .any(|i| matches!(i, InstKind::BinaryOp { op: BinOp::Div, .. })),
        "the right-hand side must not be evaluated in the entry block"
    );
    assert!(matches!(
        main.blocks[main.entry].term,
        Terminator::CondJump { .. }
    ));
}

#[test]
fn ternary_lowers_to_phi() {
    let module = lower("Give back _1_ if _Yes_ else _2_.");
    let main = main_func(&module);
    assert!(all_instrs(main)
        .iter()
        .any(|i| matches!(i, InstKind::Phi { .. })));
}

#[test]
fn methods_become_functions() {
    let module = lower(
        "### **Action**: `double`\n\
         <details>\n\
         #### Inputs\n\
         - `n` as Whole Number\n\
         give back `n` * _2_.\n\
         </details>\n\
         Give back call `double` with _21_.",
    );
    assert_eq!(module.functions.len(), 2);
    let double = &module.functions[FuncId(0)];
    assert_eq!(double.name.as_str(), "double");
    assert_eq!(double.params, 1);

    let main = main_func(&module);
    assert!(all_instrs(main).iter().any(|i| matches!(
        i,
        InstKind::Call {
            callee: Callee::Func(FuncId(0)),
            ..
        }
    )));
}

#[test]
fn unknown_callee_stays_by_name() {
    let module = lower("Call `print` with _1_.");
    let main = main_func(&module);
    assert!(all_instrs(main).iter().any(|i| matches!(
        i,
        InstKind::Call {
            callee: Callee::Name(_),
            dest: None,
            ..
        }
    )));
}

#[test]
fn say_lowers_to_print() {
    let module = lower("Say _\"hi\"_.");
    let main = main_func(&module);
    assert!(all_instrs(main)
        .iter()
        .any(|i| matches!(i, InstKind::Print { .. })));
}

// Optimisation passes -----------------------------------------------------

#[test]
fn constant_folding_collapses_arithmetic() {
    let mut module = lower("Set `x` to _2_ + _3_ * _4_. Give back `x`.");
    optimize_module(&mut module, OptLevel::Aggressive);
    verify_module(&module).unwrap();

    let main = main_func(&module);
    let instrs = all_instrs(main);
    assert!(
        instrs
            .iter()
            .any(|i| matches!(i, InstKind::LoadConst { value: Constant::Int(14), .. })),
        "2 + 3 * 4 must fold to 14: {instrs:?}"
    );
    assert!(
        !instrs.iter().any(|i| matches!(i, InstKind::BinaryOp { .. })),
        "no arithmetic should survive folding"
    );
}

#[test]
fn constant_folding_is_a_fixpoint() {
    let mut module = lower("Set `x` to _2_ + _3_ * _4_ - _1_. Give back `x`.");
    let main = module.main;
    assert!(constant_folding(&mut module.functions[main]));
    let snapshot = module.functions[main].clone();
    assert!(!constant_folding(&mut module.functions[main]));
    assert_eq!(module.functions[main], snapshot);
}

#[test]
fn division_by_zero_is_not_folded() {
    let mut module = lower("Give back _1_ / _0_.");
    optimize_module(&mut module, OptLevel::Aggressive);
    let main = main_func(&module);
    assert!(
        all_instrs(main)
            .iter()
            .any(|i| matches!(i, InstKind::BinaryOp { op: BinOp::Div, .. })),
        "the erroring division must stay for the runtime to report"
    );
}

#[test]
fn string_concat_folds() {
    let mut module = lower("Give back _\"foo\"_ + _\"bar\"_.");
    optimize_module(&mut module, OptLevel::Aggressive);
    let main = main_func(&module);
    let expected = Symbol::intern("foobar");
    assert!(all_instrs(main).iter().any(|i| matches!(
        i,
        InstKind::LoadConst {
            value: Constant::Str(s),
            ..
        } if *s == expected
    )));
}

#[test]
fn mixed_numeric_folding_promotes_to_float() {
    let mut module = lower("Give back _1_ + _0.5_.");
    optimize_module(&mut module, OptLevel::Aggressive);
    let main = main_func(&module);
    assert!(all_instrs(main).iter().any(|i| matches!(
        i,
        InstKind::LoadConst {
            value: Constant::Float(f),
            ..
        } if *f == 1.5
    )));
}

#[test]
fn dce_removes_unused_loads() {
    let mut module = lower("Set `x` to _1_. Set `y` to _2_. Give back `y`.");
    optimize_module(&mut module, OptLevel::Aggressive);
    let main = main_func(&module);
    // Stores persist (they are observable through later loads), but the
    // folded-away constant temps must be gone.
    let loads = all_instrs(main)
        .iter()
        .filter(|i| matches!(i, InstKind::LoadConst { .. }))
        .count();
    assert_eq!(loads, 2, "one constant per store survives");
}

#[test]
fn dce_preserves_prints_and_calls() {
    let mut module = lower("Say _1_. Call `print` with _2_.");
    optimize_module(&mut module, OptLevel::Aggressive);
    let main = main_func(&module);
    let instrs = all_instrs(main);
    assert!(instrs.iter().any(|i| matches!(i, InstKind::Print { .. })));
    assert!(instrs.iter().any(|i| matches!(i, InstKind::Call { .. })));
}

#[test]
fn code_after_return_is_unreachable_and_removed() {
    let mut module = lower("Give back _1_. Say _2_.");
    // Before DCE the orphaned code exists.
    let had_print = all_instrs(main_func(&module))
        .iter()
        .any(|i| matches!(i, InstKind::Print { .. }));
    assert!(had_print);

    optimize_module(&mut module, OptLevel::Aggressive);
    let main = main_func(&module);
    let reachable = reachable_blocks(main);
    for (block_id, block) in main.blocks.iter_enumerated() {
        if !reachable.contains(&block_id) {
            assert!(block.instrs.is_empty(), "unreachable blocks are cleared");
        }
    }
}

#[test]
fn folded_branch_drops_phi_edge() {
    let mut module = lower("Give back _1_ if _Yes_ else _2_.");
    optimize_module(&mut module, OptLevel::Aggressive);
    verify_module(&module).unwrap();
    let main = main_func(&module);
    // The constant condition folds the CondJump; the dead arm's phi edge
    // disappears with it.
    for kind in all_instrs(main) {
        if let InstKind::Phi { incoming, .. } = kind {
            assert_eq!(incoming.len(), 1);
        }
    }
}

#[test]
fn opt_level_none_is_identity() {
    let mut module = lower("Set `x` to _2_ + _3_. Give back `x`.");
    let snapshot = module.clone();
    optimize_module(&mut module, OptLevel::None);
    assert_eq!(module, snapshot);
}

// Verifier ---------------------------------------------------------------

#[test]
fn verifier_accepts_lowered_programs() {
    let module = lower(
        "Set `a` to _1_.\nIf `a` then:\n> Set `a` to _2_.\nGive back `a`.",
    );
    assert!(verify_module(&module).is_ok());
}

#[test]
fn verifier_rejects_double_definition() {
    let mut blocks: IndexVec<BlockId, BasicBlock> = IndexVec::new();
    let temp = TempId(0);
    blocks.push(BasicBlock {
        instrs: vec![
            Inst {
                kind: InstKind::LoadConst {
                    dest: temp,
                    value: Constant::Int(1),
                },
                span: Span::DUMMY,
            },
            Inst {
                kind: InstKind::LoadConst {
                    dest: temp,
                    value: Constant::Int(2),
                },
                span: Span::DUMMY,
            },
        ],
        term: Terminator::Return(None),
    });
    let func = Function {
        name: Symbol::intern("broken"),
        params: 0,
        locals: IndexVec::new(),
        blocks,
        entry: BlockId(0),
        temps: 1,
        span: Span::DUMMY,
    };
    assert!(verify_function(&func).is_err());
}

#[test]
fn verifier_rejects_undefined_use() {
    let mut blocks: IndexVec<BlockId, BasicBlock> = IndexVec::new();
    blocks.push(BasicBlock {
        instrs: Vec::new(),
        term: Terminator::Return(Some(Value::Temp(TempId(7)))),
    });
    let func = Function {
        name: Symbol::intern("broken"),
        params: 0,
        locals: IndexVec::new(),
        blocks,
        entry: BlockId(0),
        temps: 8,
        span: Span::DUMMY,
    };
    assert!(verify_function(&func).is_err());
}
