//! Codegen tests: MIR built from real source, assertions on the emitted
//! module and its disassembly.

use crate::asm::{AsmCode, AsmInst, AsmOperand};
use crate::codegen::generate_module;
use crate::error::CodegenError;
use crate::peephole;
use mdc_bc::{disassemble, BcConst, Op};
use mdc_mir::optimize::OptLevel;
use mdc_mir::BlockId;
use mdc_util::Handler;

fn mir_for(source: &str, level: OptLevel) -> mdc_mir::Module {
    let handler = Handler::new();
    let ast = mdc_par::parse(source, &handler);
    let hir = mdc_hir::lower_program(&ast, &handler);
    assert!(!handler.has_errors(), "{:?}", handler.diagnostics());
    let mut module = mdc_mir::lower_program(&hir, &handler);
    mdc_mir::optimize_module(&mut module, level);
    module
}

fn compile(source: &str, level: OptLevel) -> mdc_bc::Module {
    let mir = mir_for(source, level);
    generate_module(&mir, "test", level).expect("codegen must succeed")
}

#[test]
fn main_chunk_ends_with_return() {
    let module = compile("Set `x` to _1_. Give back `x`.", OptLevel::None);
    assert_eq!(module.main.arity, 0);
    assert_eq!(*module.main.code.last().unwrap(), Op::Return as u8);
}

#[test]
fn methods_become_chunks_and_globals() {
    let module = compile(
        "### **Action**: `double`\n\
         <details>\n\
         #### Inputs\n\
         - `n` as Whole Number\n\
         give back `n` * _2_.\n\
         </details>\n\
         Give back call `double` with _21_.",
        OptLevel::None,
    );
    assert_eq!(module.functions.len(), 1);
    assert_eq!(module.functions[0].arity, 1);
    assert_eq!(module.global("double"), Some(BcConst::FuncRef(0)));
}

#[test]
fn constants_are_deduplicated() {
    let module = compile(
        "Set `a` to _7_. Set `b` to _7_. Set `c` to _7_.",
        OptLevel::None,
    );
    let sevens = module
        .constants
        .iter()
        .filter(|c| matches!(c, BcConst::Int(7)))
        .count();
    assert_eq!(sevens, 1);
}

#[test]
fn url_literal_uses_load_url() {
    let module = compile(
        "Set `site` to _\"https://example.com\"_.",
        OptLevel::None,
    );
    let text = disassemble(&module);
    assert!(text.contains("LOAD_URL"), "{text}");
    assert!(
        module
            .strings
            .iter()
            .any(|s| s == "https://example.com"),
        "url string is interned"
    );
}

#[test]
fn call_loads_callee_by_name_constant() {
    let module = compile("Call `print` with _1_.", OptLevel::None);
    let text = disassemble(&module);
    assert!(text.contains("LOAD_GLOBAL"), "{text}");
    assert!(text.contains("CALL 1"), "{text}");
    // A statement call discards its result.
    assert!(text.contains("POP"), "{text}");
    assert!(module.strings.iter().any(|s| s == "print"));
}

#[test]
fn if_compiles_to_conditional_jump() {
    let module = compile(
        "Set `x` to _5_.\nIf `x` is greater than _3_ then:\n> Say _1_.\n",
        OptLevel::None,
    );
    let text = disassemble(&module);
    assert!(text.contains("JUMP_IF_FALSE"), "{text}");
    assert!(text.contains("GT"), "{text}");
}

#[test]
fn peephole_shrinks_code() {
    let source = "Set `x` to _15_.\n\
                  If `x` is greater than _10_ then:\n\
                  > Set `y` to _1_.\n\
                  else:\n\
                  > Set `y` to _2_.\n\
                  Give back `y`.";
    // Same MIR both times; only the bytecode peephole differs.
    let mir = mir_for(source, OptLevel::None);
    let raw = generate_module(&mir, "test", OptLevel::None).unwrap();
    let tidy = generate_module(&mir, "test", OptLevel::Basic).unwrap();
    assert!(
        tidy.main.code.len() < raw.main.code.len(),
        "peephole should at least drop jumps to the next block: {} vs {}",
        tidy.main.code.len(),
        raw.main.code.len()
    );
}

#[test]
fn line_info_maps_back_to_source() {
    let module = compile("Set `x` to _1_.\nSay `x`.", OptLevel::None);
    // The first instruction comes from line 1.
    assert_eq!(module.main.lines.lookup(0).map(|(line, _)| line), Some(1));
    // Some instruction maps to line 2.
    let has_line2 = (0..module.main.code.len() as u32)
        .filter_map(|pc| module.main.lines.lookup(pc))
        .any(|(line, _)| line == 2);
    assert!(has_line2);
}

#[test]
fn too_many_locals_is_an_error() {
    let source: String = (0..300)
        .map(|i| format!("Set `v{i}` to _{i}_.\n"))
        .collect();
    let mir = mir_for(&source, OptLevel::None);
    let result = generate_module(&mir, "test", OptLevel::None);
    assert!(matches!(result, Err(CodegenError::TooManySlots { .. })));
}

#[test]
fn temps_share_slots() {
    // A long chain of independent expressions must not need a slot per
    // temp.
    let source = "Set `a` to _1_ + _2_. Set `b` to _3_ + _4_. Set `c` to _5_ + _6_. Give back `a` + `b` + `c`.";
    let module = compile(source, OptLevel::None);
    // 3 named locals + a small working set of temp slots, far below the
    // total temp count.
    assert!(
        module.main.locals < 12,
        "expected slot reuse, got {} slots",
        module.main.locals
    );
}

#[test]
fn generated_module_round_trips_through_serialisation() {
    let module = compile(
        "Set `x` to _15_.\nIf `x` is greater than _10_ then:\n> Set `y` to _\"big\"_.\nelse:\n> Set `y` to _\"small\"_.\nGive back `y`.",
        OptLevel::Aggressive,
    );
    let decoded = mdc_bc::Module::decode(&module.encode()).unwrap();
    assert_eq!(module, decoded);
}

// Peephole patterns, exercised directly on the assembly form.

fn inst(op: Op, operand: AsmOperand) -> AsmInst {
    AsmInst::new(op, operand, (1, 1))
}

#[test]
fn peephole_removes_const_then_pop() {
    let mut code = AsmCode {
        blocks: vec![(
            BlockId(0),
            vec![
                inst(Op::LoadConst, AsmOperand::U16(0)),
                inst(Op::Pop, AsmOperand::None),
                inst(Op::Return, AsmOperand::None),
            ],
        )],
    };
    peephole::run(&mut code);
    assert_eq!(code.blocks[0].1.len(), 1);
    assert_eq!(code.blocks[0].1[0].op, Op::Return);
}

#[test]
fn peephole_folds_true_condition() {
    let mut code = AsmCode {
        blocks: vec![
            (
                BlockId(0),
                vec![
                    inst(Op::LoadTrue, AsmOperand::None),
                    inst(Op::JumpIfFalse, AsmOperand::Target(BlockId(2))),
                    inst(Op::Jump, AsmOperand::Target(BlockId(1))),
                ],
            ),
            (BlockId(1), vec![inst(Op::Return, AsmOperand::None)]),
            (BlockId(2), vec![inst(Op::Return, AsmOperand::None)]),
        ],
    };
    peephole::run(&mut code);
    // The conditional pair is gone; the jump to the next block falls away
    // too.
    assert!(code.blocks[0].1.is_empty(), "{:?}", code.blocks[0].1);
}

#[test]
fn peephole_folds_false_condition_to_jump() {
    let mut code = AsmCode {
        blocks: vec![
            (
                BlockId(0),
                vec![
                    inst(Op::LoadFalse, AsmOperand::None),
                    inst(Op::JumpIfFalse, AsmOperand::Target(BlockId(2))),
                    inst(Op::Jump, AsmOperand::Target(BlockId(1))),
                ],
            ),
            (BlockId(1), vec![inst(Op::Return, AsmOperand::None)]),
            (BlockId(2), vec![inst(Op::Return, AsmOperand::None)]),
        ],
    };
    peephole::run(&mut code);
    let block0 = &code.blocks[0].1;
    assert_eq!(block0.len(), 1);
    assert_eq!(block0[0].op, Op::Jump);
    assert_eq!(block0[0].operand, AsmOperand::Target(BlockId(2)));
}

#[test]
fn peephole_drops_jump_to_next_block() {
    let mut code = AsmCode {
        blocks: vec![
            (
                BlockId(0),
                vec![inst(Op::Jump, AsmOperand::Target(BlockId(1)))],
            ),
            (BlockId(1), vec![inst(Op::Return, AsmOperand::None)]),
        ],
    };
    peephole::run(&mut code);
    assert!(code.blocks[0].1.is_empty());
}
