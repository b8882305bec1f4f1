//! Bytecode disassembler.
//!
//! Renders a module as text for `-d` output and the `disasm` command:
//! header, constant pool, globals, then each chunk with offsets, mnemonics,
//! resolved constant operands, computed jump targets and line markers.

use std::fmt::Write;

use crate::chunk::Chunk;
use crate::module::{BcConst, Module};
use crate::opcode::{Op, OperandKind};

/// Disassemble a whole module.
pub fn disassemble(module: &Module) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "module {}", module.name);

    if !module.constants.is_empty() {
        let _ = writeln!(out, "constants:");
        for (index, constant) in module.constants.iter().enumerate() {
            let _ = writeln!(out, "  [{index}] {}", render_const(module, *constant));
        }
    }

    if !module.globals.is_empty() {
        let _ = writeln!(out, "globals:");
        for (&name_idx, &const_idx) in &module.globals {
            let name = module.string(name_idx).unwrap_or("<bad-string>");
            let _ = writeln!(out, "  {name} -> const [{const_idx}]");
        }
    }

    let _ = writeln!(out, "chunk main:");
    disassemble_chunk(&mut out, module, &module.main);

    for (index, chunk) in module.functions.iter().enumerate() {
        let _ = writeln!(out, "chunk fn[{index}]:");
        disassemble_chunk(&mut out, module, chunk);
    }

    out
}

fn disassemble_chunk(out: &mut String, module: &Module, chunk: &Chunk) {
    let _ = writeln!(
        out,
        "  ; arity {} locals {} code {} bytes",
        chunk.arity,
        chunk.locals,
        chunk.code.len()
    );

    let mut pc = 0usize;
    let mut last_pos = None;
    while pc < chunk.code.len() {
        let here = pc;
        let byte = chunk.code[pc];
        pc += 1;

        let position = chunk.lines.lookup(here as u32);
        let marker = if position != last_pos {
            last_pos = position;
            match position {
                Some((line, col)) => format!("{line}:{col}"),
                None => String::new(),
            }
        } else {
            String::new()
        };

        let Some(op) = Op::from_u8(byte) else {
            let _ = writeln!(out, "  {here:04} {marker:>7}  .byte {byte:#04x}");
            continue;
        };

        let operand_text = match op.operand() {
            OperandKind::None => String::new(),
            OperandKind::U8 => {
                let value = chunk.code.get(pc).copied().unwrap_or(0);
                pc += 1;
                format!(" {value}")
            }
            OperandKind::U16 => {
                let value = read_u16(&chunk.code, pc);
                pc += 2;
                match op {
                    Op::LoadConst | Op::LoadUrl => {
                        match module.constants.get(value as usize) {
                            Some(c) => format!(" [{value}] ; {}", render_const(module, *c)),
                            None => format!(" [{value}] ; <bad-const>"),
                        }
                    }
                    Op::LoadGlobal | Op::StoreGlobal => {
                        let name = module
                            .globals
                            .get_index(value as usize)
                            .and_then(|(&name_idx, _)| module.string(name_idx))
                            .unwrap_or("<bad-global>");
                        format!(" [{value}] ; {name}")
                    }
                    _ => format!(" {value}"),
                }
            }
            OperandKind::I16 => {
                let value = read_u16(&chunk.code, pc) as i16;
                pc += 2;
                let target = pc as i64 + value as i64;
                format!(" {value:+} ; -> {target:04}")
            }
        };

        let _ = writeln!(out, "  {here:04} {marker:>7}  {}{operand_text}", op.mnemonic());
    }
}

fn render_const(module: &Module, constant: BcConst) -> String {
    match constant {
        BcConst::Empty => "empty".to_owned(),
        BcConst::Int(i) => format!("int {i}"),
        BcConst::Float(f) => format!("float {f}"),
        BcConst::StrRef(i) => match module.string(i) {
            Some(s) => format!("str {s:?}"),
            None => format!("str <bad index {i}>"),
        },
        BcConst::FuncRef(i) => format!("fn[{i}]"),
    }
}

fn read_u16(code: &[u8], pc: usize) -> u16 {
    let lo = code.get(pc).copied().unwrap_or(0);
    let hi = code.get(pc + 1).copied().unwrap_or(0);
    u16::from_le_bytes([lo, hi])
}
