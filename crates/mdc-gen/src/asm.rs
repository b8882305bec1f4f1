//! Assembly-level code representation.
//!
//! Codegen builds a list of instructions per laid-out block with jumps
//! still referring to block ids. The peephole pass rewrites this list;
//! assembly then concatenates the blocks, resolves block ids to byte
//! offsets and patches the signed 16-bit jump operands.

use mdc_bc::{Chunk, LineTable, Op, OperandKind};
use mdc_mir::BlockId;
use mdc_util::FxHashMap;

use crate::error::CodegenError;

/// One not-yet-encoded instruction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AsmInst {
    pub op: Op,
    pub operand: AsmOperand,
    /// Source position for the line table; (0, 0) means unknown.
    pub line: (u32, u32),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AsmOperand {
    None,
    U8(u8),
    U16(u16),
    /// A branch target, resolved during assembly.
    Target(BlockId),
}

impl AsmInst {
    pub fn new(op: Op, operand: AsmOperand, line: (u32, u32)) -> Self {
        debug_assert!(
            matches!(
                (op.operand(), operand),
                (OperandKind::None, AsmOperand::None)
                    | (OperandKind::U8, AsmOperand::U8(_))
                    | (OperandKind::U16, AsmOperand::U16(_))
                    | (OperandKind::I16, AsmOperand::Target(_))
            ),
            "operand shape mismatch for {op:?}"
        );
        Self { op, operand, line }
    }

    /// Encoded size in bytes.
    pub fn width(&self) -> usize {
        1 + self.op.operand().width()
    }
}

/// The instructions of one function, grouped by laid-out block.
pub struct AsmCode {
    /// Blocks in layout order.
    pub blocks: Vec<(BlockId, Vec<AsmInst>)>,
}

impl AsmCode {
    /// Encode to bytes, resolving branch targets. `arity` and `locals`
    /// fill in the chunk header.
    pub fn assemble(&self, arity: u8, locals: u16) -> Result<Chunk, CodegenError> {
        // First pass: byte offset of every block.
        let mut offsets: FxHashMap<BlockId, usize> = FxHashMap::default();
        let mut pc = 0usize;
        for (block, instrs) in &self.blocks {
            offsets.insert(*block, pc);
            pc += instrs.iter().map(AsmInst::width).sum::<usize>();
        }

        // Second pass: emit, patching jumps relative to the following
        // instruction.
        let mut code = Vec::with_capacity(pc);
        let mut lines = LineTable::new();
        for (_, instrs) in &self.blocks {
            for inst in instrs {
                if inst.line.0 != 0 {
                    lines.push(code.len() as u32, inst.line.0, inst.line.1);
                }
                code.push(inst.op as u8);
                match inst.operand {
                    AsmOperand::None => {}
                    AsmOperand::U8(value) => code.push(value),
                    AsmOperand::U16(value) => code.extend_from_slice(&value.to_le_bytes()),
                    AsmOperand::Target(block) => {
                        let target = offsets[&block] as i64;
                        let after = (code.len() + 2) as i64;
                        let distance = target - after;
                        let offset = i16::try_from(distance)
                            .map_err(|_| CodegenError::JumpTooFar { distance })?;
                        code.extend_from_slice(&offset.to_le_bytes());
                    }
                }
            }
        }

        Ok(Chunk {
            arity,
            locals,
            code,
            lines,
        })
    }
}
