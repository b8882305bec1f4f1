//! Binary serialisation of compiled modules (`.mdc`).
//!
//! Layout, all integers little-endian:
//!
//! ```text
//! magic               u32  = 0xBEBECAFE
//! version             u16  = 0x0001
//! flags               u16  (bit0: little-endian)
//! module_type         u8   (0 = procedural, 1 = class, reserved)
//! name_len            u16  ; name bytes (UTF-8)
//! string_table_count  u32  ; entries: len u32 + bytes
//! constant_pool_count u16  ; entries: tag u8 + payload
//!   tag 0 Empty       : (none)
//!   tag 1 Int         : i64
//!   tag 2 Float       : f64
//!   tag 3 StringRef   : u32 index into string table
//!   tag 4 FunctionRef : u16 index into functions
//! globals_count       u16  ; entries: name_idx u32, const_idx u16
//! main_chunk          ; Chunk
//! function_count      u16  ; then Chunks
//! ```
//!
//! `Chunk` = arity u8, locals u16, code_len u32, code bytes,
//! lineinfo_len u32, lineinfo. Line info is a sequence of 12-byte runs
//! (pc u32, line u32, column u32) mapping pc ranges to source positions.
//!
//! Decoding is strict: a bad magic number, version, tag or truncated input
//! is an error, never a panic.

use thiserror::Error;

use crate::chunk::{Chunk, LineRun, LineTable};
use crate::module::{BcConst, Module};

/// Magic number opening every compiled module.
pub const MAGIC: u32 = 0xBEBE_CAFE;

/// Current format version.
pub const VERSION: u16 = 0x0001;

/// Flag bit 0: integers are little-endian.
pub const FLAG_LITTLE_ENDIAN: u16 = 0x0001;

/// Errors raised while decoding a module.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("input ended unexpectedly at offset {0}")]
    UnexpectedEof(usize),
    #[error("bad magic number {0:#010x}, expected {MAGIC:#010x}")]
    BadMagic(u32),
    #[error("unsupported module version {0}")]
    UnsupportedVersion(u16),
    #[error("unknown constant tag {0} at offset {1}")]
    BadConstTag(u8, usize),
    #[error("string table entry is not valid UTF-8")]
    BadUtf8,
    #[error("{0} bytes of trailing garbage after the module")]
    TrailingBytes(usize),
}

impl Module {
    /// Serialise the module to bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        write_u32(&mut out, MAGIC);
        write_u16(&mut out, VERSION);
        write_u16(&mut out, FLAG_LITTLE_ENDIAN);
        out.push(0); // module_type: procedural

        write_u16(&mut out, self.name.len() as u16);
        out.extend_from_slice(self.name.as_bytes());

        write_u32(&mut out, self.strings.len() as u32);
        for s in &self.strings {
            write_u32(&mut out, s.len() as u32);
            out.extend_from_slice(s.as_bytes());
        }

        write_u16(&mut out, self.constants.len() as u16);
        for constant in &self.constants {
            match constant {
                BcConst::Empty => out.push(0),
                BcConst::Int(i) => {
                    out.push(1);
                    out.extend_from_slice(&i.to_le_bytes());
                }
                BcConst::Float(f) => {
                    out.push(2);
                    out.extend_from_slice(&f.to_le_bytes());
                }
                BcConst::StrRef(i) => {
                    out.push(3);
                    write_u32(&mut out, *i);
                }
                BcConst::FuncRef(i) => {
                    out.push(4);
                    write_u16(&mut out, *i);
                }
            }
        }

        write_u16(&mut out, self.globals.len() as u16);
        for (&name_idx, &const_idx) in &self.globals {
            write_u32(&mut out, name_idx);
            write_u16(&mut out, const_idx);
        }

        encode_chunk(&mut out, &self.main);
        write_u16(&mut out, self.functions.len() as u16);
        for chunk in &self.functions {
            encode_chunk(&mut out, chunk);
        }

        out
    }

    /// Deserialise a module. `decode(encode(m)) == m` for every valid `m`.
    pub fn decode(bytes: &[u8]) -> Result<Module, DecodeError> {
        let mut r = Reader::new(bytes);

        let magic = r.u32()?;
        if magic != MAGIC {
            return Err(DecodeError::BadMagic(magic));
        }
        let version = r.u16()?;
        if version != VERSION {
            return Err(DecodeError::UnsupportedVersion(version));
        }
        let _flags = r.u16()?;
        let _module_type = r.u8()?;

        let name_len = r.u16()? as usize;
        let name = r.string(name_len)?;

        // Counts are untrusted until their reads succeed; allocate as the
        // entries arrive.
        let string_count = r.u32()? as usize;
        let mut strings = Vec::new();
        for _ in 0..string_count {
            let len = r.u32()? as usize;
            strings.push(r.string(len)?);
        }

        let const_count = r.u16()? as usize;
        let mut constants = Vec::new();
        for _ in 0..const_count {
            let offset = r.offset;
            let tag = r.u8()?;
            constants.push(match tag {
                0 => BcConst::Empty,
                1 => BcConst::Int(i64::from_le_bytes(r.array()?)),
                2 => BcConst::Float(f64::from_le_bytes(r.array()?)),
                3 => BcConst::StrRef(r.u32()?),
                4 => BcConst::FuncRef(r.u16()?),
                _ => return Err(DecodeError::BadConstTag(tag, offset)),
            });
        }

        let globals_count = r.u16()? as usize;
        let mut globals = indexmap::IndexMap::new();
        for _ in 0..globals_count {
            let name_idx = r.u32()?;
            let const_idx = r.u16()?;
            globals.insert(name_idx, const_idx);
        }

        let main = decode_chunk(&mut r)?;
        let function_count = r.u16()? as usize;
        let mut functions = Vec::new();
        for _ in 0..function_count {
            functions.push(decode_chunk(&mut r)?);
        }

        if r.offset != bytes.len() {
            return Err(DecodeError::TrailingBytes(bytes.len() - r.offset));
        }

        Ok(Module {
            name,
            strings,
            constants,
            globals,
            main,
            functions,
        })
    }
}

fn encode_chunk(out: &mut Vec<u8>, chunk: &Chunk) {
    out.push(chunk.arity);
    write_u16(out, chunk.locals);
    write_u32(out, chunk.code.len() as u32);
    out.extend_from_slice(&chunk.code);

    let runs = chunk.lines.runs();
    write_u32(out, (runs.len() * 12) as u32);
    for run in runs {
        write_u32(out, run.pc);
        write_u32(out, run.line);
        write_u32(out, run.column);
    }
}

fn decode_chunk(r: &mut Reader<'_>) -> Result<Chunk, DecodeError> {
    let arity = r.u8()?;
    let locals = r.u16()?;
    let code_len = r.u32()? as usize;
    let code = r.bytes(code_len)?.to_vec();

    let lineinfo_len = r.u32()? as usize;
    let mut runs = Vec::new();
    let lineinfo_end = r
        .offset
        .checked_add(lineinfo_len)
        .filter(|&end| end <= r.bytes.len())
        .ok_or(DecodeError::UnexpectedEof(r.offset))?;
    while r.offset + 12 <= lineinfo_end {
        runs.push(LineRun {
            pc: r.u32()?,
            line: r.u32()?,
            column: r.u32()?,
        });
    }
    // Skip any padding a foreign writer may have added.
    if r.offset < lineinfo_end {
        r.bytes(lineinfo_end - r.offset)?;
    }

    Ok(Chunk {
        arity,
        locals,
        code,
        lines: LineTable::from_runs(runs),
    })
}

fn write_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn write_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    fn bytes(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        let end = self
            .offset
            .checked_add(len)
            .filter(|&end| end <= self.bytes.len())
            .ok_or(DecodeError::UnexpectedEof(self.offset))?;
        let slice = &self.bytes[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let slice = self.bytes(N)?;
        Ok(slice.try_into().expect("slice length checked"))
    }

    fn u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.array::<1>()?[0])
    }

    fn u16(&mut self) -> Result<u16, DecodeError> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    fn u32(&mut self) -> Result<u32, DecodeError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn string(&mut self, len: usize) -> Result<String, DecodeError> {
        let bytes = self.bytes(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| DecodeError::BadUtf8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::ModuleBuilder;
    use crate::opcode::Op;

    fn sample_module() -> Module {
        let mut builder = ModuleBuilder::new("sample");
        let int_const = builder.add_const(BcConst::Int(42));
        let _float_const = builder.add_const(BcConst::Float(3.25));
        let str_const = builder.add_str_const("hello");
        let func_const = builder.add_const(BcConst::FuncRef(0));
        builder.define_global("greet", func_const);

        let mut main = Chunk {
            arity: 0,
            locals: 2,
            code: Vec::new(),
            lines: LineTable::new(),
        };
        main.code.push(Op::LoadConst as u8);
        main.code.extend_from_slice(&int_const.to_le_bytes());
        main.code.push(Op::Return as u8);
        main.lines.push(0, 1, 1);

        let mut greet = Chunk {
            arity: 1,
            locals: 1,
            code: Vec::new(),
            lines: LineTable::new(),
        };
        greet.code.push(Op::LoadConst as u8);
        greet.code.extend_from_slice(&str_const.to_le_bytes());
        greet.code.push(Op::Print as u8);
        greet.code.push(Op::LoadEmpty as u8);
        greet.code.push(Op::Return as u8);
        greet.lines.push(0, 3, 1);
        greet.lines.push(4, 4, 1);

        builder.finish(main, vec![greet])
    }

    #[test]
    fn test_round_trip() {
        let module = sample_module();
        let bytes = module.encode();
        let decoded = Module::decode(&bytes).unwrap();
        assert_eq!(module, decoded);
    }

    #[test]
    fn test_magic_is_first() {
        let bytes = sample_module().encode();
        assert_eq!(&bytes[0..4], &MAGIC.to_le_bytes());
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = sample_module().encode();
        bytes[0] ^= 0xff;
        assert!(matches!(
            Module::decode(&bytes),
            Err(DecodeError::BadMagic(_))
        ));
    }

    #[test]
    fn test_bad_version() {
        let mut bytes = sample_module().encode();
        bytes[4] = 0x99;
        assert!(matches!(
            Module::decode(&bytes),
            Err(DecodeError::UnsupportedVersion(_))
        ));
    }

    #[test]
    fn test_truncated_input() {
        let bytes = sample_module().encode();
        for len in [0, 3, 8, bytes.len() / 2, bytes.len() - 1] {
            assert!(
                Module::decode(&bytes[..len]).is_err(),
                "truncation to {len} bytes must fail"
            );
        }
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut bytes = sample_module().encode();
        bytes.push(0);
        assert!(matches!(
            Module::decode(&bytes),
            Err(DecodeError::TrailingBytes(1))
        ));
    }

    #[test]
    fn test_bad_const_tag() {
        let module = sample_module();
        let bytes = module.encode();
        // Find the constant pool: skip header, name, strings.
        // Easier: corrupt every byte position and ensure no panic.
        for i in 0..bytes.len() {
            let mut corrupted = bytes.clone();
            corrupted[i] = 0xfe;
            let _ = Module::decode(&corrupted);
        }
    }

    #[test]
    fn test_empty_module_round_trips() {
        let builder = ModuleBuilder::new("empty");
        let module = builder.finish(Chunk::default(), Vec::new());
        let decoded = Module::decode(&module.encode()).unwrap();
        assert_eq!(module, decoded);
    }
}
