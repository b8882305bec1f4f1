//! The compiled module: string table, constant pool, symbol table and
//! chunks, plus the builder codegen uses to assemble one with
//! deduplication.

use indexmap::IndexMap;
use rustc_hash::FxHashMap;

use crate::chunk::Chunk;

/// A constant pool entry. Strings live in the module's string table and
/// are referenced by index; functions are referenced by chunk index.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BcConst {
    Empty,
    Int(i64),
    Float(f64),
    StrRef(u32),
    FuncRef(u16),
}

/// A compiled, serialisable module.
#[derive(Clone, Debug, PartialEq)]
pub struct Module {
    /// Module name (the source file stem, or `main`).
    pub name: String,
    /// Deduplicated interned strings.
    pub strings: Vec<String>,
    /// Deduplicated constants.
    pub constants: Vec<BcConst>,
    /// Global names (as string-table indices) to constant-pool indices,
    /// in definition order.
    pub globals: IndexMap<u32, u16>,
    /// Top-level code.
    pub main: Chunk,
    /// Function chunks, indexed by `FuncRef`.
    pub functions: Vec<Chunk>,
}

impl Module {
    /// Resolve a string-table index.
    pub fn string(&self, index: u32) -> Option<&str> {
        self.strings.get(index as usize).map(|s| s.as_str())
    }

    /// Look up a global's constant by name.
    pub fn global(&self, name: &str) -> Option<BcConst> {
        let index = self.strings.iter().position(|s| s == name)? as u32;
        let const_idx = *self.globals.get(&index)?;
        self.constants.get(const_idx as usize).copied()
    }
}

/// Builds a [`Module`], interning strings and deduplicating constants.
#[derive(Default)]
pub struct ModuleBuilder {
    name: String,
    strings: Vec<String>,
    string_indices: FxHashMap<String, u32>,
    constants: Vec<BcConst>,
    const_indices: FxHashMap<ConstKey, u16>,
    globals: IndexMap<u32, u16>,
}

/// Hashable identity of a constant. Floats dedup by bit pattern.
#[derive(PartialEq, Eq, Hash)]
enum ConstKey {
    Empty,
    Int(i64),
    Float(u64),
    StrRef(u32),
    FuncRef(u16),
}

impl ConstKey {
    fn of(constant: BcConst) -> Self {
        match constant {
            BcConst::Empty => ConstKey::Empty,
            BcConst::Int(i) => ConstKey::Int(i),
            BcConst::Float(f) => ConstKey::Float(f.to_bits()),
            BcConst::StrRef(i) => ConstKey::StrRef(i),
            BcConst::FuncRef(i) => ConstKey::FuncRef(i),
        }
    }
}

impl ModuleBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Intern a string, returning its table index.
    pub fn intern_string(&mut self, s: &str) -> u32 {
        if let Some(&index) = self.string_indices.get(s) {
            return index;
        }
        let index = self.strings.len() as u32;
        self.strings.push(s.to_owned());
        self.string_indices.insert(s.to_owned(), index);
        index
    }

    /// Add a constant, returning its pool index. Identical constants share
    /// an entry.
    pub fn add_const(&mut self, constant: BcConst) -> u16 {
        let key = ConstKey::of(constant);
        if let Some(&index) = self.const_indices.get(&key) {
            return index;
        }
        let index = self.constants.len() as u16;
        self.constants.push(constant);
        self.const_indices.insert(key, index);
        index
    }

    /// Convenience: intern a string and add a `StrRef` constant for it.
    pub fn add_str_const(&mut self, s: &str) -> u16 {
        let string_index = self.intern_string(s);
        self.add_const(BcConst::StrRef(string_index))
    }

    /// Bind a global name to a constant.
    pub fn define_global(&mut self, name: &str, const_index: u16) {
        let name_index = self.intern_string(name);
        self.globals.insert(name_index, const_index);
    }

    pub fn finish(self, main: Chunk, functions: Vec<Chunk>) -> Module {
        Module {
            name: self.name,
            strings: self.strings,
            constants: self.constants,
            globals: self.globals,
            main,
            functions,
        }
    }
}
