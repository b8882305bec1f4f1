//! Global string table backing [`Symbol`].
//!
//! Lookups go through a `DashMap` keyed by the string contents so concurrent
//! interning never blocks readers; resolved strings sit in an append-only
//! vector indexed by symbol. Interned strings are leaked to obtain `'static`
//! lifetime, which is acceptable for a process whose unique-string count is
//! bounded by its input.

use ahash::RandomState;
use dashmap::DashMap;
use std::sync::{LazyLock, RwLock};

use super::Symbol;

/// The one global string table.
///
/// Language keywords are pre-interned so their symbols are stable across
/// runs and cheap to compare against.
pub(crate) static STRING_TABLE: LazyLock<StringTable> = LazyLock::new(|| {
    let table = StringTable::new();
    for kw in KNOWN_STRINGS {
        table.intern(kw);
    }
    table
});

/// Keywords and operator words interned at startup.
const KNOWN_STRINGS: &[&str] = &[
    "set", "to", "give back", "gives back", "if", "when", "whenever", "then", "else",
    "otherwise", "call", "use", "apply", "with", "say", "and", "or", "not", "action",
    "interaction", "inputs", "outputs", "as", "equals", "empty", "yes", "no",
    // Built-in function names
    "print", "type", "len", "str", "int", "float", "bool", "abs", "min", "max",
    "is_empty", "round", "main",
];

pub(crate) struct StringTable {
    /// string → symbol index.
    map: DashMap<&'static str, u32, RandomState>,
    /// symbol index → string. Append-only.
    strings: RwLock<Vec<&'static str>>,
}

impl StringTable {
    fn new() -> Self {
        Self {
            map: DashMap::with_hasher(RandomState::new()),
            strings: RwLock::new(Vec::with_capacity(256)),
        }
    }

    pub(crate) fn intern(&self, string: &str) -> Symbol {
        if let Some(index) = self.map.get(string) {
            return Symbol::from_index(*index);
        }

        // Writers serialise on the strings vector; re-check under the lock so
        // two racing interns of a new string agree on one index.
        let mut strings = self.strings.write().expect("interner poisoned");
        if let Some(index) = self.map.get(string) {
            return Symbol::from_index(*index);
        }
        let leaked: &'static str = Box::leak(string.to_owned().into_boxed_str());
        let index = strings.len() as u32;
        strings.push(leaked);
        self.map.insert(leaked, index);
        Symbol::from_index(index)
    }

    pub(crate) fn get(&self, symbol: Symbol) -> &'static str {
        self.strings.read().expect("interner poisoned")[symbol.as_u32() as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_strings_preinterned() {
        // Keywords were interned at startup, so they sit in the low,
        // reserved index range.
        for kw in ["give back", "set", "whenever", "print"] {
            let sym = Symbol::intern(kw);
            assert!(
                (sym.as_u32() as usize) < KNOWN_STRINGS.len(),
                "`{kw}` should be pre-interned, got index {}",
                sym.as_u32()
            );
        }
    }

    #[test]
    fn test_indices_are_dense() {
        let a = Symbol::intern("dense_check_a");
        assert_eq!(STRING_TABLE.get(a), "dense_check_a");
    }

    #[test]
    fn test_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<StringTable>();
    }
}
