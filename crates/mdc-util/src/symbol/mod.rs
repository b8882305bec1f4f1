//! String interning.
//!
//! A [`Symbol`] is a 4-byte handle to a string stored once in a global table.
//! Identifiers, keywords and string literals repeat constantly across a
//! compile, so every phase passes symbols around instead of `String`s:
//! comparison is an integer compare and cloning is a copy.
//!
//! Interned strings live for the program duration; the table only grows.
//!
//! # Examples
//!
//! ```
//! use mdc_util::Symbol;
//!
//! let a = Symbol::intern("total price");
//! let b = Symbol::intern("total price");
//! assert_eq!(a, b);
//! assert_eq!(a.as_str(), "total price");
//! ```

mod interner;

use interner::STRING_TABLE;
use std::fmt;

/// An interned string.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Symbol {
    index: u32,
}

impl Symbol {
    /// Intern a string, returning its symbol.
    ///
    /// Interning the same string twice yields the same symbol.
    pub fn intern(string: &str) -> Self {
        STRING_TABLE.intern(string)
    }

    /// The string this symbol stands for.
    pub fn as_str(self) -> &'static str {
        STRING_TABLE.get(self)
    }

    /// The raw table index. Useful for serialization and debugging.
    #[inline]
    pub fn as_u32(self) -> u32 {
        self.index
    }

    pub(crate) fn from_index(index: u32) -> Self {
        Self { index }
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({:?})", self.as_str())
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_same_string() {
        let a = Symbol::intern("hello");
        let b = Symbol::intern("hello");
        assert_eq!(a, b);
    }

    #[test]
    fn test_intern_different_strings() {
        assert_ne!(Symbol::intern("hello"), Symbol::intern("world"));
    }

    #[test]
    fn test_as_str_round_trip() {
        let sym = Symbol::intern("name with spaces");
        assert_eq!(sym.as_str(), "name with spaces");
    }

    #[test]
    fn test_empty_string() {
        assert_eq!(Symbol::intern("").as_str(), "");
    }

    #[test]
    fn test_unicode() {
        for s in ["café", "🦀", "näme"] {
            assert_eq!(Symbol::intern(s).as_str(), s);
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(Symbol::intern("x").to_string(), "x");
    }

    #[test]
    fn test_concurrent_intern() {
        let handles: Vec<_> = (0..8)
            .map(|i| std::thread::spawn(move || Symbol::intern(&format!("thread_{i}"))))
            .collect();
        let symbols: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for i in 0..symbols.len() {
            for j in (i + 1)..symbols.len() {
                assert_ne!(symbols[i], symbols[j]);
            }
        }
    }
}
