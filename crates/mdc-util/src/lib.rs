//! mdc-util - Foundation types for the Machine Dialect compiler.
//!
//! This crate provides the utilities shared by every compiler phase:
//!
//! - [`Span`] - source location tracking (byte offsets + line/column)
//! - [`diagnostic`] - error and warning collection ([`Handler`], [`Diagnostic`])
//! - [`symbol`] - global string interning ([`Symbol`])
//! - [`index_vec`] - vectors with typed indices ([`IndexVec`], [`Idx`])

pub mod diagnostic;
pub mod index_vec;
pub mod span;
pub mod symbol;

pub use diagnostic::{Diagnostic, DiagnosticCode, Handler, Level};
pub use index_vec::{Idx, IndexVec};
pub use span::Span;
pub use symbol::Symbol;

// Re-export the hash types used across the compiler.
pub use rustc_hash::FxHashMap;
pub use rustc_hash::FxHashSet;

/// Define a typed index newtype implementing [`Idx`].
///
/// # Examples
///
/// ```
/// use mdc_util::{define_idx, Idx, IndexVec};
///
/// define_idx!(NodeId);
///
/// let mut nodes: IndexVec<NodeId, &str> = IndexVec::new();
/// let id = nodes.push("root");
/// assert_eq!(nodes[id], "root");
/// assert_eq!(id.index(), 0);
/// ```
#[macro_export]
macro_rules! define_idx {
    ($name:ident) => {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub u32);

        impl $crate::Idx for $name {
            fn from_usize(idx: usize) -> Self {
                assert!(idx <= u32::MAX as usize);
                $name(idx as u32)
            }

            fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}
