//! Binding layer: sources, slots and substitutions
//!
//! Bindings are cells in an arena. Whether two substitutions share a binding
//! or only hold equal values is decided by which key they store.

pub mod arena;
pub mod observer;
pub mod slot;
pub mod source;
pub mod substitution;

use slotmap::new_key_type;

new_key_type! {
    /// Handle of a source cell in the binding arena
    pub struct SourceKey;
    /// Handle of a slot in the binding arena
    pub struct SlotKey;
}

pub use arena::Bindings;
pub use observer::{ListenerId, Observers};
pub use slot::Slot;
pub use source::{Source, SourceChanged};
pub use substitution::Substitution;
