//! Swift mangled-name decoder.
//!
//! The Swift compiler encodes the full identity of every exported
//! declaration — module path, nesting, types, generic arguments, calling
//! convention, specialization metadata — into its linker symbol. This crate
//! parses such a symbol back into a tree of kinded nodes that debuggers,
//! profilers and symbol viewers can traverse or render.
//!
//! ```
//! use swift_demangler::{demangle_symbol, Kind};
//!
//! // func foo() in module "main"
//! let symbol = demangle_symbol("_T04main3fooyyF").unwrap();
//! let root = symbol.root();
//! assert_eq!(root.kind(), Kind::Global);
//!
//! let function = root.child(0).unwrap();
//! assert_eq!(function.kind(), Kind::Function);
//! assert_eq!(function.child(0).unwrap().text(), Some("main"));
//! assert_eq!(function.child(1).unwrap().text(), Some("foo"));
//! ```
//!
//! The grammar is heavily compressed: earlier subtrees are reused through
//! back-references and repeated identifier fragments through a per-parse
//! word table, so the decoder is a stateful recursive-descent parser rather
//! than a context-free one. All nodes of a parse live in a [`NodeArena`]
//! and are addressed by [`NodeId`] handles; a back-reference resolves to the
//! *same* node, not a copy. Memory is reclaimed in bulk by dropping or
//! resetting the arena.
//!
//! Malformed input yields `None`, never a panic and never a partial tree.
//! Validating that a string looks like a mangled name in the first place
//! (and bounding the length of untrusted input) is the caller's job.

mod arena;
mod context;
mod demangle;
mod node;
mod punycode;
mod tests;

pub use arena::{NodeArena, NodeId};
pub use node::{
    Kind, Node, NodeRef, Payload, SpecializationParamFlags, SpecializationParamKind,
    ValueWitnessKind,
};

use context::Demangler;

/// A demangled symbol owning the arena its nodes live in.
pub struct Symbol<'a> {
    arena: NodeArena<'a>,
    root: NodeId,
}

impl<'a> Symbol<'a> {
    /// The root of the parse tree.
    pub fn root(&self) -> NodeRef<'_, 'a> {
        self.arena.node(self.root)
    }

    pub fn arena(&self) -> &NodeArena<'a> {
        &self.arena
    }
}

impl std::fmt::Debug for Symbol<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(&self.root(), f)
    }
}

/// Demangles a full symbol, mangling prefix (`_T0`, `$s`, `$S` or `_Tt`)
/// included. Returns `None` if `mangled` is not a well-formed symbol.
pub fn demangle_symbol(mangled: &str) -> Option<Symbol<'_>> {
    let mut arena = NodeArena::new();
    let root = demangle_symbol_in(&mut arena, mangled)?;
    Some(Symbol { arena, root })
}

/// Demangles a mangled type fragment (no symbol prefix).
pub fn demangle_type(mangled: &str) -> Option<Symbol<'_>> {
    let mut arena = NodeArena::new();
    let root = demangle_type_in(&mut arena, mangled)?;
    Some(Symbol { arena, root })
}

/// Batch variant of [`demangle_symbol`]: decodes into a caller-owned arena,
/// so many symbols can share one memory pool and be released together.
/// Every input decoded into the arena must outlive it.
pub fn demangle_symbol_in<'a>(arena: &mut NodeArena<'a>, mangled: &'a str) -> Option<NodeId> {
    let result = Demangler::new(arena, mangled)?.demangle_symbol();
    if result.is_none() {
        log::trace!("failed to demangle symbol {mangled:?}");
    }
    result
}

/// Batch variant of [`demangle_type`].
pub fn demangle_type_in<'a>(arena: &mut NodeArena<'a>, mangled: &'a str) -> Option<NodeId> {
    let result = Demangler::new(arena, mangled)?.demangle_type();
    if result.is_none() {
        log::trace!("failed to demangle type {mangled:?}");
    }
    result
}
