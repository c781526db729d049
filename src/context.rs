//! Parser state shared by every grammar production.
//!
//! A [`Demangler`] bundles the read cursor over the mangled text, the stack
//! of partially built nodes and the two per-parse compression tables. One
//! `Demangler` is constructed per top-level parse, so the tables always
//! start empty; only the arena outlives it.

use std::borrow::Cow;

use crate::arena::{NodeArena, NodeId};
use crate::node::{Kind, Payload};

/// The word table holds at most 26 fragments, addressable by `a`..`z`.
pub(crate) const MAX_NUM_WORDS: usize = 26;

pub(crate) struct Demangler<'a, 'n> {
    pub(crate) arena: &'n mut NodeArena<'a>,
    text: &'a str,
    pos: usize,

    /// Finished nodes awaiting a parent, with the cursor position at push.
    node_stack: Vec<(NodeId, usize)>,

    /// Completed substitutable nodes, addressed by back-reference index.
    substitutions: Vec<NodeId>,

    /// Identifier fragments seen so far, borrowed from the input.
    words: [&'a str; MAX_NUM_WORDS],
    num_words: usize,
}

impl<'a, 'n> Demangler<'a, 'n> {
    /// Sets up a parse over `text`. Mangled names are ASCII; anything else
    /// is rejected here, which also makes byte-indexed slicing safe in the
    /// productions.
    pub(crate) fn new(arena: &'n mut NodeArena<'a>, text: &'a str) -> Option<Self> {
        if !text.is_ascii() {
            return None;
        }
        Some(Demangler {
            arena,
            text,
            pos: 0,
            node_stack: Vec::new(),
            substitutions: Vec::new(),
            words: [""; MAX_NUM_WORDS],
            num_words: 0,
        })
    }

    // ---- cursor ----------------------------------------------------------

    pub(crate) fn at_end(&self) -> bool {
        self.pos >= self.text.len()
    }

    pub(crate) fn peek_char(&self) -> Option<u8> {
        self.text.as_bytes().get(self.pos).copied()
    }

    pub(crate) fn next_char(&mut self) -> Option<u8> {
        let c = self.peek_char()?;
        self.pos += 1;
        Some(c)
    }

    /// Consumes `c` if it is the next character. No effect on mismatch.
    pub(crate) fn next_if(&mut self, c: u8) -> bool {
        if self.peek_char() == Some(c) {
            self.pos += 1;
            return true;
        }
        false
    }

    /// Consumes `s` if the input continues with it. No effect on mismatch.
    pub(crate) fn next_if_str(&mut self, s: &str) -> bool {
        if self.text[self.pos..].starts_with(s) {
            self.pos += s.len();
            return true;
        }
        false
    }

    /// Steps back over the character just consumed, so a different
    /// production can reinterpret it.
    pub(crate) fn push_back(&mut self) {
        debug_assert!(self.pos > 0);
        self.pos -= 1;
    }

    /// Borrows `len` characters at the cursor and consumes them.
    pub(crate) fn next_slice(&mut self, len: usize) -> Option<&'a str> {
        let end = self.pos.checked_add(len)?;
        let slice = self.text.get(self.pos..end)?;
        self.pos = end;
        Some(slice)
    }

    // ---- node stack ------------------------------------------------------

    pub(crate) fn push_node(&mut self, node: NodeId) {
        self.node_stack.push((node, self.pos));
    }

    pub(crate) fn pop_node(&mut self) -> Option<NodeId> {
        self.node_stack.pop().map(|(node, _)| node)
    }

    /// Pops the top node only if its kind matches.
    pub(crate) fn pop_kind(&mut self, kind: Kind) -> Option<NodeId> {
        self.pop_if(|k| k == kind)
    }

    /// Pops the top node only if its kind satisfies `pred`. Leaves the stack
    /// untouched otherwise, which is how optional children are threaded into
    /// parent productions.
    pub(crate) fn pop_if(&mut self, pred: impl Fn(Kind) -> bool) -> Option<NodeId> {
        let &(top, _) = self.node_stack.last()?;
        if !pred(self.arena[top].kind()) {
            return None;
        }
        self.pop_node()
    }

    pub(crate) fn stack_len(&self) -> usize {
        self.node_stack.len()
    }

    // ---- substitution table ----------------------------------------------

    pub(crate) fn add_substitution(&mut self, node: NodeId) {
        self.substitutions.push(node);
    }

    /// Resolves a back-reference to the node registered at `idx`. The same
    /// node is returned, not a copy; an out-of-range index means the rest of
    /// the input can no longer be trusted and fails the whole parse.
    pub(crate) fn substitution(&self, idx: usize) -> Option<NodeId> {
        let node = self.substitutions.get(idx).copied();
        if node.is_none() {
            log::trace!(
                "back-reference {} out of range ({} registered) at offset {}",
                idx,
                self.substitutions.len(),
                self.pos
            );
        }
        node
    }

    // ---- word table ------------------------------------------------------

    /// Registers the identifier fragments of `slice`. Fragments start at a
    /// non-digit, non-underscore character and end at an underscore or a
    /// lower-to-upper case transition; fragments shorter than two characters
    /// are not worth a code. Past 26 words the table is full and further
    /// fragments are simply not registered.
    pub(crate) fn record_words(&mut self, slice: &'a str) {
        fn is_word_start(c: u8) -> bool {
            c != 0 && c != b'_' && !c.is_ascii_digit()
        }
        fn is_word_end(c: u8, prev: u8) -> bool {
            c == 0 || c == b'_' || (!prev.is_ascii_uppercase() && c.is_ascii_uppercase())
        }

        let bytes = slice.as_bytes();
        let mut word_start: Option<usize> = None;
        for i in 0..=bytes.len() {
            let c = bytes.get(i).copied().unwrap_or(0);
            if let Some(start) = word_start {
                if is_word_end(c, bytes[i - 1]) {
                    if i - start >= 2 && self.num_words < MAX_NUM_WORDS {
                        self.words[self.num_words] = &slice[start..i];
                        self.num_words += 1;
                    }
                    word_start = None;
                }
            }
            if word_start.is_none() && is_word_start(c) {
                word_start = Some(i);
            }
        }
    }

    pub(crate) fn word(&self, idx: usize) -> Option<&'a str> {
        if idx >= self.num_words {
            return None;
        }
        Some(self.words[idx])
    }

    // ---- node building ---------------------------------------------------

    pub(crate) fn create(&mut self, kind: Kind) -> NodeId {
        self.arena.create(kind)
    }

    pub(crate) fn create_with_child(
        &mut self,
        kind: Kind,
        child: Option<NodeId>,
    ) -> Option<NodeId> {
        let child = child?;
        let node = self.arena.create(kind);
        self.arena.add_child(node, child);
        Some(node)
    }

    /// Creates `kind` with every child present, failing if any is missing.
    pub(crate) fn create_with_children(
        &mut self,
        kind: Kind,
        children: &[Option<NodeId>],
    ) -> Option<NodeId> {
        let node = self.arena.create(kind);
        for child in children {
            let child = (*child)?;
            self.arena.add_child(node, child);
        }
        Some(node)
    }

    /// Wraps a node in the `Type` node that every type-position production
    /// expects on the stack.
    pub(crate) fn create_type(&mut self, child: Option<NodeId>) -> Option<NodeId> {
        self.create_with_child(Kind::Type, child)
    }

    pub(crate) fn create_with_popped_type(&mut self, kind: Kind) -> Option<NodeId> {
        let ty = self.pop_kind(Kind::Type);
        self.create_with_child(kind, ty)
    }

    /// Creates a text node, borrowing or copying as the `Cow` dictates.
    pub(crate) fn create_text_from_cow(&mut self, kind: Kind, text: Cow<'a, str>) -> NodeId {
        match text {
            Cow::Borrowed(s) => self.arena.create_borrowed(kind, s),
            Cow::Owned(s) => self.arena.create_text(kind, s),
        }
    }

    /// Re-tags a node, preserving payload and children. The original node is
    /// left in place; substitutions pointing at it keep their meaning.
    pub(crate) fn change_kind(&mut self, node: NodeId, kind: Kind) -> NodeId {
        let payload = self.arena[node].payload().clone();
        let children: Vec<NodeId> = self.arena[node].children().to_vec();
        let new = match payload {
            Payload::None => self.arena.create(kind),
            Payload::Index(idx) => self.arena.create_index(kind, idx),
            Payload::Text(text) => self.create_text_from_cow(kind, text),
        };
        for child in children {
            self.arena.add_child(new, child);
        }
        new
    }
}
