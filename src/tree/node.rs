//! Arena-resident nodes of a [`Tree`](super::Tree).

use std::collections::HashMap;

/// A vertex of a [`Tree`](super::Tree).
///
/// `text` is the label of the edge leading to the node; the root is the only node with an empty
/// label. Children are indexed by the first unit of their label and refer to arena slots.
#[derive(Clone, Debug)]
pub struct Node<K, T> {
    pub(super) text: Vec<K>,
    pub(super) value: Option<T>,
    pub(super) end: bool,
    pub(super) children: HashMap<K, usize>,
    pub(super) parent: Option<usize>,
}

impl<K, T> Node<K, T> {
    pub(super) fn new(text: Vec<K>, value: Option<T>, end: bool) -> Self {
        Self {
            text,
            value,
            end,
            children: HashMap::new(),
            parent: None,
        }
    }

    /// Returns the label of the edge leading to this node.
    #[inline]
    pub fn text(&self) -> &[K] {
        &self.text
    }

    /// Returns the value stored in the node.
    ///
    /// Non-terminal nodes may carry a placeholder value borrowed from a key below them.
    #[inline]
    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    /// Returns `true` if the node represents an inserted key.
    #[inline]
    pub fn is_end(&self) -> bool {
        self.end
    }

    /// Returns the number of children.
    #[inline]
    pub fn num_children(&self) -> usize {
        self.children.len()
    }
}

/// A slot of the node arena.
///
/// The generation is bumped whenever the slot is released so that handles to the previous
/// occupant no longer resolve.
#[derive(Clone, Debug)]
pub(super) struct Slot<K, T> {
    pub(super) generation: u32,
    pub(super) live: bool,
    pub(super) node: Node<K, T>,
}

impl<K, T> Slot<K, T> {
    pub(super) fn occupied(node: Node<K, T>) -> Self {
        Self {
            generation: 0,
            live: true,
            node,
        }
    }

    /// Drops the occupant and invalidates outstanding handles.
    pub(super) fn vacate(&mut self) {
        self.node = Node::new(Vec::new(), None, false);
        self.live = false;
        self.generation = self.generation.wrapping_add(1);
    }
}
