//! Lock-protected node of a [`ConcurrentTree`](super::ConcurrentTree).

use std::collections::HashMap;
use std::hash::Hash;
use std::ptr;

use sdd::Shared;

use crate::lock::NodeLock;

/// [`Node`] is a vertex of a [`ConcurrentTree`](super::ConcurrentTree).
///
/// Every field of the node is guarded by its own lock. Two-node operations always lock the
/// parent before the child.
pub(crate) struct Node<K, T> {
    pub(crate) state: NodeLock<State<K, T>>,
}

/// The lock-protected part of a [`Node`].
pub(crate) struct State<K, T> {
    /// Edge label; empty only for the root.
    pub(crate) text: Vec<K>,
    pub(crate) value: Option<T>,
    pub(crate) end: bool,
    pub(crate) children: HashMap<K, Shared<Node<K, T>>>,
    /// Cleared when the node is unlinked, which also breaks the reference cycle with the parent.
    pub(crate) parent: Option<Shared<Node<K, T>>>,
}

impl<K, T> Node<K, T> {
    pub(crate) fn new(
        text: Vec<K>,
        value: Option<T>,
        end: bool,
        parent: Option<Shared<Node<K, T>>>,
    ) -> Self {
        Self {
            state: NodeLock::new(State {
                text,
                value,
                end,
                children: HashMap::new(),
                parent,
            }),
        }
    }
}

/// The outcome of looking up a child of a node.
pub(crate) enum Lookup<K, T> {
    Found(Shared<Node<K, T>>),
    Missing,
    /// The node has been unlinked; the caller has to start over from the root.
    Detached,
}

impl<K: Eq + Hash, T> Node<K, T> {
    /// Returns the child whose label starts with `unit`.
    pub(crate) fn lookup(&self, unit: &K) -> Lookup<K, T> {
        let state = self.state.read();
        if !state.is_linked() {
            return Lookup::Detached;
        }
        state
            .children
            .get(unit)
            .map_or(Lookup::Missing, |child| Lookup::Found(child.clone()))
    }
}

impl<K, T> State<K, T> {
    /// Returns `true` unless the node has been unlinked from the tree.
    #[inline]
    pub(crate) fn is_linked(&self) -> bool {
        self.parent.is_some() || self.text.is_empty()
    }

    /// Returns `true` if `parent` is the current parent of the node.
    #[inline]
    pub(crate) fn is_child_of(&self, parent: &Shared<Node<K, T>>) -> bool {
        matches!(&self.parent, Some(current) if same_node(current, parent))
    }
}

/// Returns `true` if both handles point to the same node.
#[inline]
pub(crate) fn same_node<K, T>(a: &Shared<Node<K, T>>, b: &Shared<Node<K, T>>) -> bool {
    ptr::eq::<Node<K, T>>(&**a, &**b)
}
