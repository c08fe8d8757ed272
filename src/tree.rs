//! [`Tree`] is a single-threaded radix tree supporting longest common prefix matching.

pub mod node;

use std::fmt;
use std::hash::Hash;
use std::mem;

use crate::matches::{LongestMatch, Match};
use crate::prefix::shared_prefix_len;
use node::{Node, Slot};

/// The arena index of the root node.
const ROOT: usize = 0;

/// A handle to a node of a [`Tree`].
///
/// A [`NodeId`] stays valid until the node it refers to is removed; afterwards, the tree ignores
/// it even if the underlying slot is reused.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct NodeId {
    index: usize,
    generation: u32,
}

/// A prefix-compressed radix tree.
///
/// [`Tree`] maps sequences of units `K` to values `T`. Edges are labeled with unit sequences and
/// sibling edges never share their first unit. When a new key shares only part of an existing
/// edge, the edge is split, and the node created for the shared part receives the inserted value
/// as a placeholder so that lookups ending there still find a representative value.
///
/// Nodes are kept in an arena and addressed by [`NodeId`].
///
/// # Examples
///
/// ```
/// use lcp_radix::Tree;
///
/// let mut tree: Tree<u8, i32> = Tree::new();
/// tree.insert(b"hello", 1);
/// tree.insert(b"world", 2);
///
/// let result = tree.longest_common_prefix_match(b"hello world");
/// assert_eq!(result.prefix, b"hello");
/// assert_eq!(result.value, Some(&1));
/// assert!(!result.exact);
/// ```
#[derive(Clone)]
pub struct Tree<K, T> {
    slots: Vec<Slot<K, T>>,
    free: Vec<usize>,
}

impl<K, T> Tree<K, T> {
    /// Creates an empty [`Tree`].
    ///
    /// # Examples
    ///
    /// ```
    /// use lcp_radix::Tree;
    ///
    /// let tree: Tree<char, u32> = Tree::new();
    /// assert!(tree.is_empty());
    /// ```
    pub fn new() -> Self {
        Self {
            slots: vec![Slot::occupied(Node::new(Vec::new(), None, false))],
            free: Vec::new(),
        }
    }

    /// Returns the handle of the root node.
    #[inline]
    pub fn root(&self) -> NodeId {
        self.id(ROOT)
    }

    /// Returns `true` if `id` refers to a node that is still part of the tree.
    #[inline]
    pub fn contains_node(&self, id: NodeId) -> bool {
        self.index_of(id).is_some()
    }

    /// Returns the node referred to by `id`.
    ///
    /// # Examples
    ///
    /// ```
    /// use lcp_radix::Tree;
    ///
    /// let mut tree: Tree<u8, i32> = Tree::new();
    /// let id = tree.insert(b"abc", 1).unwrap();
    ///
    /// let node = tree.node(id).unwrap();
    /// assert_eq!(node.text(), b"abc");
    /// assert_eq!(node.value(), Some(&1));
    /// assert!(node.is_end());
    /// ```
    #[inline]
    pub fn node(&self, id: NodeId) -> Option<&Node<K, T>> {
        self.index_of(id).map(|index| self.node_at(index))
    }

    /// Returns the handles of the children of `id`.
    ///
    /// The order of the children is unspecified.
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.node(id)
            .into_iter()
            .flat_map(|node| node.children.values())
            .map(move |&index| self.id(index))
    }

    /// Returns the handle of the parent of `id`.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        let index = self.index_of(id)?;
        self.node_at(index).parent.map(|parent| self.id(parent))
    }

    /// Returns the number of keys.
    ///
    /// # Examples
    ///
    /// ```
    /// use lcp_radix::Tree;
    ///
    /// let mut tree: Tree<u8, i32> = Tree::new();
    /// tree.insert(b"romane", 1);
    /// tree.insert(b"romanus", 2);
    /// assert_eq!(tree.len(), 2);
    /// ```
    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.live && slot.node.end)
            .count()
    }

    /// Returns `true` if the tree holds no keys.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.node_at(ROOT).children.is_empty()
    }

    /// Visits every key and its value in depth-first order.
    ///
    /// # Examples
    ///
    /// ```
    /// use lcp_radix::Tree;
    ///
    /// let mut tree: Tree<u8, i32> = Tree::new();
    /// tree.insert(b"a", 1);
    /// tree.insert(b"ab", 2);
    ///
    /// let mut entries = Vec::new();
    /// tree.for_each(|key, value| entries.push((key.to_vec(), *value)));
    /// assert_eq!(entries, vec![(b"a".to_vec(), 1), (b"ab".to_vec(), 2)]);
    /// ```
    pub fn for_each<F: FnMut(&[K], &T)>(&self, mut f: F)
    where
        K: Clone,
    {
        let mut key = Vec::new();
        let mut stack = vec![(ROOT, 0)];
        while let Some((index, depth)) = stack.pop() {
            let node = self.node_at(index);
            key.truncate(depth);
            key.extend_from_slice(&node.text);
            if node.end {
                if let Some(value) = node.value.as_ref() {
                    f(&key, value);
                }
            }
            stack.extend(node.children.values().map(|&child| (child, key.len())));
        }
    }

    #[inline]
    fn id(&self, index: usize) -> NodeId {
        NodeId {
            index,
            generation: self.slots[index].generation,
        }
    }

    #[inline]
    fn index_of(&self, id: NodeId) -> Option<usize> {
        let slot = self.slots.get(id.index)?;
        (slot.live && slot.generation == id.generation).then_some(id.index)
    }

    #[inline]
    fn node_at(&self, index: usize) -> &Node<K, T> {
        &self.slots[index].node
    }

    #[inline]
    fn node_at_mut(&mut self, index: usize) -> &mut Node<K, T> {
        &mut self.slots[index].node
    }

    fn alloc(&mut self, node: Node<K, T>) -> usize {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index];
            slot.node = node;
            slot.live = true;
            index
        } else {
            self.slots.push(Slot::occupied(node));
            self.slots.len() - 1
        }
    }

    fn release(&mut self, index: usize) {
        self.slots[index].vacate();
        self.free.push(index);
    }

    /// Finds the first value in the subtree rooted at `index`, the node itself included.
    fn representative(&self, index: usize) -> Option<&T> {
        let mut stack = vec![index];
        while let Some(index) = stack.pop() {
            let node = self.node_at(index);
            if node.value.is_some() {
                return node.value.as_ref();
            }
            stack.extend(node.children.values().copied());
        }
        None
    }

    /// Builds the result of a lookup that stopped at `index`.
    fn stopped_at(&self, prefix: Vec<K>, index: usize, exhausted: bool) -> LongestMatch<K, &T> {
        if index == ROOT {
            return LongestMatch::miss(prefix);
        }
        let node = self.node_at(index);
        if node.end {
            LongestMatch {
                prefix,
                value: node.value.as_ref(),
                exact: exhausted,
            }
        } else {
            LongestMatch {
                prefix,
                value: self.representative(index),
                exact: false,
            }
        }
    }
}

impl<K, T> Tree<K, T>
where
    K: Clone + Eq + Hash,
    T: Clone,
{
    /// Inserts a key-value pair.
    ///
    /// Returns the handle of the node representing `key`, or `None` if `key` is empty. The value
    /// of an existing key is overwritten.
    ///
    /// # Examples
    ///
    /// ```
    /// use lcp_radix::Tree;
    ///
    /// let mut tree: Tree<u8, i32> = Tree::new();
    /// assert!(tree.insert(b"", 0).is_none());
    ///
    /// let first = tree.insert(b"hi", 3).unwrap();
    /// let second = tree.insert(b"hi", 9).unwrap();
    /// assert_eq!(first, second);
    /// assert_eq!(tree.get(b"hi"), Some(&9));
    /// ```
    pub fn insert(&mut self, key: &[K], value: T) -> Option<NodeId> {
        if key.is_empty() {
            return None;
        }
        let mut current = ROOT;
        let mut index = 0;
        while index < key.len() {
            let rest = &key[index..];
            let Some(&child) = self.node_at(current).children.get(&rest[0]) else {
                let leaf = self.alloc(Node::new(rest.to_vec(), Some(value), true));
                self.attach(current, leaf);
                return Some(self.id(leaf));
            };
            let text = &self.node_at(child).text;
            let shared = shared_prefix_len(text, rest);
            if shared < text.len() {
                let inserted = self.split(current, child, shared, rest, value);
                return Some(self.id(inserted));
            }
            index += shared;
            current = child;
        }
        let node = self.node_at_mut(current);
        node.value = Some(value);
        node.end = true;
        Some(self.id(current))
    }

    /// Returns the value of `key` if it was inserted.
    ///
    /// # Examples
    ///
    /// ```
    /// use lcp_radix::Tree;
    ///
    /// let mut tree: Tree<u8, i32> = Tree::new();
    /// tree.insert(b"romane", 1);
    /// tree.insert(b"romanus", 2);
    ///
    /// assert_eq!(tree.get(b"romanus"), Some(&2));
    /// assert!(tree.get(b"roman").is_none());
    /// ```
    pub fn get(&self, key: &[K]) -> Option<&T> {
        let node = self.node_at(self.find(key)?);
        if node.end {
            node.value.as_ref()
        } else {
            None
        }
    }

    /// Finds the longest inserted prefix path shared with `query`.
    ///
    /// The lookup descends as long as `query` matches. If it stops on a node representing an
    /// inserted key, that key's value is returned. If it stops on a node created by a split or
    /// halfway through an edge, a value of some key below that point is returned instead, and
    /// `exact` is `false`. Stopping at the root yields no value.
    ///
    /// # Examples
    ///
    /// ```
    /// use lcp_radix::Tree;
    ///
    /// let mut tree: Tree<u8, i32> = Tree::new();
    /// tree.insert(b"hello", 1);
    ///
    /// let result = tree.longest_common_prefix_match(b"hel");
    /// assert_eq!(result.prefix, b"hel");
    /// assert_eq!(result.value, Some(&1));
    /// assert!(!result.exact);
    ///
    /// assert!(tree.longest_common_prefix_match(b"test").is_miss());
    /// ```
    pub fn longest_common_prefix_match(&self, query: &[K]) -> LongestMatch<K, &T> {
        let mut prefix = Vec::new();
        let mut current = ROOT;
        let mut index = 0;
        while index < query.len() {
            let Some(&child) = self.node_at(current).children.get(&query[index]) else {
                return self.stopped_at(prefix, current, false);
            };
            let text = &self.node_at(child).text;
            let shared = shared_prefix_len(text, &query[index..]);
            prefix.extend_from_slice(&text[..shared]);
            if shared < text.len() {
                return self.stopped_at(prefix, child, false);
            }
            index += shared;
            current = child;
        }
        self.stopped_at(prefix, current, true)
    }

    /// Collects every candidate value along the path of `query`.
    ///
    /// For each node fully matched on the way down, the node's own value and the values of all
    /// its children are recorded with the number of units matched so far. The record of the
    /// node's own value is `exact` only if the node represents exactly `query`. Records are
    /// ordered from the root to the leaf; the order among siblings is unspecified.
    ///
    /// # Examples
    ///
    /// ```
    /// use lcp_radix::Tree;
    ///
    /// let mut tree: Tree<u8, i32> = Tree::new();
    /// tree.insert(b"a", 1);
    /// tree.insert(b"ab", 2);
    ///
    /// let matches = tree.multi_longest_common_prefix_match(b"ab");
    /// let last = matches.last().unwrap();
    /// assert_eq!(last.match_length, 2);
    /// assert_eq!(last.value, Some(&2));
    /// assert!(last.exact);
    /// ```
    pub fn multi_longest_common_prefix_match(&self, query: &[K]) -> Vec<Match<&T>> {
        let mut matches = Vec::new();
        let mut current = ROOT;
        let mut index = 0;
        loop {
            let node = self.node_at(current);
            let own = node.value.as_ref().map(|value| {
                matches.push(Match::new(index, Some(value)));
                matches.len() - 1
            });
            matches.extend(
                node.children
                    .values()
                    .filter_map(|&child| self.node_at(child).value.as_ref())
                    .map(|value| Match::new(index, Some(value))),
            );
            if index == query.len() {
                if let (true, Some(own)) = (node.end, own) {
                    matches[own].exact = true;
                }
                break;
            }
            let Some(&child) = node.children.get(&query[index]) else {
                break;
            };
            let text = &self.node_at(child).text;
            let shared = shared_prefix_len(text, &query[index..]);
            if shared < text.len() {
                break;
            }
            index += shared;
            current = child;
        }
        matches
    }

    /// Removes the key represented by `id`.
    ///
    /// A leaf is unlinked from the tree, and every ancestor left without children and without a
    /// key of its own is unlinked in turn. A node with children is kept as a plain branch: it no
    /// longer represents a key and takes a value from one of its children. The root and handles
    /// of removed nodes are ignored.
    ///
    /// # Examples
    ///
    /// ```
    /// use lcp_radix::Tree;
    ///
    /// let mut tree: Tree<u8, i32> = Tree::new();
    /// let hello = tree.insert(b"hello", 1).unwrap();
    /// tree.insert(b"world", 2);
    ///
    /// tree.remove_node(hello);
    /// assert!(tree.longest_common_prefix_match(b"hello").is_miss());
    /// assert_eq!(tree.get(b"world"), Some(&2));
    /// assert!(!tree.contains_node(hello));
    /// ```
    pub fn remove_node(&mut self, id: NodeId) {
        let Some(mut index) = self.index_of(id) else {
            return;
        };
        if index == ROOT {
            return;
        }
        if !self.node_at(index).children.is_empty() {
            self.node_at_mut(index).end = false;
            self.refresh_placeholder(index);
            return;
        }
        while let Some(parent) = self.node_at(index).parent {
            if let Some(head) = self.node_at(index).text.first() {
                let head = head.clone();
                self.node_at_mut(parent).children.remove(&head);
            }
            self.release(index);
            if parent == ROOT {
                return;
            }
            let parent_node = self.node_at(parent);
            if parent_node.end {
                return;
            }
            if parent_node.children.is_empty() {
                index = parent;
                continue;
            }
            self.refresh_placeholder(parent);
            return;
        }
    }

    /// Removes `key` from the tree.
    ///
    /// Returns `true` if `key` had been inserted.
    ///
    /// # Examples
    ///
    /// ```
    /// use lcp_radix::Tree;
    ///
    /// let mut tree: Tree<u8, i32> = Tree::new();
    /// tree.insert(b"a", 1);
    /// tree.insert(b"abc", 3);
    ///
    /// assert!(tree.remove(b"a"));
    /// assert!(!tree.remove(b"a"));
    /// assert_eq!(tree.get(b"abc"), Some(&3));
    /// ```
    pub fn remove(&mut self, key: &[K]) -> bool {
        match self.find(key) {
            Some(index) if index != ROOT && self.node_at(index).end => {
                self.remove_node(self.id(index));
                true
            }
            _ => false,
        }
    }

    /// Finds the node whose path spells exactly `key`.
    fn find(&self, key: &[K]) -> Option<usize> {
        let mut current = ROOT;
        let mut index = 0;
        while index < key.len() {
            let &child = self.node_at(current).children.get(&key[index])?;
            let text = &self.node_at(child).text;
            if !key[index..].starts_with(text) {
                return None;
            }
            index += text.len();
            current = child;
        }
        Some(current)
    }

    /// Links `child` under `parent`, replacing the child sharing its first unit.
    fn attach(&mut self, parent: usize, child: usize) {
        let Some(head) = self.node_at(child).text.first().cloned() else {
            return;
        };
        self.node_at_mut(child).parent = Some(parent);
        self.node_at_mut(parent).children.insert(head, child);
    }

    /// Splits the edge leading to `child` after `shared` units and hangs the rest of the key
    /// being inserted below the new branch node.
    ///
    /// Returns the node representing the inserted key.
    fn split(&mut self, parent: usize, child: usize, shared: usize, rest: &[K], value: T) -> usize {
        let text = &mut self.node_at_mut(child).text;
        let suffix = text.split_off(shared);
        let common_text = mem::replace(text, suffix);
        let exhausted = shared == rest.len();
        let (placeholder, leftover) = if exhausted {
            (value, None)
        } else {
            (value.clone(), Some(value))
        };
        let common = self.alloc(Node::new(common_text, Some(placeholder), exhausted));
        self.attach(parent, common);
        self.attach(common, child);
        match leftover {
            Some(value) => {
                let leaf = self.alloc(Node::new(rest[shared..].to_vec(), Some(value), true));
                self.attach(common, leaf);
                leaf
            }
            None => common,
        }
    }

    /// Replaces the placeholder value of `index` with the value of one of its children.
    fn refresh_placeholder(&mut self, index: usize) {
        let value = self
            .node_at(index)
            .children
            .values()
            .find_map(|&child| self.node_at(child).value.clone());
        if value.is_some() {
            self.node_at_mut(index).value = value;
        }
    }
}

impl<K, T> Default for Tree<K, T> {
    /// Creates an empty [`Tree`].
    ///
    /// # Examples
    ///
    /// ```
    /// use lcp_radix::Tree;
    ///
    /// let tree: Tree<u8, u8> = Tree::default();
    /// assert!(tree.is_empty());
    /// ```
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<K, T> fmt::Debug for Tree<K, T>
where
    K: Clone + fmt::Debug,
    T: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_map();
        self.for_each(|key, value| {
            d.entry(&key, value);
        });
        d.finish()
    }
}

impl<K, T> PartialEq for Tree<K, T>
where
    K: Clone + Eq + Hash,
    T: Clone + PartialEq,
{
    /// Compares two trees by their keys and values.
    fn eq(&self, other: &Self) -> bool {
        if self.len() != other.len() {
            return false;
        }
        let mut equal = true;
        self.for_each(|key, value| {
            if equal && other.get(key) != Some(value) {
                equal = false;
            }
        });
        equal
    }
}
