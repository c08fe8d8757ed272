//! [`ConcurrentTree`] is a radix tree with per-node locking.

pub(crate) mod node;

use std::fmt;
use std::hash::Hash;
use std::mem;

use sdd::Shared;

use crate::matches::{LongestMatch, Match};
use crate::prefix::shared_prefix_len;
use node::{same_node, Lookup, Node, State};

/// A scalable concurrent radix tree.
///
/// [`ConcurrentTree`] implements the same operations as [`Tree`](crate::Tree) for callers on
/// multiple threads. There is no tree-wide lock: every node carries its own reader-writer lock.
///
/// ## Locking protocol
/// * Read operations hold a shared lock on a single node at a time.
/// * Structural changes lock at most two nodes, always the parent before the child, therefore
///   concurrent inserts descending from the root and removals walking towards the root cannot
///   deadlock.
/// * An insert that reaches a node unlinked in the meantime restarts from the root, and a removal
///   that finds its target moved under a new parent by a split retries with the new parent.
///
/// Readers may observe the tree before or after a concurrent modification, but never in the
/// middle of one.
///
/// # Examples
///
/// ```
/// use lcp_radix::ConcurrentTree;
///
/// let tree: ConcurrentTree<u8, i32> = ConcurrentTree::new();
/// tree.insert(b"romane", 1);
/// tree.insert(b"romanus", 2);
///
/// let result = tree.longest_common_prefix_match(b"romanus");
/// assert_eq!(result.value, Some(2));
/// assert!(result.exact);
/// ```
pub struct ConcurrentTree<K, T>
where
    K: 'static + Clone + Eq + Hash + Send + Sync,
    T: 'static + Clone + Send + Sync,
{
    root: Shared<Node<K, T>>,
}

/// A handle to a node of a [`ConcurrentTree`].
///
/// The handle keeps the node alive but not attached: once the node is removed from the tree,
/// [`NodeRef::is_detached`] returns `true` and the tree ignores the handle.
pub struct NodeRef<K, T> {
    node: Shared<Node<K, T>>,
}

/// A pending visit of [`ConcurrentTree::for_each`]: the node, the length of the key above it,
/// and the parent and unit it was reached through.
type Visit<K, T> = (Shared<Node<K, T>>, usize, Option<(Shared<Node<K, T>>, K)>);

/// The outcome of descending one edge.
enum Descent<K, T> {
    /// `shared` units of the child label match; `full` is set if the whole label matches.
    Child {
        node: Shared<Node<K, T>>,
        shared: usize,
        full: bool,
    },
    Missing,
    /// The node descended from has been unlinked.
    Restart,
}

impl<K, T> ConcurrentTree<K, T>
where
    K: 'static + Clone + Eq + Hash + Send + Sync,
    T: 'static + Clone + Send + Sync,
{
    /// Creates an empty [`ConcurrentTree`].
    ///
    /// # Examples
    ///
    /// ```
    /// use lcp_radix::ConcurrentTree;
    ///
    /// let tree: ConcurrentTree<char, u64> = ConcurrentTree::new();
    /// assert!(tree.is_empty());
    /// ```
    pub fn new() -> Self {
        Self {
            root: Shared::new(Node::new(Vec::new(), None, false, None)),
        }
    }

    /// Returns the handle of the root node.
    #[inline]
    pub fn root(&self) -> NodeRef<K, T> {
        NodeRef::new(self.root.clone())
    }

    /// Inserts a key-value pair.
    ///
    /// Returns the handle of the node representing `key`, or `None` if `key` is empty. The value
    /// of an existing key is overwritten.
    ///
    /// # Examples
    ///
    /// ```
    /// use lcp_radix::ConcurrentTree;
    ///
    /// let tree: ConcurrentTree<u8, i32> = ConcurrentTree::new();
    /// assert!(tree.insert(b"", 0).is_none());
    ///
    /// let node = tree.insert(b"hi", 3).unwrap();
    /// assert_eq!(node.value(), Some(3));
    ///
    /// tree.insert(b"hi", 9);
    /// assert_eq!(node.value(), Some(9));
    /// ```
    pub fn insert(&self, key: &[K], value: T) -> Option<NodeRef<K, T>> {
        if key.is_empty() {
            return None;
        }
        'restart: loop {
            let mut current = self.root.clone();
            let mut index = 0;
            while index < key.len() {
                let rest = &key[index..];
                let mut current_state = current.state.write();
                if !current_state.is_linked() {
                    continue 'restart;
                }
                let Some(child) = current_state.children.get(&rest[0]).cloned() else {
                    let leaf = Shared::new(Node::new(
                        rest.to_vec(),
                        Some(value),
                        true,
                        Some(current.clone()),
                    ));
                    current_state.children.insert(rest[0].clone(), leaf.clone());
                    return Some(NodeRef::new(leaf));
                };
                let mut child_state = child.state.write();
                let shared = shared_prefix_len(&child_state.text, rest);
                if shared < child_state.text.len() {
                    let inserted = Self::split(
                        &current,
                        &mut current_state,
                        &child,
                        &mut child_state,
                        shared,
                        rest,
                        value,
                    );
                    return Some(NodeRef::new(inserted));
                }
                drop(child_state);
                drop(current_state);
                index += shared;
                current = child;
            }
            let mut state = current.state.write();
            if !state.is_linked() {
                continue 'restart;
            }
            state.value = Some(value);
            state.end = true;
            drop(state);
            return Some(NodeRef::new(current));
        }
    }

    /// Returns the value of `key` if it was inserted.
    ///
    /// # Examples
    ///
    /// ```
    /// use lcp_radix::ConcurrentTree;
    ///
    /// let tree: ConcurrentTree<u8, i32> = ConcurrentTree::new();
    /// tree.insert(b"romane", 1);
    /// tree.insert(b"romanus", 2);
    ///
    /// assert_eq!(tree.get(b"romane"), Some(1));
    /// assert!(tree.get(b"roman").is_none());
    /// ```
    pub fn get(&self, key: &[K]) -> Option<T> {
        let node = self.find(key)?;
        let state = node.state.read();
        if state.end {
            state.value.clone()
        } else {
            None
        }
    }

    /// Finds the longest inserted prefix path shared with `query`.
    ///
    /// See [`Tree::longest_common_prefix_match`](crate::Tree::longest_common_prefix_match) for
    /// the semantics of the result. The returned value is a clone.
    ///
    /// # Examples
    ///
    /// ```
    /// use lcp_radix::ConcurrentTree;
    ///
    /// let tree: ConcurrentTree<u8, i32> = ConcurrentTree::new();
    /// tree.insert(b"hello", 1);
    ///
    /// let result = tree.longest_common_prefix_match(b"hel");
    /// assert_eq!(result.prefix, b"hel");
    /// assert_eq!(result.value, Some(1));
    /// assert!(!result.exact);
    ///
    /// assert!(tree.longest_common_prefix_match(b"world").is_miss());
    /// ```
    pub fn longest_common_prefix_match(&self, query: &[K]) -> LongestMatch<K, T> {
        let mut prefix = Vec::new();
        let mut current = self.root.clone();
        let mut index = 0;
        while index < query.len() {
            match Self::descend(&current, &query[index..]) {
                Descent::Child { node, shared, full } => {
                    prefix.extend_from_slice(&query[index..index + shared]);
                    if !full {
                        return self.stopped_at(prefix, &node, false);
                    }
                    index += shared;
                    current = node;
                }
                Descent::Missing => return self.stopped_at(prefix, &current, false),
                Descent::Restart => {
                    prefix.clear();
                    index = 0;
                    current = self.root.clone();
                }
            }
        }
        self.stopped_at(prefix, &current, true)
    }

    /// Collects every candidate value along the path of `query`.
    ///
    /// See
    /// [`Tree::multi_longest_common_prefix_match`](crate::Tree::multi_longest_common_prefix_match)
    /// for the records produced.
    ///
    /// # Examples
    ///
    /// ```
    /// use lcp_radix::ConcurrentTree;
    ///
    /// let tree: ConcurrentTree<u8, i32> = ConcurrentTree::new();
    /// tree.insert(b"a", 1);
    /// tree.insert(b"ab", 2);
    /// tree.insert(b"ac", 3);
    ///
    /// let matches = tree.multi_longest_common_prefix_match(b"a");
    /// assert_eq!(matches.len(), 4);
    /// assert!(matches.iter().any(|m| m.exact && m.value == Some(1)));
    /// ```
    pub fn multi_longest_common_prefix_match(&self, query: &[K]) -> Vec<Match<T>> {
        let mut matches = Vec::new();
        let mut current = self.root.clone();
        let mut index = 0;
        loop {
            let (own, end, children) = {
                let state = current.state.read();
                let children: Vec<_> = state.children.values().cloned().collect();
                (state.value.clone(), state.end, children)
            };
            let own = own.map(|value| {
                matches.push(Match::new(index, Some(value)));
                matches.len() - 1
            });
            for child in children {
                let child_state = child.state.read();
                if child_state.value.is_some() && child_state.is_child_of(&current) {
                    matches.push(Match::new(index, child_state.value.clone()));
                }
            }
            if index == query.len() {
                if let (true, Some(own)) = (end, own) {
                    matches[own].exact = true;
                }
                return matches;
            }
            match Self::descend(&current, &query[index..]) {
                Descent::Child {
                    node,
                    shared,
                    full: true,
                } => {
                    index += shared;
                    current = node;
                }
                Descent::Child { .. } | Descent::Missing => return matches,
                Descent::Restart => {
                    matches.clear();
                    index = 0;
                    current = self.root.clone();
                }
            }
        }
    }

    /// Removes the key represented by `node`.
    ///
    /// See [`Tree::remove_node`](crate::Tree::remove_node) for the effect on the tree. The root
    /// and detached handles are ignored.
    ///
    /// # Examples
    ///
    /// ```
    /// use lcp_radix::ConcurrentTree;
    ///
    /// let tree: ConcurrentTree<u8, i32> = ConcurrentTree::new();
    /// let hello = tree.insert(b"hello", 1).unwrap();
    /// tree.insert(b"world", 2);
    ///
    /// tree.remove_node(&hello);
    /// assert!(hello.is_detached());
    /// assert!(tree.longest_common_prefix_match(b"hello").is_miss());
    /// assert_eq!(tree.root().children().len(), 1);
    /// ```
    pub fn remove_node(&self, node: &NodeRef<K, T>) {
        self.unlink(node.node.clone(), false);
    }

    /// Removes `key` from the tree.
    ///
    /// Returns `true` if `key` was removed by this call.
    ///
    /// # Examples
    ///
    /// ```
    /// use lcp_radix::ConcurrentTree;
    ///
    /// let tree: ConcurrentTree<u8, i32> = ConcurrentTree::new();
    /// tree.insert(b"a", 1);
    /// tree.insert(b"abc", 3);
    ///
    /// assert!(tree.remove(b"a"));
    /// assert!(!tree.remove(b"a"));
    /// assert_eq!(tree.get(b"abc"), Some(3));
    /// ```
    pub fn remove(&self, key: &[K]) -> bool {
        loop {
            let Some(node) = self.find(key) else {
                return false;
            };
            if self.unlink(node.clone(), true) {
                return true;
            }
            if node.state.read().is_linked() {
                return false;
            }
            // Unlinked by another thread after it was found; the key may have been re-inserted.
        }
    }

    /// Returns the number of keys.
    ///
    /// The tree is scanned, so the result may not reflect concurrent modifications.
    ///
    /// # Examples
    ///
    /// ```
    /// use lcp_radix::ConcurrentTree;
    ///
    /// let tree: ConcurrentTree<u8, i32> = ConcurrentTree::new();
    /// tree.insert(b"a", 1);
    /// tree.insert(b"b", 2);
    /// assert_eq!(tree.len(), 2);
    /// ```
    pub fn len(&self) -> usize {
        let mut len = 0;
        self.for_each(|_, _| len += 1);
        len
    }

    /// Returns `true` if the tree holds no keys.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.root.state.read().children.is_empty()
    }

    /// Visits every key and its value in depth-first order.
    ///
    /// No lock is held while `f` runs.
    ///
    /// # Examples
    ///
    /// ```
    /// use lcp_radix::ConcurrentTree;
    ///
    /// let tree: ConcurrentTree<u8, i32> = ConcurrentTree::new();
    /// tree.insert(b"a", 1);
    /// tree.insert(b"ab", 2);
    ///
    /// let mut sum = 0;
    /// tree.for_each(|_, value| sum += *value);
    /// assert_eq!(sum, 3);
    /// ```
    pub fn for_each<F: FnMut(&[K], &T)>(&self, mut f: F) {
        let mut key = Vec::new();
        let mut stack: Vec<Visit<K, T>> = vec![(self.root.clone(), 0, None)];
        while let Some((node, depth, via)) = stack.pop() {
            let (value, children) = {
                let state = node.state.read();
                let moved = matches!(&via, Some((parent, _)) if !state.is_child_of(parent));
                if moved {
                    drop(state);
                    // A split moved the node; visit whatever now hangs off the edge instead.
                    if let Some((parent, unit)) = via {
                        if let Lookup::Found(moved) = parent.lookup(&unit) {
                            stack.push((moved, depth, Some((parent, unit))));
                        }
                    }
                    continue;
                }
                key.truncate(depth);
                key.extend_from_slice(&state.text);
                let value = if state.end { state.value.clone() } else { None };
                let children: Vec<_> = state
                    .children
                    .iter()
                    .map(|(unit, child)| (child.clone(), unit.clone()))
                    .collect();
                (value, children)
            };
            let depth = key.len();
            stack.extend(
                children
                    .into_iter()
                    .map(|(child, unit)| (child, depth, Some((node.clone(), unit)))),
            );
            if let Some(value) = value {
                f(&key, &value);
            }
        }
    }

    /// Removes the key represented by `target` and cleans up the ancestors left without a
    /// purpose.
    ///
    /// Returns `false` if `target` is the root or no longer in the tree, or, when `require_end`
    /// is set, if `target` does not represent a key once locked.
    fn unlink(&self, mut target: Shared<Node<K, T>>, require_end: bool) -> bool {
        let mut cascading = false;
        loop {
            if same_node(&target, &self.root) {
                return cascading;
            }
            let parent = target.state.read().parent.clone();
            let Some(parent) = parent else {
                return cascading;
            };
            let mut parent_state = parent.state.write();
            let mut target_state = target.state.write();
            if !target_state.is_child_of(&parent) {
                // Moved under a new branch node by a split since the parent was read.
                continue;
            }
            if cascading {
                if target_state.end || !target_state.children.is_empty() {
                    return true;
                }
            } else if require_end && !target_state.end {
                return false;
            }
            if !target_state.children.is_empty() {
                drop(parent_state);
                target_state.end = false;
                Self::refresh_placeholder(&mut target_state);
                return true;
            }
            if let Some(head) = target_state.text.first() {
                parent_state.children.remove(head);
            }
            target_state.parent = None;
            drop(target_state);
            if same_node(&parent, &self.root) || parent_state.end {
                return true;
            }
            if parent_state.children.is_empty() {
                drop(parent_state);
                target = parent;
                cascading = true;
                continue;
            }
            Self::refresh_placeholder(&mut parent_state);
            return true;
        }
    }

    /// Finds the node whose path spells exactly `key`.
    fn find(&self, key: &[K]) -> Option<Shared<Node<K, T>>> {
        let mut current = self.root.clone();
        let mut index = 0;
        while index < key.len() {
            match Self::descend(&current, &key[index..]) {
                Descent::Child {
                    node,
                    shared,
                    full: true,
                } => {
                    index += shared;
                    current = node;
                }
                Descent::Child { .. } | Descent::Missing => return None,
                Descent::Restart => {
                    index = 0;
                    current = self.root.clone();
                }
            }
        }
        Some(current)
    }

    /// Looks up the child of `current` on the path of `rest` and matches its label against
    /// `rest`.
    ///
    /// The child is verified to still hang off `current` while its label is read, so that a
    /// concurrent split is never observed halfway.
    fn descend(current: &Shared<Node<K, T>>, rest: &[K]) -> Descent<K, T> {
        loop {
            let child = match current.lookup(&rest[0]) {
                Lookup::Found(child) => child,
                Lookup::Missing => return Descent::Missing,
                Lookup::Detached => return Descent::Restart,
            };
            let child_state = child.state.read();
            if !child_state.is_child_of(current) {
                continue;
            }
            let shared = shared_prefix_len(&child_state.text, rest);
            let full = shared == child_state.text.len();
            drop(child_state);
            return Descent::Child {
                node: child,
                shared,
                full,
            };
        }
    }

    /// Builds the result of a lookup that stopped at `node`.
    fn stopped_at(
        &self,
        prefix: Vec<K>,
        node: &Shared<Node<K, T>>,
        exhausted: bool,
    ) -> LongestMatch<K, T> {
        if same_node(node, &self.root) {
            return LongestMatch::miss(prefix);
        }
        let children: Vec<_> = {
            let state = node.state.read();
            if state.end {
                return LongestMatch {
                    prefix,
                    value: state.value.clone(),
                    exact: exhausted,
                };
            }
            if state.value.is_some() {
                return LongestMatch {
                    prefix,
                    value: state.value.clone(),
                    exact: false,
                };
            }
            state.children.values().cloned().collect()
        };
        LongestMatch {
            prefix,
            value: Self::first_value(children),
            exact: false,
        }
    }

    /// Searches the given subtrees depth-first for a value, locking one node at a time.
    fn first_value(mut stack: Vec<Shared<Node<K, T>>>) -> Option<T> {
        while let Some(node) = stack.pop() {
            let state = node.state.read();
            if state.value.is_some() {
                return state.value.clone();
            }
            stack.extend(state.children.values().cloned());
        }
        None
    }

    /// Splits the edge leading to `child` after `shared` units and hangs the rest of the key
    /// being inserted below the new branch node.
    ///
    /// Both `parent` and `child` must be write-locked by the caller. The branch node is locked
    /// before it is published, which cannot contend with any other thread.
    fn split(
        parent: &Shared<Node<K, T>>,
        parent_state: &mut State<K, T>,
        child: &Shared<Node<K, T>>,
        child_state: &mut State<K, T>,
        shared: usize,
        rest: &[K],
        value: T,
    ) -> Shared<Node<K, T>> {
        let suffix = child_state.text.split_off(shared);
        let common_text = mem::replace(&mut child_state.text, suffix);
        let exhausted = shared == rest.len();
        let (placeholder, leftover) = if exhausted {
            (value, None)
        } else {
            (value.clone(), Some(value))
        };
        let common = Shared::new(Node::new(
            common_text,
            Some(placeholder),
            exhausted,
            Some(parent.clone()),
        ));
        let inserted = {
            let mut common_state = common.state.write();
            child_state.parent = Some(common.clone());
            common_state
                .children
                .insert(child_state.text[0].clone(), child.clone());
            match leftover {
                Some(value) => {
                    let leaf = Shared::new(Node::new(
                        rest[shared..].to_vec(),
                        Some(value),
                        true,
                        Some(common.clone()),
                    ));
                    common_state
                        .children
                        .insert(rest[shared].clone(), leaf.clone());
                    leaf
                }
                None => common.clone(),
            }
        };
        parent_state.children.insert(rest[0].clone(), common);
        inserted
    }

    /// Replaces the placeholder value of a write-locked node with the value of one of its
    /// children.
    fn refresh_placeholder(state: &mut State<K, T>) {
        let value = state
            .children
            .values()
            .find_map(|child| child.state.read().value.clone());
        if value.is_some() {
            state.value = value;
        }
    }
}

impl<K, T> Default for ConcurrentTree<K, T>
where
    K: 'static + Clone + Eq + Hash + Send + Sync,
    T: 'static + Clone + Send + Sync,
{
    /// Creates an empty [`ConcurrentTree`].
    ///
    /// # Examples
    ///
    /// ```
    /// use lcp_radix::ConcurrentTree;
    ///
    /// let tree: ConcurrentTree<u8, u8> = ConcurrentTree::default();
    /// assert!(tree.is_empty());
    /// ```
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<K, T> Drop for ConcurrentTree<K, T>
where
    K: 'static + Clone + Eq + Hash + Send + Sync,
    T: 'static + Clone + Send + Sync,
{
    fn drop(&mut self) {
        // Parent links form reference cycles; break them so that every node can be reclaimed.
        let mut stack = vec![self.root.clone()];
        while let Some(node) = stack.pop() {
            let mut state = node.state.write();
            state.parent = None;
            stack.extend(mem::take(&mut state.children).into_values());
        }
    }
}

impl<K, T> fmt::Debug for ConcurrentTree<K, T>
where
    K: 'static + Clone + Eq + Hash + Send + Sync + fmt::Debug,
    T: 'static + Clone + Send + Sync + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_map();
        self.for_each(|key, value| {
            d.entry(&key, value);
        });
        d.finish()
    }
}

impl<K, T> PartialEq for ConcurrentTree<K, T>
where
    K: 'static + Clone + Eq + Hash + Send + Sync,
    T: 'static + Clone + Send + Sync + PartialEq,
{
    /// Compares two trees by their keys and values.
    fn eq(&self, other: &Self) -> bool {
        if self.len() != other.len() {
            return false;
        }
        let mut equal = true;
        self.for_each(|key, value| {
            if equal && other.get(key).as_ref() != Some(value) {
                equal = false;
            }
        });
        equal
    }
}

impl<K, T> NodeRef<K, T> {
    #[inline]
    fn new(node: Shared<Node<K, T>>) -> Self {
        Self { node }
    }

    /// Returns a copy of the label of the edge leading to the node.
    pub fn text(&self) -> Vec<K>
    where
        K: Clone,
    {
        self.node.state.read().text.clone()
    }

    /// Returns a copy of the value stored in the node.
    pub fn value(&self) -> Option<T>
    where
        T: Clone,
    {
        self.node.state.read().value.clone()
    }

    /// Returns `true` if the node represents an inserted key.
    pub fn is_end(&self) -> bool {
        self.node.state.read().end
    }

    /// Returns handles of the children of the node.
    ///
    /// The order of the children is unspecified.
    pub fn children(&self) -> Vec<NodeRef<K, T>> {
        self.node
            .state
            .read()
            .children
            .values()
            .map(|child| NodeRef::new(child.clone()))
            .collect()
    }

    /// Returns `true` if the node has been removed from its tree.
    pub fn is_detached(&self) -> bool {
        !self.node.state.read().is_linked()
    }
}

impl<K, T> Clone for NodeRef<K, T> {
    #[inline]
    fn clone(&self) -> Self {
        Self::new(self.node.clone())
    }
}

impl<K, T> PartialEq for NodeRef<K, T> {
    /// Two handles are equal if they refer to the same node.
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        same_node(&self.node, &other.node)
    }
}

impl<K, T> Eq for NodeRef<K, T> {}

impl<K, T> fmt::Debug for NodeRef<K, T>
where
    K: fmt::Debug,
    T: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.node.state.read();
        f.debug_struct("NodeRef")
            .field("text", &state.text)
            .field("value", &state.value)
            .field("end", &state.end)
            .finish()
    }
}
