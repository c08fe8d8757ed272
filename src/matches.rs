//! Results produced by prefix lookups.

/// The outcome of a longest common prefix lookup.
///
/// `prefix` holds the units of the query that were matched along the tree, `value` the value
/// representing the node the lookup stopped at, and `exact` whether the query denotes an inserted
/// key.
///
/// `V` is a reference for [`Tree`](crate::Tree) and an owned value for
/// [`ConcurrentTree`](crate::ConcurrentTree).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LongestMatch<K, V> {
    /// The matched part of the query.
    pub prefix: Vec<K>,
    /// The value found, if any.
    pub value: Option<V>,
    /// `true` if the query is exactly an inserted key.
    pub exact: bool,
}

impl<K, V> LongestMatch<K, V> {
    /// Returns `true` if no value could be found for the query.
    #[inline]
    pub fn is_miss(&self) -> bool {
        self.value.is_none()
    }

    /// Returns an empty result.
    pub(crate) fn miss(prefix: Vec<K>) -> Self {
        Self {
            prefix,
            value: None,
            exact: false,
        }
    }
}

/// A single candidate recorded by a multi-candidate prefix lookup.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Match<V> {
    /// Number of query units matched when the candidate was recorded.
    pub match_length: usize,
    /// The candidate value.
    pub value: Option<V>,
    /// `true` only for the record of the node that exactly matches the whole query.
    pub exact: bool,
}

impl<V> Match<V> {
    #[inline]
    pub(crate) fn new(match_length: usize, value: Option<V>) -> Self {
        Self {
            match_length,
            value,
            exact: false,
        }
    }
}
