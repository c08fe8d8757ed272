//! [`Serialize`] and [`Deserialize`] for [`Tree`] and [`ConcurrentTree`].
//!
//! A tree is represented as a map from key sequences to values.

use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;

use serde::de::{Deserialize, MapAccess, Visitor};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde::Deserializer;

use super::{ConcurrentTree, Tree};

/// Writes every entry visited by `for_each` into a map.
fn serialize_entries<K, T, S, F>(len: usize, for_each: F, serializer: S) -> Result<S::Ok, S::Error>
where
    K: Serialize,
    T: Serialize,
    S: Serializer,
    F: FnOnce(&mut dyn FnMut(&[K], &T)),
{
    let mut map = serializer.serialize_map(Some(len))?;
    let mut error = None;
    for_each(&mut |key: &[K], value: &T| {
        if error.is_none() {
            if let Err(e) = map.serialize_entry(key, value) {
                error.replace(e);
            }
        }
    });

    if let Some(e) = error {
        return Err(e);
    }

    map.end()
}

pub struct TreeVisitor<K, T> {
    marker: PhantomData<fn() -> Tree<K, T>>,
}

impl<K, T> TreeVisitor<K, T> {
    fn new() -> Self {
        TreeVisitor {
            marker: PhantomData,
        }
    }
}

impl<'de, K, T> Visitor<'de> for TreeVisitor<K, T>
where
    K: Deserialize<'de> + Clone + Eq + Hash,
    T: Deserialize<'de> + Clone,
{
    type Value = Tree<K, T>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a Tree")
    }

    fn visit_map<M>(self, mut access: M) -> Result<Self::Value, M::Error>
    where
        M: MapAccess<'de>,
    {
        let mut tree = Tree::new();
        while let Some((key, value)) = access.next_entry::<Vec<K>, T>()? {
            tree.insert(&key, value);
        }
        Ok(tree)
    }
}

impl<'de, K, T> Deserialize<'de> for Tree<K, T>
where
    K: Deserialize<'de> + Clone + Eq + Hash,
    T: Deserialize<'de> + Clone,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(TreeVisitor::<K, T>::new())
    }
}

impl<K, T> Serialize for Tree<K, T>
where
    K: Serialize + Clone,
    T: Serialize,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serialize_entries(self.len(), |f| self.for_each(f), serializer)
    }
}

pub struct ConcurrentTreeVisitor<K, T>
where
    K: 'static + Clone + Eq + Hash + Send + Sync,
    T: 'static + Clone + Send + Sync,
{
    #[allow(clippy::type_complexity)]
    marker: PhantomData<fn() -> ConcurrentTree<K, T>>,
}

impl<K, T> ConcurrentTreeVisitor<K, T>
where
    K: 'static + Clone + Eq + Hash + Send + Sync,
    T: 'static + Clone + Send + Sync,
{
    fn new() -> Self {
        ConcurrentTreeVisitor {
            marker: PhantomData,
        }
    }
}

impl<'de, K, T> Visitor<'de> for ConcurrentTreeVisitor<K, T>
where
    K: 'static + Deserialize<'de> + Clone + Eq + Hash + Send + Sync,
    T: 'static + Deserialize<'de> + Clone + Send + Sync,
{
    type Value = ConcurrentTree<K, T>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a ConcurrentTree")
    }

    fn visit_map<M>(self, mut access: M) -> Result<Self::Value, M::Error>
    where
        M: MapAccess<'de>,
    {
        let tree = ConcurrentTree::new();
        while let Some((key, value)) = access.next_entry::<Vec<K>, T>()? {
            tree.insert(&key, value);
        }
        Ok(tree)
    }
}

impl<'de, K, T> Deserialize<'de> for ConcurrentTree<K, T>
where
    K: 'static + Deserialize<'de> + Clone + Eq + Hash + Send + Sync,
    T: 'static + Deserialize<'de> + Clone + Send + Sync,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(ConcurrentTreeVisitor::<K, T>::new())
    }
}

impl<K, T> Serialize for ConcurrentTree<K, T>
where
    K: 'static + Serialize + Clone + Eq + Hash + Send + Sync,
    T: 'static + Serialize + Clone + Send + Sync,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serialize_entries(self.len(), |f| self.for_each(f), serializer)
    }
}
