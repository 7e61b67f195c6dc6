//! # Property Bag
//!
//! Per-query cache of vertex properties, filled by
//! [`crate::Transaction::get_properties`].
//!
//! The bag remembers which keys it already holds for each vertex (its
//! *coverage*). The accessor only fetches vertices whose coverage does not
//! include the requested keys, and merging never overwrites a value that is
//! already present.

use crate::types::{PropertyValue, VertexRef};
use std::collections::{BTreeMap, BTreeSet};

/// Property name to value.
pub type PropertyMap = BTreeMap<String, PropertyValue>;

/// Which properties to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyKeys {
    /// Every stored property.
    All,
    /// Only these names. Names a vertex doesn't have stay absent.
    Named(Vec<String>),
}

impl PropertyKeys {
    /// Build a `Named` selection.
    pub fn named<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Named(names.into_iter().map(Into::into).collect())
    }

    /// Restrict a fetched map to the selection.
    pub(crate) fn select(&self, mut map: PropertyMap) -> PropertyMap {
        match self {
            Self::All => map,
            Self::Named(names) => names
                .iter()
                .filter_map(|name| map.remove_entry(name))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Coverage {
    All,
    Keys(BTreeSet<String>),
}

impl Coverage {
    fn covers(&self, keys: &PropertyKeys) -> bool {
        match (self, keys) {
            (Self::All, _) => true,
            (Self::Keys(_), PropertyKeys::All) => false,
            (Self::Keys(held), PropertyKeys::Named(names)) => {
                names.iter().all(|name| held.contains(name))
            }
        }
    }

    fn extend(&mut self, keys: &PropertyKeys) {
        match keys {
            PropertyKeys::All => *self = Self::All,
            PropertyKeys::Named(names) => {
                if let Self::Keys(held) = self {
                    held.extend(names.iter().cloned());
                }
            }
        }
    }
}

/// Vertex properties gathered during one query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyBag {
    values: BTreeMap<VertexRef, PropertyMap>,
    coverage: BTreeMap<VertexRef, Coverage>,
}

impl PropertyBag {
    /// Create an empty bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All properties held for `vertex`.
    ///
    /// Returns `None` if the vertex was never fetched. A fetched vertex that
    /// doesn't exist in the store has an empty map.
    pub fn get(&self, vertex: &VertexRef) -> Option<&PropertyMap> {
        self.values.get(vertex)
    }

    /// One property of `vertex`.
    pub fn value(&self, vertex: &VertexRef, key: &str) -> Option<&PropertyValue> {
        self.values.get(vertex).and_then(|props| props.get(key))
    }

    /// A string property of `vertex`.
    pub fn str(&self, vertex: &VertexRef, key: &str) -> Option<&str> {
        self.value(vertex, key).and_then(PropertyValue::as_str)
    }

    /// An integer property of `vertex`.
    pub fn int(&self, vertex: &VertexRef, key: &str) -> Option<i64> {
        self.value(vertex, key).and_then(PropertyValue::as_int)
    }

    /// Whether `vertex` has been fetched at all.
    pub fn contains(&self, vertex: &VertexRef) -> bool {
        self.coverage.contains_key(vertex)
    }

    /// Whether the bag already holds `keys` for `vertex`.
    pub fn covers(&self, vertex: &VertexRef, keys: &PropertyKeys) -> bool {
        self.coverage
            .get(vertex)
            .is_some_and(|coverage| coverage.covers(keys))
    }

    /// Number of fetched vertices.
    pub fn len(&self) -> usize {
        self.coverage.len()
    }

    /// Whether nothing has been fetched.
    pub fn is_empty(&self) -> bool {
        self.coverage.is_empty()
    }

    /// Iterate fetched vertices and their properties in vertex order.
    pub fn iter(&self) -> impl Iterator<Item = (&VertexRef, &PropertyMap)> {
        self.values.iter()
    }

    /// Merge freshly fetched properties. Keys already present are kept.
    pub(crate) fn merge(&mut self, vertex: VertexRef, fetched: PropertyMap, keys: &PropertyKeys) {
        let held = self.values.entry(vertex.clone()).or_default();
        for (name, value) in keys.select(fetched) {
            held.entry(name).or_insert(value);
        }

        self.coverage
            .entry(vertex)
            .or_insert_with(|| Coverage::Keys(BTreeSet::new()))
            .extend(keys);
    }
}
