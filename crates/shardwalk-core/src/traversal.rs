//! # Traversal Results and Frontiers
//!
//! A [`TraversalResult`] is the output of one hop: for every source vertex
//! that reached something, the ordered list of neighbors it reached,
//! optionally the parallel list of edge properties, and the flattened set of
//! all neighbors.
//!
//! ## Invariants
//!
//! - no source maps to an empty neighbor list
//! - `v_set` equals the union of all neighbor lists
//! - when present, `p_map` has exactly the keys of `v_map`, with lists of
//!   the same lengths
//!
//! The one exception is a *set-only* result built with
//! [`TraversalResult::from_set`]: it has no map at all and its `v_set` is the
//! whole content. Set-only results serve as frontiers and filters.
//!
//! Every constructor and helper in this crate keeps these invariants.

use crate::properties::PropertyMap;
use crate::types::VertexRef;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::hash::BuildHasher;

/// Source vertex to ordered neighbors.
pub type VertexMap = BTreeMap<VertexRef, Vec<VertexRef>>;

/// Source vertex to edge properties, parallel to a [`VertexMap`].
pub type EdgePropertyMap = BTreeMap<VertexRef, Vec<PropertyMap>>;

// =============================================================================
// TRAVERSAL RESULT
// =============================================================================

/// Output of a hop, and input to the next one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraversalResult {
    v_map: VertexMap,
    p_map: Option<EdgePropertyMap>,
    v_set: BTreeSet<VertexRef>,
}

impl TraversalResult {
    /// An empty result without edge properties.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty result that will carry edge properties.
    #[must_use]
    pub(crate) fn with_edge_properties() -> Self {
        Self {
            p_map: Some(EdgePropertyMap::new()),
            ..Self::default()
        }
    }

    /// Build a result from a bare map. Empty lists are dropped.
    #[must_use]
    pub fn from_v_map(v_map: VertexMap) -> Self {
        Self::from_parts(v_map, None)
    }

    /// Build a set-only result.
    #[must_use]
    pub fn from_set(v_set: BTreeSet<VertexRef>) -> Self {
        Self {
            v_map: VertexMap::new(),
            p_map: None,
            v_set,
        }
    }

    /// Assemble a result from a map and optional edge properties, dropping
    /// empty entries and recomputing the neighbor set.
    ///
    /// Callers guarantee `p_map` lists are parallel to `v_map` lists.
    pub(crate) fn from_parts(v_map: VertexMap, p_map: Option<EdgePropertyMap>) -> Self {
        let v_map: VertexMap = v_map
            .into_iter()
            .filter(|(_, neighbors)| !neighbors.is_empty())
            .collect();
        let p_map = p_map.map(|mut props| {
            props.retain(|source, _| v_map.contains_key(source));
            props
        });
        let v_set = v_map.values().flatten().cloned().collect();
        Self {
            v_map,
            p_map,
            v_set,
        }
    }

    /// Append one edge. `props` is ignored when the result carries no edge
    /// properties.
    pub(crate) fn push(&mut self, source: &VertexRef, neighbor: VertexRef, props: PropertyMap) {
        if let Some(p_map) = self.p_map.as_mut() {
            p_map.entry(source.clone()).or_default().push(props);
        }
        self.v_set.insert(neighbor.clone());
        self.v_map.entry(source.clone()).or_default().push(neighbor);
    }

    /// Source to neighbors.
    pub fn v_map(&self) -> &VertexMap {
        &self.v_map
    }

    /// Source to edge properties, if they were requested.
    pub fn p_map(&self) -> Option<&EdgePropertyMap> {
        self.p_map.as_ref()
    }

    /// Every neighbor reached, once.
    pub fn v_set(&self) -> &BTreeSet<VertexRef> {
        &self.v_set
    }

    /// Neighbors of `source`, in stored order. Empty if it reached nothing.
    pub fn neighbors(&self, source: &VertexRef) -> &[VertexRef] {
        self.v_map.get(source).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Edge properties of `source`, parallel to [`Self::neighbors`].
    pub fn edge_properties(&self, source: &VertexRef) -> Option<&[PropertyMap]> {
        self.p_map
            .as_ref()
            .and_then(|p_map| p_map.get(source))
            .map(Vec::as_slice)
    }

    /// Sources that reached at least one neighbor.
    pub fn sources(&self) -> impl Iterator<Item = &VertexRef> {
        self.v_map.keys()
    }

    /// Whether `vertex` was reached.
    pub fn contains(&self, vertex: &VertexRef) -> bool {
        self.v_set.contains(vertex)
    }

    /// Whether nothing was reached.
    pub fn is_empty(&self) -> bool {
        self.v_set.is_empty()
    }

    /// Number of distinct neighbors reached.
    pub fn len(&self) -> usize {
        self.v_set.len()
    }

    /// Number of edges, counting duplicates.
    pub fn edge_count(&self) -> usize {
        self.v_map.values().map(Vec::len).sum()
    }

    /// Whether the result is set-only (no source information).
    pub fn is_set_only(&self) -> bool {
        self.v_map.is_empty() && self.p_map.is_none() && !self.v_set.is_empty()
    }

    /// Swap sources and neighbors: every neighbor maps to the sources that
    /// reached it, in source order. Edge properties follow their edge.
    ///
    /// If a source reached the same neighbor more than once, the first edge
    /// is kept.
    #[must_use]
    pub fn invert(&self) -> Self {
        let mut v_map = VertexMap::new();
        let mut p_map = self.p_map.as_ref().map(|_| EdgePropertyMap::new());

        for (source, neighbors) in &self.v_map {
            let props = self.edge_properties(source);
            for (idx, neighbor) in neighbors.iter().enumerate() {
                let reached_by = v_map.entry(neighbor.clone()).or_default();
                if reached_by.contains(source) {
                    continue;
                }
                reached_by.push(source.clone());
                if let (Some(p_map), Some(props)) = (p_map.as_mut(), props) {
                    let edge = props.get(idx).cloned().unwrap_or_default();
                    p_map.entry(neighbor.clone()).or_default().push(edge);
                }
            }
        }

        Self::from_parts(v_map, p_map)
    }

    /// Keep only the sources for which `keep` returns true.
    pub fn retain_sources<P>(&mut self, mut keep: P)
    where
        P: FnMut(&VertexRef) -> bool,
    {
        if self.is_set_only() {
            self.v_set.retain(|v| keep(v));
            return;
        }
        let v_map = std::mem::take(&mut self.v_map);
        let p_map = self.p_map.take();
        let v_map = v_map.into_iter().filter(|(source, _)| keep(source)).collect();
        *self = Self::from_parts(v_map, p_map);
    }

    /// Check every structural invariant.
    pub fn is_consistent(&self) -> bool {
        if self.v_map.values().any(Vec::is_empty) {
            return false;
        }
        if !self.v_map.is_empty() || self.p_map.is_some() {
            let flattened: BTreeSet<&VertexRef> = self.v_map.values().flatten().collect();
            if flattened.len() != self.v_set.len()
                || !self.v_set.iter().all(|v| flattened.contains(v))
            {
                return false;
            }
        }
        match &self.p_map {
            None => true,
            Some(p_map) => {
                p_map.len() == self.v_map.len()
                    && self.v_map.iter().all(|(source, neighbors)| {
                        p_map
                            .get(source)
                            .is_some_and(|props| props.len() == neighbors.len())
                    })
            }
        }
    }

    /// Take the result apart.
    pub fn into_parts(self) -> (VertexMap, Option<EdgePropertyMap>, BTreeSet<VertexRef>) {
        (self.v_map, self.p_map, self.v_set)
    }
}

// =============================================================================
// FRONTIER
// =============================================================================

/// Something that names a group of vertices to expand from.
pub trait Frontier {
    /// Visit every vertex, duplicates included.
    fn for_each_vertex(&self, visit: &mut dyn FnMut(&VertexRef));

    /// Distinct vertices in first-occurrence order.
    fn collect_unique(&self) -> Vec<VertexRef> {
        let mut seen = HashSet::new();
        let mut unique = Vec::new();
        self.for_each_vertex(&mut |v| {
            if seen.insert(v.clone()) {
                unique.push(v.clone());
            }
        });
        unique
    }
}

impl Frontier for VertexRef {
    fn for_each_vertex(&self, visit: &mut dyn FnMut(&VertexRef)) {
        visit(self);
    }
}

impl Frontier for [VertexRef] {
    fn for_each_vertex(&self, visit: &mut dyn FnMut(&VertexRef)) {
        for v in self {
            visit(v);
        }
    }
}

impl<const N: usize> Frontier for [VertexRef; N] {
    fn for_each_vertex(&self, visit: &mut dyn FnMut(&VertexRef)) {
        self.as_slice().for_each_vertex(visit);
    }
}

impl Frontier for Vec<VertexRef> {
    fn for_each_vertex(&self, visit: &mut dyn FnMut(&VertexRef)) {
        self.as_slice().for_each_vertex(visit);
    }
}

impl Frontier for BTreeSet<VertexRef> {
    fn for_each_vertex(&self, visit: &mut dyn FnMut(&VertexRef)) {
        for v in self {
            visit(v);
        }
    }
}

impl<S: BuildHasher> Frontier for HashSet<VertexRef, S> {
    fn for_each_vertex(&self, visit: &mut dyn FnMut(&VertexRef)) {
        for v in self {
            visit(v);
        }
    }
}

impl Frontier for TraversalResult {
    fn for_each_vertex(&self, visit: &mut dyn FnMut(&VertexRef)) {
        for v in &self.v_set {
            visit(v);
        }
    }
}

impl<'a> Frontier for [&'a dyn Frontier] {
    fn for_each_vertex(&self, visit: &mut dyn FnMut(&VertexRef)) {
        for frontier in self {
            frontier.for_each_vertex(visit);
        }
    }
}

impl<'a, const N: usize> Frontier for [&'a dyn Frontier; N] {
    fn for_each_vertex(&self, visit: &mut dyn FnMut(&VertexRef)) {
        self.as_slice().for_each_vertex(visit);
    }
}

impl<F: Frontier + ?Sized> Frontier for &F {
    fn for_each_vertex(&self, visit: &mut dyn FnMut(&VertexRef)) {
        (**self).for_each_vertex(visit);
    }
}

// =============================================================================
// VERTEX SET
// =============================================================================

/// Membership test used by the set-algebra helpers.
pub trait VertexSet {
    /// Whether `vertex` is a member.
    fn contains_vertex(&self, vertex: &VertexRef) -> bool;
}

impl VertexSet for BTreeSet<VertexRef> {
    fn contains_vertex(&self, vertex: &VertexRef) -> bool {
        self.contains(vertex)
    }
}

impl<S: BuildHasher> VertexSet for HashSet<VertexRef, S> {
    fn contains_vertex(&self, vertex: &VertexRef) -> bool {
        self.contains(vertex)
    }
}

/// Membership by key, as in `intersect(result, v_map.keys())`.
impl<V> VertexSet for BTreeMap<VertexRef, V> {
    fn contains_vertex(&self, vertex: &VertexRef) -> bool {
        self.contains_key(vertex)
    }
}

impl VertexSet for [VertexRef] {
    fn contains_vertex(&self, vertex: &VertexRef) -> bool {
        self.contains(vertex)
    }
}

impl VertexSet for Vec<VertexRef> {
    fn contains_vertex(&self, vertex: &VertexRef) -> bool {
        self.as_slice().contains_vertex(vertex)
    }
}

impl VertexSet for VertexRef {
    fn contains_vertex(&self, vertex: &VertexRef) -> bool {
        self == vertex
    }
}

impl VertexSet for TraversalResult {
    fn contains_vertex(&self, vertex: &VertexRef) -> bool {
        self.v_set.contains(vertex)
    }
}

impl<T: VertexSet + ?Sized> VertexSet for &T {
    fn contains_vertex(&self, vertex: &VertexRef) -> bool {
        (**self).contains_vertex(vertex)
    }
}

// =============================================================================
// TESTS
// =============================================================================
