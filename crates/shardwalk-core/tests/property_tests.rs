//! # Property-Based Tests
//!
//! Invariant fuzzing of the set-algebra helpers and of the traversal
//! primitive against a naive model.

use proptest::collection::{btree_set, vec};
use proptest::prelude::*;
use shardwalk_core::properties::PropertyMap;
use shardwalk_core::traversal::VertexMap;
use shardwalk_core::{
    Direction, EdgeSpec, EngineConfig, EntityId, Graph, Ingestor, MemoryStore, PropertyValue,
    TraversalResult, VertexRef, VertexSpec, fuse, intersect, remove_edge_if, subtract,
};
use std::collections::BTreeSet;

fn person(local: u64) -> VertexRef {
    VertexRef::new(EntityId::new(1, local), "Person")
}

/// Small id space so sets overlap often.
fn adjacency() -> impl Strategy<Value = Vec<(u64, Vec<u64>)>> {
    vec((0u64..20, vec(0u64..20, 0..6)), 0..12)
}

fn edge_props(idx: usize) -> PropertyMap {
    let mut props = PropertyMap::new();
    props.insert("weight".to_string(), PropertyValue::Int(idx as i64));
    props
}

/// Build a result through the store so `p_map` is populated the real way.
fn stored_result(adjacency: &[(u64, Vec<u64>)], with_props: bool) -> TraversalResult {
    let graph = Graph::new(MemoryStore::new(4), EngineConfig::default());
    let vertices: Vec<VertexSpec> = (0..20)
        .map(|i| VertexSpec {
            vertex: person(i),
            properties: PropertyMap::new(),
        })
        .collect();
    let mut edges = Vec::new();
    for (source, targets) in adjacency {
        for (idx, target) in targets.iter().enumerate() {
            edges.push(EdgeSpec {
                out: person(*source),
                relationship: "knows".to_string(),
                target: person(*target),
                properties: edge_props(idx),
            });
        }
    }
    Ingestor::load(&graph, &vertices, &edges).expect("load");

    let sources: Vec<_> = (0..20).map(person).collect();
    graph
        .read_with_retry(|tx| tx.traverse(&sources, "knows", Direction::Out, with_props, &[]))
        .expect("traverse")
}

fn vertex_set(ids: &BTreeSet<u64>) -> BTreeSet<VertexRef> {
    ids.iter().copied().map(person).collect()
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Traversal returns exactly the distinct stored neighbors.
    #[test]
    fn traverse_matches_model(adj in adjacency()) {
        let result = stored_result(&adj, true);
        prop_assert!(result.is_consistent());

        let mut expected = BTreeSet::new();
        for (_, targets) in &adj {
            expected.extend(targets.iter().copied().map(person));
        }
        prop_assert_eq!(result.v_set(), &expected);
    }

    /// subtract removes exactly the subtrahend and keeps invariants.
    #[test]
    fn subtract_is_set_difference(
        adj in adjacency(),
        seen in btree_set(0u64..20, 0..10),
        with_props in any::<bool>(),
    ) {
        let before = stored_result(&adj, with_props);
        let seen = vertex_set(&seen);
        let mut after = before.clone();
        subtract(&mut after, &seen);

        prop_assert!(after.is_consistent());
        let expected: BTreeSet<_> = before.v_set().difference(&seen).cloned().collect();
        prop_assert_eq!(after.v_set(), &expected);
    }

    /// intersect keeps exactly the shared vertices and keeps invariants.
    #[test]
    fn intersect_is_set_intersection(
        adj in adjacency(),
        retain in btree_set(0u64..20, 0..10),
        with_props in any::<bool>(),
    ) {
        let before = stored_result(&adj, with_props);
        let retain = vertex_set(&retain);
        let mut after = before.clone();
        intersect(&mut after, &retain);

        prop_assert!(after.is_consistent());
        let expected: BTreeSet<_> = before.v_set().intersection(&retain).cloned().collect();
        prop_assert_eq!(after.v_set(), &expected);
    }

    /// remove_edge_if drops exactly the matching edges, per source.
    #[test]
    fn remove_edge_if_keeps_parallel_props(adj in adjacency(), threshold in 0i64..6) {
        let before = stored_result(&adj, true);
        let mut after = before.clone();
        remove_edge_if(&mut after, |_, props| {
            props.get("weight").and_then(PropertyValue::as_int).is_some_and(|w| w < threshold)
        });

        prop_assert!(after.is_consistent());
        for source in after.sources() {
            let props = after.edge_properties(source).expect("props");
            prop_assert!(props.iter().all(|p| p.get("weight").and_then(PropertyValue::as_int) >= Some(threshold)));
        }
        prop_assert!(after.edge_count() <= before.edge_count());
    }

    /// fuse output matches a naive two-hop walk.
    #[test]
    fn fuse_matches_model(
        first in adjacency(),
        second in adjacency(),
        keep in any::<bool>(),
        with_props in any::<bool>(),
    ) {
        let a = stored_result(&first, false);
        let b = stored_result(&second, with_props);
        let fused = fuse(&a, &b, keep);
        prop_assert!(fused.is_consistent());

        for (x, ys) in a.v_map() {
            let mut walk = Vec::new();
            for y in ys {
                for z in b.neighbors(y) {
                    if keep || !walk.contains(z) {
                        walk.push(z.clone());
                    }
                }
            }
            prop_assert_eq!(fused.neighbors(x), walk.as_slice());
        }
    }

    /// from_v_map and invert always produce consistent results.
    #[test]
    fn reshaping_is_consistent(adj in adjacency()) {
        let mut map = VertexMap::new();
        for (source, targets) in &adj {
            map.entry(person(*source))
                .or_insert_with(Vec::new)
                .extend(targets.iter().copied().map(person));
        }
        let result = TraversalResult::from_v_map(map);
        prop_assert!(result.is_consistent());

        let inverted = result.invert();
        prop_assert!(inverted.is_consistent());
        let sources: BTreeSet<_> = result.sources().cloned().collect();
        prop_assert_eq!(inverted.v_set(), &sources);
    }
}

#[test]
fn edge_props_follow_their_edge() {
    let result = stored_result(&[(1, vec![2, 3])], true);
    let props = result.edge_properties(&person(1)).expect("props");
    assert_eq!(props, &[edge_props(0), edge_props(1)][..]);
}
