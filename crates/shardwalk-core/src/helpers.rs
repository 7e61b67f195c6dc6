//! # Set Algebra
//!
//! In-memory reshaping of [`TraversalResult`]s between hops. Nothing here
//! touches the store.
//!
//! `subtract`, `intersect` and `remove_edge_if` filter edges in place;
//! `fuse` composes two hops into one. All of them keep the result
//! invariants: a source whose last edge goes away disappears, and a neighbor
//! leaves `v_set` once no remaining source reaches it.

use crate::properties::PropertyMap;
use crate::traversal::{EdgePropertyMap, TraversalResult, VertexMap, VertexSet};
use crate::types::VertexRef;
use std::collections::HashSet;

/// Keep the edges for which `keep(neighbor, edge_props)` holds.
fn retain_edges<P>(result: &mut TraversalResult, mut keep: P)
where
    P: FnMut(&VertexRef, &PropertyMap) -> bool,
{
    let empty = PropertyMap::new();

    if result.is_set_only() {
        result.retain_sources(|v| keep(v, &empty));
        return;
    }

    let (v_map, p_map, _) = std::mem::take(result).into_parts();
    let mut kept_v = VertexMap::new();
    let mut kept_p = p_map.as_ref().map(|_| EdgePropertyMap::new());

    for (source, neighbors) in v_map {
        let props = p_map.as_ref().and_then(|p| p.get(&source));
        let mut survivors = Vec::with_capacity(neighbors.len());
        let mut survivor_props = Vec::new();

        for (idx, neighbor) in neighbors.into_iter().enumerate() {
            let edge = props.and_then(|p| p.get(idx)).unwrap_or(&empty);
            if keep(&neighbor, edge) {
                if kept_p.is_some() {
                    survivor_props.push(edge.clone());
                }
                survivors.push(neighbor);
            }
        }

        if survivors.is_empty() {
            continue;
        }
        if let Some(kept_p) = kept_p.as_mut() {
            kept_p.insert(source.clone(), survivor_props);
        }
        kept_v.insert(source, survivors);
    }

    *result = TraversalResult::from_parts(kept_v, kept_p);
}

/// Remove every vertex of `seen` from the neighbor lists and from `v_set`.
///
/// Typical use is dropping already-visited vertices after a hop.
pub fn subtract<S>(result: &mut TraversalResult, seen: &S)
where
    S: VertexSet + ?Sized,
{
    retain_edges(result, |neighbor, _| !seen.contains_vertex(neighbor));
}

/// Remove every vertex NOT in `retain`.
pub fn intersect<S>(result: &mut TraversalResult, retain: &S)
where
    S: VertexSet + ?Sized,
{
    retain_edges(result, |neighbor, _| retain.contains_vertex(neighbor));
}

/// Remove the individual edges for which `predicate(neighbor, edge_props)`
/// returns true.
///
/// Results without edge properties pass an empty map.
pub fn remove_edge_if<P>(result: &mut TraversalResult, mut predicate: P)
where
    P: FnMut(&VertexRef, &PropertyMap) -> bool,
{
    retain_edges(result, |neighbor, props| !predicate(neighbor, props));
}

/// Compose `a: X -> Y` with `b: Y -> Z` into `X -> Z`.
///
/// With `keep_intermediate` every path `X -> Y -> Z` contributes one entry,
/// so a `Z` reached through several `Y`s repeats. Without it each `Z`
/// appears once per `X`, at its first occurrence. Edge properties of `b`
/// are carried over when `b` has them. An `X` that reaches no `Z` is
/// omitted.
pub fn fuse(a: &TraversalResult, b: &TraversalResult, keep_intermediate: bool) -> TraversalResult {
    let mut v_map = VertexMap::new();
    let mut p_map = b.p_map().map(|_| EdgePropertyMap::new());

    for (x, ys) in a.v_map() {
        let mut zs = Vec::new();
        let mut z_props = Vec::new();
        let mut seen = HashSet::new();

        for y in ys {
            let props = b.edge_properties(y);
            for (idx, z) in b.neighbors(y).iter().enumerate() {
                if !keep_intermediate && !seen.insert(z) {
                    continue;
                }
                zs.push(z.clone());
                if p_map.is_some() {
                    z_props.push(props.and_then(|p| p.get(idx)).cloned().unwrap_or_default());
                }
            }
        }

        if zs.is_empty() {
            continue;
        }
        if let Some(p_map) = p_map.as_mut() {
            p_map.insert(x.clone(), z_props);
        }
        v_map.insert(x.clone(), zs);
    }

    TraversalResult::from_parts(v_map, p_map)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::types::{EntityId, PropertyValue};
    use std::collections::BTreeSet;

    fn person(local: u64) -> VertexRef {
        VertexRef::new(EntityId::new(1, local), "Person")
    }

    fn forum(local: u64) -> VertexRef {
        VertexRef::new(EntityId::new(4, local), "Forum")
    }

    fn map(entries: &[(VertexRef, Vec<VertexRef>)]) -> TraversalResult {
        TraversalResult::from_v_map(entries.iter().cloned().collect())
    }

    fn set(vs: &[VertexRef]) -> BTreeSet<VertexRef> {
        vs.iter().cloned().collect()
    }

    #[test]
    fn subtract_drops_seen_and_empty_sources() {
        let mut result = map(&[
            (person(1), vec![person(2), person(3)]),
            (person(4), vec![person(2)]),
        ]);
        subtract(&mut result, &set(&[person(2)]));

        assert_eq!(result.v_set(), &set(&[person(3)]));
        assert_eq!(result.v_map().len(), 1);
        assert!(result.neighbors(&person(4)).is_empty());
        assert!(result.is_consistent());
    }

    #[test]
    fn intersect_with_map_keys() {
        let mut result = map(&[(person(1), vec![person(2), person(3), person(5)])]);
        let other = map(&[(person(3), vec![person(9)]), (person(5), vec![person(9)])]);
        intersect(&mut result, other.v_map());

        assert_eq!(result.neighbors(&person(1)), &[person(3), person(5)]);
        assert!(result.is_consistent());
    }

    #[test]
    fn neighbor_stays_while_another_source_reaches_it() {
        let mut result = map(&[
            (person(1), vec![person(3)]),
            (person(2), vec![person(3), person(4)]),
        ]);
        remove_edge_if(&mut result, |n, _| n == &person(4));
        assert!(result.contains(&person(3)));
        assert!(!result.contains(&person(4)));
        assert!(result.is_consistent());
    }

    #[test]
    fn fuse_deduplicates_per_source() {
        let a = map(&[(person(1), vec![person(11), person(12)])]);
        let b = map(&[
            (person(11), vec![person(21)]),
            (person(12), vec![person(21), person(22)]),
        ]);

        let fused = fuse(&a, &b, false);
        assert_eq!(fused.neighbors(&person(1)), &[person(21), person(22)]);
        assert!(fused.is_consistent());
    }

    #[test]
    fn fuse_keeps_one_entry_per_path() {
        let a = map(&[(person(1), vec![person(11), person(12)])]);
        let b = map(&[
            (person(11), vec![person(21)]),
            (person(12), vec![person(21), person(22)]),
        ]);

        let fused = fuse(&a, &b, true);
        assert_eq!(
            fused.neighbors(&person(1)),
            &[person(21), person(21), person(22)]
        );
        assert_eq!(fused.len(), 2);
        assert!(fused.is_consistent());
    }

    #[test]
    fn fuse_omits_sources_without_second_hop() {
        let a = map(&[(person(1), vec![person(11)]), (person(2), vec![person(12)])]);
        let b = map(&[(person(11), vec![person(21)])]);

        let fused = fuse(&a, &b, false);
        assert_eq!(fused.sources().cloned().collect::<Vec<_>>(), vec![person(1)]);
    }

    #[test]
    fn fuse_carries_second_hop_edge_properties() {
        let mut props = PropertyMap::new();
        props.insert("classYear".to_string(), PropertyValue::Int(2004));

        let a = map(&[(person(1), vec![person(11)])]);
        let mut b = TraversalResult::with_edge_properties();
        b.push(&person(11), person(21), props.clone());

        let fused = fuse(&a, &b, false);
        assert_eq!(fused.edge_properties(&person(1)), Some(&[props][..]));
        assert!(fused.is_consistent());
    }

    #[test]
    fn remove_edge_if_by_join_date() {
        let cutoff = 100;
        let joined = |ts: i64| {
            let mut props = PropertyMap::new();
            props.insert("joinDate".to_string(), PropertyValue::Int(ts));
            props
        };

        let mut membership = TraversalResult::with_edge_properties();
        membership.push(&forum(1), person(1), joined(50));
        membership.push(&forum(1), person(2), joined(150));
        membership.push(&forum(2), person(3), joined(100));
        membership.push(&forum(3), person(1), joined(101));

        remove_edge_if(&mut membership, |_, props| {
            props
                .get("joinDate")
                .and_then(PropertyValue::as_int)
                .is_some_and(|ts| ts <= cutoff)
        });

        assert_eq!(membership.neighbors(&forum(1)), &[person(2)]);
        assert!(!membership.v_map().contains_key(&forum(2)));
        assert_eq!(membership.neighbors(&forum(3)), &[person(1)]);
        assert_eq!(membership.v_set(), &set(&[person(1), person(2)]));
        assert_eq!(
            membership.edge_properties(&forum(1)),
            Some(&[joined(150)][..])
        );
        assert!(membership.is_consistent());
    }

    #[test]
    fn predicate_without_edge_properties_sees_empty_map() {
        let mut result = map(&[(person(1), vec![person(2)])]);
        let mut calls = 0;
        remove_edge_if(&mut result, |_, props| {
            calls += 1;
            assert!(props.is_empty());
            false
        });
        assert_eq!(calls, 1);
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn set_only_results_filter_their_set() {
        let mut result = TraversalResult::from_set(set(&[person(1), person(2), person(3)]));
        subtract(&mut result, &person(2));
        intersect(&mut result, &vec![person(1), person(2)]);
        assert_eq!(result.v_set(), &set(&[person(1)]));
    }
}
