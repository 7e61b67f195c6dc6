//! # Transactions
//!
//! An optimistic transaction over a [`KvStore`].
//!
//! A transaction starts at the store's current version (`read_ts`), buffers
//! its writes, and records the version of every tracked read. At commit the
//! store re-checks those versions and applies the writes atomically, or
//! rejects the whole batch with [`GraphError::Conflict`].
//!
//! ## Read modes
//!
//! - `Transactional`: every read is tracked. A read that sees a version newer
//!   than `read_ts` aborts on the spot, since the snapshot is already broken.
//! - `NonTransactional`: plain reads are untracked and see the latest
//!   committed data. Reads done on behalf of a mutation (edge-list
//!   read-modify-write) are always tracked.
//!
//! ## States
//!
//! `Active` until `commit` succeeds (`Committed`) or a conflict, failed
//! commit or `rollback` ends it (`Aborted`). Every operation on an aborted
//! transaction fails with [`GraphError::TransactionAborted`].

use crate::GraphError;
use crate::config::ReadMode;
use crate::formats::{
    EdgeList, VertexRecord, decode_edge_list, decode_vertex, edge_list_key, encode_edge_list,
    encode_vertex, vertex_key,
};
use crate::ingestor::{EdgeSpec, Ingestor};
use crate::primitives::{ABSENT_VERSION, label_is_valid, relationship_is_valid};
use crate::properties::{PropertyBag, PropertyKeys, PropertyMap};
use crate::storage::{CommitBatch, Key, KvStore, Version, WriteOp};
use crate::traversal::{Frontier, TraversalResult};
use crate::types::{Direction, VertexRef};
use std::collections::{BTreeMap, HashMap};

/// Lifecycle of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    /// Accepting reads and writes.
    Active,
    /// Writes applied.
    Committed,
    /// Ended without applying anything.
    Aborted,
}

/// One attempt at running a unit of work against the store.
pub struct Transaction<'g, S: KvStore + ?Sized> {
    store: &'g S,
    read_ts: Version,
    mode: ReadMode,
    attempt: u32,
    reads: BTreeMap<Key, Version>,
    writes: BTreeMap<Key, WriteOp>,
    state: TxState,
}

impl<S: KvStore + ?Sized> std::fmt::Debug for Transaction<'_, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("read_ts", &self.read_ts)
            .field("mode", &self.mode)
            .field("attempt", &self.attempt)
            .field("reads", &self.reads.len())
            .field("writes", &self.writes.len())
            .field("state", &self.state)
            .finish()
    }
}

impl<'g, S: KvStore + ?Sized> Transaction<'g, S> {
    pub(crate) fn new(store: &'g S, read_ts: Version, mode: ReadMode, attempt: u32) -> Self {
        Self {
            store,
            read_ts,
            mode,
            attempt,
            reads: BTreeMap::new(),
            writes: BTreeMap::new(),
            state: TxState::Active,
        }
    }

    /// Current state.
    pub fn state(&self) -> TxState {
        self.state
    }

    /// 1-based attempt number within the retry wrapper.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Snapshot version the transaction started at.
    pub fn read_ts(&self) -> Version {
        self.read_ts
    }

    /// How plain reads are tracked.
    pub fn mode(&self) -> ReadMode {
        self.mode
    }

    /// Number of buffered writes.
    pub fn pending_writes(&self) -> usize {
        self.writes.len()
    }

    fn ensure_active(&self) -> Result<(), GraphError> {
        match self.state {
            TxState::Active => Ok(()),
            TxState::Aborted => Err(GraphError::TransactionAborted),
            TxState::Committed => Err(GraphError::InvalidRequest(
                "transaction already committed".to_string(),
            )),
        }
    }

    // =========================================================================
    // READ PATH
    // =========================================================================

    /// Read `keys` in one store request, serving buffered writes locally.
    ///
    /// The result is parallel to `keys`. No request is made when every key is
    /// buffered (or `keys` is empty).
    fn fetch(&mut self, keys: &[Key], track: bool) -> Result<Vec<Option<Vec<u8>>>, GraphError> {
        self.ensure_active()?;

        let mut results = Vec::with_capacity(keys.len());
        let mut remote = Vec::new();
        let mut remote_pos = Vec::new();

        for (pos, key) in keys.iter().enumerate() {
            match self.writes.get(key) {
                Some(WriteOp::Put(bytes)) => results.push(Some(bytes.clone())),
                Some(WriteOp::Delete) => results.push(None),
                None => {
                    results.push(None);
                    remote.push(key.clone());
                    remote_pos.push(pos);
                }
            }
        }

        if remote.is_empty() {
            return Ok(results);
        }

        let values = self.store.multi_get(&remote)?;
        if values.len() != remote.len() {
            return Err(GraphError::Storage(format!(
                "store returned {} values for {} keys",
                values.len(),
                remote.len()
            )));
        }

        let snapshot = self.mode == ReadMode::Transactional;
        for ((key, pos), value) in remote.into_iter().zip(remote_pos).zip(values) {
            let version = value.as_ref().map_or(ABSENT_VERSION, |v| v.version);
            if track {
                if snapshot && version > self.read_ts {
                    self.state = TxState::Aborted;
                    return Err(GraphError::Conflict(format!(
                        "key {} at version {} is newer than snapshot {}",
                        key, version, self.read_ts
                    )));
                }
                self.reads.entry(key).or_insert(version);
            }
            results[pos] = value.map(|v| v.bytes);
        }

        Ok(results)
    }

    /// Expand `sources` by one hop over `relationship` in `direction`.
    ///
    /// All edge lists are read with a single store request. Neighbors keep
    /// their stored order; neighbors whose label is not in `labels` are
    /// skipped (an empty `labels` keeps everything). Sources that don't exist
    /// or reach nothing are simply absent from the result.
    pub fn traverse<F>(
        &mut self,
        sources: &F,
        relationship: &str,
        direction: Direction,
        edge_props: bool,
        labels: &[&str],
    ) -> Result<TraversalResult, GraphError>
    where
        F: Frontier + ?Sized,
    {
        if !relationship_is_valid(relationship) {
            return Err(GraphError::InvalidRequest(format!(
                "malformed relationship name '{}'",
                relationship.escape_debug()
            )));
        }
        if let Some(bad) = labels.iter().find(|l| !label_is_valid(l)) {
            return Err(GraphError::InvalidRequest(format!(
                "malformed label '{}'",
                bad.escape_debug()
            )));
        }

        let sources = sources.collect_unique();
        let keys = sources
            .iter()
            .map(|v| edge_list_key(&v.id, relationship, direction))
            .collect::<Result<Vec<_>, _>>()?;

        let track = self.mode == ReadMode::Transactional;
        let values = self.fetch(&keys, track)?;

        let mut result = if edge_props {
            TraversalResult::with_edge_properties()
        } else {
            TraversalResult::new()
        };

        for (source, value) in sources.iter().zip(values) {
            let Some(bytes) = value else {
                continue;
            };
            for entry in decode_edge_list(&bytes)?.entries {
                if entry.neighbor.has_label_in(labels) {
                    result.push(source, entry.neighbor, entry.properties);
                }
            }
        }

        Ok(result)
    }

    /// Load properties of `vertices` into `bag`.
    ///
    /// Vertices the bag already covers for `keys` are skipped; the rest are
    /// read with one store request. A vertex that doesn't exist is recorded
    /// with an empty map.
    pub fn get_properties<F>(
        &mut self,
        bag: &mut PropertyBag,
        vertices: &F,
        keys: &PropertyKeys,
    ) -> Result<(), GraphError>
    where
        F: Frontier + ?Sized,
    {
        let missing: Vec<VertexRef> = vertices
            .collect_unique()
            .into_iter()
            .filter(|v| !bag.covers(v, keys))
            .collect();

        let store_keys = missing
            .iter()
            .map(|v| vertex_key(&v.id))
            .collect::<Result<Vec<_>, _>>()?;

        let track = self.mode == ReadMode::Transactional;
        let values = self.fetch(&store_keys, track)?;

        for (vertex, value) in missing.into_iter().zip(values) {
            let properties = match value {
                Some(bytes) => decode_vertex(&bytes)?.properties,
                None => PropertyMap::new(),
            };
            bag.merge(vertex, properties, keys);
        }

        Ok(())
    }

    // =========================================================================
    // WRITE PATH
    // =========================================================================

    /// Write a vertex record, replacing any existing one.
    pub fn add_vertex(
        &mut self,
        vertex: &VertexRef,
        properties: PropertyMap,
    ) -> Result<(), GraphError> {
        self.ensure_active()?;
        Ingestor::check_vertex(vertex, &properties)?;

        let record = VertexRecord {
            label: vertex.label.clone(),
            properties,
        };
        self.writes
            .insert(vertex_key(&vertex.id)?, WriteOp::Put(encode_vertex(&record)?));
        Ok(())
    }

    /// Add one edge `out -[relationship]-> target`.
    pub fn add_edge(
        &mut self,
        out: &VertexRef,
        relationship: &str,
        target: &VertexRef,
        properties: PropertyMap,
    ) -> Result<(), GraphError> {
        self.add_edges(&[EdgeSpec {
            out: out.clone(),
            relationship: relationship.to_string(),
            target: target.clone(),
            properties,
        }])
    }

    /// Add many edges with one store read.
    ///
    /// Each edge is appended to the `Out` list of its source and the `In`
    /// list of its target. Adding an edge that already exists replaces its
    /// properties. Both endpoints must exist (in the store or in this
    /// transaction's writes).
    pub fn add_edges(&mut self, edges: &[EdgeSpec]) -> Result<(), GraphError> {
        self.ensure_active()?;
        if edges.is_empty() {
            return Ok(());
        }
        for edge in edges {
            Ingestor::validate_edge(edge)?;
        }

        // One key list: endpoint vertex records first, then edge lists.
        let mut keys: Vec<Key> = Vec::new();
        let mut index: HashMap<Key, usize> = HashMap::new();
        let mut slot = |key: Key, keys: &mut Vec<Key>| -> usize {
            *index.entry(key.clone()).or_insert_with(|| {
                keys.push(key);
                keys.len() - 1
            })
        };

        let mut endpoints = Vec::with_capacity(edges.len());
        for edge in edges {
            let out_vertex = slot(vertex_key(&edge.out.id)?, &mut keys);
            let target_vertex = slot(vertex_key(&edge.target.id)?, &mut keys);
            endpoints.push((out_vertex, target_vertex));
        }
        let mut lists_at = Vec::with_capacity(edges.len());
        for edge in edges {
            let out_list = slot(
                edge_list_key(&edge.out.id, &edge.relationship, Direction::Out)?,
                &mut keys,
            );
            let in_list = slot(
                edge_list_key(&edge.target.id, &edge.relationship, Direction::In)?,
                &mut keys,
            );
            lists_at.push((out_list, in_list));
        }

        let values = self.fetch(&keys, true)?;

        for (edge, &(out_vertex, target_vertex)) in edges.iter().zip(&endpoints) {
            if values[out_vertex].is_none() {
                return Err(GraphError::VertexNotFound(edge.out.id));
            }
            if values[target_vertex].is_none() {
                return Err(GraphError::VertexNotFound(edge.target.id));
            }
        }

        let mut lists: BTreeMap<usize, EdgeList> = BTreeMap::new();
        for (edge, &(out_list, in_list)) in edges.iter().zip(&lists_at) {
            for (pos, neighbor) in [(out_list, &edge.target), (in_list, &edge.out)] {
                if !lists.contains_key(&pos) {
                    let list = match &values[pos] {
                        Some(bytes) => decode_edge_list(bytes)?,
                        None => EdgeList::default(),
                    };
                    lists.insert(pos, list);
                }
                if let Some(list) = lists.get_mut(&pos) {
                    list.upsert(neighbor.clone(), edge.properties.clone());
                }
            }
        }

        for (pos, list) in lists {
            self.writes
                .insert(keys[pos].clone(), WriteOp::Put(encode_edge_list(&list)?));
        }
        Ok(())
    }

    /// Remove the edge `out -[relationship]-> target` from both of its
    /// lists. Returns whether the edge existed.
    ///
    /// A list left empty is deleted rather than stored empty.
    pub fn remove_edge(
        &mut self,
        out: &VertexRef,
        relationship: &str,
        target: &VertexRef,
    ) -> Result<bool, GraphError> {
        self.ensure_active()?;
        if !relationship_is_valid(relationship) {
            return Err(GraphError::InvalidRequest(format!(
                "malformed relationship name '{}'",
                relationship.escape_debug()
            )));
        }

        let keys = [
            edge_list_key(&out.id, relationship, Direction::Out)?,
            edge_list_key(&target.id, relationship, Direction::In)?,
        ];
        let values = self.fetch(&keys, true)?;

        let mut removed = false;
        for ((key, value), neighbor) in keys.into_iter().zip(values).zip([target, out]) {
            let Some(bytes) = value else {
                continue;
            };
            let mut list = decode_edge_list(&bytes)?;
            if !list.remove(neighbor) {
                continue;
            }
            removed = true;
            let op = if list.entries.is_empty() {
                WriteOp::Delete
            } else {
                WriteOp::Put(encode_edge_list(&list)?)
            };
            self.writes.insert(key, op);
        }
        Ok(removed)
    }

    // =========================================================================
    // COMPLETION
    // =========================================================================

    /// Validate the read set and apply the buffered writes.
    ///
    /// Returns the commit version, or `read_ts` when there was nothing to
    /// validate or write. On failure the transaction is aborted.
    pub fn commit(&mut self) -> Result<Version, GraphError> {
        self.ensure_active()?;

        let batch = CommitBatch {
            reads: std::mem::take(&mut self.reads),
            writes: std::mem::take(&mut self.writes),
        };

        if batch.is_empty() {
            self.state = TxState::Committed;
            return Ok(self.read_ts);
        }

        match self.store.commit(batch) {
            Ok(version) => {
                self.state = TxState::Committed;
                Ok(version)
            }
            Err(e) => {
                self.state = TxState::Aborted;
                Err(e)
            }
        }
    }

    /// Discard buffered writes and end the transaction.
    pub fn rollback(&mut self) {
        self.reads.clear();
        self.writes.clear();
        if self.state == TxState::Active {
            self.state = TxState::Aborted;
        }
    }
}
