//! # Record Layout
//!
//! Two record kinds live in the store:
//!
//! | Key                                    | Value           |
//! |----------------------------------------|-----------------|
//! | `Vertex(id)`                           | [`VertexRecord`] |
//! | `Edges(id, relationship, direction)`   | [`EdgeList`]     |
//!
//! An edge list holds every neighbor reachable from one vertex over one
//! relationship in one direction, so a hop costs one key per source vertex.
//! Neighbors are stored as full [`VertexRef`]s: label filtering happens on
//! the edge list without touching the neighbor's own record.
//!
//! Values are a one-byte format version followed by a postcard payload.

use crate::GraphError;
use crate::primitives::{MAX_RECORD_SIZE, RECORD_FORMAT_VERSION};
use crate::properties::PropertyMap;
use crate::storage::Key;
use crate::types::{Direction, EntityId, Label, VertexRef};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

// =============================================================================
// KEYS
// =============================================================================

#[derive(Serialize)]
enum RecordKey<'a> {
    Vertex(EntityId),
    Edges {
        vertex: EntityId,
        relationship: &'a str,
        direction: Direction,
    },
}

fn encode_key(key: &RecordKey<'_>) -> Result<Key, GraphError> {
    postcard::to_stdvec(key)
        .map(Key)
        .map_err(|e| GraphError::Serialization(e.to_string()))
}

/// Key of a vertex record.
pub fn vertex_key(id: &EntityId) -> Result<Key, GraphError> {
    encode_key(&RecordKey::Vertex(*id))
}

/// Key of the edge list of `id` over `relationship` in `direction`.
pub fn edge_list_key(
    id: &EntityId,
    relationship: &str,
    direction: Direction,
) -> Result<Key, GraphError> {
    encode_key(&RecordKey::Edges {
        vertex: *id,
        relationship,
        direction,
    })
}

// =============================================================================
// VALUES
// =============================================================================

/// Stored form of a vertex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VertexRecord {
    pub label: Label,
    pub properties: PropertyMap,
}

/// One edge as seen from its source vertex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeEntry {
    pub neighbor: VertexRef,
    pub properties: PropertyMap,
}

/// All edges of one vertex over one relationship in one direction, in
/// insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeList {
    pub entries: Vec<EdgeEntry>,
}

impl EdgeList {
    /// Position of the entry pointing at `neighbor`.
    #[must_use]
    pub fn position_of(&self, neighbor: &VertexRef) -> Option<usize> {
        self.entries.iter().position(|e| &e.neighbor == neighbor)
    }

    /// Drop the entry pointing at `neighbor`. Returns whether one existed.
    pub fn remove(&mut self, neighbor: &VertexRef) -> bool {
        match self.position_of(neighbor) {
            Some(pos) => {
                self.entries.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Insert an edge, replacing the properties of an existing edge to the
    /// same neighbor.
    pub fn upsert(&mut self, neighbor: VertexRef, properties: PropertyMap) {
        match self.position_of(&neighbor) {
            Some(pos) => self.entries[pos].properties = properties,
            None => self.entries.push(EdgeEntry {
                neighbor,
                properties,
            }),
        }
    }
}

fn encode_value<T: Serialize>(value: &T) -> Result<Vec<u8>, GraphError> {
    let mut out = vec![RECORD_FORMAT_VERSION];
    let payload =
        postcard::to_stdvec(value).map_err(|e| GraphError::Serialization(e.to_string()))?;
    out.extend_from_slice(&payload);
    // Anything larger could never be read back.
    if out.len() > MAX_RECORD_SIZE {
        return Err(GraphError::InvalidRequest(format!(
            "record too large: {} bytes (max {})",
            out.len(),
            MAX_RECORD_SIZE
        )));
    }
    Ok(out)
}

fn decode_value<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, GraphError> {
    if bytes.len() > MAX_RECORD_SIZE {
        return Err(GraphError::Deserialization(format!(
            "record too large: {} bytes (max {})",
            bytes.len(),
            MAX_RECORD_SIZE
        )));
    }
    let Some((&version, payload)) = bytes.split_first() else {
        return Err(GraphError::Deserialization("empty record".to_string()));
    };
    if version != RECORD_FORMAT_VERSION {
        return Err(GraphError::Deserialization(format!(
            "unsupported record version: {} (expected {})",
            version, RECORD_FORMAT_VERSION
        )));
    }
    postcard::from_bytes(payload).map_err(|e| GraphError::Deserialization(e.to_string()))
}

/// Encode a vertex record.
pub fn encode_vertex(record: &VertexRecord) -> Result<Vec<u8>, GraphError> {
    encode_value(record)
}

/// Decode a vertex record.
pub fn decode_vertex(bytes: &[u8]) -> Result<VertexRecord, GraphError> {
    decode_value(bytes)
}

/// Encode an edge list.
pub fn encode_edge_list(list: &EdgeList) -> Result<Vec<u8>, GraphError> {
    encode_value(list)
}

/// Decode an edge list.
pub fn decode_edge_list(bytes: &[u8]) -> Result<EdgeList, GraphError> {
    decode_value(bytes)
}

// =============================================================================
// TESTS
// =============================================================================
