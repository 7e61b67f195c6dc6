//! # Ingestor Module
//!
//! Validation and bulk loading of vertices and edges.
//!
//! - Validate records before any store mutation
//! - Reject malformed input
//! - Load in fixed-size batches, one retried transaction per batch
//! - All vertices before any edge, so edge endpoints always resolve

use crate::GraphError;
use crate::graph::Graph;
use crate::primitives::{MAX_PROPERTY_NAME_LENGTH, label_is_valid, relationship_is_valid};
use crate::properties::PropertyMap;
use crate::storage::KvStore;
use crate::types::VertexRef;
use serde::Serialize;
use tracing::{debug, info};

/// A vertex to load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexSpec {
    pub vertex: VertexRef,
    pub properties: PropertyMap,
}

/// An edge to load: `out -[relationship]-> target`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeSpec {
    pub out: VertexRef,
    pub relationship: String,
    pub target: VertexRef,
    pub properties: PropertyMap,
}

/// What a load did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Vertices written.
    pub vertices: usize,
    /// Edges written.
    pub edges: usize,
    /// Transactions committed.
    pub batches: usize,
}

/// The Ingestor validates records and loads them into a graph.
pub struct Ingestor;

impl Ingestor {
    fn check_properties(properties: &PropertyMap) -> Result<(), GraphError> {
        for name in properties.keys() {
            if name.is_empty() || name.len() > MAX_PROPERTY_NAME_LENGTH {
                return Err(GraphError::InvalidRequest(format!(
                    "property name of length {} is out of range",
                    name.len()
                )));
            }
        }
        Ok(())
    }

    /// Validate a vertex and its properties.
    ///
    /// The label must be well-formed and property names non-empty and within
    /// `MAX_PROPERTY_NAME_LENGTH`.
    pub fn check_vertex(vertex: &VertexRef, properties: &PropertyMap) -> Result<(), GraphError> {
        if !label_is_valid(vertex.label.as_str()) {
            return Err(GraphError::InvalidRequest(format!(
                "malformed label '{}' on vertex {}",
                vertex.label.as_str().escape_debug(),
                vertex.id
            )));
        }
        Self::check_properties(properties)
    }

    /// Validate a vertex record.
    pub fn validate_vertex(spec: &VertexSpec) -> Result<(), GraphError> {
        Self::check_vertex(&spec.vertex, &spec.properties)
    }

    /// Validate an edge record.
    ///
    /// Endpoint labels and the relationship name must be well-formed.
    /// Endpoint existence is checked when the edge is written.
    pub fn validate_edge(spec: &EdgeSpec) -> Result<(), GraphError> {
        if !relationship_is_valid(&spec.relationship) {
            return Err(GraphError::InvalidRequest(format!(
                "malformed relationship name '{}'",
                spec.relationship.escape_debug()
            )));
        }
        for endpoint in [&spec.out, &spec.target] {
            if !label_is_valid(endpoint.label.as_str()) {
                return Err(GraphError::InvalidRequest(format!(
                    "malformed label on edge endpoint {}",
                    endpoint.id
                )));
            }
        }
        Self::check_properties(&spec.properties)
    }

    /// Load vertices, then edges.
    ///
    /// Everything is validated up front; nothing is written if any record is
    /// malformed. Records are committed in chunks of
    /// `EngineConfig::load_batch_size`, each chunk in its own retried
    /// transaction. A failure part-way leaves earlier chunks committed.
    pub fn load<S: KvStore>(
        graph: &Graph<S>,
        vertices: &[VertexSpec],
        edges: &[EdgeSpec],
    ) -> Result<IngestReport, GraphError> {
        for spec in vertices {
            Self::validate_vertex(spec)?;
        }
        for spec in edges {
            Self::validate_edge(spec)?;
        }

        let batch_size = graph.config().load_batch_size.max(1);
        let mut report = IngestReport::default();

        for chunk in vertices.chunks(batch_size) {
            graph.with_retry(|tx| {
                for spec in chunk {
                    tx.add_vertex(&spec.vertex, spec.properties.clone())?;
                }
                Ok(())
            })?;
            report.vertices += chunk.len();
            report.batches += 1;
            debug!(loaded = report.vertices, "vertex batch committed");
        }

        for chunk in edges.chunks(batch_size) {
            graph.with_retry(|tx| tx.add_edges(chunk))?;
            report.edges += chunk.len();
            report.batches += 1;
            debug!(loaded = report.edges, "edge batch committed");
        }

        info!(
            vertices = report.vertices,
            edges = report.edges,
            batches = report.batches,
            "load complete"
        );
        Ok(report)
    }
}

// =============================================================================
// TESTS
// =============================================================================
