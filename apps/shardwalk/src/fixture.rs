//! # JSON Fixtures
//!
//! Graph snapshots in a small JSON shape, used by `shardwalk load` and the
//! tests:
//!
//! ```json
//! {
//!   "vertices": [
//!     { "entity": "Person", "id": 1, "properties": { "firstName": "Ada" } }
//!   ],
//!   "edges": [
//!     { "out": "Person:1", "relationship": "knows", "target": "Person:2",
//!       "properties": { "creationDate": 1262304000000 } }
//!   ]
//! }
//! ```
//!
//! Property values map to [`PropertyValue`]: strings, integers, booleans and
//! arrays of strings. Anything else is rejected.

use crate::schema::{Entity, parse_vertex};
use serde::Deserialize;
use shardwalk_core::{EdgeSpec, GraphError, PropertyMap, PropertyValue, VertexSpec};

/// Maximum number of records (vertices + edges) in one fixture.
pub const MAX_FIXTURE_RECORDS: usize = 10_000_000;

#[derive(Debug, Deserialize)]
struct RawFixture {
    #[serde(default)]
    vertices: Vec<RawVertex>,
    #[serde(default)]
    edges: Vec<RawEdge>,
}

#[derive(Debug, Deserialize)]
struct RawVertex {
    entity: String,
    id: u64,
    #[serde(default)]
    properties: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawEdge {
    out: String,
    relationship: String,
    target: String,
    #[serde(default)]
    properties: serde_json::Map<String, serde_json::Value>,
}

/// A parsed fixture, ready for [`shardwalk_core::Ingestor::load`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fixture {
    pub vertices: Vec<VertexSpec>,
    pub edges: Vec<EdgeSpec>,
}

impl Fixture {
    /// Parse fixture JSON.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, GraphError> {
        let raw: RawFixture = serde_json::from_slice(bytes)
            .map_err(|e| GraphError::Deserialization(format!("fixture: {}", e)))?;

        let total = raw.vertices.len() + raw.edges.len();
        if total > MAX_FIXTURE_RECORDS {
            return Err(GraphError::InvalidRequest(format!(
                "fixture has {} records, maximum is {}",
                total, MAX_FIXTURE_RECORDS
            )));
        }

        let vertices = raw
            .vertices
            .into_iter()
            .map(|v| {
                let entity: Entity = v.entity.parse()?;
                Ok(VertexSpec {
                    vertex: entity.vertex(v.id),
                    properties: convert_properties(v.properties)?,
                })
            })
            .collect::<Result<Vec<_>, GraphError>>()?;

        let edges = raw
            .edges
            .into_iter()
            .map(|e| {
                Ok(EdgeSpec {
                    out: parse_vertex(&e.out)?,
                    relationship: e.relationship,
                    target: parse_vertex(&e.target)?,
                    properties: convert_properties(e.properties)?,
                })
            })
            .collect::<Result<Vec<_>, GraphError>>()?;

        Ok(Self { vertices, edges })
    }

    /// Total number of records.
    pub fn len(&self) -> usize {
        self.vertices.len() + self.edges.len()
    }

    /// Whether the fixture holds no records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn convert_properties(
    raw: serde_json::Map<String, serde_json::Value>,
) -> Result<PropertyMap, GraphError> {
    raw.into_iter()
        .map(|(name, value)| {
            let converted = convert_value(&value).ok_or_else(|| {
                GraphError::InvalidRequest(format!(
                    "property '{}' has unsupported value {}",
                    name, value
                ))
            })?;
            Ok((name, converted))
        })
        .collect()
}

fn convert_value(value: &serde_json::Value) -> Option<PropertyValue> {
    use serde_json::Value;

    match value {
        Value::String(s) => Some(PropertyValue::String(s.clone())),
        Value::Number(n) => n.as_i64().map(PropertyValue::Int),
        Value::Bool(b) => Some(PropertyValue::Bool(*b)),
        Value::Array(items) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string))
            .collect::<Option<Vec<_>>>()
            .map(PropertyValue::StringList),
        Value::Null | Value::Object(_) => None,
    }
}

/// Render a property map as JSON for command output.
pub fn properties_to_json(properties: &PropertyMap) -> serde_json::Value {
    let map = properties
        .iter()
        .map(|(name, value)| {
            let json = match value {
                PropertyValue::String(s) => serde_json::Value::from(s.as_str()),
                PropertyValue::Int(i) => serde_json::Value::from(*i),
                PropertyValue::Bool(b) => serde_json::Value::from(*b),
                PropertyValue::StringList(l) => serde_json::Value::from(l.clone()),
            };
            (name.clone(), json)
        })
        .collect();
    serde_json::Value::Object(map)
}

// =============================================================================
// TESTS
// =============================================================================
