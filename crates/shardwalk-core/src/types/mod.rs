//! # Core Type Definitions
//!
//! This module contains the identity model and error type of the engine:
//! - Entity identifiers (`EntityId`) and labels (`Label`)
//! - Vertex handles (`VertexRef`) and traversal `Direction`
//! - Stored property values (`PropertyValue`)
//! - Error types (`GraphError`)
//!
//! ## Identity
//!
//! A vertex is identified by a 128-bit `EntityId`: a 64-bit id space (the
//! type tag, one per entity kind) and a 64-bit id local to that space.
//! `VertexRef` equality, ordering and hashing look at the `EntityId` only;
//! the label travels along for filtering and display.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use thiserror::Error;

// =============================================================================
// ENTITY IDENTIFIER
// =============================================================================

/// 128-bit identifier of a stored entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId {
    /// Type tag (upper 64 bits).
    pub id_space: u64,
    /// Id local to the id space (lower 64 bits).
    pub local: u64,
}

impl EntityId {
    /// Create an identifier from its two halves.
    #[must_use]
    pub const fn new(id_space: u64, local: u64) -> Self {
        Self { id_space, local }
    }

    /// The identifier as a single 128-bit integer.
    #[must_use]
    pub const fn as_u128(self) -> u128 {
        ((self.id_space as u128) << 64) | self.local as u128
    }

    /// Split a 128-bit integer into id space and local id.
    #[must_use]
    pub const fn from_u128(raw: u128) -> Self {
        Self {
            id_space: (raw >> 64) as u64,
            local: raw as u64,
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.id_space, self.local)
    }
}

// =============================================================================
// LABEL
// =============================================================================

/// Vertex label ("Person", "Post", ...).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Label(pub String);

impl Label {
    /// Create a new label.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the label as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// VERTEX REF
// =============================================================================

/// Immutable handle to a vertex.
///
/// Never persisted as an object and never owns anything: callers build one
/// whenever they need to name a vertex. Two refs with the same `EntityId`
/// are the same vertex regardless of label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VertexRef {
    /// Identity.
    pub id: EntityId,
    /// Informational label.
    pub label: Label,
}

impl VertexRef {
    /// Create a vertex handle.
    #[must_use]
    pub fn new(id: EntityId, label: impl Into<String>) -> Self {
        Self {
            id,
            label: Label::new(label),
        }
    }

    /// The local (lower 64-bit) id, which is what LDBC parameters refer to.
    #[must_use]
    pub const fn local_id(&self) -> u64 {
        self.id.local
    }

    /// Check the label against a filter. An empty filter accepts everything.
    #[must_use]
    pub fn has_label_in(&self, labels: &[&str]) -> bool {
        labels.is_empty() || labels.contains(&self.label.as_str())
    }
}

impl PartialEq for VertexRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for VertexRef {}

impl Hash for VertexRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for VertexRef {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for VertexRef {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl fmt::Display for VertexRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.label, self.id)
    }
}

// =============================================================================
// DIRECTION
// =============================================================================

/// Direction of an edge relative to the vertex it is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Edges leaving the vertex.
    Out,
    /// Edges entering the vertex.
    In,
}

impl Direction {
    /// The opposite direction.
    #[must_use]
    pub const fn reverse(self) -> Self {
        match self {
            Self::Out => Self::In,
            Self::In => Self::Out,
        }
    }
}

impl std::str::FromStr for Direction {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "out" => Ok(Self::Out),
            "in" => Ok(Self::In),
            other => Err(GraphError::InvalidRequest(format!(
                "unknown direction '{}' (expected 'out' or 'in')",
                other
            ))),
        }
    }
}

// =============================================================================
// PROPERTY VALUE
// =============================================================================

/// A stored vertex or edge property.
///
/// Dates are carried as epoch milliseconds in `Int`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PropertyValue {
    /// UTF-8 text.
    String(String),
    /// Signed integer (counts, years, timestamps).
    Int(i64),
    /// Boolean flag.
    Bool(bool),
    /// List of strings (emails, languages).
    StringList(Vec<String>),
}

impl PropertyValue {
    /// Borrow as a string, if this is a `String`.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Copy out as an integer, if this is an `Int`.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Copy out as a bool, if this is a `Bool`.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Borrow as a string list, if this is a `StringList`.
    #[must_use]
    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::StringList(l) => Some(l),
            _ => None,
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for PropertyValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<Vec<String>> for PropertyValue {
    fn from(l: Vec<String>) -> Self {
        Self::StringList(l)
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the engine.
///
/// - `Conflict` and `TransactionAborted` are transient: the retry wrapper
///   absorbs them.
/// - Everything else is fatal for the query and propagates verbatim.
/// - A missing vertex on the read path is never an error.
#[derive(Debug, Error)]
pub enum GraphError {
    /// The store aborted the transaction (write-write or read-write conflict).
    #[error("Transaction conflict: {0}")]
    Conflict(String),

    /// The transaction was already aborted by an earlier conflict.
    #[error("Transaction already aborted")]
    TransactionAborted,

    /// The retry budget was spent without a successful commit.
    #[error("Transaction failed after {attempts} attempts (last error: {last})")]
    RetriesExhausted {
        /// Number of attempts made.
        attempts: u32,
        /// Display form of the last retryable error.
        last: String,
    },

    /// The store could not be reached.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The store reported an internal failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Malformed request (bad relationship name, bad label, bad direction).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A mutation referenced a vertex that does not exist.
    #[error("Vertex not found: {0}")]
    VertexNotFound(EntityId),

    /// A serialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A deserialization error occurred.
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Invalid engine or application configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An I/O error occurred outside the store (fixtures, config files).
    #[error("I/O error: {0}")]
    Io(String),
}

impl GraphError {
    /// Whether the retry wrapper should start a fresh attempt.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_) | Self::TransactionAborted)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeSet, HashSet};

    #[test]
    fn entity_id_u128_roundtrip_layout() {
        let id = EntityId::new(3, 42);
        assert_eq!(id.as_u128(), (3u128 << 64) | 42);
        assert_eq!(EntityId::from_u128(id.as_u128()), id);
    }

    #[test]
    fn vertex_identity_ignores_label() {
        let a = VertexRef::new(EntityId::new(1, 7), "Person");
        let b = VertexRef::new(EntityId::new(1, 7), "Message");
        assert_eq!(a, b);

        let mut hashed = HashSet::new();
        hashed.insert(a.clone());
        assert!(hashed.contains(&b));

        let mut ordered = BTreeSet::new();
        ordered.insert(a);
        assert!(!ordered.insert(b));
    }

    #[test]
    fn vertex_ordering_follows_id_space_then_local() {
        let p1 = VertexRef::new(EntityId::new(1, 9), "Person");
        let t0 = VertexRef::new(EntityId::new(2, 0), "Tag");
        assert!(p1 < t0);
    }

    #[test]
    fn empty_label_filter_accepts_everything() {
        let v = VertexRef::new(EntityId::new(1, 1), "Post");
        assert!(v.has_label_in(&[]));
        assert!(v.has_label_in(&["Post", "Comment"]));
        assert!(!v.has_label_in(&["Person"]));
    }

    #[test]
    fn direction_parse_and_reverse() {
        assert_eq!("OUT".parse::<Direction>().ok(), Some(Direction::Out));
        assert_eq!(Direction::In.reverse(), Direction::Out);
        assert!("sideways".parse::<Direction>().is_err());
    }

    #[test]
    fn retryable_classification() {
        assert!(GraphError::Conflict("k".into()).is_retryable());
        assert!(GraphError::TransactionAborted.is_retryable());
        assert!(!GraphError::Transport("down".into()).is_retryable());
        assert!(
            !GraphError::RetriesExhausted {
                attempts: 100,
                last: String::new()
            }
            .is_retryable()
        );
    }
}
