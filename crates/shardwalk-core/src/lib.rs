//! # shardwalk-core
//!
//! A batched multi-hop graph traversal engine over a versioned key-value
//! store.
//!
//! The graph is laid out as two kinds of records:
//! - one vertex record per entity (label + properties)
//! - one edge list per `(vertex, relationship, direction)`
//!
//! A hop over an arbitrarily large frontier is a single `multi_get` against
//! the store. Multi-hop queries are composed by chaining [`TraversalResult`]s
//! and reshaping them in memory with the [`helpers`] set algebra.
//!
//! ## Transactions
//!
//! Every read and write happens inside a [`Transaction`]. The store may abort
//! a transaction under contention; [`Graph::with_retry`] re-runs the whole
//! body from the top until it commits or the attempt budget is spent.
//!
//! ```
//! use shardwalk_core::{Direction, EngineConfig, EntityId, Graph, MemoryStore, VertexRef};
//! use shardwalk_core::properties::PropertyMap;
//!
//! let graph = Graph::new(MemoryStore::new(4), EngineConfig::default());
//! let alice = VertexRef::new(EntityId::new(1, 1), "Person");
//! let bob = VertexRef::new(EntityId::new(1, 2), "Person");
//!
//! graph
//!     .with_retry(|tx| {
//!         tx.add_vertex(&alice, PropertyMap::new())?;
//!         tx.add_vertex(&bob, PropertyMap::new())?;
//!         tx.add_edge(&alice, "knows", &bob, PropertyMap::new())
//!     })
//!     .expect("load");
//!
//! let friends = graph
//!     .read_with_retry(|tx| tx.traverse(&alice, "knows", Direction::Out, false, &["Person"]))
//!     .expect("traverse");
//! assert!(friends.contains(&bob));
//! ```

// =============================================================================
// MODULES
// =============================================================================

pub mod config;
pub mod formats;
pub mod graph;
pub mod helpers;
pub mod ingestor;
pub mod primitives;
pub mod properties;
pub mod storage;
pub mod topk;
pub mod transaction;
pub mod traversal;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types
// =============================================================================

pub use types::{Direction, EntityId, GraphError, Label, PropertyValue, VertexRef};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use config::{EngineConfig, ReadMode};
pub use graph::Graph;
pub use helpers::{fuse, intersect, remove_edge_if, subtract};
pub use ingestor::{EdgeSpec, IngestReport, Ingestor, VertexSpec};
pub use properties::{PropertyBag, PropertyKeys, PropertyMap};
pub use storage::{InstrumentedStore, KvStore, MemoryStore, RedbStore, StoreStats};
pub use topk::TopK;
pub use transaction::{Transaction, TxState};
pub use traversal::{Frontier, TraversalResult, VertexSet};
