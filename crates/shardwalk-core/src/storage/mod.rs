//! # Key-Value Store Seam
//!
//! The engine talks to its backing store through [`KvStore`] only. The
//! contract is deliberately small:
//!
//! - `multi_get`: one round trip for any number of keys, each value carrying
//!   the version of the commit that wrote it
//! - `commit`: atomically validate a read set (`key -> version observed`) and
//!   apply a write set, or fail with [`GraphError::Conflict`]
//! - `current_version`: the store's commit clock, used as a snapshot
//!   timestamp
//!
//! Implementations must be safe to share between threads: one store serves
//! every in-flight transaction.
//!
//! ## Backends
//!
//! - [`MemoryStore`]: lock-striped shards, volatile
//! - [`RedbStore`]: redb-backed, persistent, ACID
//! - [`InstrumentedStore`]: wraps any store and counts round trips

mod instrumented;
mod memory;
mod redb_store;

pub use instrumented::{InstrumentedStore, StoreStats};
pub use memory::MemoryStore;
pub use redb_store::RedbStore;

use crate::GraphError;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Commit timestamp. Every successful commit gets the next value.
pub type Version = u64;

/// Encoded store key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Key(pub Vec<u8>);

impl Key {
    /// Raw key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// A stored value and the version of the commit that wrote it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedValue {
    /// Commit version.
    pub version: Version,
    /// Encoded record.
    pub bytes: Vec<u8>,
}

/// Buffered mutation of one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    /// Insert or overwrite.
    Put(Vec<u8>),
    /// Remove the key.
    Delete,
}

/// Everything a transaction hands to the store at commit time.
#[derive(Debug, Clone, Default)]
pub struct CommitBatch {
    /// Keys read and the version observed (`ABSENT_VERSION` when missing).
    pub reads: BTreeMap<Key, Version>,
    /// Keys to write.
    pub writes: BTreeMap<Key, WriteOp>,
}

impl CommitBatch {
    /// Nothing to validate and nothing to write.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reads.is_empty() && self.writes.is_empty()
    }
}

/// A versioned key-value store with optimistic commits.
pub trait KvStore: Send + Sync {
    /// The latest committed version.
    fn current_version(&self) -> Result<Version, GraphError>;

    /// Read many keys in one request. The result is parallel to `keys`.
    fn multi_get(&self, keys: &[Key]) -> Result<Vec<Option<VersionedValue>>, GraphError>;

    /// Validate `batch.reads` and apply `batch.writes` atomically.
    ///
    /// Returns the version assigned to the writes, or the current version if
    /// there were none. Returns `GraphError::Conflict` if any read key changed
    /// since it was observed.
    fn commit(&self, batch: CommitBatch) -> Result<Version, GraphError>;

    /// Number of stored keys.
    fn key_count(&self) -> Result<usize, GraphError>;
}

impl<S: KvStore + ?Sized> KvStore for Box<S> {
    fn current_version(&self) -> Result<Version, GraphError> {
        (**self).current_version()
    }

    fn multi_get(&self, keys: &[Key]) -> Result<Vec<Option<VersionedValue>>, GraphError> {
        (**self).multi_get(keys)
    }

    fn commit(&self, batch: CommitBatch) -> Result<Version, GraphError> {
        (**self).commit(batch)
    }

    fn key_count(&self) -> Result<usize, GraphError> {
        (**self).key_count()
    }
}

impl<S: KvStore + ?Sized> KvStore for Arc<S> {
    fn current_version(&self) -> Result<Version, GraphError> {
        (**self).current_version()
    }

    fn multi_get(&self, keys: &[Key]) -> Result<Vec<Option<VersionedValue>>, GraphError> {
        (**self).multi_get(keys)
    }

    fn commit(&self, batch: CommitBatch) -> Result<Version, GraphError> {
        (**self).commit(batch)
    }

    fn key_count(&self) -> Result<usize, GraphError> {
        (**self).key_count()
    }
}

/// Build the conflict error for a read that no longer validates.
pub(crate) fn read_conflict(key: &Key, observed: Version, current: Version) -> GraphError {
    GraphError::Conflict(format!(
        "key {} moved from version {} to {}",
        key, observed, current
    ))
}
