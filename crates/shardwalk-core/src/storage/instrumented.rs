//! Round-trip accounting.
//!
//! Wraps any [`KvStore`] and counts requests. Used by the benchmark command
//! and by tests that check one hop costs one `multi_get` no matter how large
//! the frontier is.

use super::{CommitBatch, Key, KvStore, Version, VersionedValue};
use crate::GraphError;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    /// `multi_get` requests issued.
    pub multi_get_calls: u64,
    /// Keys requested across all `multi_get` calls.
    pub keys_requested: u64,
    /// `commit` requests issued, including rejected ones.
    pub commits: u64,
    /// Commits rejected with a conflict.
    pub conflicts: u64,
}

/// A store that counts what passes through it.
#[derive(Debug, Default)]
pub struct InstrumentedStore<S> {
    inner: S,
    multi_get_calls: AtomicU64,
    keys_requested: AtomicU64,
    commits: AtomicU64,
    conflicts: AtomicU64,
}

impl<S: KvStore> InstrumentedStore<S> {
    /// Wrap a store with zeroed counters.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            multi_get_calls: AtomicU64::new(0),
            keys_requested: AtomicU64::new(0),
            commits: AtomicU64::new(0),
            conflicts: AtomicU64::new(0),
        }
    }

    /// The wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Current counter values.
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            multi_get_calls: self.multi_get_calls.load(Ordering::Relaxed),
            keys_requested: self.keys_requested.load(Ordering::Relaxed),
            commits: self.commits.load(Ordering::Relaxed),
            conflicts: self.conflicts.load(Ordering::Relaxed),
        }
    }

    /// Zero every counter.
    pub fn reset(&self) {
        self.multi_get_calls.store(0, Ordering::Relaxed);
        self.keys_requested.store(0, Ordering::Relaxed);
        self.commits.store(0, Ordering::Relaxed);
        self.conflicts.store(0, Ordering::Relaxed);
    }
}

impl<S: KvStore> KvStore for InstrumentedStore<S> {
    fn current_version(&self) -> Result<Version, GraphError> {
        self.inner.current_version()
    }

    fn multi_get(&self, keys: &[Key]) -> Result<Vec<Option<VersionedValue>>, GraphError> {
        self.multi_get_calls.fetch_add(1, Ordering::Relaxed);
        self.keys_requested
            .fetch_add(keys.len() as u64, Ordering::Relaxed);
        self.inner.multi_get(keys)
    }

    fn commit(&self, batch: CommitBatch) -> Result<Version, GraphError> {
        self.commits.fetch_add(1, Ordering::Relaxed);
        let result = self.inner.commit(batch);
        if matches!(result, Err(GraphError::Conflict(_))) {
            self.conflicts.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    fn key_count(&self) -> Result<usize, GraphError> {
        self.inner.key_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;
    use crate::storage::WriteOp;

    #[test]
    fn counts_requests_and_keys() {
        let store = InstrumentedStore::new(MemoryStore::new(2));
        store
            .multi_get(&[Key(vec![1]), Key(vec![2]), Key(vec![3])])
            .expect("get");
        store.multi_get(&[]).expect("get");

        let stats = store.stats();
        assert_eq!(stats.multi_get_calls, 2);
        assert_eq!(stats.keys_requested, 3);
    }

    #[test]
    fn counts_conflicts() {
        let store = InstrumentedStore::new(MemoryStore::new(2));
        let mut write = CommitBatch::default();
        write.writes.insert(Key(vec![1]), WriteOp::Put(vec![0]));
        store.commit(write).expect("commit");

        let mut stale = CommitBatch::default();
        stale.reads.insert(Key(vec![1]), 0);
        assert!(store.commit(stale).is_err());

        let stats = store.stats();
        assert_eq!(stats.commits, 2);
        assert_eq!(stats.conflicts, 1);

        store.reset();
        assert_eq!(store.stats(), StoreStats::default());
        assert_eq!(store.inner().key_count().expect("count"), 1);
    }
}
