//! In-memory, lock-striped store.
//!
//! Keys are spread over `N` shards by hash, each behind its own `RwLock`, so
//! readers of different shards never contend. Commits are serialized by a
//! single commit lock; validation and application happen under it, which
//! makes every commit atomic with respect to other commits.

use super::{CommitBatch, Key, KvStore, Version, VersionedValue, WriteOp, read_conflict};
use crate::GraphError;
use crate::primitives::{ABSENT_VERSION, DEFAULT_SHARD_COUNT};
use std::collections::BTreeMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};

type Shard = BTreeMap<Key, VersionedValue>;

/// Volatile sharded store.
#[derive(Debug)]
pub struct MemoryStore {
    shards: Vec<RwLock<Shard>>,
    clock: AtomicU64,
    commit_lock: Mutex<()>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_SHARD_COUNT)
    }
}

impl MemoryStore {
    /// Create an empty store with `shards` lock stripes (at least one).
    #[must_use]
    pub fn new(shards: usize) -> Self {
        let shards = shards.max(1);
        Self {
            shards: (0..shards).map(|_| RwLock::new(Shard::new())).collect(),
            clock: AtomicU64::new(ABSENT_VERSION),
            commit_lock: Mutex::new(()),
        }
    }

    /// Number of lock stripes.
    #[must_use]
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    fn shard_of(&self, key: &Key) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % self.shards.len() as u64) as usize
    }

    fn version_of(&self, key: &Key) -> Result<Version, GraphError> {
        let shard = self.shards[self.shard_of(key)]
            .read()
            .map_err(|_| poisoned())?;
        Ok(shard.get(key).map(|v| v.version).unwrap_or(ABSENT_VERSION))
    }
}

fn poisoned() -> GraphError {
    GraphError::Storage("memory store lock poisoned".to_string())
}

impl KvStore for MemoryStore {
    fn current_version(&self) -> Result<Version, GraphError> {
        Ok(self.clock.load(Ordering::Acquire))
    }

    fn multi_get(&self, keys: &[Key]) -> Result<Vec<Option<VersionedValue>>, GraphError> {
        let mut results = vec![None; keys.len()];

        // Group positions by shard so each stripe is locked once.
        let mut by_shard: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (pos, key) in keys.iter().enumerate() {
            by_shard.entry(self.shard_of(key)).or_default().push(pos);
        }

        for (shard_idx, positions) in by_shard {
            let shard = self.shards[shard_idx].read().map_err(|_| poisoned())?;
            for pos in positions {
                results[pos] = shard.get(&keys[pos]).cloned();
            }
        }

        Ok(results)
    }

    fn commit(&self, batch: CommitBatch) -> Result<Version, GraphError> {
        let _guard = self.commit_lock.lock().map_err(|_| poisoned())?;

        for (key, &observed) in &batch.reads {
            let current = self.version_of(key)?;
            if current != observed {
                return Err(read_conflict(key, observed, current));
            }
        }

        if batch.writes.is_empty() {
            return Ok(self.clock.load(Ordering::Acquire));
        }

        let version = self.clock.load(Ordering::Acquire).saturating_add(1);
        for (key, op) in batch.writes {
            let mut shard = self.shards[self.shard_of(&key)]
                .write()
                .map_err(|_| poisoned())?;
            match op {
                WriteOp::Put(bytes) => {
                    shard.insert(key, VersionedValue { version, bytes });
                }
                WriteOp::Delete => {
                    shard.remove(&key);
                }
            }
        }
        self.clock.store(version, Ordering::Release);

        Ok(version)
    }

    fn key_count(&self) -> Result<usize, GraphError> {
        let mut total = 0;
        for shard in &self.shards {
            total += shard.read().map_err(|_| poisoned())?.len();
        }
        Ok(total)
    }
}
