//! # redb-backed Store
//!
//! A persistent [`KvStore`] on top of the redb embedded database.
//!
//! redb provides crash safety and serializes writers; this module adds the
//! optimistic layer on top: every record carries the version of the commit
//! that wrote it, and a commit re-checks the versions a transaction observed
//! inside the same redb write transaction that applies its writes.
//!
//! ## Record layout
//!
//! `records` table: `key bytes -> [version: u64 big-endian][payload]`
//! `metadata` table: `"commit_version" -> u64`

use super::{CommitBatch, Key, KvStore, Version, VersionedValue, WriteOp, read_conflict};
use crate::GraphError;
use crate::primitives::ABSENT_VERSION;
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

/// Table for records: key bytes -> versioned payload
const RECORDS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("records");

/// Table for metadata: key string -> value u64
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

const COMMIT_VERSION: &str = "commit_version";

const VERSION_PREFIX: usize = std::mem::size_of::<u64>();

fn storage_err(e: impl std::fmt::Display) -> GraphError {
    GraphError::Storage(e.to_string())
}

fn encode_record(version: Version, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(VERSION_PREFIX + payload.len());
    out.extend_from_slice(&version.to_be_bytes());
    out.extend_from_slice(payload);
    out
}

fn decode_record(raw: &[u8]) -> Result<VersionedValue, GraphError> {
    if raw.len() < VERSION_PREFIX {
        return Err(GraphError::Deserialization(format!(
            "record of {} bytes is shorter than its version prefix",
            raw.len()
        )));
    }
    let (prefix, payload) = raw.split_at(VERSION_PREFIX);
    let mut version = [0u8; VERSION_PREFIX];
    version.copy_from_slice(prefix);
    Ok(VersionedValue {
        version: u64::from_be_bytes(version),
        bytes: payload.to_vec(),
    })
}

/// A disk-backed store using redb.
pub struct RedbStore {
    /// The redb database handle.
    db: Database,
    /// Cached copy of the committed version; redb is the source of truth.
    clock: AtomicU64,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore")
            .field("commit_version", &self.clock.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, GraphError> {
        let db = Database::create(path.as_ref()).map_err(storage_err)?;

        // Initialize tables if they don't exist
        {
            let write_txn = db.begin_write().map_err(storage_err)?;
            let _ = write_txn.open_table(RECORDS).map_err(storage_err)?;
            let _ = write_txn.open_table(METADATA).map_err(storage_err)?;
            write_txn.commit().map_err(storage_err)?;
        }

        let version = {
            let read_txn = db.begin_read().map_err(storage_err)?;
            let table = read_txn.open_table(METADATA).map_err(storage_err)?;
            table
                .get(COMMIT_VERSION)
                .map_err(storage_err)?
                .map(|v| v.value())
                .unwrap_or(ABSENT_VERSION)
        };

        Ok(Self {
            db,
            clock: AtomicU64::new(version),
        })
    }

    /// Compact the database file.
    pub fn compact(&mut self) -> Result<(), GraphError> {
        self.db.compact().map_err(storage_err)?;
        Ok(())
    }
}

impl KvStore for RedbStore {
    fn current_version(&self) -> Result<Version, GraphError> {
        Ok(self.clock.load(Ordering::Acquire))
    }

    fn multi_get(&self, keys: &[Key]) -> Result<Vec<Option<VersionedValue>>, GraphError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(RECORDS).map_err(storage_err)?;

        let mut results = Vec::with_capacity(keys.len());
        for key in keys {
            let value = match table.get(key.as_bytes()).map_err(storage_err)? {
                Some(raw) => Some(decode_record(raw.value())?),
                None => None,
            };
            results.push(value);
        }
        Ok(results)
    }

    fn commit(&self, batch: CommitBatch) -> Result<Version, GraphError> {
        let write_txn = self.db.begin_write().map_err(storage_err)?;

        // Validate the read set inside the writer, so nothing can commit in
        // between validation and application.
        let conflict = {
            let records = write_txn.open_table(RECORDS).map_err(storage_err)?;
            let mut conflict = None;
            for (key, &observed) in &batch.reads {
                let current = match records.get(key.as_bytes()).map_err(storage_err)? {
                    Some(raw) => decode_record(raw.value())?.version,
                    None => ABSENT_VERSION,
                };
                if current != observed {
                    conflict = Some(read_conflict(key, observed, current));
                    break;
                }
            }
            conflict
        };

        if let Some(err) = conflict {
            write_txn.abort().map_err(storage_err)?;
            return Err(err);
        }

        if batch.writes.is_empty() {
            write_txn.abort().map_err(storage_err)?;
            return Ok(self.clock.load(Ordering::Acquire));
        }

        let version = {
            let mut meta = write_txn.open_table(METADATA).map_err(storage_err)?;
            let version = meta
                .get(COMMIT_VERSION)
                .map_err(storage_err)?
                .map(|v| v.value())
                .unwrap_or(ABSENT_VERSION)
                .saturating_add(1);
            meta.insert(COMMIT_VERSION, version).map_err(storage_err)?;

            let mut records = write_txn.open_table(RECORDS).map_err(storage_err)?;
            for (key, op) in &batch.writes {
                match op {
                    WriteOp::Put(payload) => {
                        let record = encode_record(version, payload);
                        records
                            .insert(key.as_bytes(), record.as_slice())
                            .map_err(storage_err)?;
                    }
                    WriteOp::Delete => {
                        records.remove(key.as_bytes()).map_err(storage_err)?;
                    }
                }
            }
            version
        };

        write_txn.commit().map_err(storage_err)?;

        // Update the cached clock only after a successful commit.
        self.clock.store(version, Ordering::Release);
        Ok(version)
    }

    fn key_count(&self) -> Result<usize, GraphError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(RECORDS).map_err(storage_err)?;
        let count = table.len().map_err(storage_err)?;
        Ok(count as usize)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn put(key: &[u8], value: &[u8]) -> CommitBatch {
        let mut batch = CommitBatch::default();
        batch
            .writes
            .insert(Key(key.to_vec()), WriteOp::Put(value.to_vec()));
        batch
    }

    #[test]
    fn basic_put_and_get() {
        let temp = tempdir().expect("temp dir");
        let store = RedbStore::open(temp.path().join("test.redb")).expect("open db");

        let version = store.commit(put(b"k", b"payload")).expect("commit");
        assert_eq!(version, 1);

        let got = store.multi_get(&[Key(b"k".to_vec())]).expect("get");
        assert_eq!(
            got[0],
            Some(VersionedValue {
                version: 1,
                bytes: b"payload".to_vec()
            })
        );
    }

    #[test]
    fn missing_keys_are_none() {
        let temp = tempdir().expect("temp dir");
        let store = RedbStore::open(temp.path().join("test.redb")).expect("open db");

        let got = store
            .multi_get(&[Key(b"x".to_vec()), Key(b"y".to_vec())])
            .expect("get");
        assert_eq!(got, vec![None, None]);
    }

    #[test]
    fn stale_read_rejected_and_nothing_written() {
        let temp = tempdir().expect("temp dir");
        let store = RedbStore::open(temp.path().join("test.redb")).expect("open db");
        store.commit(put(b"a", b"1")).expect("commit");

        let mut stale = put(b"b", b"2");
        stale.reads.insert(Key(b"a".to_vec()), ABSENT_VERSION);
        assert!(matches!(store.commit(stale), Err(GraphError::Conflict(_))));

        assert_eq!(store.key_count().expect("count"), 1);
        assert_eq!(store.current_version().expect("version"), 1);
    }

    #[test]
    fn version_persists_after_reopen() {
        let temp = tempdir().expect("temp dir");
        let path = temp.path().join("test.redb");

        {
            let store = RedbStore::open(&path).expect("open db");
            store.commit(put(b"a", b"1")).expect("commit");
            store.commit(put(b"b", b"2")).expect("commit");
        }

        {
            let store = RedbStore::open(&path).expect("reopen db");
            assert_eq!(store.current_version().expect("version"), 2);
            assert_eq!(store.key_count().expect("count"), 2);
            let next = store.commit(put(b"c", b"3")).expect("commit");
            assert_eq!(next, 3);
        }
    }

    #[test]
    fn delete_and_compact() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("test.redb")).expect("open db");
        store.commit(put(b"a", b"1")).expect("commit");

        let mut del = CommitBatch::default();
        del.writes.insert(Key(b"a".to_vec()), WriteOp::Delete);
        store.commit(del).expect("commit");
        store.compact().expect("compact");

        assert_eq!(store.key_count().expect("count"), 0);
    }

    #[test]
    fn truncated_record_is_a_decode_error() {
        assert!(matches!(
            decode_record(&[0, 1, 2]),
            Err(GraphError::Deserialization(_))
        ));
    }
}
