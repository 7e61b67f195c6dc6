//! # Engine Primitives
//!
//! Compiled-in constants of the engine. Runtime-tunable values live in
//! [`crate::config::EngineConfig`]; these are the defaults and hard limits.

/// Default maximum number of attempts a transaction gets before the retry
/// wrapper gives up.
pub const DEFAULT_MAX_TX_ATTEMPTS: u32 = 100;

/// Default number of vertices (and separately edges) committed per load
/// transaction.
pub const DEFAULT_LOAD_BATCH_SIZE: usize = 512;

/// Default number of lock-striped shards in the in-memory store.
pub const DEFAULT_SHARD_COUNT: usize = 16;

/// Maximum length of a relationship name.
///
/// Longer names are rejected as malformed requests.
pub const MAX_RELATIONSHIP_LENGTH: usize = 64;

/// Maximum length of a vertex label.
pub const MAX_LABEL_LENGTH: usize = 64;

/// Maximum length of a property name.
pub const MAX_PROPERTY_NAME_LENGTH: usize = 256;

/// Version reported for a key that has never been written.
///
/// Real versions start at 1, so a read of an absent key can be validated the
/// same way as a read of a present one.
pub const ABSENT_VERSION: u64 = 0;

/// Leading byte of every encoded vertex record and edge list.
///
/// Bumped whenever the record layout changes incompatibly.
pub const RECORD_FORMAT_VERSION: u8 = 1;

/// Maximum accepted size of a single encoded record.
///
/// Checked before decoding, so a corrupted length can't trigger a huge
/// allocation.
pub const MAX_RECORD_SIZE: usize = 64 * 1024 * 1024;

/// Check a relationship name for well-formedness.
pub fn relationship_is_valid(relationship: &str) -> bool {
    !relationship.is_empty()
        && relationship.len() <= MAX_RELATIONSHIP_LENGTH
        && !relationship.chars().any(char::is_control)
}

/// Check a label for well-formedness.
pub fn label_is_valid(label: &str) -> bool {
    !label.is_empty() && label.len() <= MAX_LABEL_LENGTH && !label.chars().any(char::is_control)
}
