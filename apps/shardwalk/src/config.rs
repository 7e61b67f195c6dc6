//! # Application Configuration
//!
//! Settings come from an optional TOML file, then command-line flags win:
//!
//! ```toml
//! [engine]
//! max_tx_attempts = 100
//! transactional_reads = false
//! load_batch_size = 512
//!
//! [store]
//! backend = "redb"        # or "memory"
//! path = "shardwalk.redb"
//! shards = 16
//! ```
//!
//! Without `--config`, `shardwalk.toml` in the working directory is used
//! when present.

use serde::{Deserialize, Serialize};
use shardwalk_core::primitives::DEFAULT_SHARD_COUNT;
use shardwalk_core::{
    EngineConfig, Graph, GraphError, InstrumentedStore, KvStore, MemoryStore, RedbStore,
};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "shardwalk.toml";

/// Default redb file.
pub const DEFAULT_DATABASE: &str = "shardwalk.redb";

/// Maximum config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

/// Store type behind every command.
pub type AppStore = InstrumentedStore<Box<dyn KvStore>>;

/// Graph type behind every command.
pub type AppGraph = Graph<AppStore>;

// =============================================================================
// BACKEND
// =============================================================================

/// Storage backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Persistent redb file.
    #[default]
    Redb,
    /// Volatile lock-striped shards; lives as long as the process.
    Memory,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Redb => f.write_str("redb"),
            Self::Memory => f.write_str("memory"),
        }
    }
}

impl FromStr for Backend {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "redb" => Ok(Self::Redb),
            "memory" => Ok(Self::Memory),
            other => Err(GraphError::Configuration(format!(
                "unknown backend '{}' (expected 'redb' or 'memory')",
                other
            ))),
        }
    }
}

// =============================================================================
// CONFIG
// =============================================================================

/// `[store]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: Backend,
    /// redb file; ignored by the memory backend.
    pub path: PathBuf,
    /// Lock stripes of the memory backend.
    pub shards: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            path: PathBuf::from(DEFAULT_DATABASE),
            shards: DEFAULT_SHARD_COUNT,
        }
    }
}

/// Whole application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub store: StoreConfig,
}

impl AppConfig {
    /// Parse TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, GraphError> {
        let config: Self = toml::from_str(text)
            .map_err(|e| GraphError::Configuration(format!("config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load settings.
    ///
    /// An explicit `path` must exist. Without one, [`DEFAULT_CONFIG_FILE`]
    /// is read if present and defaults are used otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, GraphError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !fallback.is_file() {
                    return Ok(Self::default());
                }
                fallback
            }
        };

        let metadata = std::fs::metadata(&path).map_err(|e| {
            GraphError::Io(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(GraphError::Configuration(format!(
                "config file of {} bytes exceeds maximum {} bytes",
                metadata.len(),
                MAX_CONFIG_FILE_SIZE
            )));
        }

        let text = std::fs::read_to_string(&path).map_err(|e| {
            GraphError::Io(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        tracing::debug!(path = %path.display(), "loaded config file");
        Self::from_toml_str(&text)
    }

    /// Apply command-line overrides.
    pub fn with_overrides(mut self, database: Option<PathBuf>, backend: Option<Backend>) -> Self {
        if let Some(path) = database {
            self.store.path = path;
        }
        if let Some(backend) = backend {
            self.store.backend = backend;
        }
        self
    }

    /// Reject settings that cannot run.
    pub fn validate(&self) -> Result<(), GraphError> {
        self.engine.validate()?;
        if self.store.shards == 0 {
            return Err(GraphError::Configuration(
                "store.shards must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Open the configured store and wrap it in a graph.
    pub fn open_graph(&self) -> Result<AppGraph, GraphError> {
        self.validate()?;
        let store: Box<dyn KvStore> = match self.store.backend {
            Backend::Redb => Box::new(RedbStore::open(&self.store.path)?),
            Backend::Memory => Box::new(MemoryStore::new(self.store.shards)),
        };
        Graph::try_new(InstrumentedStore::new(store), self.engine.clone())
    }
}

// =============================================================================
// TESTS
// =============================================================================
