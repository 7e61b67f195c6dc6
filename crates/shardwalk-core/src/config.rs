//! # Engine Configuration
//!
//! Explicit configuration handed to [`crate::Graph::new`]. There is no global
//! mutable state: two graphs in one process can run with different settings.

use crate::GraphError;
use crate::primitives::{DEFAULT_LOAD_BATCH_SIZE, DEFAULT_MAX_TX_ATTEMPTS};
use serde::{Deserialize, Serialize};

/// How read-only bodies are bracketed by the retry wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadMode {
    /// Track every read and validate the read set at commit.
    Transactional,
    /// Only keys read for update are tracked; plain reads see the latest
    /// committed value.
    NonTransactional,
}

/// Engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Attempts before a transaction is reported as failed.
    pub max_tx_attempts: u32,
    /// Run read-only bodies with full read-set validation.
    pub transactional_reads: bool,
    /// Records per load transaction.
    pub load_batch_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_tx_attempts: DEFAULT_MAX_TX_ATTEMPTS,
            transactional_reads: false,
            load_batch_size: DEFAULT_LOAD_BATCH_SIZE,
        }
    }
}

impl EngineConfig {
    /// Read mode used by [`crate::Graph::read_with_retry`].
    #[must_use]
    pub const fn read_mode(&self) -> ReadMode {
        if self.transactional_reads {
            ReadMode::Transactional
        } else {
            ReadMode::NonTransactional
        }
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), GraphError> {
        if self.max_tx_attempts == 0 {
            return Err(GraphError::Configuration(
                "max_tx_attempts must be at least 1".to_string(),
            ));
        }
        if self.load_batch_size == 0 {
            return Err(GraphError::Configuration(
                "load_batch_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_primitives() {
        let config = EngineConfig::default();
        assert_eq!(config.max_tx_attempts, 100);
        assert!(!config.transactional_reads);
        assert_eq!(config.read_mode(), ReadMode::NonTransactional);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_attempts_rejected() {
        let config = EngineConfig {
            max_tx_attempts: 0,
            ..EngineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(GraphError::Configuration(_))
        ));
    }

    #[test]
    fn transactional_reads_switch_mode() {
        let config = EngineConfig {
            transactional_reads: true,
            ..EngineConfig::default()
        };
        assert_eq!(config.read_mode(), ReadMode::Transactional);
    }
}
