//! # Graph Handle
//!
//! [`Graph`] owns a store and the engine configuration, opens transactions
//! and runs units of work under the optimistic retry discipline.
//!
//! ## Retry contract
//!
//! The body passed to [`Graph::with_retry`] may run several times. Each
//! attempt gets a fresh transaction; the body must rebuild all of its state
//! from that transaction and keep externally visible effects (printing,
//! sending) until the wrapper has returned.

use crate::GraphError;
use crate::config::{EngineConfig, ReadMode};
use crate::storage::KvStore;
use crate::transaction::Transaction;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// A graph stored in a [`KvStore`].
#[derive(Debug)]
pub struct Graph<S: KvStore> {
    store: S,
    config: EngineConfig,
    aborted_attempts: AtomicU64,
}

impl<S: KvStore> Graph<S> {
    /// Wrap a store.
    pub fn new(store: S, config: EngineConfig) -> Self {
        Self {
            store,
            config,
            aborted_attempts: AtomicU64::new(0),
        }
    }

    /// Wrap a store after validating `config`.
    pub fn try_new(store: S, config: EngineConfig) -> Result<Self, GraphError> {
        config.validate()?;
        Ok(Self::new(store, config))
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Attempts the retry wrappers have abandoned on a retryable error,
    /// whether the conflict surfaced during a read or at commit.
    pub fn aborted_attempts(&self) -> u64 {
        self.aborted_attempts.load(Ordering::Relaxed)
    }

    /// Zero the aborted-attempt counter.
    pub fn reset_aborted_attempts(&self) {
        self.aborted_attempts.store(0, Ordering::Relaxed);
    }

    /// Open a transactional transaction at the current version.
    pub fn begin(&self) -> Result<Transaction<'_, S>, GraphError> {
        self.begin_with(ReadMode::Transactional)
    }

    /// Open a transaction with an explicit read mode.
    pub fn begin_with(&self, mode: ReadMode) -> Result<Transaction<'_, S>, GraphError> {
        self.begin_attempt(mode, 1)
    }

    fn begin_attempt(&self, mode: ReadMode, attempt: u32) -> Result<Transaction<'_, S>, GraphError> {
        let read_ts = self.store.current_version()?;
        Ok(Transaction::new(&self.store, read_ts, mode, attempt))
    }

    /// Run `body` in a transactional transaction until it commits.
    ///
    /// Retryable errors (from the body or from commit) start a new attempt;
    /// any other error is returned as is. After `max_tx_attempts` attempts
    /// the result is [`GraphError::RetriesExhausted`].
    pub fn with_retry<T, B>(&self, body: B) -> Result<T, GraphError>
    where
        B: FnMut(&mut Transaction<'_, S>) -> Result<T, GraphError>,
    {
        self.run(ReadMode::Transactional, body)
    }

    /// Like [`Self::with_retry`], with the read mode taken from
    /// `EngineConfig::transactional_reads`. Meant for read-only bodies.
    pub fn read_with_retry<T, B>(&self, body: B) -> Result<T, GraphError>
    where
        B: FnMut(&mut Transaction<'_, S>) -> Result<T, GraphError>,
    {
        self.run(self.config.read_mode(), body)
    }

    fn run<T, B>(&self, mode: ReadMode, mut body: B) -> Result<T, GraphError>
    where
        B: FnMut(&mut Transaction<'_, S>) -> Result<T, GraphError>,
    {
        let max_attempts = self.config.max_tx_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            let mut tx = self.begin_attempt(mode, attempt)?;
            let outcome = body(&mut tx).and_then(|value| tx.commit().map(|_| value));

            match outcome {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() => {
                    self.aborted_attempts.fetch_add(1, Ordering::Relaxed);
                    debug!(attempt, max_attempts, error = %e, "transaction aborted, retrying");
                    tx.rollback();
                    last_error = Some(e);
                }
                Err(e) => {
                    tx.rollback();
                    return Err(e);
                }
            }
        }

        let last = last_error.map(|e| e.to_string()).unwrap_or_default();
        warn!(attempts = max_attempts, last = %last, "transaction retry budget exhausted");
        Err(GraphError::RetriesExhausted {
            attempts: max_attempts,
            last,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::properties::PropertyMap;
    use crate::storage::MemoryStore;
    use crate::transaction::TxState;
    use crate::types::{EntityId, VertexRef};

    fn person(local: u64) -> VertexRef {
        VertexRef::new(EntityId::new(1, local), "Person")
    }

    #[test]
    fn try_new_rejects_bad_config() {
        let config = EngineConfig {
            load_batch_size: 0,
            ..EngineConfig::default()
        };
        assert!(Graph::try_new(MemoryStore::new(1), config).is_err());
    }

    #[test]
    fn body_conflict_is_retried() {
        let graph = Graph::new(MemoryStore::new(1), EngineConfig::default());
        let mut runs = 0;
        let value = graph
            .with_retry(|tx| {
                runs += 1;
                if runs < 3 {
                    return Err(GraphError::Conflict("injected".to_string()));
                }
                tx.add_vertex(&person(1), PropertyMap::new())?;
                Ok(tx.attempt())
            })
            .unwrap();
        assert_eq!(runs, 3);
        assert_eq!(value, 3);
        assert_eq!(graph.store().key_count().unwrap(), 1);
        assert_eq!(graph.aborted_attempts(), 2);
    }

    #[test]
    fn read_time_conflicts_are_counted() {
        let graph = Graph::new(
            crate::storage::InstrumentedStore::new(MemoryStore::new(1)),
            EngineConfig::default(),
        );
        graph
            .with_retry(|tx| tx.add_vertex(&person(1), PropertyMap::new()))
            .unwrap();

        let mut runs = 0;
        let mut bag = crate::PropertyBag::new();
        graph
            .with_retry(|tx| {
                runs += 1;
                if runs == 1 {
                    // a writer lands between begin and the first read
                    graph
                        .with_retry(|other| other.add_vertex(&person(2), PropertyMap::new()))
                        .unwrap();
                }
                tx.get_properties(&mut bag, &person(2), &crate::PropertyKeys::All)
            })
            .unwrap();

        assert_eq!(runs, 2);
        assert_eq!(graph.aborted_attempts(), 1);
        // the abort happened before any commit reached the store
        assert_eq!(graph.store().stats().conflicts, 0);

        graph.reset_aborted_attempts();
        assert_eq!(graph.aborted_attempts(), 0);
    }

    #[test]
    fn fatal_error_propagates_without_retry() {
        let graph = Graph::new(MemoryStore::new(1), EngineConfig::default());
        let mut runs = 0;
        let err = graph
            .with_retry(|tx| {
                runs += 1;
                tx.traverse(&person(1), "", crate::Direction::Out, false, &[])
            })
            .unwrap_err();
        assert_eq!(runs, 1);
        assert!(matches!(err, GraphError::InvalidRequest(_)));
    }

    #[test]
    fn exhausted_budget_reports_attempts() {
        let config = EngineConfig {
            max_tx_attempts: 4,
            ..EngineConfig::default()
        };
        let graph = Graph::new(MemoryStore::new(1), config);
        let mut runs = 0;
        let err = graph
            .with_retry(|_| -> Result<(), GraphError> {
                runs += 1;
                Err(GraphError::TransactionAborted)
            })
            .unwrap_err();
        assert_eq!(runs, 4);
        match err {
            GraphError::RetriesExhausted { attempts, last } => {
                assert_eq!(attempts, 4);
                assert!(last.contains("aborted"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn begin_with_uses_requested_mode() {
        let graph = Graph::new(MemoryStore::new(1), EngineConfig::default());
        let tx = graph.begin_with(ReadMode::NonTransactional).unwrap();
        assert_eq!(tx.mode(), ReadMode::NonTransactional);
        assert_eq!(tx.state(), TxState::Active);
        assert_eq!(graph.begin().unwrap().mode(), ReadMode::Transactional);
    }
}
