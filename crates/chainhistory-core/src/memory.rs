//! In-memory record source.
//!
//! Holds logs, block timestamps and urn handlers in RAM and counts every
//! query it serves. Useful for tests, fixture replay and for checking that
//! cached reconstructions issue no new queries.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use alloy_primitives::Address;

use crate::error::SourceError;
use crate::source::RecordSource;
use crate::types::{LogFilter, RawLog};

/// In-memory [`RecordSource`].
#[derive(Default)]
pub struct MemorySource {
    logs: Mutex<Vec<RawLog>>,
    timestamps: Mutex<HashMap<u64, i64>>,
    handlers: Mutex<HashMap<u64, Address>>,
    /// `(genesis_timestamp, seconds_per_block)` for blocks without an
    /// explicit timestamp.
    block_time: Mutex<Option<(i64, i64)>>,
    failing: AtomicBool,
    log_queries: AtomicU64,
    timestamp_queries: AtomicU64,
    handler_queries: AtomicU64,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive timestamps for unset blocks as `genesis + block * seconds_per_block`.
    pub fn with_block_time(self, genesis: i64, seconds_per_block: i64) -> Self {
        *lock(&self.block_time) = Some((genesis, seconds_per_block));
        self
    }

    /// Record a log.
    pub fn insert_log(&self, log: RawLog) {
        lock(&self.logs).push(log);
    }

    /// Record many logs.
    pub fn extend_logs(&self, logs: impl IntoIterator<Item = RawLog>) {
        lock(&self.logs).extend(logs);
    }

    /// Set the timestamp of a block.
    pub fn set_timestamp(&self, block_number: u64, timestamp: i64) {
        lock(&self.timestamps).insert(block_number, timestamp);
    }

    /// Register the urn handler of a vault.
    pub fn set_handler(&self, vault_id: u64, handler: Address) {
        lock(&self.handlers).insert(vault_id, handler);
    }

    /// Make every subsequent call fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of `query_records` calls served.
    pub fn query_count(&self) -> u64 {
        self.log_queries.load(Ordering::SeqCst)
    }

    /// Number of `block_timestamp` calls served.
    pub fn timestamp_query_count(&self) -> u64 {
        self.timestamp_queries.load(Ordering::SeqCst)
    }

    /// Number of `resolve_handler` calls served.
    pub fn handler_query_count(&self) -> u64 {
        self.handler_queries.load(Ordering::SeqCst)
    }

    /// Total calls of any kind.
    pub fn total_calls(&self) -> u64 {
        self.query_count() + self.timestamp_query_count() + self.handler_query_count()
    }

    fn check_available(&self) -> Result<(), SourceError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SourceError::Request("memory source set to fail".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordSource for MemorySource {
    async fn query_records(&self, filter: &LogFilter) -> Result<Vec<RawLog>, SourceError> {
        self.log_queries.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        let mut matched: Vec<RawLog> = lock(&self.logs)
            .iter()
            .filter(|log| filter.matches(log))
            .cloned()
            .collect();
        matched.sort_by_key(|log| (log.block_number, log.log_index));
        Ok(matched)
    }

    async fn block_timestamp(&self, block_number: u64) -> Result<i64, SourceError> {
        self.timestamp_queries.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        if let Some(ts) = lock(&self.timestamps).get(&block_number) {
            return Ok(*ts);
        }
        let (genesis, step) =
            (*lock(&self.block_time)).ok_or(SourceError::BlockNotFound(block_number))?;
        i64::try_from(block_number)
            .ok()
            .and_then(|n| n.checked_mul(step))
            .and_then(|offset| genesis.checked_add(offset))
            .ok_or(SourceError::BlockNotFound(block_number))
    }

    async fn resolve_handler(&self, vault_id: u64) -> Result<Option<Address>, SourceError> {
        self.handler_queries.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(lock(&self.handlers).get(&vault_id).copied())
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
