//! The `RecordSource` trait: the engine's only view of the chain.

use alloy_primitives::Address;
use async_trait::async_trait;

use crate::error::SourceError;
use crate::types::{LogFilter, RawLog};

/// Read-only access to the append-only log store.
///
/// Every call is a suspension point of the engine. Timeouts and retries are
/// the implementation's business; errors bubble up unchanged.
///
/// The trait is object-safe and is stored as `Arc<dyn RecordSource>`.
#[async_trait]
pub trait RecordSource: Send + Sync + 'static {
    /// Return every log matching `filter`, ordered by block then log index.
    async fn query_records(&self, filter: &LogFilter) -> Result<Vec<RawLog>, SourceError>;

    /// Return the unix timestamp (seconds) of `block_number`.
    async fn block_timestamp(&self, block_number: u64) -> Result<i64, SourceError>;

    /// Return the urn handler (internal collateral address) of a vault,
    /// or `None` if the vault does not exist.
    async fn resolve_handler(&self, vault_id: u64) -> Result<Option<Address>, SourceError>;
}
