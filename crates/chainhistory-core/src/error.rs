//! Error types for the reconstruction pipeline.

use thiserror::Error;

/// Errors a [`RecordSource`](crate::source::RecordSource) can return.
///
/// All of them are treated as transient by the engine: nothing is retried
/// internally and nothing is cached.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("request timed out after {ms}ms")]
    Timeout { ms: u64 },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("block {0} not found")]
    BlockNotFound(u64),
}

/// Errors returned by timeline reconstruction.
///
/// `Clone` so one in-flight reconstruction can hand the same failure to
/// every caller waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistoryError {
    #[error("record source unavailable: {0}")]
    SourceUnavailable(#[from] SourceError),

    #[error("{record} record in tx {tx_hash} does not match its shape: {reason}")]
    DecodeMismatch {
        record: String,
        tx_hash: String,
        reason: String,
    },

    #[error("no urn handler found for vault {vault_id}")]
    HandlerUnresolved { vault_id: u64 },

    #[error("unknown network '{0}': no contract addresses configured")]
    UnknownNetwork(String),

    #[error("invalid subject: {0}")]
    InvalidSubject(String),
}

impl HistoryError {
    /// Returns `true` if retrying the same reconstruction may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::SourceUnavailable(_))
    }
}
