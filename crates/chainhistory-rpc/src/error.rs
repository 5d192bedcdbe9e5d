//! Transport-level error types.

use chainhistory_core::SourceError;
use thiserror::Error;

use crate::request::JsonRpcError;

/// Errors that can occur while talking to a node.
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP request failed (connection refused, bad status, ...).
    #[error("HTTP error: {0}")]
    Http(String),

    /// JSON-RPC error returned by the node.
    #[error("RPC error {}: {}", .0.code, .0.message)]
    Rpc(JsonRpcError),

    #[error("request timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// Response could not be deserialized.
    #[error("deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Returns `true` if this error is transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Timeout { .. })
    }
}

impl From<TransportError> for SourceError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout { ms } => SourceError::Timeout { ms },
            TransportError::Deserialization(e) => SourceError::Malformed(e.to_string()),
            other => SourceError::Request(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_kinds() {
        assert!(TransportError::Http("connection reset".into()).is_retryable());
        assert!(TransportError::Timeout { ms: 100 }.is_retryable());
        let rpc = TransportError::Rpc(JsonRpcError {
            code: 3,
            message: "execution reverted".into(),
            data: None,
        });
        assert!(!rpc.is_retryable());
    }

    #[test]
    fn maps_into_source_error() {
        assert_eq!(
            SourceError::from(TransportError::Timeout { ms: 250 }),
            SourceError::Timeout { ms: 250 }
        );
        let bad = serde_json::from_str::<u64>("\"x\"").unwrap_err();
        assert!(matches!(
            SourceError::from(TransportError::from(bad)),
            SourceError::Malformed(_)
        ));
        assert!(matches!(
            SourceError::from(TransportError::Http("503".into())),
            SourceError::Request(_)
        ));
    }
}
