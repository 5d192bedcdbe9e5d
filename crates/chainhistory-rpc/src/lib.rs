//! chainhistory-rpc: a JSON-RPC backed `RecordSource`.
//!
//! `RpcRecordSource` sits on top of any `RpcTransport`; `HttpRpcClient` is
//! the production transport, with exponential-backoff retry on transient
//! failures. Transport errors surface to the engine as `SourceError`s.

pub mod error;
pub mod http;
pub mod request;
pub mod retry;
pub mod source;
pub mod transport;

pub use error::TransportError;
pub use http::{HttpClientConfig, HttpRpcClient};
pub use request::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, RpcId};
pub use retry::{RetryConfig, RetryPolicy};
pub use source::{block_chunks, RpcRecordSource, DEFAULT_MAX_BLOCK_RANGE};
pub use transport::RpcTransport;
