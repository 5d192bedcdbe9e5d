//! chainhistory-core: foundation for reconstructing vault and savings
//! timelines from append-only chain logs.
//!
//! # Architecture
//!
//! ```text
//! ProtocolWindow ─┐
//! NetworkProfile ─┴─► LookupRegistry ─► (Decoder, Correlator, RecordSource) ─► EventHistory
//!                                                                       │
//!                                          MemoCache<Subject, Timeline> ┤
//!                                          MemoCache<block, timestamp>  ┘
//! ```
//!
//! This crate holds the chain-agnostic pieces: the raw log and filter types,
//! the domain event model, the [`RecordSource`] trait every backend
//! implements, the protocol-window table and the memo caches. The engine
//! itself lives in `chainhistory-evm`.

pub mod cache;
pub mod error;
pub mod event;
pub mod memory;
pub mod network;
pub mod signature;
pub mod source;
pub mod types;
pub mod window;

pub use cache::MemoCache;
pub use error::{HistoryError, SourceError};
pub use event::{Amount, EventKind, HistoryEvent, Subject, Timeline};
pub use memory::MemorySource;
pub use network::{ContractAddresses, NetworkProfile};
pub use signature::{keccak256_signature, selector};
pub use source::RecordSource;
pub use types::{address_topic, u256_topic, LogFilter, RawLog};
pub use window::{CutoverKind, EmitterCutover, EmitterWindow, ProtocolWindow};
