//! # chainhistory-evm
//!
//! Vault and savings timeline reconstruction over EVM logs.
//!
//! ## Implementation notes
//! - `topics`: event and note signatures (`topics[0]`)
//! - `decoder`: payload shapes, ABI-decoded with `alloy-core`
//! - `registry`: the lookups that cover one subject, split across the
//!   liquidator cutover
//! - `handlers`: `RecordKind` → decode handler table
//! - `correlator`: adapter/move matching for debt and savings movements
//! - `history`: `EventHistory`, the cached assembler

pub mod correlator;
pub mod decoder;
pub mod handlers;
pub mod history;
pub mod registry;
pub mod topics;

pub use correlator::{Correlator, DebtDirection, SavingsDirection};
pub use handlers::{handler_for, DecodeContext, PendingEvent, RecordHandler};
pub use history::EventHistory;
pub use registry::{Lookup, LookupRegistry, RecordKind};
pub use topics::{topics, Topics};
