//! Raw log and query filter types shared by every record source.

use alloy_primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

// ─── RawLog ──────────────────────────────────────────────────────────────────

/// A single log record as emitted by a contract. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLog {
    /// Contract that emitted the log.
    pub emitter: Address,
    /// `topics[0]` identifies the record shape; the rest are indexed params.
    pub topics: Vec<B256>,
    /// Non-indexed payload.
    pub data: Bytes,
    /// Block the log was included in.
    pub block_number: u64,
    /// Transaction that emitted the log.
    pub tx_hash: B256,
    /// Log index within the block.
    pub log_index: u64,
}

impl RawLog {
    /// Returns the topic at `index`, if present.
    pub fn topic(&self, index: usize) -> Option<&B256> {
        self.topics.get(index)
    }
}

// ─── LogFilter ───────────────────────────────────────────────────────────────

/// Query for raw logs: emitter set, positional topic pattern and block range.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogFilter {
    /// Only match logs from these emitters (empty = any emitter).
    pub addresses: Vec<Address>,
    /// Positional topic pattern; `None` matches anything at that position.
    pub topics: Vec<Option<B256>>,
    /// Start block (inclusive).
    pub from_block: u64,
    /// End block (inclusive); `None` = chain head.
    pub to_block: Option<u64>,
}

impl LogFilter {
    /// Create a filter for a single emitter.
    pub fn address(addr: Address) -> Self {
        Self {
            addresses: vec![addr],
            ..Default::default()
        }
    }

    /// Set the record signature (`topics[0]`).
    pub fn topic0(self, signature: B256) -> Self {
        self.topic(0, signature)
    }

    /// Require `value` at topic position `index`, padding earlier positions
    /// with wildcards.
    pub fn topic(mut self, index: usize, value: B256) -> Self {
        if self.topics.len() <= index {
            self.topics.resize(index + 1, None);
        }
        self.topics[index] = Some(value);
        self
    }

    /// Set the start block.
    pub fn from_block(mut self, block: u64) -> Self {
        self.from_block = block;
        self
    }

    /// Set the end block.
    pub fn to_block(mut self, block: u64) -> Self {
        self.to_block = Some(block);
        self
    }

    /// Narrow the range to exactly one block.
    pub fn at_block(self, block: u64) -> Self {
        self.from_block(block).to_block(block)
    }

    /// Returns `true` if the range can never contain a block.
    pub fn is_empty_range(&self) -> bool {
        matches!(self.to_block, Some(to) if to < self.from_block)
    }

    /// Returns `true` if `address` matches this filter.
    pub fn matches_address(&self, address: &Address) -> bool {
        self.addresses.is_empty() || self.addresses.contains(address)
    }

    /// Returns `true` if every pinned topic position matches.
    pub fn matches_topics(&self, topics: &[B256]) -> bool {
        self.topics.iter().enumerate().all(|(i, expected)| match expected {
            Some(want) => topics.get(i) == Some(want),
            None => true,
        })
    }

    /// Returns `true` if `block` falls inside the range.
    pub fn matches_block(&self, block: u64) -> bool {
        block >= self.from_block && self.to_block.map_or(true, |to| block <= to)
    }

    /// Returns `true` if the log satisfies every part of the filter.
    pub fn matches(&self, log: &RawLog) -> bool {
        self.matches_address(&log.emitter)
            && self.matches_block(log.block_number)
            && self.matches_topics(&log.topics)
    }
}

/// Left-pad an integer id into a 32-byte topic.
pub fn u256_topic(value: u64) -> B256 {
    B256::from(U256::from(value).to_be_bytes::<32>())
}

/// Left-pad an address into a 32-byte topic.
pub fn address_topic(addr: Address) -> B256 {
    addr.into_word()
}

// ─── Tests ───────────────────────────────────────────────────────────────────
