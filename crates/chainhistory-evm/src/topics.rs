//! Record signatures (`topics[0]`) for every record the engine queries.
//!
//! Two conventions are in use:
//!
//! - **Events** carry the full keccak256 of their canonical signature, e.g.
//!   `keccak256("NewCdp(address,address,uint256)")`.
//! - **Notes** (anonymous call logs) carry the 4-byte function selector,
//!   left-aligned and zero-padded to 32 bytes.

use std::sync::OnceLock;

use alloy_primitives::B256;
use chainhistory_core::{keccak256_signature, selector};

/// `topics[0]` of an event.
pub fn event_topic(signature: &str) -> B256 {
    B256::from(keccak256_signature(signature))
}

/// `topics[0]` of a note: the selector followed by 28 zero bytes.
pub fn note_topic(signature: &str) -> B256 {
    let mut word = [0u8; 32];
    word[..4].copy_from_slice(&selector(signature));
    B256::from(word)
}

/// Signatures of all records the lookups and correlator use.
#[derive(Debug, Clone)]
pub struct Topics {
    /// Position manager: vault opened (`usr`, `own`, `cdp` indexed).
    pub new_cdp: B256,
    /// Position manager: ownership handed to `dst`.
    pub give: B256,
    /// Position manager: debt/collateral change for a vault id.
    pub manager_frob: B256,
    /// Position manager: internal stablecoin balance moved out of a vault.
    pub manager_move: B256,
    /// Core accounting: direct collateral/debt change on an urn.
    pub vat_frob: B256,
    /// Stablecoin adapter: tokens burned into internal balance (pay back).
    pub dai_join: B256,
    /// Stablecoin adapter: tokens minted out of internal balance (generate).
    pub dai_exit: B256,
    /// Savings: deposit.
    pub pot_join: B256,
    /// Savings: withdrawal.
    pub pot_exit: B256,
    /// Liquidator: a vault was liquidated.
    pub bite: B256,
}

impl Topics {
    fn compute() -> Self {
        Self {
            new_cdp: event_topic("NewCdp(address,address,uint256)"),
            give: note_topic("give(uint256,address)"),
            manager_frob: note_topic("frob(uint256,int256,int256)"),
            manager_move: note_topic("move(uint256,address,uint256)"),
            vat_frob: note_topic("frob(bytes32,address,address,address,int256,int256)"),
            dai_join: note_topic("join(address,uint256)"),
            dai_exit: note_topic("exit(address,uint256)"),
            pot_join: note_topic("join(uint256)"),
            pot_exit: note_topic("exit(uint256)"),
            bite: event_topic("Bite(bytes32,address,uint256,uint256,uint256,address,uint256)"),
        }
    }
}

/// The process-wide signature table.
pub fn topics() -> &'static Topics {
    static TOPICS: OnceLock<Topics> = OnceLock::new();
    TOPICS.get_or_init(Topics::compute)
}

/// The selector embedded in a note topic.
pub fn note_selector(topic: &B256) -> [u8; 4] {
    [topic[0], topic[1], topic[2], topic[3]]
}
