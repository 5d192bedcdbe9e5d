//! Protocol-window resolver.
//!
//! Two facts depend on where a record sits in chain history:
//!
//! - **Scan start.** Scanning from genesis is prohibitively slow, so each
//!   known network has a fixed block before which no protocol record exists.
//!   Unknown networks fall back to block 1.
//! - **Authoritative emitter.** Some record kinds moved to a new contract in
//!   a protocol upgrade. Blocks strictly before the cutover belong to the old
//!   emitter, blocks on/after it to the new one.
//!
//! Both are a fixed table; nothing is inferred from the chain.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::network::mainnet;

/// Scan start for networks without a table entry.
pub const FALLBACK_SCAN_START: u64 = 1;

/// Known networks → first block worth scanning.
const SCAN_START: &[(&str, u64)] = &[("mainnet", 8_928_152), ("kovan", 14_764_534)];

/// Record kinds whose emitter changed in a protocol upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CutoverKind {
    /// Liquidation records (the liquidator contract was replaced).
    Liquidation,
}

/// One emitter switch for one record kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmitterCutover {
    pub kind: CutoverKind,
    /// First block served by `after`.
    pub block: u64,
    /// Emitter for blocks `< block`.
    pub before: Address,
    /// Emitter for blocks `>= block`.
    pub after: Address,
}

/// A block range served by a single emitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmitterWindow {
    pub emitter: Address,
    pub from_block: u64,
    /// `None` = open-ended (up to the chain head).
    pub to_block: Option<u64>,
}

/// Scan start and emitter cutovers for one network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolWindow {
    pub scan_start_block: u64,
    #[serde(default)]
    pub cutovers: Vec<EmitterCutover>,
}

impl Default for ProtocolWindow {
    fn default() -> Self {
        Self {
            scan_start_block: FALLBACK_SCAN_START,
            cutovers: vec![],
        }
    }
}

impl ProtocolWindow {
    /// Look up the built-in window for `network` (name or chain id).
    pub fn resolve(network: &str) -> Self {
        let Some(name) = canonical_network(network) else {
            return Self::default();
        };
        let scan_start_block = SCAN_START
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, block)| *block)
            .unwrap_or(FALLBACK_SCAN_START);
        let cutovers = match name {
            "mainnet" => vec![EmitterCutover {
                kind: CutoverKind::Liquidation,
                block: mainnet::CAT_CUTOVER_BLOCK,
                before: mainnet::CAT_V1,
                after: mainnet::CAT_V2,
            }],
            _ => vec![],
        };
        Self {
            scan_start_block,
            cutovers,
        }
    }

    /// The block scans should start from.
    pub fn scan_start_block(&self) -> u64 {
        self.scan_start_block
    }

    /// Which emitter is authoritative for `kind` at `block`.
    pub fn authoritative_emitter(&self, kind: CutoverKind, block: u64) -> Option<Address> {
        let cutover = self.cutover(kind)?;
        Some(if block < cutover.block {
            cutover.before
        } else {
            cutover.after
        })
    }

    /// The block ranges to scan for `kind`, one per emitter, clipped to the
    /// scan start. The pre-cutover range may be empty (`to < from`) when the
    /// cutover precedes the scan start.
    pub fn emitter_windows(&self, kind: CutoverKind) -> Vec<EmitterWindow> {
        let Some(cutover) = self.cutover(kind) else {
            return vec![];
        };
        let start = self.scan_start_block;
        vec![
            EmitterWindow {
                emitter: cutover.before,
                from_block: start,
                to_block: Some(cutover.block.saturating_sub(1)),
            },
            EmitterWindow {
                emitter: cutover.after,
                from_block: start.max(cutover.block),
                to_block: None,
            },
        ]
    }

    fn cutover(&self, kind: CutoverKind) -> Option<&EmitterCutover> {
        self.cutovers.iter().find(|c| c.kind == kind)
    }
}

/// Normalize a network identifier (name or chain id) to its table name.
pub fn canonical_network(network: &str) -> Option<&'static str> {
    match network.trim().to_ascii_lowercase().as_str() {
        "mainnet" | "ethereum" | "1" => Some("mainnet"),
        "kovan" | "42" => Some("kovan"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_network_scans_from_block_one() {
        let w = ProtocolWindow::resolve("my-devnet");
        assert_eq!(w.scan_start_block(), 1);
        assert!(w.authoritative_emitter(CutoverKind::Liquidation, 100).is_none());
        assert!(w.emitter_windows(CutoverKind::Liquidation).is_empty());
    }

    #[test]
    fn known_networks_by_name_or_id() {
        assert_eq!(ProtocolWindow::resolve("mainnet").scan_start_block(), 8_928_152);
        assert_eq!(ProtocolWindow::resolve("1").scan_start_block(), 8_928_152);
        assert_eq!(ProtocolWindow::resolve("Kovan").scan_start_block(), 14_764_534);
    }

    #[test]
    fn emitter_switches_at_cutover() {
        let w = ProtocolWindow::resolve("mainnet");
        let cut = mainnet::CAT_CUTOVER_BLOCK;
        assert_eq!(
            w.authoritative_emitter(CutoverKind::Liquidation, cut - 1),
            Some(mainnet::CAT_V1)
        );
        assert_eq!(
            w.authoritative_emitter(CutoverKind::Liquidation, cut),
            Some(mainnet::CAT_V2)
        );
    }

    #[test]
    fn emitter_windows_split_at_cutover() {
        let w = ProtocolWindow {
            scan_start_block: 100,
            cutovers: vec![EmitterCutover {
                kind: CutoverKind::Liquidation,
                block: 500,
                before: Address::repeat_byte(0x01),
                after: Address::repeat_byte(0x02),
            }],
        };
        let windows = w.emitter_windows(CutoverKind::Liquidation);
        assert_eq!(
            windows,
            vec![
                EmitterWindow {
                    emitter: Address::repeat_byte(0x01),
                    from_block: 100,
                    to_block: Some(499),
                },
                EmitterWindow {
                    emitter: Address::repeat_byte(0x02),
                    from_block: 500,
                    to_block: None,
                },
            ]
        );
    }

    #[test]
    fn cutover_before_scan_start_leaves_empty_old_window() {
        let w = ProtocolWindow {
            scan_start_block: 1_000,
            cutovers: vec![EmitterCutover {
                kind: CutoverKind::Liquidation,
                block: 10,
                before: Address::repeat_byte(0x01),
                after: Address::repeat_byte(0x02),
            }],
        };
        let windows = w.emitter_windows(CutoverKind::Liquidation);
        assert!(windows[0].to_block.unwrap() < windows[0].from_block);
        assert_eq!(windows[1].from_block, 1_000);
    }
}
