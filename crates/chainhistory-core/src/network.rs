//! Per-network contract addresses.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::window::{canonical_network, ProtocolWindow};

/// Mainnet deployment.
pub mod mainnet {
    use alloy_primitives::{address, Address};

    pub const CDP_MANAGER: Address = address!("5ef30b9986345249bc32d8928b7ee64de9435e39");
    pub const VAT: Address = address!("35d1b3f3d7966a1dfe207aa4514c12a259a0492b");
    pub const DAI_JOIN: Address = address!("9759a6ac90977b93b58547b4a71c78317f391a28");
    pub const POT: Address = address!("197e90f9fad81970ba7976f33cbd77088e5d7cf7");
    pub const MIGRATION: Address = address!("c73e0383f3aff3215e6f04b0331d58cecf0ab849");

    /// Liquidator before the upgrade.
    pub const CAT_V1: Address = address!("78f2c2af65126834c51822f56be0d7469d7a523e");
    /// Liquidator on/after the upgrade.
    pub const CAT_V2: Address = address!("a5679c04fc3d9d8b0aab1f0ab83555b301ca70ea");
    pub const CAT_CUTOVER_BLOCK: u64 = 10_742_907;
}

/// The contracts whose records make up a timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractAddresses {
    /// Position manager: vault creation, ownership, debt changes, moves.
    pub cdp_manager: Address,
    /// Core accounting contract: direct collateral movements.
    pub vat: Address,
    /// Stablecoin adapter: the authoritative amounts for debt changes.
    pub dai_join: Address,
    /// Savings contract.
    pub pot: Address,
    /// Contract that opens vaults on behalf of migrated positions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migration: Option<Address>,
}

/// Everything the engine needs to know about one network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkProfile {
    pub name: String,
    pub contracts: ContractAddresses,
    /// Scan start and cutovers; defaults to the built-in table for `name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<ProtocolWindow>,
}

impl NetworkProfile {
    /// The built-in mainnet profile.
    pub fn mainnet() -> Self {
        Self {
            name: "mainnet".into(),
            contracts: ContractAddresses {
                cdp_manager: mainnet::CDP_MANAGER,
                vat: mainnet::VAT,
                dai_join: mainnet::DAI_JOIN,
                pot: mainnet::POT,
                migration: Some(mainnet::MIGRATION),
            },
            window: Some(ProtocolWindow::resolve("mainnet")),
        }
    }

    /// Look up a built-in profile by network name or chain id.
    pub fn builtin(network: &str) -> Option<Self> {
        match canonical_network(network)? {
            "mainnet" => Some(Self::mainnet()),
            _ => None,
        }
    }

    /// The protocol window for this network.
    pub fn window(&self) -> ProtocolWindow {
        self.window
            .clone()
            .unwrap_or_else(|| ProtocolWindow::resolve(&self.name))
    }
}
