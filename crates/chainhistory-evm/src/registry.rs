//! Lookup registry: the fixed set of queries that covers one subject.
//!
//! A vault needs six lookups: creation, ownership transfer, direct
//! collateral movement (keyed by the vault's urn handler), debt change and
//! one liquidation lookup per liquidator emitter window. A savings account
//! needs two: deposits and withdrawals. Every filter pins its topics
//! exactly, using zero-padded ids and addresses, so a lookup never returns
//! another subject's records.

use std::sync::Arc;

use alloy_primitives::Address;
use chainhistory_core::{
    address_topic, u256_topic, CutoverKind, HistoryError, LogFilter, NetworkProfile,
    ProtocolWindow, RecordSource, Subject,
};

use crate::topics::topics;

/// The record families a lookup can cover. Each maps to one decode handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    VaultCreated,
    OwnershipTransfer,
    CollateralMove,
    DebtChange,
    Liquidation,
    SavingsDeposit,
    SavingsWithdraw,
}

impl RecordKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::VaultCreated => "vault-created",
            Self::OwnershipTransfer => "ownership-transfer",
            Self::CollateralMove => "collateral-move",
            Self::DebtChange => "debt-change",
            Self::Liquidation => "liquidation",
            Self::SavingsDeposit => "savings-deposit",
            Self::SavingsWithdraw => "savings-withdraw",
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One primary query plus the record family that decodes its results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lookup {
    pub kind: RecordKind,
    pub filter: LogFilter,
}

impl Lookup {
    fn new(kind: RecordKind, filter: LogFilter) -> Self {
        Self { kind, filter }
    }
}

/// Builds lookups for subjects on one network.
#[derive(Debug, Clone)]
pub struct LookupRegistry {
    profile: Arc<NetworkProfile>,
    window: ProtocolWindow,
}

impl LookupRegistry {
    pub fn new(profile: Arc<NetworkProfile>) -> Self {
        let window = profile.window();
        Self { profile, window }
    }

    pub fn profile(&self) -> &NetworkProfile {
        &self.profile
    }

    pub fn window(&self) -> &ProtocolWindow {
        &self.window
    }

    /// Build every lookup for `subject`.
    ///
    /// For vaults the urn handler is resolved first; if it cannot be found
    /// the subject fails with [`HistoryError::HandlerUnresolved`] before any
    /// lookup is issued.
    pub async fn build(
        &self,
        subject: &Subject,
        source: &dyn RecordSource,
    ) -> Result<Vec<Lookup>, HistoryError> {
        match subject {
            Subject::Vault(id) => {
                let handler = source
                    .resolve_handler(*id)
                    .await?
                    .filter(|addr| !addr.is_zero())
                    .ok_or(HistoryError::HandlerUnresolved { vault_id: *id })?;
                Ok(self.vault_lookups(*id, handler))
            }
            Subject::Savings(account) => {
                if account.is_zero() {
                    return Err(HistoryError::InvalidSubject(subject.to_string()));
                }
                Ok(self.savings_lookups(*account))
            }
        }
    }

    /// Lookups for a vault whose urn handler is already known.
    pub fn vault_lookups(&self, vault_id: u64, urn: Address) -> Vec<Lookup> {
        let t = topics();
        let c = &self.profile.contracts;
        let start = self.window.scan_start_block();
        let id = u256_topic(vault_id);
        let urn = address_topic(urn);

        let mut lookups = vec![
            Lookup::new(
                RecordKind::VaultCreated,
                LogFilter::address(c.cdp_manager)
                    .topic0(t.new_cdp)
                    .topic(3, id)
                    .from_block(start),
            ),
            Lookup::new(
                RecordKind::OwnershipTransfer,
                LogFilter::address(c.cdp_manager)
                    .topic0(t.give)
                    .topic(2, id)
                    .from_block(start),
            ),
            Lookup::new(
                RecordKind::CollateralMove,
                LogFilter::address(c.vat)
                    .topic0(t.vat_frob)
                    .topic(2, urn)
                    .from_block(start),
            ),
            Lookup::new(
                RecordKind::DebtChange,
                LogFilter::address(c.cdp_manager)
                    .topic0(t.manager_frob)
                    .topic(2, id)
                    .from_block(start),
            ),
        ];

        for window in self.window.emitter_windows(CutoverKind::Liquidation) {
            let mut filter = LogFilter::address(window.emitter)
                .topic0(t.bite)
                .topic(2, urn)
                .from_block(window.from_block);
            filter.to_block = window.to_block;
            lookups.push(Lookup::new(RecordKind::Liquidation, filter));
        }

        lookups
    }

    /// Lookups for a savings account.
    pub fn savings_lookups(&self, account: Address) -> Vec<Lookup> {
        let t = topics();
        let pot = self.profile.contracts.pot;
        let start = self.window.scan_start_block();
        let account = address_topic(account);

        vec![
            Lookup::new(
                RecordKind::SavingsDeposit,
                LogFilter::address(pot)
                    .topic0(t.pot_join)
                    .topic(1, account)
                    .from_block(start),
            ),
            Lookup::new(
                RecordKind::SavingsWithdraw,
                LogFilter::address(pot)
                    .topic0(t.pot_exit)
                    .topic(1, account)
                    .from_block(start),
            ),
        ]
    }
}
