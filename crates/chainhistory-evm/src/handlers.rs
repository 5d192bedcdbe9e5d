//! Decode handlers, one per [`RecordKind`].
//!
//! A handler turns the primary records of one lookup into pending events.
//! Pending events still carry their order rank and lack a timestamp; the
//! assembler resolves timestamps once per block and sorts before stripping
//! the rank.

use async_trait::async_trait;
use futures::future::try_join_all;

use alloy_primitives::{Address, B256};
use chainhistory_core::{
    Amount, ContractAddresses, EventKind, HistoryError, HistoryEvent, RawLog, RecordSource,
    Subject,
};

use crate::correlator::{Correlator, SavingsDirection};
use crate::decoder::{
    collateral_currency, decode_bite, decode_manager_frob, decode_vat_frob, topic_address,
    topic_word, ShapeError,
};
use crate::registry::RecordKind;

// ─── PendingEvent ────────────────────────────────────────────────────────────

/// A decoded event awaiting its block timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEvent {
    pub kind: EventKind,
    pub block_number: u64,
    pub tx_hash: B256,
    pub log_index: u64,
    pub amount: Option<Amount>,
    pub counterparty: Option<Address>,
}

impl PendingEvent {
    /// Event of `kind` positioned at `log`.
    pub fn from_log(kind: EventKind, log: &RawLog) -> Self {
        Self {
            kind,
            block_number: log.block_number,
            tx_hash: log.tx_hash,
            log_index: log.log_index,
            amount: None,
            counterparty: None,
        }
    }

    pub fn with_amount(mut self, amount: Amount) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn with_counterparty(mut self, counterparty: Address) -> Self {
        self.counterparty = Some(counterparty);
        self
    }

    pub fn order_rank(&self) -> u8 {
        self.kind.order_rank()
    }

    pub fn into_event(self, subject: Subject, timestamp: i64) -> HistoryEvent {
        HistoryEvent {
            kind: self.kind,
            block_number: self.block_number,
            tx_hash: self.tx_hash,
            log_index: self.log_index,
            subject,
            amount: self.amount,
            counterparty: self.counterparty,
            timestamp,
        }
    }
}

// ─── Handler trait ───────────────────────────────────────────────────────────

/// What a handler may use while decoding.
pub struct DecodeContext<'a> {
    pub subject: &'a Subject,
    pub source: &'a dyn RecordSource,
    pub contracts: &'a ContractAddresses,
}

impl DecodeContext<'_> {
    fn correlator(&self) -> Correlator<'_> {
        Correlator::new(self.source, self.contracts)
    }
}

/// Decodes the records of one lookup.
#[async_trait]
pub trait RecordHandler: Send + Sync {
    fn kind(&self) -> RecordKind;

    async fn decode(
        &self,
        ctx: &DecodeContext<'_>,
        records: Vec<RawLog>,
    ) -> Result<Vec<PendingEvent>, HistoryError>;
}

/// The handler registered for `kind`.
pub fn handler_for(kind: RecordKind) -> &'static dyn RecordHandler {
    match kind {
        RecordKind::VaultCreated => &CreationHandler,
        RecordKind::OwnershipTransfer => &TransferHandler,
        RecordKind::CollateralMove => &CollateralHandler,
        RecordKind::DebtChange => &DebtHandler,
        RecordKind::Liquidation => &LiquidationHandler,
        RecordKind::SavingsDeposit => &SAVINGS_DEPOSIT,
        RecordKind::SavingsWithdraw => &SAVINGS_WITHDRAW,
    }
}

static SAVINGS_DEPOSIT: SavingsHandler = SavingsHandler(SavingsDirection::Deposit);
static SAVINGS_WITHDRAW: SavingsHandler = SavingsHandler(SavingsDirection::Withdraw);

// ─── Handlers ────────────────────────────────────────────────────────────────

/// `NewCdp(usr, own, cdp)`. Opened by the migration contract means migrated.
pub struct CreationHandler;

#[async_trait]
impl RecordHandler for CreationHandler {
    fn kind(&self) -> RecordKind {
        RecordKind::VaultCreated
    }

    async fn decode(
        &self,
        ctx: &DecodeContext<'_>,
        records: Vec<RawLog>,
    ) -> Result<Vec<PendingEvent>, HistoryError> {
        records
            .iter()
            .map(|log| {
                let creator = topic_address(log, 1).map_err(|e| mismatch(self.kind(), log, e))?;
                let owner = topic_address(log, 2).map_err(|e| mismatch(self.kind(), log, e))?;
                let kind = if ctx.contracts.migration == Some(creator) {
                    EventKind::Migrate
                } else {
                    EventKind::Create
                };
                Ok(PendingEvent::from_log(kind, log).with_counterparty(owner))
            })
            .collect()
    }
}

/// `give(cdp, dst)` note: `[sig, caller, cdp, dst]`.
pub struct TransferHandler;

#[async_trait]
impl RecordHandler for TransferHandler {
    fn kind(&self) -> RecordKind {
        RecordKind::OwnershipTransfer
    }

    async fn decode(
        &self,
        _ctx: &DecodeContext<'_>,
        records: Vec<RawLog>,
    ) -> Result<Vec<PendingEvent>, HistoryError> {
        records
            .iter()
            .map(|log| {
                let new_owner = topic_address(log, 3).map_err(|e| mismatch(self.kind(), log, e))?;
                Ok(PendingEvent::from_log(EventKind::Transfer, log).with_counterparty(new_owner))
            })
            .collect()
    }
}

/// Core-accounting `frob` on the vault's urn. Only the collateral delta is
/// read here; debt deltas are attributed through the position manager.
pub struct CollateralHandler;

#[async_trait]
impl RecordHandler for CollateralHandler {
    fn kind(&self) -> RecordKind {
        RecordKind::CollateralMove
    }

    async fn decode(
        &self,
        _ctx: &DecodeContext<'_>,
        records: Vec<RawLog>,
    ) -> Result<Vec<PendingEvent>, HistoryError> {
        let mut events = Vec::new();
        for log in &records {
            let frob = decode_vat_frob(&log.data).map_err(|e| mismatch(self.kind(), log, e))?;
            if frob.dink.is_zero() {
                continue;
            }
            let kind = if frob.dink.is_negative() {
                EventKind::Withdraw
            } else {
                EventKind::Deposit
            };
            let amount = Amount::wad(frob.dink.unsigned_abs(), collateral_currency(&frob.ilk));
            events.push(
                PendingEvent::from_log(kind, log)
                    .with_amount(amount)
                    .with_counterparty(frob.collateral_src),
            );
        }
        Ok(events)
    }
}

/// Position-manager `frob`. Each record with a nonzero debt delta is
/// correlated against the stablecoin adapter; records are correlated
/// concurrently.
pub struct DebtHandler;

#[async_trait]
impl RecordHandler for DebtHandler {
    fn kind(&self) -> RecordKind {
        RecordKind::DebtChange
    }

    async fn decode(
        &self,
        ctx: &DecodeContext<'_>,
        records: Vec<RawLog>,
    ) -> Result<Vec<PendingEvent>, HistoryError> {
        let Subject::Vault(vault_id) = *ctx.subject else {
            return Ok(vec![]);
        };

        let mut changes = Vec::with_capacity(records.len());
        for log in &records {
            let frob = decode_manager_frob(&log.data).map_err(|e| mismatch(self.kind(), log, e))?;
            if !frob.dart.is_zero() {
                changes.push((log, frob.dart));
            }
        }

        let correlator = ctx.correlator();
        let tasks: Vec<_> = changes
            .into_iter()
            .map(|(log, dart)| correlator.debt_change(vault_id, log, dart))
            .collect();
        let per_record = try_join_all(tasks).await?;
        Ok(per_record.into_iter().flatten().collect())
    }
}

/// `Bite(ilk, urn, ink, art, tab, flip, id)`.
pub struct LiquidationHandler;

#[async_trait]
impl RecordHandler for LiquidationHandler {
    fn kind(&self) -> RecordKind {
        RecordKind::Liquidation
    }

    async fn decode(
        &self,
        _ctx: &DecodeContext<'_>,
        records: Vec<RawLog>,
    ) -> Result<Vec<PendingEvent>, HistoryError> {
        records
            .iter()
            .map(|log| {
                let ilk = topic_word(log, 1).map_err(|e| mismatch(self.kind(), log, e))?;
                let bite = decode_bite(&log.data).map_err(|e| mismatch(self.kind(), log, e))?;
                Ok(PendingEvent::from_log(EventKind::Liquidate, log)
                    .with_amount(Amount::wad(bite.ink, collateral_currency(&ilk)))
                    .with_counterparty(bite.auction))
            })
            .collect()
    }
}

/// Savings-contract `join`/`exit`, correlated with the adapter.
pub struct SavingsHandler(pub SavingsDirection);

#[async_trait]
impl RecordHandler for SavingsHandler {
    fn kind(&self) -> RecordKind {
        match self.0 {
            SavingsDirection::Deposit => RecordKind::SavingsDeposit,
            SavingsDirection::Withdraw => RecordKind::SavingsWithdraw,
        }
    }

    async fn decode(
        &self,
        ctx: &DecodeContext<'_>,
        records: Vec<RawLog>,
    ) -> Result<Vec<PendingEvent>, HistoryError> {
        let correlator = ctx.correlator();
        let tasks: Vec<_> = records
            .iter()
            .map(|log| correlator.savings(log, self.0))
            .collect();
        let per_record = try_join_all(tasks).await?;
        Ok(per_record.into_iter().flatten().collect())
    }
}

fn mismatch(kind: RecordKind, log: &RawLog, err: ShapeError) -> HistoryError {
    HistoryError::DecodeMismatch {
        record: kind.to_string(),
        tx_hash: log.tx_hash.to_string(),
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::Bytes;
    use chainhistory_core::network::mainnet;
    use chainhistory_core::{u256_topic, MemorySource, NetworkProfile};

    use crate::topics::topics;

    fn new_cdp(creator: Address, owner: Address, id: u64) -> RawLog {
        RawLog {
            emitter: mainnet::CDP_MANAGER,
            topics: vec![topics().new_cdp, creator.into_word(), owner.into_word(), u256_topic(id)],
            data: Bytes::new(),
            block_number: 100,
            tx_hash: B256::repeat_byte(0xc1),
            log_index: 2,
        }
    }

    #[tokio::test]
    async fn creation_by_migration_contract_is_migrate() {
        let src = MemorySource::new();
        let profile = NetworkProfile::mainnet();
        let subject = Subject::Vault(7);
        let ctx = DecodeContext {
            subject: &subject,
            source: &src,
            contracts: &profile.contracts,
        };
        let owner = Address::repeat_byte(0x0a);
        let records = vec![
            new_cdp(Address::repeat_byte(0x99), owner, 7),
            new_cdp(mainnet::MIGRATION, owner, 7),
        ];
        let events = handler_for(RecordKind::VaultCreated)
            .decode(&ctx, records)
            .await
            .unwrap();
        assert_eq!(events[0].kind, EventKind::Create);
        assert_eq!(events[1].kind, EventKind::Migrate);
        assert_eq!(events[0].counterparty, Some(owner));
    }

    #[tokio::test]
    async fn malformed_topic_is_decode_mismatch() {
        let src = MemorySource::new();
        let profile = NetworkProfile::mainnet();
        let subject = Subject::Vault(7);
        let ctx = DecodeContext {
            subject: &subject,
            source: &src,
            contracts: &profile.contracts,
        };
        let mut log = new_cdp(Address::repeat_byte(0x99), Address::repeat_byte(0x0a), 7);
        log.topics.truncate(2);
        let err = handler_for(RecordKind::VaultCreated)
            .decode(&ctx, vec![log])
            .await
            .unwrap_err();
        assert!(matches!(err, HistoryError::DecodeMismatch { ref record, .. } if record == "vault-created"));
    }

    #[test]
    fn handler_table_covers_every_kind() {
        for kind in [
            RecordKind::VaultCreated,
            RecordKind::OwnershipTransfer,
            RecordKind::CollateralMove,
            RecordKind::DebtChange,
            RecordKind::Liquidation,
            RecordKind::SavingsDeposit,
            RecordKind::SavingsWithdraw,
        ] {
            assert_eq!(handler_for(kind).kind(), kind);
        }
    }

    #[test]
    fn pending_event_into_event() {
        let log = new_cdp(Address::ZERO, Address::ZERO, 1);
        let event = PendingEvent::from_log(EventKind::Create, &log).into_event(Subject::Vault(1), 42);
        assert_eq!(event.timestamp, 42);
        assert_eq!(event.block_number, 100);
        assert_eq!(event.log_index, 2);
        assert_eq!(event.amount, None);
    }
}
