//! Correlator: turns half-operations into domain events.
//!
//! A debt change on the position manager only says *that* debt moved. The
//! authoritative amount lives on the stablecoin adapter, emitted in the same
//! transaction by the proxy that drove the operation. For every primary
//! record the correlator issues secondary queries scoped to the primary's
//! block and keeps only adapter records that
//!
//! - share the primary's transaction hash, and
//! - (debt changes only) also appear in a position-manager move record for
//!   the same vault and proxy, which rules out unrelated adapter calls by the
//!   same proxy in the same block.
//!
//! A primary without a matching counterpart yields no event, and no amount
//! is ever derived from the raw delta.

use std::collections::HashSet;

use alloy_primitives::{Address, B256, I256};
use chainhistory_core::{
    address_topic, u256_topic, Amount, ContractAddresses, EventKind, HistoryError, LogFilter,
    RawLog, RecordSource,
};

use crate::decoder::{topic_address, topic_uint, ShapeError};
use crate::handlers::PendingEvent;
use crate::topics::topics;

/// Currency of the stablecoin adapter.
pub const DAI: &str = "DAI";

/// Direction of a debt change, from the sign of its delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebtDirection {
    Generate,
    PayBack,
}

impl DebtDirection {
    /// `None` for a zero delta.
    pub fn from_delta(dart: I256) -> Option<Self> {
        if dart.is_positive() {
            Some(Self::Generate)
        } else if dart.is_negative() {
            Some(Self::PayBack)
        } else {
            None
        }
    }

    pub fn kind(self) -> EventKind {
        match self {
            Self::Generate => EventKind::Generate,
            Self::PayBack => EventKind::PayBack,
        }
    }

    /// Adapter record for this direction: exit mints, join burns.
    fn adapter_signature(self) -> B256 {
        match self {
            Self::Generate => topics().dai_exit,
            Self::PayBack => topics().dai_join,
        }
    }
}

/// Direction of a savings movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SavingsDirection {
    Deposit,
    Withdraw,
}

impl SavingsDirection {
    pub fn kind(self) -> EventKind {
        match self {
            Self::Deposit => EventKind::DsrDeposit,
            Self::Withdraw => EventKind::DsrWithdraw,
        }
    }

    fn adapter_signature(self) -> B256 {
        match self {
            Self::Deposit => topics().dai_join,
            Self::Withdraw => topics().dai_exit,
        }
    }
}

/// Issues the secondary queries for one subject's primary records.
pub struct Correlator<'a> {
    source: &'a dyn RecordSource,
    contracts: &'a ContractAddresses,
}

impl<'a> Correlator<'a> {
    pub fn new(source: &'a dyn RecordSource, contracts: &'a ContractAddresses) -> Self {
        Self { source, contracts }
    }

    /// Correlate one position-manager debt change for `vault_id`.
    pub async fn debt_change(
        &self,
        vault_id: u64,
        primary: &RawLog,
        dart: I256,
    ) -> Result<Vec<PendingEvent>, HistoryError> {
        let Some(direction) = DebtDirection::from_delta(dart) else {
            return Ok(vec![]);
        };
        let proxy = topic_address(primary, 1).map_err(|e| mismatch(primary, e))?;
        let proxy_topic = address_topic(proxy);

        let adapter_filter = LogFilter::address(self.contracts.dai_join)
            .topic0(direction.adapter_signature())
            .topic(1, proxy_topic)
            .at_block(primary.block_number);
        let move_filter = LogFilter::address(self.contracts.cdp_manager)
            .topic0(topics().manager_move)
            .topic(1, proxy_topic)
            .topic(2, u256_topic(vault_id))
            .at_block(primary.block_number);

        let (adapter, moves) = futures::try_join!(
            self.source.query_records(&adapter_filter),
            self.source.query_records(&move_filter),
        )?;

        let moved: HashSet<B256> = moves.iter().map(|m| m.tx_hash).collect();
        let events = adapter
            .iter()
            .filter(|a| a.tx_hash == primary.tx_hash && moved.contains(&a.tx_hash))
            .map(|a| adapter_event(direction.kind(), primary, a, proxy))
            .collect::<Result<Vec<_>, _>>()?;

        if events.is_empty() {
            tracing::debug!(
                vault_id,
                block = primary.block_number,
                tx = %primary.tx_hash,
                adapter = adapter.len(),
                moves = moves.len(),
                "no adapter/move pair for debt change; dropping"
            );
        }
        Ok(events)
    }

    /// Correlate one savings-contract record.
    pub async fn savings(
        &self,
        primary: &RawLog,
        direction: SavingsDirection,
    ) -> Result<Vec<PendingEvent>, HistoryError> {
        let proxy = topic_address(primary, 1).map_err(|e| mismatch(primary, e))?;

        let adapter_filter = LogFilter::address(self.contracts.dai_join)
            .topic0(direction.adapter_signature())
            .topic(1, address_topic(proxy))
            .at_block(primary.block_number);
        let adapter = self.source.query_records(&adapter_filter).await?;

        let events = adapter
            .iter()
            .filter(|a| a.tx_hash == primary.tx_hash)
            .map(|a| adapter_event(direction.kind(), primary, a, proxy))
            .collect::<Result<Vec<_>, _>>()?;

        if events.is_empty() {
            tracing::debug!(
                block = primary.block_number,
                tx = %primary.tx_hash,
                "no adapter record for savings movement; dropping"
            );
        }
        Ok(events)
    }
}

fn adapter_event(
    kind: EventKind,
    primary: &RawLog,
    adapter: &RawLog,
    proxy: Address,
) -> Result<PendingEvent, HistoryError> {
    let wad = topic_uint(adapter, 3).map_err(|e| mismatch(adapter, e))?;
    Ok(PendingEvent::from_log(kind, primary)
        .with_amount(Amount::wad(wad, DAI))
        .with_counterparty(proxy))
}

fn mismatch(log: &RawLog, err: ShapeError) -> HistoryError {
    HistoryError::DecodeMismatch {
        record: "correlated".into(),
        tx_hash: log.tx_hash.to_string(),
        reason: err.to_string(),
    }
}
