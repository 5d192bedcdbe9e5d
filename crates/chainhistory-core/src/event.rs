//! Domain event model: subjects, event kinds, amounts and timelines.

use alloy_primitives::{Address, B256, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Subject ─────────────────────────────────────────────────────────────────

/// The position whose history is reconstructed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum Subject {
    /// A collateralized vault, identified by its numeric position-manager id.
    Vault(u64),
    /// A savings account, identified by the proxy address that holds it.
    Savings(Address),
}

impl std::fmt::Display for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Vault(id) => write!(f, "vault:{id}"),
            Self::Savings(addr) => write!(f, "savings:{addr:#x}"),
        }
    }
}

// ─── EventKind ───────────────────────────────────────────────────────────────

/// Every domain event the engine can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    Create,
    Deposit,
    Withdraw,
    Generate,
    PayBack,
    Transfer,
    Migrate,
    Liquidate,
    DsrDeposit,
    DsrWithdraw,
}

impl EventKind {
    /// Tie-break rank for events sharing a block; higher ranks happened
    /// later inside a transaction and sort first.
    pub fn order_rank(self) -> u8 {
        match self {
            Self::Create | Self::Migrate => 0,
            Self::Deposit => 1,
            Self::Generate | Self::PayBack => 2,
            Self::Withdraw => 3,
            Self::Transfer => 4,
            Self::Liquidate => 5,
            Self::DsrDeposit => 0,
            Self::DsrWithdraw => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Deposit => "DEPOSIT",
            Self::Withdraw => "WITHDRAW",
            Self::Generate => "GENERATE",
            Self::PayBack => "PAY_BACK",
            Self::Transfer => "TRANSFER",
            Self::Migrate => "MIGRATE",
            Self::Liquidate => "LIQUIDATE",
            Self::DsrDeposit => "DSR_DEPOSIT",
            Self::DsrWithdraw => "DSR_WITHDRAW",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Amount ──────────────────────────────────────────────────────────────────

/// A raw on-chain quantity tagged with its currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amount {
    /// Quantity in base units.
    pub value: U256,
    /// Number of decimals `value` is scaled by.
    pub decimals: u8,
    /// Currency symbol, e.g. `"DAI"` or `"ETH"`.
    pub currency: String,
}

impl Amount {
    /// An 18-decimal (wad) amount.
    pub fn wad(value: U256, currency: impl Into<String>) -> Self {
        Self {
            value,
            decimals: 18,
            currency: currency.into(),
        }
    }

    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }
}

impl std::fmt::Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let unit = U256::from(10u64).pow(U256::from(self.decimals));
        let whole = self.value / unit;
        let frac = self.value % unit;
        if frac.is_zero() {
            return write!(f, "{whole} {}", self.currency);
        }
        let digits = format!("{:0>width$}", frac.to_string(), width = self.decimals as usize);
        write!(f, "{whole}.{} {}", digits.trim_end_matches('0'), self.currency)
    }
}

// ─── HistoryEvent ────────────────────────────────────────────────────────────

/// One entry of a reconstructed timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEvent {
    pub kind: EventKind,
    pub block_number: u64,
    pub tx_hash: B256,
    /// Log index of the record that produced the event.
    pub log_index: u64,
    pub subject: Subject,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Amount>,
    /// Owner, proxy or auction the event involves, depending on the kind.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counterparty: Option<Address>,
    /// Block timestamp (unix seconds).
    pub timestamp: i64,
}

impl HistoryEvent {
    /// The block timestamp as a UTC datetime.
    pub fn time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.timestamp, 0)
    }
}

// ─── Timeline ────────────────────────────────────────────────────────────────

/// Newest-first history of one subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeline {
    pub subject: Subject,
    pub events: Vec<HistoryEvent>,
}

impl Timeline {
    pub fn empty(subject: Subject) -> Self {
        Self {
            subject,
            events: vec![],
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, HistoryEvent> {
        self.events.iter()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amount_display_trims_fraction() {
        let one_and_half = U256::from(1_500_000_000_000_000_000u128);
        assert_eq!(Amount::wad(one_and_half, "DAI").to_string(), "1.5 DAI");
        assert_eq!(
            Amount::wad(U256::from(2_000_000_000_000_000_000u128), "ETH").to_string(),
            "2 ETH"
        );
        assert_eq!(Amount::wad(U256::from(1u64), "DAI").to_string(), "0.000000000000000001 DAI");
    }

    #[test]
    fn kind_serializes_screaming_snake() {
        let json = serde_json::to_string(&EventKind::PayBack).unwrap();
        assert_eq!(json, "\"PAY_BACK\"");
        let json = serde_json::to_string(&EventKind::DsrWithdraw).unwrap();
        assert_eq!(json, "\"DSR_WITHDRAW\"");
    }

    #[test]
    fn same_transaction_ranks() {
        // lock-and-draw: create, deposit, then generate
        assert!(EventKind::Generate.order_rank() > EventKind::Deposit.order_rank());
        assert!(EventKind::Deposit.order_rank() > EventKind::Create.order_rank());
        // wipe-and-free: pay back, then withdraw
        assert!(EventKind::Withdraw.order_rank() > EventKind::PayBack.order_rank());
    }

    #[test]
    fn subject_display() {
        assert_eq!(Subject::Vault(7).to_string(), "vault:7");
        let s = Subject::Savings(Address::repeat_byte(0xab)).to_string();
        assert!(s.starts_with("savings:0xabab"));
    }

    #[test]
    fn event_time_from_timestamp() {
        let event = HistoryEvent {
            kind: EventKind::Create,
            block_number: 1,
            tx_hash: B256::ZERO,
            log_index: 0,
            subject: Subject::Vault(1),
            amount: None,
            counterparty: None,
            timestamp: 1_600_000_000,
        };
        assert_eq!(event.time().unwrap().timestamp(), 1_600_000_000);
    }
}
