//! Payload decoders, one per record shape.
//!
//! Notes (anonymous call logs) wrap the call's calldata in an ABI `bytes`
//! envelope: an offset word, a length word, then the calldata itself
//! (4-byte selector + 32-byte argument words, zero padded). The decoders
//! strip the envelope and the selector, check the selector against the
//! record's `topics[0]`, and ABI-decode exactly the argument words they need.
//!
//! Signed deltas are two's-complement `int256` words.

use alloy_core::dyn_abi::{DynSolType, DynSolValue};
use alloy_primitives::{Address, B256, I256, U256};
use chainhistory_core::RawLog;
use thiserror::Error;

use crate::topics::{note_selector, topics};

const WORD: usize = 32;
/// Offset word + length word in front of a note's calldata.
const NOTE_HEADER: usize = 2 * WORD;
const SELECTOR: usize = 4;

/// A payload or topic that does not match its expected shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ShapeError(pub String);

impl ShapeError {
    fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// Position-manager debt/collateral change: `frob(uint256,int256,int256)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerFrob {
    pub vault_id: U256,
    pub dink: I256,
    pub dart: I256,
}

/// Core accounting change: `frob(bytes32,address,address,address,int256,int256)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VatFrob {
    /// Collateral type, e.g. `"ETH-A"` right-padded with zeros.
    pub ilk: B256,
    pub urn: Address,
    /// Where collateral is taken from / sent to.
    pub collateral_src: Address,
    /// Where internal stablecoin balance is sent to / taken from.
    pub dai_dst: Address,
    pub dink: I256,
    pub dart: I256,
}

/// Liquidation: `Bite(bytes32,address,uint256,uint256,uint256,address,uint256)`
/// non-indexed part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bite {
    /// Collateral seized.
    pub ink: U256,
    /// Normalized debt covered.
    pub art: U256,
    /// Debt plus penalty sent to auction.
    pub tab: U256,
    /// Auction contract handling the seized collateral.
    pub auction: Address,
    pub auction_id: U256,
}

/// Decode the 3-field position-manager note.
pub fn decode_manager_frob(data: &[u8]) -> Result<ManagerFrob, ShapeError> {
    let args = note_args(data, &topics().manager_frob, 3)?;
    let values = decode_tuple(
        args,
        vec![DynSolType::Uint(256), DynSolType::Int(256), DynSolType::Int(256)],
    )?;
    let [vault_id, dink, dart] = values.as_slice() else {
        return Err(ShapeError::new("expected 3 fields"));
    };
    Ok(ManagerFrob {
        vault_id: uint(vault_id)?,
        dink: int(dink)?,
        dart: int(dart)?,
    })
}

/// Decode the 6-field core-accounting note.
pub fn decode_vat_frob(data: &[u8]) -> Result<VatFrob, ShapeError> {
    let args = note_args(data, &topics().vat_frob, 6)?;
    let values = decode_tuple(
        args,
        vec![
            DynSolType::FixedBytes(32),
            DynSolType::Address,
            DynSolType::Address,
            DynSolType::Address,
            DynSolType::Int(256),
            DynSolType::Int(256),
        ],
    )?;
    let [ilk, urn, src, dst, dink, dart] = values.as_slice() else {
        return Err(ShapeError::new("expected 6 fields"));
    };
    Ok(VatFrob {
        ilk: word(ilk)?,
        urn: address(urn)?,
        collateral_src: address(src)?,
        dai_dst: address(dst)?,
        dink: int(dink)?,
        dart: int(dart)?,
    })
}

/// Decode a liquidation event payload (plain ABI, no envelope).
pub fn decode_bite(data: &[u8]) -> Result<Bite, ShapeError> {
    let args = data
        .get(..5 * WORD)
        .ok_or_else(|| ShapeError::new(format!("payload has {} bytes, need {}", data.len(), 5 * WORD)))?;
    let values = decode_tuple(
        args,
        vec![
            DynSolType::Uint(256),
            DynSolType::Uint(256),
            DynSolType::Uint(256),
            DynSolType::Address,
            DynSolType::Uint(256),
        ],
    )?;
    let [ink, art, tab, auction, id] = values.as_slice() else {
        return Err(ShapeError::new("expected 5 fields"));
    };
    Ok(Bite {
        ink: uint(ink)?,
        art: uint(art)?,
        tab: uint(tab)?,
        auction: address(auction)?,
        auction_id: uint(id)?,
    })
}

/// Read an indexed address (left-padded word) from `topics[index]`.
pub fn topic_address(log: &RawLog, index: usize) -> Result<Address, ShapeError> {
    let topic = log
        .topic(index)
        .ok_or_else(|| ShapeError::new(format!("missing topic {index}")))?;
    if topic[..12].iter().any(|b| *b != 0) {
        return Err(ShapeError::new(format!("topic {index} is not an address")));
    }
    Ok(Address::from_word(*topic))
}

/// Read an indexed unsigned integer from `topics[index]`.
pub fn topic_uint(log: &RawLog, index: usize) -> Result<U256, ShapeError> {
    log.topic(index)
        .map(|t| U256::from_be_slice(t.as_slice()))
        .ok_or_else(|| ShapeError::new(format!("missing topic {index}")))
}

/// Read an indexed raw word from `topics[index]`.
pub fn topic_word(log: &RawLog, index: usize) -> Result<B256, ShapeError> {
    log.topic(index)
        .copied()
        .ok_or_else(|| ShapeError::new(format!("missing topic {index}")))
}

/// The collateral type name, e.g. `"ETH-A"`.
pub fn ilk_name(ilk: &B256) -> String {
    let end = ilk.iter().position(|b| *b == 0).unwrap_or(ilk.len());
    String::from_utf8_lossy(&ilk[..end]).into_owned()
}

/// The currency of a collateral type: the part of its name before `-`.
pub fn collateral_currency(ilk: &B256) -> String {
    let name = ilk_name(ilk);
    match name.split_once('-') {
        Some((currency, _)) => currency.to_string(),
        None => name,
    }
}

// ─── helpers ─────────────────────────────────────────────────────────────────

fn note_args<'a>(data: &'a [u8], signature: &B256, words: usize) -> Result<&'a [u8], ShapeError> {
    if data.len() < NOTE_HEADER {
        return Err(ShapeError::new(format!(
            "payload has {} bytes, shorter than the note header",
            data.len()
        )));
    }
    let len_word = &data[WORD..NOTE_HEADER];
    if len_word[..WORD - 8].iter().any(|b| *b != 0) {
        return Err(ShapeError::new("calldata length out of range"));
    }
    let mut len_bytes = [0u8; 8];
    len_bytes.copy_from_slice(&len_word[WORD - 8..]);
    let len = usize::try_from(u64::from_be_bytes(len_bytes))
        .map_err(|_| ShapeError::new("calldata length out of range"))?;

    let calldata = NOTE_HEADER
        .checked_add(len)
        .and_then(|end| data.get(NOTE_HEADER..end))
        .ok_or_else(|| ShapeError::new(format!("calldata length {len} exceeds payload")))?;

    let needed = SELECTOR + words * WORD;
    if calldata.len() < needed {
        return Err(ShapeError::new(format!(
            "calldata has {} bytes, need {needed}",
            calldata.len()
        )));
    }
    if calldata[..SELECTOR] != note_selector(signature) {
        return Err(ShapeError::new("selector does not match record signature"));
    }
    Ok(&calldata[SELECTOR..needed])
}

fn decode_tuple(bytes: &[u8], types: Vec<DynSolType>) -> Result<Vec<DynSolValue>, ShapeError> {
    match DynSolType::Tuple(types).abi_decode(bytes) {
        Ok(DynSolValue::Tuple(values)) => Ok(values),
        Ok(other) => Ok(vec![other]),
        Err(e) => Err(ShapeError::new(format!("abi decode failed: {e}"))),
    }
}

fn uint(v: &DynSolValue) -> Result<U256, ShapeError> {
    match v {
        DynSolValue::Uint(u, _) => Ok(*u),
        other => Err(ShapeError::new(format!("expected uint, got {other:?}"))),
    }
}

fn int(v: &DynSolValue) -> Result<I256, ShapeError> {
    match v {
        DynSolValue::Int(i, _) => Ok(*i),
        other => Err(ShapeError::new(format!("expected int, got {other:?}"))),
    }
}

fn address(v: &DynSolValue) -> Result<Address, ShapeError> {
    match v {
        DynSolValue::Address(a) => Ok(*a),
        other => Err(ShapeError::new(format!("expected address, got {other:?}"))),
    }
}

fn word(v: &DynSolValue) -> Result<B256, ShapeError> {
    match v {
        DynSolValue::FixedBytes(w, _) => Ok(*w),
        other => Err(ShapeError::new(format!("expected bytes32, got {other:?}"))),
    }
}
