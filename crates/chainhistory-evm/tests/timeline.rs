//! Timeline reconstruction integration tests.
//!
//! Each test seeds a `MemorySource` with the raw logs a real vault or
//! savings flow would emit, runs `EventHistory` over it and checks the
//! resulting timeline plus the number of source calls it cost.

use std::sync::Arc;

use alloy_primitives::{Address, Bytes, B256, I256, U256};
use chainhistory_core::network::mainnet;
use chainhistory_core::{
    address_topic, u256_topic, CutoverKind, EmitterCutover, EventKind, HistoryError,
    MemorySource, NetworkProfile, ProtocolWindow, RawLog, Subject,
};
use chainhistory_evm::topics::{note_selector, topics};
use chainhistory_evm::EventHistory;

// ─── Helpers ──────────────────────────────────────────────────────────────────

const GENESIS: i64 = 1_600_000_000;
const BLOCK_TIME: i64 = 15;
const CUTOVER: u64 = 200;

const VAULT: u64 = 7;

fn urn() -> Address {
    Address::repeat_byte(0x11)
}

fn proxy() -> Address {
    Address::repeat_byte(0x22)
}

fn owner() -> Address {
    Address::repeat_byte(0x33)
}

fn auction() -> Address {
    Address::repeat_byte(0x44)
}

fn tx(n: u8) -> B256 {
    B256::repeat_byte(n)
}

/// Mainnet contracts with a short history: scans start at block 1 and the
/// liquidator switches at block 200.
fn profile() -> NetworkProfile {
    let mut profile = NetworkProfile::mainnet();
    profile.window = Some(ProtocolWindow {
        scan_start_block: 1,
        cutovers: vec![EmitterCutover {
            kind: CutoverKind::Liquidation,
            block: CUTOVER,
            before: mainnet::CAT_V1,
            after: mainnet::CAT_V2,
        }],
    });
    profile
}

fn setup() -> (Arc<MemorySource>, EventHistory) {
    let src = Arc::new(MemorySource::new().with_block_time(GENESIS, BLOCK_TIME));
    src.set_handler(VAULT, urn());
    let history = EventHistory::new(src.clone(), profile());
    (src, history)
}

fn int_word(v: i64) -> [u8; 32] {
    I256::try_from(v).unwrap().into_raw().to_be_bytes::<32>()
}

fn uint_word(v: u64) -> [u8; 32] {
    U256::from(v).to_be_bytes::<32>()
}

fn ilk(name: &str) -> B256 {
    let mut word = [0u8; 32];
    word[..name.len()].copy_from_slice(name.as_bytes());
    B256::from(word)
}

/// Calldata wrapped as a note payload: offset, length, selector + args.
fn note_data(signature: &B256, args: &[[u8; 32]]) -> Bytes {
    let mut calldata = note_selector(signature).to_vec();
    for a in args {
        calldata.extend_from_slice(a);
    }
    let len = calldata.len().max(224);
    calldata.resize(len, 0);

    let mut data = uint_word(32).to_vec();
    data.extend_from_slice(&uint_word(len as u64));
    data.extend_from_slice(&calldata);
    Bytes::from(data)
}

fn log(
    emitter: Address,
    topics: Vec<B256>,
    data: Bytes,
    block: u64,
    tx_hash: B256,
    index: u64,
) -> RawLog {
    RawLog {
        emitter,
        topics,
        data,
        block_number: block,
        tx_hash,
        log_index: index,
    }
}

fn new_cdp(creator: Address, vault: u64, block: u64, tx_hash: B256, index: u64) -> RawLog {
    log(
        mainnet::CDP_MANAGER,
        vec![
            topics().new_cdp,
            address_topic(creator),
            address_topic(owner()),
            u256_topic(vault),
        ],
        Bytes::new(),
        block,
        tx_hash,
        index,
    )
}

fn vat_frob(urn: Address, dink: i64, dart: i64, block: u64, tx_hash: B256, index: u64) -> RawLog {
    let sig = topics().vat_frob;
    let ilk = ilk("ETH-A");
    log(
        mainnet::VAT,
        vec![sig, ilk, address_topic(urn), address_topic(urn)],
        note_data(
            &sig,
            &[
                ilk.0,
                urn.into_word().0,
                urn.into_word().0,
                urn.into_word().0,
                int_word(dink),
                int_word(dart),
            ],
        ),
        block,
        tx_hash,
        index,
    )
}

fn manager_frob(vault: u64, dart: i64, block: u64, tx_hash: B256, index: u64) -> RawLog {
    let sig = topics().manager_frob;
    log(
        mainnet::CDP_MANAGER,
        vec![sig, address_topic(proxy()), u256_topic(vault), B256::from(int_word(0))],
        note_data(&sig, &[uint_word(vault), int_word(0), int_word(dart)]),
        block,
        tx_hash,
        index,
    )
}

fn manager_move(vault: u64, block: u64, tx_hash: B256, index: u64) -> RawLog {
    log(
        mainnet::CDP_MANAGER,
        vec![
            topics().manager_move,
            address_topic(proxy()),
            u256_topic(vault),
            address_topic(proxy()),
        ],
        Bytes::new(),
        block,
        tx_hash,
        index,
    )
}

fn adapter(signature: B256, wad: u64, block: u64, tx_hash: B256, index: u64) -> RawLog {
    log(
        mainnet::DAI_JOIN,
        vec![signature, address_topic(proxy()), address_topic(proxy()), u256_topic(wad)],
        Bytes::new(),
        block,
        tx_hash,
        index,
    )
}

fn pot(signature: B256, account: Address, block: u64, tx_hash: B256, index: u64) -> RawLog {
    log(
        mainnet::POT,
        vec![signature, address_topic(account), u256_topic(1)],
        Bytes::new(),
        block,
        tx_hash,
        index,
    )
}

fn bite(emitter: Address, ink: u64, block: u64, tx_hash: B256, index: u64) -> RawLog {
    let mut data = Vec::new();
    for w in [
        uint_word(ink),
        uint_word(100),
        uint_word(113),
        auction().into_word().0,
        uint_word(1),
    ] {
        data.extend_from_slice(&w);
    }
    log(
        emitter,
        vec![topics().bite, ilk("ETH-A"), address_topic(urn())],
        Bytes::from(data),
        block,
        tx_hash,
        index,
    )
}

fn block_kinds(timeline: &chainhistory_core::Timeline) -> Vec<(EventKind, u64)> {
    timeline
        .iter()
        .map(|e| (e.kind, e.block_number))
        .collect()
}

// ─── Scenarios ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn single_creation_record() {
    let (src, history) = setup();
    src.insert_log(new_cdp(proxy(), VAULT, 100, tx(1), 0));

    let timeline = history.vault(VAULT).await.unwrap();
    assert_eq!(timeline.subject, Subject::Vault(VAULT));
    assert_eq!(block_kinds(&timeline), vec![(EventKind::Create, 100)]);

    let event = &timeline.events[0];
    assert_eq!(event.subject, Subject::Vault(VAULT));
    assert_eq!(event.counterparty, Some(owner()));
    assert_eq!(event.timestamp, GENESIS + 100 * BLOCK_TIME);
}

#[tokio::test]
async fn same_block_events_follow_order_rank() {
    let (src, history) = setup();
    let t1 = tx(1);
    src.extend_logs([
        new_cdp(proxy(), VAULT, 100, t1, 0),
        vat_frob(urn(), 2_000, 500, 100, t1, 1),
        manager_frob(VAULT, 500, 100, t1, 2),
        manager_move(VAULT, 100, t1, 3),
        adapter(topics().dai_exit, 500, 100, t1, 4),
        vat_frob(urn(), -700, 0, 105, tx(2), 0),
    ]);

    let timeline = history.vault(VAULT).await.unwrap();
    assert_eq!(
        block_kinds(&timeline),
        vec![
            (EventKind::Withdraw, 105),
            (EventKind::Generate, 100),
            (EventKind::Deposit, 100),
            (EventKind::Create, 100),
        ]
    );

    let withdraw = &timeline.events[0];
    let amount = withdraw.amount.as_ref().unwrap();
    assert_eq!(amount.value, U256::from(700u64));
    assert_eq!(amount.currency, "ETH");

    let generate = &timeline.events[1];
    let amount = generate.amount.as_ref().unwrap();
    assert_eq!(amount.value, U256::from(500u64));
    assert_eq!(amount.currency, "DAI");
    assert_eq!(generate.counterparty, Some(proxy()));
    assert_eq!(generate.tx_hash, t1);
}

#[tokio::test]
async fn equal_rank_events_keep_discovery_order() {
    let (src, history) = setup();
    src.extend_logs([
        vat_frob(urn(), 30, 0, 100, tx(1), 7),
        vat_frob(urn(), 10, 0, 100, tx(2), 1),
        vat_frob(urn(), 20, 0, 100, tx(3), 4),
    ]);

    let timeline = history.vault(VAULT).await.unwrap();
    let order: Vec<(u64, U256)> = timeline
        .iter()
        .map(|e| {
            assert_eq!((e.kind, e.block_number), (EventKind::Deposit, 100));
            (e.log_index, e.amount.as_ref().unwrap().value)
        })
        .collect();
    assert_eq!(
        order,
        vec![
            (1, U256::from(10u64)),
            (4, U256::from(20u64)),
            (7, U256::from(30u64)),
        ]
    );
}

#[tokio::test]
async fn liquidations_respect_emitter_window() {
    let (src, history) = setup();
    src.extend_logs([
        // before the cutover: only the old liquidator counts
        bite(mainnet::CAT_V1, 3, 150, tx(1), 0),
        bite(mainnet::CAT_V2, 4, 151, tx(2), 0),
        // on/after the cutover: only the new one
        bite(mainnet::CAT_V1, 5, 250, tx(3), 0),
        bite(mainnet::CAT_V2, 6, 251, tx(4), 0),
    ]);

    let timeline = history.vault(VAULT).await.unwrap();
    assert_eq!(
        block_kinds(&timeline),
        vec![(EventKind::Liquidate, 251), (EventKind::Liquidate, 150)]
    );
    let seized: Vec<_> = timeline
        .iter()
        .map(|e| e.amount.as_ref().unwrap().value)
        .collect();
    assert_eq!(seized, vec![U256::from(6u64), U256::from(3u64)]);
    assert!(timeline.iter().all(|e| e.counterparty == Some(auction())));
}

// ─── Caching ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn repeated_reconstruct_is_cached() {
    let (src, history) = setup();
    src.insert_log(new_cdp(proxy(), VAULT, 100, tx(1), 0));

    let first = history.vault(VAULT).await.unwrap();
    let calls = src.total_calls();
    assert!(calls > 0);

    let second = history.vault(VAULT).await.unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(src.total_calls(), calls);
}

#[tokio::test]
async fn concurrent_calls_share_one_computation() {
    let (src, history) = setup();
    src.insert_log(new_cdp(proxy(), VAULT, 100, tx(1), 0));

    let (a, b) = tokio::join!(history.vault(VAULT), history.vault(VAULT));
    assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
    assert_eq!(src.handler_query_count(), 1);
}

#[tokio::test]
async fn invalidate_picks_up_new_records() {
    let (src, history) = setup();
    src.insert_log(new_cdp(proxy(), VAULT, 100, tx(1), 0));
    let before = history.vault(VAULT).await.unwrap();
    assert_eq!(before.len(), 1);

    src.insert_log(vat_frob(urn(), 10, 0, 120, tx(2), 0));
    assert_eq!(history.vault(VAULT).await.unwrap().len(), 1);

    assert!(history.invalidate(&Subject::Vault(VAULT)));
    let after = history.vault(VAULT).await.unwrap();
    assert_eq!(
        block_kinds(&after),
        vec![(EventKind::Deposit, 120), (EventKind::Create, 100)]
    );

    history.invalidate_all();
    assert_eq!(history.cached_timelines(), 0);
    assert_eq!(history.cached_timestamps(), 0);
}

#[tokio::test]
async fn timestamps_resolved_once_per_block_across_subjects() {
    let (src, history) = setup();
    src.set_handler(8, Address::repeat_byte(0x55));
    src.extend_logs([
        new_cdp(proxy(), VAULT, 100, tx(1), 0),
        vat_frob(urn(), 10, 0, 100, tx(1), 1),
        new_cdp(proxy(), 8, 100, tx(2), 2),
    ]);

    assert_eq!(history.vault(VAULT).await.unwrap().len(), 2);
    assert_eq!(src.timestamp_query_count(), 1);

    assert_eq!(history.vault(8).await.unwrap().len(), 1);
    assert_eq!(src.timestamp_query_count(), 1);
}

// ─── Edge cases ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn subject_without_records_is_empty() {
    let (_src, history) = setup();
    let timeline = history.vault(VAULT).await.unwrap();
    assert!(timeline.is_empty());

    let savings = history.savings(Address::repeat_byte(0x66)).await.unwrap();
    assert!(savings.is_empty());
}

#[tokio::test]
async fn unmatched_debt_change_is_dropped() {
    let (src, history) = setup();
    src.extend_logs([
        new_cdp(proxy(), VAULT, 100, tx(1), 0),
        // adapter record present but no move record
        manager_frob(VAULT, 500, 110, tx(2), 0),
        adapter(topics().dai_exit, 500, 110, tx(2), 1),
        // move record present but adapter record in another tx
        manager_frob(VAULT, 300, 120, tx(3), 0),
        manager_move(VAULT, 120, tx(3), 1),
        adapter(topics().dai_exit, 300, 120, tx(4), 0),
        manager_move(VAULT, 120, tx(4), 1),
    ]);

    let timeline = history.vault(VAULT).await.unwrap();
    assert_eq!(block_kinds(&timeline), vec![(EventKind::Create, 100)]);
}

#[tokio::test]
async fn pay_back_uses_adapter_amount() {
    let (src, history) = setup();
    src.extend_logs([
        manager_frob(VAULT, -250, 130, tx(5), 0),
        manager_move(VAULT, 130, tx(5), 1),
        adapter(topics().dai_join, 260, 130, tx(5), 2),
    ]);

    let timeline = history.vault(VAULT).await.unwrap();
    assert_eq!(block_kinds(&timeline), vec![(EventKind::PayBack, 130)]);
    let amount = timeline.events[0].amount.as_ref().unwrap();
    assert_eq!(amount.value, U256::from(260u64));
}

#[tokio::test]
async fn migrated_vault_and_transfer() {
    let (src, history) = setup();
    let new_owner = Address::repeat_byte(0x77);
    src.extend_logs([
        new_cdp(mainnet::MIGRATION, VAULT, 100, tx(1), 0),
        log(
            mainnet::CDP_MANAGER,
            vec![
                topics().give,
                address_topic(proxy()),
                u256_topic(VAULT),
                address_topic(new_owner),
            ],
            Bytes::new(),
            140,
            tx(2),
            0,
        ),
    ]);

    let timeline = history.vault(VAULT).await.unwrap();
    assert_eq!(
        block_kinds(&timeline),
        vec![(EventKind::Transfer, 140), (EventKind::Migrate, 100)]
    );
    assert_eq!(timeline.events[0].counterparty, Some(new_owner));
}

#[tokio::test]
async fn savings_flow() {
    let (src, history) = setup();
    let account = proxy();
    src.extend_logs([
        pot(topics().pot_join, account, 300, tx(1), 0),
        adapter(topics().dai_join, 1_000, 300, tx(1), 1),
        pot(topics().pot_exit, account, 310, tx(2), 0),
        adapter(topics().dai_exit, 400, 310, tx(2), 1),
        // no adapter record in this tx
        pot(topics().pot_join, account, 320, tx(3), 0),
        adapter(topics().dai_join, 50, 320, tx(9), 1),
    ]);

    let timeline = history.savings(account).await.unwrap();
    assert_eq!(
        block_kinds(&timeline),
        vec![(EventKind::DsrWithdraw, 310), (EventKind::DsrDeposit, 300)]
    );
    let amounts: Vec<_> = timeline
        .iter()
        .map(|e| e.amount.as_ref().unwrap().value)
        .collect();
    assert_eq!(amounts, vec![U256::from(400u64), U256::from(1_000u64)]);
}

// ─── Errors ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn unresolved_handler_issues_no_lookups() {
    let (src, history) = setup();
    let err = history.vault(99).await.unwrap_err();
    assert_eq!(err, HistoryError::HandlerUnresolved { vault_id: 99 });
    assert_eq!(src.query_count(), 0);
    assert_eq!(history.cached_timelines(), 0);
}

#[tokio::test]
async fn source_failure_is_not_cached() {
    let (src, history) = setup();
    src.insert_log(new_cdp(proxy(), VAULT, 100, tx(1), 0));

    src.set_failing(true);
    let err = history.vault(VAULT).await.unwrap_err();
    assert!(err.is_transient());
    assert_eq!(history.cached_timelines(), 0);

    src.set_failing(false);
    let timeline = history.vault(VAULT).await.unwrap();
    assert_eq!(timeline.len(), 1);
}

#[tokio::test]
async fn malformed_payload_fails_reconstruction() {
    let (src, history) = setup();
    let mut broken = vat_frob(urn(), 10, 0, 100, tx(1), 0);
    broken.data = Bytes::from(vec![0u8; 40]);
    src.insert_log(broken);

    let err = history.vault(VAULT).await.unwrap_err();
    assert!(matches!(err, HistoryError::DecodeMismatch { .. }));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn unknown_network_is_rejected() {
    let src = Arc::new(MemorySource::new());
    let err = EventHistory::for_network(src.clone(), "kovan").err().unwrap();
    assert_eq!(err, HistoryError::UnknownNetwork("kovan".into()));
    assert!(EventHistory::for_network(src, "1").is_ok());
}
