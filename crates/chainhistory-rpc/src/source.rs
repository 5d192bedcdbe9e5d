//! `RpcRecordSource`: a [`RecordSource`] over a JSON-RPC node.
//!
//! - logs: `eth_getLogs`, split into chunks of at most `max_block_range`
//!   blocks; logs flagged `removed` (reorged out) are skipped
//! - timestamps: `eth_getBlockByNumber`
//! - urn handlers: `eth_call` of `urns(uint256)` on the position manager

use std::sync::atomic::{AtomicU64, Ordering};

use alloy_primitives::{Address, Bytes, B256, U64};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use chainhistory_core::{selector, ContractAddresses, LogFilter, RawLog, RecordSource, SourceError};

use crate::transport::RpcTransport;

/// Default maximum number of blocks per `eth_getLogs` request.
pub const DEFAULT_MAX_BLOCK_RANGE: u64 = 500_000;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcLog {
    address: Address,
    topics: Vec<B256>,
    data: Bytes,
    block_number: Option<U64>,
    transaction_hash: Option<B256>,
    log_index: Option<U64>,
    #[serde(default)]
    removed: bool,
}

impl RpcLog {
    /// `None` for removed or still-pending logs.
    fn into_raw(self) -> Option<RawLog> {
        if self.removed {
            return None;
        }
        Some(RawLog {
            emitter: self.address,
            topics: self.topics,
            data: self.data,
            block_number: self.block_number?.to::<u64>(),
            tx_hash: self.transaction_hash?,
            log_index: self.log_index?.to::<u64>(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct RpcBlock {
    timestamp: U64,
}

/// Record source backed by an [`RpcTransport`].
pub struct RpcRecordSource<T> {
    transport: T,
    cdp_manager: Address,
    max_block_range: u64,
    next_id: AtomicU64,
}

impl<T: RpcTransport> RpcRecordSource<T> {
    pub fn new(transport: T, contracts: &ContractAddresses) -> Self {
        Self {
            transport,
            cdp_manager: contracts.cdp_manager,
            max_block_range: DEFAULT_MAX_BLOCK_RANGE,
            next_id: AtomicU64::new(1),
        }
    }

    /// Cap each `eth_getLogs` request at `blocks` blocks (0 = no cap).
    pub fn with_max_block_range(mut self, blocks: u64) -> Self {
        self.max_block_range = blocks;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    async fn call<R: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<R, SourceError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        Ok(self.transport.call(id, method, params).await?)
    }

    async fn head(&self) -> Result<u64, SourceError> {
        let head: U64 = self.call("eth_blockNumber", vec![]).await?;
        Ok(head.to::<u64>())
    }

    async fn get_logs(&self, filter: &LogFilter, to: Value) -> Result<Vec<RawLog>, SourceError> {
        let address = match filter.addresses.as_slice() {
            [one] => json!(one),
            many => json!(many),
        };
        let params = json!({
            "address": address,
            "topics": filter.topics,
            "fromBlock": quantity(filter.from_block),
            "toBlock": to,
        });
        let logs: Vec<RpcLog> = self.call("eth_getLogs", vec![params]).await?;
        let total = logs.len();
        let kept: Vec<RawLog> = logs.into_iter().filter_map(RpcLog::into_raw).collect();
        if kept.len() < total {
            tracing::debug!(
                skipped = total - kept.len(),
                from = filter.from_block,
                "skipped removed or pending logs"
            );
        }
        Ok(kept)
    }
}

#[async_trait]
impl<T: RpcTransport> RecordSource for RpcRecordSource<T> {
    async fn query_records(&self, filter: &LogFilter) -> Result<Vec<RawLog>, SourceError> {
        if filter.is_empty_range() {
            return Ok(vec![]);
        }
        if self.max_block_range == 0 {
            let to = filter.to_block.map(quantity).unwrap_or_else(|| json!("latest"));
            return self.get_logs(filter, to).await;
        }

        let to = match filter.to_block {
            Some(to) => to,
            None => self.head().await?,
        };
        let mut logs = Vec::new();
        for (from, to) in block_chunks(filter.from_block, to, self.max_block_range) {
            let chunk = LogFilter {
                from_block: from,
                to_block: Some(to),
                ..filter.clone()
            };
            logs.extend(self.get_logs(&chunk, quantity(to)).await?);
        }
        logs.sort_by_key(|log| (log.block_number, log.log_index));
        Ok(logs)
    }

    async fn block_timestamp(&self, block_number: u64) -> Result<i64, SourceError> {
        let block: Option<RpcBlock> = self
            .call("eth_getBlockByNumber", vec![quantity(block_number), json!(false)])
            .await?;
        let block = block.ok_or(SourceError::BlockNotFound(block_number))?;
        i64::try_from(block.timestamp.to::<u64>())
            .map_err(|_| SourceError::Malformed(format!("timestamp of block {block_number} out of range")))
    }

    async fn resolve_handler(&self, vault_id: u64) -> Result<Option<Address>, SourceError> {
        let mut calldata = urns_selector().to_vec();
        calldata.extend_from_slice(&[0u8; 24]);
        calldata.extend_from_slice(&vault_id.to_be_bytes());

        let call = json!({
            "to": self.cdp_manager,
            "data": format!("0x{}", hex::encode(calldata)),
        });
        let ret: Bytes = self.call("eth_call", vec![call, json!("latest")]).await?;
        let word = ret
            .get(..32)
            .ok_or_else(|| SourceError::Malformed(format!("urns({vault_id}) returned {} bytes", ret.len())))?;
        let handler = Address::from_slice(&word[12..]);
        Ok((!handler.is_zero()).then_some(handler))
    }
}

/// Split `[from, to]` into consecutive inclusive ranges of at most `max` blocks.
pub fn block_chunks(from: u64, to: u64, max: u64) -> Vec<(u64, u64)> {
    let mut chunks = Vec::new();
    if to < from || max == 0 {
        return chunks;
    }
    let mut start = from;
    loop {
        let end = start.saturating_add(max - 1).min(to);
        chunks.push((start, end));
        if end == to {
            break;
        }
        start = end + 1;
    }
    chunks
}

fn quantity(n: u64) -> Value {
    json!(format!("{n:#x}"))
}

fn urns_selector() -> [u8; 4] {
    selector("urns(uint256)")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use chainhistory_core::network::mainnet;
    use chainhistory_core::NetworkProfile;

    use crate::error::TransportError;
    use crate::request::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};

    /// Replays canned results in order and records every request.
    #[derive(Default)]
    struct ScriptedTransport {
        replies: Mutex<VecDeque<Result<Value, JsonRpcError>>>,
        requests: Mutex<Vec<JsonRpcRequest>>,
    }

    impl ScriptedTransport {
        fn reply(self, result: Value) -> Self {
            self.replies.lock().unwrap().push_back(Ok(result));
            self
        }

        fn fail(self, message: &str) -> Self {
            self.replies.lock().unwrap().push_back(Err(JsonRpcError {
                code: -32000,
                message: message.into(),
                data: None,
            }));
            self
        }

        fn requests(&self) -> Vec<JsonRpcRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RpcTransport for ScriptedTransport {
        async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
            self.requests.lock().unwrap().push(req.clone());
            let next = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| TransportError::Other("script exhausted".into()))?;
            Ok(match next {
                Ok(result) => JsonRpcResponse::success(req.id, result),
                Err(error) => JsonRpcResponse {
                    jsonrpc: "2.0".into(),
                    id: req.id,
                    result: None,
                    error: Some(error),
                },
            })
        }

        fn url(&self) -> &str {
            "scripted"
        }
    }

    fn source(transport: ScriptedTransport) -> RpcRecordSource<ScriptedTransport> {
        RpcRecordSource::new(transport, &NetworkProfile::mainnet().contracts)
    }

    fn rpc_log(block: u64, index: u64, removed: bool) -> Value {
        json!({
            "address": format!("{:#x}", mainnet::VAT),
            "topics": [format!("{:#x}", B256::repeat_byte(0x01))],
            "data": "0x",
            "blockNumber": format!("{block:#x}"),
            "transactionHash": format!("{:#x}", B256::repeat_byte(block as u8)),
            "logIndex": format!("{index:#x}"),
            "removed": removed,
        })
    }

    #[test]
    fn chunks_cover_range_exactly() {
        assert_eq!(block_chunks(100, 250, 100), vec![(100, 199), (200, 250)]);
        assert_eq!(block_chunks(5, 5, 10), vec![(5, 5)]);
        assert!(block_chunks(10, 5, 10).is_empty());
        assert_eq!(block_chunks(0, u64::MAX, u64::MAX).len(), 2);
    }

    #[tokio::test]
    async fn get_logs_split_and_removed_skipped() {
        let transport = ScriptedTransport::default()
            .reply(json!([rpc_log(150, 1, false)]))
            .reply(json!([rpc_log(220, 0, false), rpc_log(230, 0, true)]));
        let src = source(transport).with_max_block_range(100);

        let filter = LogFilter::address(mainnet::VAT).from_block(100).to_block(250);
        let logs = src.query_records(&filter).await.unwrap();
        let blocks: Vec<_> = logs.iter().map(|l| l.block_number).collect();
        assert_eq!(blocks, vec![150, 220]);

        let requests = src.transport().requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].method, "eth_getLogs");
        assert_eq!(requests[0].params[0]["fromBlock"], "0x64");
        assert_eq!(requests[0].params[0]["toBlock"], "0xc7");
        assert_eq!(requests[1].params[0]["fromBlock"], "0xc8");
        assert_eq!(requests[1].params[0]["toBlock"], "0xfa");
    }

    #[tokio::test]
    async fn open_range_resolves_head_first() {
        let transport = ScriptedTransport::default()
            .reply(json!("0x12c"))
            .reply(json!([]));
        let src = source(transport);

        let filter = LogFilter::address(mainnet::VAT).from_block(100);
        assert!(src.query_records(&filter).await.unwrap().is_empty());

        let requests = src.transport().requests();
        assert_eq!(requests[0].method, "eth_blockNumber");
        assert_eq!(requests[1].params[0]["toBlock"], "0x12c");
    }

    #[tokio::test]
    async fn empty_range_issues_no_request() {
        let src = source(ScriptedTransport::default());
        let filter = LogFilter::address(mainnet::VAT).from_block(10).to_block(5);
        assert!(src.query_records(&filter).await.unwrap().is_empty());
        assert!(src.transport().requests().is_empty());
    }

    #[tokio::test]
    async fn block_timestamp_and_missing_block() {
        let transport = ScriptedTransport::default()
            .reply(json!({ "number": "0x64", "timestamp": "0x5f5e1000" }))
            .reply(Value::Null);
        let src = source(transport);

        assert_eq!(src.block_timestamp(100).await.unwrap(), 0x5f5e1000);
        assert_eq!(
            src.block_timestamp(101).await.unwrap_err(),
            SourceError::BlockNotFound(101)
        );
    }

    #[tokio::test]
    async fn resolve_handler_decodes_word() {
        let urn = Address::repeat_byte(0x11);
        let transport = ScriptedTransport::default()
            .reply(json!(format!("{:#x}", urn.into_word())))
            .reply(json!(format!("{:#x}", B256::ZERO)));
        let src = source(transport);

        assert_eq!(src.resolve_handler(7).await.unwrap(), Some(urn));
        assert_eq!(src.resolve_handler(8).await.unwrap(), None);

        let requests = src.transport().requests();
        let data = requests[0].params[0]["data"].as_str().unwrap();
        assert!(data.starts_with(&format!("0x{}", hex::encode(urns_selector()))));
        assert!(data.ends_with("07"));
    }

    #[tokio::test]
    async fn node_error_is_request_error() {
        let src = source(ScriptedTransport::default().fail("header not found"));
        let err = src.block_timestamp(1).await.unwrap_err();
        assert!(matches!(err, SourceError::Request(ref m) if m.contains("header not found")));
    }
}
