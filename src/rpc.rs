use std::future::Future;
use std::time::Instant;

use alloy::eips::BlockNumberOrTag;
use alloy_provider::{Provider as ProviderTrait, RootProvider as AlloyProvider};
use serde_json::{Value, json};
use url::Url;

use crate::data::{BlockInfo, BlockSummary, GasReading, RollupBatchInfo};
use crate::error::{FetchError, FetchResult};
use crate::network::Network;

/// Read access to a chain endpoint. Implemented by the live client and by
/// the test mocks.
pub trait ChainReader: Send + Sync + 'static {
    fn network(&self) -> Network;

    /// Human-readable endpoint, shown in the dashboard.
    fn endpoint(&self) -> String;

    fn gas_price(&self) -> impl Future<Output = FetchResult<u128>> + Send;

    fn block_number(&self) -> impl Future<Output = FetchResult<u64>> + Send;

    fn block_summary(&self, number: u64) -> impl Future<Output = FetchResult<BlockSummary>> + Send;

    fn rollup_info(&self) -> impl Future<Output = FetchResult<RollupBatchInfo>> + Send;
}

pub struct MantleRpcClient {
    network: Network,
    rpc_url: Url,
    provider: AlloyProvider,
    http: reqwest::Client,
}

impl MantleRpcClient {
    pub fn new(network: Network, rpc_url: Url) -> Self {
        let provider = AlloyProvider::new_http(rpc_url.clone());
        Self {
            network,
            rpc_url,
            provider,
            http: reqwest::Client::new(),
        }
    }

    pub fn rpc_url(&self) -> &Url {
        &self.rpc_url
    }
}

impl ChainReader for MantleRpcClient {
    fn network(&self) -> Network {
        self.network
    }

    fn endpoint(&self) -> String {
        self.rpc_url.to_string()
    }

    async fn gas_price(&self) -> FetchResult<u128> {
        let gas = self.provider.get_gas_price().await?;
        Ok(gas)
    }

    async fn block_number(&self) -> FetchResult<u64> {
        let number = self.provider.get_block_number().await?;
        Ok(number)
    }

    async fn block_summary(&self, number: u64) -> FetchResult<BlockSummary> {
        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Number(number))
            .await?
            .ok_or_else(|| FetchError::NoData(format!("block {number} not found")))?;

        Ok(BlockSummary {
            number: block.header.number,
            timestamp: block.header.timestamp,
            tx_count: block.transactions.len(),
        })
    }

    /// `rollup_getInfo` is not part of the eth namespace, so it goes out as
    /// a raw JSON-RPC POST instead of through the provider.
    async fn rollup_info(&self) -> FetchResult<RollupBatchInfo> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "rollup_getInfo",
            "params": [],
        });
        let resp = self
            .http
            .post(self.rpc_url.clone())
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        let payload: Value = resp.json().await?;
        parse_rollup_info(&payload)
    }
}

pub async fn try_gas_reading<C: ChainReader>(client: &C) -> FetchResult<GasReading> {
    let value_wei = client.gas_price().await?;
    Ok(GasReading {
        value_wei,
        observed_at: Instant::now(),
    })
}

/// Fetches the latest block and its parent. At genesis both lookups are the
/// same block, which yields no block time.
pub async fn try_block_info<C: ChainReader>(client: &C) -> FetchResult<BlockInfo> {
    let number = client.block_number().await?;
    let latest = client.block_summary(number).await?;
    let previous = if number > 0 {
        client.block_summary(number - 1).await?
    } else {
        latest.clone()
    };
    Ok(BlockInfo::from_pair(&latest, &previous))
}

pub async fn fetch_gas_price<C: ChainReader>(client: &C) -> Option<u128> {
    match client.gas_price().await {
        Ok(wei) => Some(wei),
        Err(e) => {
            tracing::warn!(network = %client.network(), error = %e, "gas price fetch failed");
            None
        }
    }
}

pub async fn fetch_block_info<C: ChainReader>(client: &C) -> Option<BlockInfo> {
    try_block_info(client)
        .await
        .inspect_err(|e| tracing::warn!(network = %client.network(), error = %e, "block info fetch failed"))
        .ok()
}

pub async fn fetch_rollup_info<C: ChainReader>(client: &C) -> RollupBatchInfo {
    match client.rollup_info().await {
        Ok(info) => info,
        Err(e) => {
            tracing::warn!(network = %client.network(), error = %e, "rollup info fetch failed");
            RollupBatchInfo::default()
        }
    }
}

const TXN_BATCH_KEYS: [&str; 3] = ["l1TxnBatch", "latestL1TxnBatch", "l1_transaction_batch"];
const STATE_BATCH_KEYS: [&str; 3] = ["l1StateBatch", "latestL1StateBatch", "l1_state_batch"];

/// Reads the batch numbers from either a JSON-RPC envelope or a bare object.
/// Each field is resolved independently; zero counts as absent. An error
/// envelope without a result is an error.
pub fn parse_rollup_info(payload: &Value) -> FetchResult<RollupBatchInfo> {
    let info = match payload.get("result") {
        Some(result) if !result.is_null() => result,
        _ => match payload.get("error").filter(|e| !e.is_null()) {
            Some(error) => {
                return Err(FetchError::Api {
                    code: error.get("code").and_then(Value::as_i64).unwrap_or_default(),
                    msg: error
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or("rollup_getInfo failed")
                        .to_string(),
                });
            }
            None => payload,
        },
    };
    Ok(RollupBatchInfo {
        l1_txn_batch: first_positive(info, &TXN_BATCH_KEYS),
        l1_state_batch: first_positive(info, &STATE_BATCH_KEYS),
    })
}

fn first_positive(info: &Value, keys: &[&str]) -> Option<u64> {
    keys.iter()
        .find_map(|k| info.get(*k).filter(|v| !v.is_null()))
        .and_then(json_to_u64)
        .filter(|n| *n > 0)
}

/// Accepts JSON numbers, decimal strings and `0x`-prefixed hex strings.
pub(crate) fn json_to_u64(v: &Value) -> Option<u64> {
    match v {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => {
            let s = s.trim();
            match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                Some(hex) => u64::from_str_radix(hex, 16).ok(),
                None => s.parse::<u64>().ok(),
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockChain;

    #[test]
    fn rollup_info_from_envelope() {
        let payload = json!({"jsonrpc": "2.0", "id": 1, "result": {"l1TxnBatch": 1234, "l1StateBatch": "0x10"}});
        let info = parse_rollup_info(&payload).unwrap();
        assert_eq!(info.l1_txn_batch, Some(1234));
        assert_eq!(info.l1_state_batch, Some(16));
    }

    #[test]
    fn rollup_info_alternate_names_and_bare_object() {
        let payload = json!({"latestL1TxnBatch": "77", "l1_state_batch": 9});
        let info = parse_rollup_info(&payload).unwrap();
        assert_eq!(info.l1_txn_batch, Some(77));
        assert_eq!(info.l1_state_batch, Some(9));
    }

    #[test]
    fn rollup_info_missing_field_is_none_for_that_field_only() {
        let payload = json!({"result": {"l1TxnBatch": 5, "l1StateBatch": 0}});
        let info = parse_rollup_info(&payload).unwrap();
        assert_eq!(info.l1_txn_batch, Some(5));
        assert_eq!(info.l1_state_batch, None);
    }

    #[test]
    fn rollup_error_envelope_is_an_error() {
        let err = json!({"jsonrpc": "2.0", "id": 1, "error": {"code": -32601, "message": "method not found"}});
        match parse_rollup_info(&err) {
            Err(FetchError::Api { code, msg }) => {
                assert_eq!(code, -32601);
                assert_eq!(msg, "method not found");
            }
            other => panic!("expected api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn block_info_at_genesis_has_no_block_time() {
        let chain = MockChain::new(Network::Mainnet).with_block(0, 1_700_000_000, 0);
        let info = try_block_info(&chain).await.unwrap();
        assert_eq!(info.block_number, 0);
        assert_eq!(info.block_time_sec, None);
        assert_eq!(chain.requested_blocks(), vec![0]);
    }

    #[tokio::test]
    async fn block_info_uses_parent_timestamp() {
        let chain = MockChain::new(Network::Mainnet)
            .with_block(99, 1_000, 3)
            .with_block(100, 1_002, 5);
        let info = try_block_info(&chain).await.unwrap();
        assert_eq!(info.block_number, 100);
        assert_eq!(info.block_time_sec, Some(2.0));
    }

    #[tokio::test]
    async fn best_effort_wrappers_degrade_to_none() {
        let chain = MockChain::new(Network::Testnet).failing();
        assert_eq!(fetch_gas_price(&chain).await, None);
        assert_eq!(fetch_block_info(&chain).await, None);
        assert_eq!(fetch_rollup_info(&chain).await, RollupBatchInfo::default());
    }
}
