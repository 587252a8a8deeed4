//! In-memory chain, market and notifier doubles.
use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::sync::{Arc, Mutex};

use crate::alert::Notifier;
use crate::data::{BlockSummary, Candle, KlineInterval, PriceQuote, RollupBatchInfo};
use crate::error::{FetchError, FetchResult};
use crate::market::MarketSource;
use crate::network::Network;
use crate::rpc::ChainReader;

fn unavailable(what: &str) -> FetchError {
    FetchError::NoData(format!("mock {what} unavailable"))
}

#[derive(Debug, Default)]
pub struct MockChain {
    network: Network,
    blocks: BTreeMap<u64, BlockSummary>,
    gas_wei: Option<u128>,
    rollup: Option<RollupBatchInfo>,
    failing: bool,
    requested: Mutex<Vec<u64>>,
}

impl MockChain {
    pub fn new(network: Network) -> Self {
        Self {
            network,
            gas_wei: Some(1_000_000_000),
            ..Default::default()
        }
    }

    pub fn with_block(mut self, number: u64, timestamp: u64, tx_count: usize) -> Self {
        self.blocks.insert(number, BlockSummary { number, timestamp, tx_count });
        self
    }

    /// Consecutive blocks `step` seconds apart, each holding `tx_count` txs.
    pub fn with_chain(mut self, numbers: RangeInclusive<u64>, first_ts: u64, step: u64, tx_count: usize) -> Self {
        let first = *numbers.start();
        for n in numbers {
            self = self.with_block(n, first_ts + (n - first) * step, tx_count);
        }
        self
    }

    pub fn with_gas(mut self, wei: u128) -> Self {
        self.gas_wei = Some(wei);
        self
    }

    pub fn with_rollup(mut self, info: RollupBatchInfo) -> Self {
        self.rollup = Some(info);
        self
    }

    /// Every call fails as if the endpoint were unreachable.
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    pub fn requested_blocks(&self) -> Vec<u64> {
        self.requested.lock().unwrap().clone()
    }

    fn check(&self, what: &str) -> FetchResult<()> {
        if self.failing { Err(unavailable(what)) } else { Ok(()) }
    }
}

impl ChainReader for MockChain {
    fn network(&self) -> Network {
        self.network
    }

    fn endpoint(&self) -> String {
        format!("mock://{}", self.network)
    }

    async fn gas_price(&self) -> FetchResult<u128> {
        self.check("gas price")?;
        self.gas_wei.ok_or_else(|| unavailable("gas price"))
    }

    async fn block_number(&self) -> FetchResult<u64> {
        self.check("block number")?;
        self.blocks
            .keys()
            .next_back()
            .copied()
            .ok_or_else(|| unavailable("block number"))
    }

    async fn block_summary(&self, number: u64) -> FetchResult<BlockSummary> {
        self.check("block")?;
        self.requested.lock().unwrap().push(number);
        self.blocks
            .get(&number)
            .cloned()
            .ok_or_else(|| FetchError::NoData(format!("block {number} not found")))
    }

    async fn rollup_info(&self) -> FetchResult<RollupBatchInfo> {
        self.check("rollup info")?;
        self.rollup.ok_or_else(|| unavailable("rollup info"))
    }
}

#[derive(Debug, Default)]
pub struct MockMarket {
    pub quote: Option<PriceQuote>,
    pub supply: Option<f64>,
    pub candles: Vec<Candle>,
    requested_intervals: Mutex<Vec<KlineInterval>>,
}

impl MockMarket {
    pub fn new(quote: Option<PriceQuote>, supply: Option<f64>) -> Self {
        Self {
            quote,
            supply,
            ..Default::default()
        }
    }

    pub fn with_candles(mut self, candles: Vec<Candle>) -> Self {
        self.candles = candles;
        self
    }

    pub fn requested_intervals(&self) -> Vec<KlineInterval> {
        self.requested_intervals.lock().unwrap().clone()
    }
}

impl MarketSource for MockMarket {
    async fn price_quote(&self) -> FetchResult<PriceQuote> {
        self.quote.ok_or_else(|| unavailable("price quote"))
    }

    async fn circulating_supply(&self) -> FetchResult<f64> {
        self.supply.ok_or_else(|| unavailable("supply"))
    }

    async fn klines(&self, interval: KlineInterval) -> FetchResult<Vec<Candle>> {
        self.requested_intervals.lock().unwrap().push(interval);
        if self.candles.is_empty() {
            return Err(FetchError::NoData("empty kline list".to_string()));
        }
        Ok(self.candles.clone())
    }
}

/// Collects notification messages for later inspection.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    messages: Arc<Mutex<Vec<String>>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, _title: &str, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}
