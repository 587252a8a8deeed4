//! Plain metric values produced by the fetchers and consumed by the store.
use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};

pub const WEI_PER_GWEI: f64 = 1_000_000_000.0;

pub fn wei_to_gwei(wei: u128) -> f64 {
    (wei as f64) / WEI_PER_GWEI
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GasReading {
    pub value_wei: u128,
    pub observed_at: Instant,
}

impl GasReading {
    pub fn gwei(&self) -> f64 {
        wei_to_gwei(self.value_wei)
    }
}

/// The subset of a block the dashboard needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSummary {
    pub number: u64,
    pub timestamp: u64,
    pub tx_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockInfo {
    pub block_number: u64,
    /// Seconds between the latest block and its parent; `None` when the
    /// delta is not positive.
    pub block_time_sec: Option<f64>,
}

impl BlockInfo {
    pub fn from_pair(latest: &BlockSummary, previous: &BlockSummary) -> Self {
        let block_time_sec = (latest.timestamp > previous.timestamp)
            .then(|| (latest.timestamp - previous.timestamp) as f64);
        Self {
            block_number: latest.number,
            block_time_sec,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PriceQuote {
    pub usd: Option<f64>,
    pub counter_asset_price: Option<f64>,
    pub change_24h_pct: Option<f64>,
}

/// `price * supply`, or `None` unless both are present and positive.
pub fn market_cap(usd: Option<f64>, supply: Option<f64>) -> Option<f64> {
    match (usd, supply) {
        (Some(p), Some(s)) if p > 0.0 && s > 0.0 => Some(p * s),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RollupBatchInfo {
    pub l1_txn_batch: Option<u64>,
    pub l1_state_batch: Option<u64>,
}

impl RollupBatchInfo {
    /// Fills fields missing from `self` with those of `previous`.
    pub fn or(self, previous: &Self) -> Self {
        Self {
            l1_txn_batch: self.l1_txn_batch.or(previous.l1_txn_batch),
            l1_state_batch: self.l1_state_batch.or(previous.l1_state_batch),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TpsSample {
    pub total_txs: u64,
    pub tps: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Bar open time, unix milliseconds.
    pub time: u64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn is_up(&self) -> bool {
        self.close >= self.open
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum KlineInterval {
    #[serde(rename = "1M")]
    Month,
    #[default]
    #[serde(rename = "1d")]
    Day,
    #[serde(rename = "4h")]
    FourHours,
    #[serde(rename = "1h")]
    Hour,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "5m")]
    FiveMinutes,
}

impl KlineInterval {
    pub const ALL: [KlineInterval; 6] = [
        KlineInterval::Month,
        KlineInterval::Day,
        KlineInterval::FourHours,
        KlineInterval::Hour,
        KlineInterval::FifteenMinutes,
        KlineInterval::FiveMinutes,
    ];

    /// Interval code understood by the Bybit kline endpoint.
    pub fn bybit_code(self) -> &'static str {
        match self {
            KlineInterval::Month => "M",
            KlineInterval::Day => "D",
            KlineInterval::FourHours => "240",
            KlineInterval::Hour => "60",
            KlineInterval::FifteenMinutes => "15",
            KlineInterval::FiveMinutes => "5",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            KlineInterval::Month => "1M",
            KlineInterval::Day => "1d",
            KlineInterval::FourHours => "4h",
            KlineInterval::Hour => "1h",
            KlineInterval::FifteenMinutes => "15m",
            KlineInterval::FiveMinutes => "5m",
        }
    }

    pub fn next(self) -> Self {
        let idx = Self::ALL.iter().position(|i| *i == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }
}

impl fmt::Display for KlineInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
