//! Dashboard state: one fetch state machine per metric family, written only
//! by the poller and published to the UI as snapshots.
use std::time::{Duration, Instant};

use crate::alert::AlertThresholds;
use crate::config::STALE_AFTER;
use crate::data::{
    BlockInfo, Candle, GasReading, KlineInterval, PriceQuote, RollupBatchInfo, TpsSample, market_cap,
};
use crate::error::FetchResult;
use crate::network::Network;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricFamily {
    Gas,
    Price,
    Block,
    Supply,
    Tps,
    Rollup,
    Kline,
}

impl MetricFamily {
    pub const ALL: [MetricFamily; 7] = [
        MetricFamily::Gas,
        MetricFamily::Price,
        MetricFamily::Block,
        MetricFamily::Supply,
        MetricFamily::Tps,
        MetricFamily::Rollup,
        MetricFamily::Kline,
    ];

    /// Families whose values belong to the selected network.
    pub fn is_chain_bound(self) -> bool {
        matches!(
            self,
            MetricFamily::Gas | MetricFamily::Block | MetricFamily::Tps | MetricFamily::Rollup
        )
    }
}

/// `Idle -> Fetching -> Settled | Failed`. A failure keeps the last settled
/// value around for display.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchState<T> {
    Idle,
    Fetching { last: Option<T> },
    Settled(T),
    Failed { last: Option<T>, error: String },
}

impl<T> Default for FetchState<T> {
    fn default() -> Self {
        FetchState::Idle
    }
}

impl<T> FetchState<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            FetchState::Idle => None,
            FetchState::Settled(v) => Some(v),
            FetchState::Fetching { last } | FetchState::Failed { last, .. } => last.as_ref(),
        }
    }

    fn take_value(&mut self) -> Option<T> {
        match std::mem::take(self) {
            FetchState::Idle => None,
            FetchState::Settled(v) => Some(v),
            FetchState::Fetching { last } | FetchState::Failed { last, .. } => last,
        }
    }

    pub fn begin(&mut self) {
        let last = self.take_value();
        *self = FetchState::Fetching { last };
    }

    pub fn settle(&mut self, value: T) {
        *self = FetchState::Settled(value);
    }

    pub fn fail(&mut self, error: impl ToString) {
        let last = self.take_value();
        *self = FetchState::Failed {
            last,
            error: error.to_string(),
        };
    }

    pub fn is_fetching(&self) -> bool {
        matches!(self, FetchState::Fetching { .. })
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            FetchState::Failed { error, .. } => Some(error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionStatus {
    Connected,
    Stale,
    Disconnected,
    Error(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Toast {
    pub message: String,
    pub expires_at: Instant,
}

impl Toast {
    pub fn is_visible(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Result of one fetch, tagged with the generation it was launched under.
#[derive(Debug)]
pub struct Outcome {
    pub generation: u64,
    pub update: MetricUpdate,
}

#[derive(Debug)]
pub enum MetricUpdate {
    Gas(FetchResult<GasReading>),
    Price(FetchResult<PriceQuote>),
    Block(FetchResult<BlockInfo>),
    Supply(FetchResult<f64>),
    Tps(FetchResult<TpsSample>),
    Rollup(FetchResult<RollupBatchInfo>),
    Kline(KlineInterval, FetchResult<Vec<Candle>>),
}

impl MetricUpdate {
    pub fn family(&self) -> MetricFamily {
        match self {
            MetricUpdate::Gas(_) => MetricFamily::Gas,
            MetricUpdate::Price(_) => MetricFamily::Price,
            MetricUpdate::Block(_) => MetricFamily::Block,
            MetricUpdate::Supply(_) => MetricFamily::Supply,
            MetricUpdate::Tps(_) => MetricFamily::Tps,
            MetricUpdate::Rollup(_) => MetricFamily::Rollup,
            MetricUpdate::Kline(..) => MetricFamily::Kline,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetricsStore {
    pub network: Network,
    pub rpc_url: String,
    /// Bumped on every network switch; outcomes from older generations are dropped.
    pub generation: u64,
    pub gas: FetchState<GasReading>,
    pub price: FetchState<PriceQuote>,
    pub block: FetchState<BlockInfo>,
    /// Last positive block time; survives readings with no usable delta.
    pub block_time_sec: Option<f64>,
    pub supply: FetchState<f64>,
    /// Last non-null market cap.
    pub market_cap: Option<f64>,
    pub tps: FetchState<TpsSample>,
    pub rollup: FetchState<RollupBatchInfo>,
    pub kline_interval: KlineInterval,
    pub klines: FetchState<Vec<Candle>>,
    pub thresholds: AlertThresholds,
    pub toast: Option<Toast>,
    pub connection_status: ConnectionStatus,
    /// When an outcome was last applied; `None` until the first one.
    pub last_updated: Option<Instant>,
    pub last_successful: Option<Instant>,
    pub tps_window: u64,
}

impl MetricsStore {
    pub fn new(network: Network, rpc_url: String, thresholds: AlertThresholds, tps_window: u64) -> Self {
        Self {
            network,
            rpc_url,
            generation: 0,
            gas: FetchState::Idle,
            price: FetchState::Idle,
            block: FetchState::Idle,
            block_time_sec: None,
            supply: FetchState::Idle,
            market_cap: None,
            tps: FetchState::Idle,
            rollup: FetchState::Idle,
            kline_interval: KlineInterval::default(),
            klines: FetchState::Idle,
            thresholds,
            toast: None,
            connection_status: ConnectionStatus::Disconnected,
            last_updated: None,
            last_successful: None,
            tps_window,
        }
    }

    /// Starts a new generation bound to `network` and clears the values that
    /// belonged to the previous one.
    pub fn switch_network(&mut self, network: Network, rpc_url: String) -> u64 {
        self.generation += 1;
        self.network = network;
        self.rpc_url = rpc_url;
        for family in MetricFamily::ALL.into_iter().filter(|f| f.is_chain_bound()) {
            self.reset(family);
        }
        self.block_time_sec = None;
        self.connection_status = ConnectionStatus::Disconnected;
        self.last_successful = None;
        self.generation
    }

    pub fn set_kline_interval(&mut self, interval: KlineInterval) {
        if self.kline_interval != interval {
            self.kline_interval = interval;
            self.klines = FetchState::Idle;
        }
    }

    fn reset(&mut self, family: MetricFamily) {
        match family {
            MetricFamily::Gas => self.gas = FetchState::Idle,
            MetricFamily::Price => self.price = FetchState::Idle,
            MetricFamily::Block => self.block = FetchState::Idle,
            MetricFamily::Supply => self.supply = FetchState::Idle,
            MetricFamily::Tps => self.tps = FetchState::Idle,
            MetricFamily::Rollup => self.rollup = FetchState::Idle,
            MetricFamily::Kline => self.klines = FetchState::Idle,
        }
    }

    pub fn begin(&mut self, family: MetricFamily) {
        match family {
            MetricFamily::Gas => self.gas.begin(),
            MetricFamily::Price => self.price.begin(),
            MetricFamily::Block => self.block.begin(),
            MetricFamily::Supply => self.supply.begin(),
            MetricFamily::Tps => self.tps.begin(),
            MetricFamily::Rollup => self.rollup.begin(),
            MetricFamily::Kline => self.klines.begin(),
        }
    }

    /// Applies `outcome` if it is still current. Returns the settled gas
    /// reading, if any, so the caller can run the alerter on it.
    pub fn apply(&mut self, outcome: Outcome, now: Instant) -> Option<GasReading> {
        if outcome.generation != self.generation {
            tracing::debug!(
                family = ?outcome.update.family(),
                stale = outcome.generation,
                current = self.generation,
                "discarding outcome from previous network"
            );
            return None;
        }
        self.last_updated = Some(now);

        let mut settled_gas = None;
        match outcome.update {
            MetricUpdate::Gas(res) => {
                if let Ok(reading) = &res {
                    settled_gas = Some(*reading);
                }
                self.record_chain(res.as_ref().map(|_| ()), "gas price", now);
                apply_result(&mut self.gas, res, "gas price");
            }
            MetricUpdate::Block(res) => {
                self.record_chain(res.as_ref().map(|_| ()), "block", now);
                if let Ok(info) = &res {
                    if let Some(dt) = info.block_time_sec {
                        self.block_time_sec = Some(dt);
                    }
                }
                apply_result(&mut self.block, res, "block info");
            }
            MetricUpdate::Price(res) => {
                apply_result(&mut self.price, res, "price quote");
                self.refresh_market_cap();
            }
            MetricUpdate::Supply(res) => {
                apply_result(&mut self.supply, res, "circulating supply");
                self.refresh_market_cap();
            }
            MetricUpdate::Tps(res) => apply_result(&mut self.tps, res, "tps"),
            MetricUpdate::Rollup(res) => {
                let res = res.map(|info| match self.rollup.value() {
                    Some(previous) => info.or(previous),
                    None => info,
                });
                apply_result(&mut self.rollup, res, "rollup info");
            }
            MetricUpdate::Kline(interval, res) => {
                if interval != self.kline_interval {
                    tracing::debug!(%interval, current = %self.kline_interval, "discarding klines for old interval");
                    return None;
                }
                apply_result(&mut self.klines, res, "klines");
            }
        }
        settled_gas
    }

    fn record_chain(&mut self, res: Result<(), &crate::error::FetchError>, what: &str, now: Instant) {
        match res {
            Ok(()) => {
                self.connection_status = ConnectionStatus::Connected;
                self.last_successful = Some(now);
            }
            Err(e) => self.connection_status = ConnectionStatus::Error(format!("{what}: {e}")),
        }
    }

    fn refresh_market_cap(&mut self) {
        let usd = self.price.value().and_then(|q| q.usd);
        let supply = self.supply.value().copied();
        if let Some(cap) = market_cap(usd, supply) {
            self.market_cap = Some(cap);
        }
    }

    pub fn show_toast(&mut self, message: String, now: Instant, duration: Duration) {
        self.toast = Some(Toast {
            message,
            expires_at: now + duration,
        });
    }

    pub fn visible_toast(&self, now: Instant) -> Option<&str> {
        self.toast
            .as_ref()
            .filter(|t| t.is_visible(now))
            .map(|t| t.message.as_str())
    }

    pub fn check_staleness(&mut self, now: Instant) {
        if matches!(self.connection_status, ConnectionStatus::Connected | ConnectionStatus::Stale) {
            if let Some(last_ok) = self.last_successful {
                if now.saturating_duration_since(last_ok) > STALE_AFTER {
                    self.connection_status = ConnectionStatus::Stale;
                }
            }
        }
    }
}

fn apply_result<T>(state: &mut FetchState<T>, res: FetchResult<T>, what: &str) {
    match res {
        Ok(v) => state.settle(v),
        Err(e) => {
            tracing::warn!(error = %e, "{what} fetch failed");
            state.fail(e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;

    fn store() -> MetricsStore {
        MetricsStore::new(Network::Mainnet, "https://rpc.mantle.xyz".into(), AlertThresholds::default(), 30)
    }

    fn gas(wei: u128) -> GasReading {
        GasReading { value_wei: wei, observed_at: Instant::now() }
    }

    fn outcome(generation: u64, update: MetricUpdate) -> Outcome {
        Outcome { generation, update }
    }

    fn err() -> FetchError {
        FetchError::NoData("unreachable".into())
    }

    #[test]
    fn failure_retains_settled_value() {
        let mut s: FetchState<u64> = FetchState::Idle;
        s.begin();
        assert!(s.is_fetching());
        s.settle(7);
        s.begin();
        assert_eq!(s.value(), Some(&7));
        s.fail("boom");
        assert_eq!(s.value(), Some(&7));
        assert_eq!(s.error(), Some("boom"));
        s.begin();
        s.settle(9);
        assert_eq!(s, FetchState::Settled(9));
    }

    #[test]
    fn last_updated_is_unset_until_first_outcome() {
        let mut st = store();
        assert_eq!(st.last_updated, None);
        let now = Instant::now();
        st.apply(outcome(0, MetricUpdate::Gas(Err(err()))), now);
        assert_eq!(st.last_updated, Some(now));
    }

    #[test]
    fn stale_generation_is_discarded() {
        let mut st = store();
        let now = Instant::now();
        st.apply(outcome(0, MetricUpdate::Gas(Ok(gas(5)))), now);
        let generation = st.switch_network(Network::Testnet, "https://rpc.testnet.mantle.xyz".into());
        assert_eq!(generation, 1);
        assert_eq!(st.gas.value(), None);

        assert!(st.apply(outcome(0, MetricUpdate::Gas(Ok(gas(99)))), now).is_none());
        assert_eq!(st.gas.value(), None);

        let fresh = st.apply(outcome(1, MetricUpdate::Gas(Ok(gas(42)))), now);
        assert_eq!(fresh.map(|g| g.value_wei), Some(42));
        assert_eq!(st.gas.value().map(|g| g.value_wei), Some(42));
    }

    #[test]
    fn block_time_keeps_previous_positive_value() {
        let mut st = store();
        let now = Instant::now();
        let info = |n, dt| BlockInfo { block_number: n, block_time_sec: dt };
        st.apply(outcome(0, MetricUpdate::Block(Ok(info(10, Some(2.0))))), now);
        st.apply(outcome(0, MetricUpdate::Block(Ok(info(11, None)))), now);
        assert_eq!(st.block.value().map(|b| b.block_number), Some(11));
        assert_eq!(st.block_time_sec, Some(2.0));
    }

    #[test]
    fn rollup_fields_keep_previous_values() {
        let mut st = store();
        let now = Instant::now();
        let info = |txn, state| RollupBatchInfo { l1_txn_batch: txn, l1_state_batch: state };
        st.apply(outcome(0, MetricUpdate::Rollup(Ok(info(Some(812), Some(410))))), now);
        st.apply(outcome(0, MetricUpdate::Rollup(Ok(info(Some(813), None)))), now);
        assert_eq!(st.rollup.value(), Some(&info(Some(813), Some(410))));

        st.apply(outcome(0, MetricUpdate::Rollup(Err(err()))), now);
        assert_eq!(st.rollup.value(), Some(&info(Some(813), Some(410))));
    }

    #[test]
    fn market_cap_follows_price_and_supply() {
        let mut st = store();
        let now = Instant::now();
        let quote = PriceQuote { usd: Some(0.5), ..Default::default() };
        st.apply(outcome(0, MetricUpdate::Price(Ok(quote))), now);
        assert_eq!(st.market_cap, None);
        st.apply(outcome(0, MetricUpdate::Supply(Ok(1_000.0))), now);
        assert_eq!(st.market_cap, Some(500.0));

        // a later quote with no usd leg leaves the displayed cap alone
        st.apply(outcome(0, MetricUpdate::Price(Ok(PriceQuote::default()))), now);
        assert_eq!(st.market_cap, Some(500.0));
    }

    #[test]
    fn chain_failures_mark_connection_error_and_staleness() {
        let mut st = store();
        let t0 = Instant::now();
        st.apply(outcome(0, MetricUpdate::Gas(Ok(gas(1)))), t0);
        assert_eq!(st.connection_status, ConnectionStatus::Connected);

        st.check_staleness(t0 + STALE_AFTER + Duration::from_secs(1));
        assert_eq!(st.connection_status, ConnectionStatus::Stale);

        st.apply(outcome(0, MetricUpdate::Gas(Err(err()))), t0);
        assert!(matches!(st.connection_status, ConnectionStatus::Error(_)));
        assert_eq!(st.gas.value().map(|g| g.value_wei), Some(1));
    }

    #[test]
    fn klines_for_old_interval_are_dropped() {
        let mut st = store();
        let now = Instant::now();
        st.set_kline_interval(KlineInterval::Hour);
        let candle = Candle { time: 1, open: 1.0, high: 1.0, low: 1.0, close: 1.0, volume: 1.0 };
        st.apply(outcome(0, MetricUpdate::Kline(KlineInterval::Day, Ok(vec![candle]))), now);
        assert_eq!(st.klines.value(), None);
        st.apply(outcome(0, MetricUpdate::Kline(KlineInterval::Hour, Ok(vec![candle]))), now);
        assert_eq!(st.klines.value().map(Vec::len), Some(1));
    }

    #[test]
    fn toast_expires() {
        let mut st = store();
        let t0 = Instant::now();
        st.show_toast("hi".into(), t0, Duration::from_secs(4));
        assert_eq!(st.visible_toast(t0 + Duration::from_secs(3)), Some("hi"));
        assert_eq!(st.visible_toast(t0 + Duration::from_secs(4)), None);
    }
}
