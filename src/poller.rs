//! The polling orchestrator. Runs as one task: every fetch is a future in a
//! local `FuturesUnordered`, so outcomes are applied one at a time by the
//! only writer of the store.
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use crate::alert::{AlertThresholds, Alerter, Notifier};
use crate::config::TOAST_DURATION;
use crate::data::{GasReading, KlineInterval};
use crate::market::MarketSource;
use crate::network::Network;
use crate::rpc::{ChainReader, try_block_info, try_gas_reading};
use crate::scheduler::Scheduler;
use crate::state::{MetricFamily, MetricUpdate, MetricsStore, Outcome};
use crate::tps;

pub const NOTIFICATION_TITLE: &str = "MantleSight";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SwitchNetwork(Network),
    SetThresholds(AlertThresholds),
    SetKlineInterval(KlineInterval),
    RefreshAll,
}

type Connect<C> = Box<dyn Fn(Network) -> C + Send + Sync>;

pub struct Poller<C: ChainReader, M: MarketSource> {
    connect: Connect<C>,
    client: Arc<C>,
    market: Arc<M>,
    scheduler: Scheduler,
    store: MetricsStore,
    alerter: Alerter,
    notifier: Box<dyn Notifier>,
    snapshots: watch::Sender<MetricsStore>,
}

impl<C: ChainReader, M: MarketSource> Poller<C, M> {
    pub fn new(
        connect: impl Fn(Network) -> C + Send + Sync + 'static,
        network: Network,
        market: M,
        thresholds: AlertThresholds,
        tps_window: u64,
        notifier: Box<dyn Notifier>,
    ) -> (Self, watch::Receiver<MetricsStore>) {
        let client = connect(network);
        let store = MetricsStore::new(network, client.endpoint(), thresholds, tps_window);
        let (snapshots, rx) = watch::channel(store.clone());
        let poller = Self {
            connect: Box::new(connect),
            client: Arc::new(client),
            market: Arc::new(market),
            scheduler: Scheduler::new(Instant::now()),
            store,
            alerter: Alerter::default(),
            notifier,
            snapshots,
        };
        (poller, rx)
    }

    pub fn set_kline_interval(&mut self, interval: KlineInterval) {
        self.store.set_kline_interval(interval);
    }

    /// Runs until the command channel closes.
    pub async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        let mut in_flight: FuturesUnordered<BoxFuture<'static, Outcome>> = FuturesUnordered::new();
        tracing::info!(network = %self.store.network, rpc = %self.store.rpc_url, "poller started");

        loop {
            let now = Instant::now();
            for family in self.scheduler.take_due(now, self.store.generation) {
                self.store.begin(family);
                in_flight.push(self.launch(family));
            }
            self.store.check_staleness(now.into_std());
            self.snapshots.send_replace(self.store.clone());

            let deadline = self.scheduler.next_deadline(now);
            tokio::select! {
                cmd = commands.recv() => match cmd {
                    Some(cmd) => self.handle(cmd),
                    None => break,
                },
                Some(outcome) = in_flight.next(), if !in_flight.is_empty() => self.on_outcome(outcome),
                _ = tokio::time::sleep_until(deadline) => {}
            }
        }
        tracing::info!(pending = in_flight.len(), "poller stopped");
    }

    fn launch(&self, family: MetricFamily) -> BoxFuture<'static, Outcome> {
        let generation = self.store.generation;
        let client = Arc::clone(&self.client);
        let market = Arc::clone(&self.market);
        let tps_window = self.store.tps_window;
        let interval = self.store.kline_interval;
        tracing::trace!(?family, generation, "launching fetch");

        async move {
            let update = match family {
                MetricFamily::Gas => MetricUpdate::Gas(try_gas_reading(client.as_ref()).await),
                MetricFamily::Block => MetricUpdate::Block(try_block_info(client.as_ref()).await),
                MetricFamily::Tps => MetricUpdate::Tps(tps::estimate(client.as_ref(), tps_window).await),
                MetricFamily::Rollup => MetricUpdate::Rollup(client.rollup_info().await),
                MetricFamily::Price => MetricUpdate::Price(market.price_quote().await),
                MetricFamily::Supply => MetricUpdate::Supply(market.circulating_supply().await),
                MetricFamily::Kline => MetricUpdate::Kline(interval, market.klines(interval).await),
            };
            Outcome { generation, update }
        }
        .boxed()
    }

    fn on_outcome(&mut self, outcome: Outcome) {
        self.scheduler.complete(outcome.update.family(), outcome.generation);
        let now = Instant::now().into_std();
        if let Some(reading) = self.store.apply(outcome, now) {
            self.check_alert(reading, now);
        }
    }

    fn check_alert(&mut self, reading: GasReading, now: std::time::Instant) {
        let Some(kind) = self.alerter.evaluate(reading.gwei(), &self.store.thresholds, now) else {
            return;
        };
        let message = kind.message();
        tracing::info!(gwei = reading.gwei(), "{message}");
        self.store.show_toast(message.clone(), now, TOAST_DURATION);
        self.notifier.notify(NOTIFICATION_TITLE, &message);
    }

    fn handle(&mut self, cmd: Command) {
        let now = Instant::now();
        match cmd {
            Command::SwitchNetwork(network) => {
                let client = (self.connect)(network);
                let endpoint = client.endpoint();
                self.client = Arc::new(client);
                let generation = self.store.switch_network(network, endpoint);
                self.scheduler.restart(now, generation);
                tracing::info!(%network, rpc = %self.store.rpc_url, generation, "switched network");
            }
            Command::SetThresholds(thresholds) => {
                tracing::info!(
                    high = thresholds.high_gwei(),
                    low = thresholds.low_gwei(),
                    enabled = thresholds.enabled,
                    "alert thresholds updated"
                );
                self.store.thresholds = thresholds;
            }
            Command::SetKlineInterval(interval) => {
                self.store.set_kline_interval(interval);
                self.scheduler.trigger(MetricFamily::Kline, now);
            }
            Command::RefreshAll => {
                for family in MetricFamily::ALL {
                    self.scheduler.trigger(family, now);
                }
            }
        }
    }
}
