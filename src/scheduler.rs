use std::time::Duration;

use tokio::time::Instant;

use crate::config::{
    BLOCK_INTERVAL, GAS_INTERVAL, KLINE_INTERVAL, PRICE_INTERVAL, ROLLUP_INTERVAL, SCHEDULE_STAGGER,
    SUPPLY_INTERVAL, TPS_INTERVAL,
};
use crate::state::MetricFamily;

/// Far enough out to stand in for "nothing scheduled".
const IDLE_HORIZON: Duration = Duration::from_secs(3600);

pub fn default_period(family: MetricFamily) -> Duration {
    match family {
        MetricFamily::Gas => GAS_INTERVAL,
        MetricFamily::Price => PRICE_INTERVAL,
        MetricFamily::Block => BLOCK_INTERVAL,
        MetricFamily::Supply => SUPPLY_INTERVAL,
        MetricFamily::Tps => TPS_INTERVAL,
        MetricFamily::Rollup => ROLLUP_INTERVAL,
        MetricFamily::Kline => KLINE_INTERVAL,
    }
}

#[derive(Debug, Clone)]
struct Entry {
    family: MetricFamily,
    period: Duration,
    next_due: Instant,
    in_flight: Option<u64>,
}

/// Cooperative timetable for all metric families. First ticks are staggered
/// and a family is never due again while its previous fetch is in flight,
/// which bounds outstanding requests to one per family.
#[derive(Debug, Clone)]
pub struct Scheduler {
    entries: Vec<Entry>,
    stagger: Duration,
}

impl Scheduler {
    pub fn new(start: Instant) -> Self {
        Self::with_periods(start, SCHEDULE_STAGGER, MetricFamily::ALL.map(|f| (f, default_period(f))))
    }

    pub fn with_periods(
        start: Instant,
        stagger: Duration,
        periods: impl IntoIterator<Item = (MetricFamily, Duration)>,
    ) -> Self {
        let entries = periods
            .into_iter()
            .enumerate()
            .map(|(i, (family, period))| Entry {
                family,
                period,
                next_due: start + stagger * i as u32,
                in_flight: None,
            })
            .collect();
        Self { entries, stagger }
    }

    /// Earliest instant at which some idle family becomes due.
    pub fn next_deadline(&self, now: Instant) -> Instant {
        self.entries
            .iter()
            .filter(|e| e.in_flight.is_none())
            .map(|e| e.next_due)
            .min()
            .unwrap_or(now + IDLE_HORIZON)
    }

    /// Marks every due, idle family as in flight under `generation` and
    /// returns them.
    pub fn take_due(&mut self, now: Instant, generation: u64) -> Vec<MetricFamily> {
        let mut due = Vec::new();
        for entry in &mut self.entries {
            if entry.in_flight.is_none() && entry.next_due <= now {
                entry.in_flight = Some(generation);
                entry.next_due = now + entry.period;
                due.push(entry.family);
            }
        }
        due
    }

    /// Clears the in-flight mark if it belongs to `generation`. Completions
    /// from an abandoned generation leave the current fetch gated.
    pub fn complete(&mut self, family: MetricFamily, generation: u64) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.family == family) {
            if entry.in_flight == Some(generation) {
                entry.in_flight = None;
            }
        }
    }

    pub fn is_in_flight(&self, family: MetricFamily) -> bool {
        self.entries
            .iter()
            .any(|e| e.family == family && e.in_flight.is_some())
    }

    /// Makes `family` due at `now`.
    pub fn trigger(&mut self, family: MetricFamily, now: Instant) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.family == family) {
            entry.next_due = now;
        }
    }

    /// Re-staggers every family from `now`. Fetches still in flight for an
    /// older generation no longer gate their family.
    pub fn restart(&mut self, now: Instant, current_generation: u64) {
        let stagger = self.stagger;
        for (i, entry) in self.entries.iter_mut().enumerate() {
            entry.next_due = now + stagger * i as u32;
            if entry.in_flight.is_some_and(|g| g != current_generation) {
                entry.in_flight = None;
            }
        }
    }
}
