//! Gas price threshold alerts.
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::config::{ALERT_COOLDOWN, DEFAULT_HIGH_GWEI, DEFAULT_LOW_GWEI};

#[derive(Debug, Error, PartialEq)]
pub enum ThresholdError {
    #[error("thresholds must be finite and non-negative (high {high}, low {low})")]
    OutOfRange { high: f64, low: f64 },

    #[error("low threshold {low} gwei must be below high threshold {high} gwei")]
    Crossed { high: f64, low: f64 },
}

/// Validated gas thresholds: `0 <= low < high`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertThresholds {
    high_gwei: f64,
    low_gwei: f64,
    pub enabled: bool,
}

impl AlertThresholds {
    pub fn new(high_gwei: f64, low_gwei: f64, enabled: bool) -> Result<Self, ThresholdError> {
        if !high_gwei.is_finite() || !low_gwei.is_finite() || high_gwei < 0.0 || low_gwei < 0.0 {
            return Err(ThresholdError::OutOfRange { high: high_gwei, low: low_gwei });
        }
        if low_gwei >= high_gwei {
            return Err(ThresholdError::Crossed { high: high_gwei, low: low_gwei });
        }
        Ok(Self { high_gwei, low_gwei, enabled })
    }

    pub fn high_gwei(&self) -> f64 {
        self.high_gwei
    }

    pub fn low_gwei(&self) -> f64 {
        self.low_gwei
    }

    pub fn with_enabled(self, enabled: bool) -> Self {
        Self { enabled, ..self }
    }
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            high_gwei: DEFAULT_HIGH_GWEI,
            low_gwei: DEFAULT_LOW_GWEI,
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AlertKind {
    High { gwei: f64, threshold: f64 },
    Low { gwei: f64, threshold: f64 },
}

impl AlertKind {
    pub fn message(&self) -> String {
        match self {
            AlertKind::High { gwei, threshold } => {
                format!("Gas price {gwei:.3} gwei is above {threshold} gwei")
            }
            AlertKind::Low { gwei, threshold } => {
                format!("Gas price {gwei:.3} gwei is below {threshold} gwei")
            }
        }
    }
}

/// Threshold check without rate limiting.
pub fn classify(gwei: f64, thresholds: &AlertThresholds) -> Option<AlertKind> {
    if !thresholds.enabled {
        return None;
    }
    if gwei > thresholds.high_gwei {
        Some(AlertKind::High { gwei, threshold: thresholds.high_gwei })
    } else if gwei < thresholds.low_gwei {
        Some(AlertKind::Low { gwei, threshold: thresholds.low_gwei })
    } else {
        None
    }
}

/// Classifies readings and suppresses firings closer together than the
/// cooldown. `last_fired_at` lives as long as the process.
#[derive(Debug, Clone)]
pub struct Alerter {
    cooldown: Duration,
    last_fired_at: Option<Instant>,
}

impl Default for Alerter {
    fn default() -> Self {
        Self::new(ALERT_COOLDOWN)
    }
}

impl Alerter {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_fired_at: None,
        }
    }

    pub fn last_fired_at(&self) -> Option<Instant> {
        self.last_fired_at
    }

    pub fn evaluate(&mut self, gwei: f64, thresholds: &AlertThresholds, now: Instant) -> Option<AlertKind> {
        let kind = classify(gwei, thresholds)?;
        if let Some(last) = self.last_fired_at {
            if now.saturating_duration_since(last) < self.cooldown {
                tracing::debug!(gwei, "alert suppressed by cooldown");
                return None;
            }
        }
        self.last_fired_at = Some(now);
        Some(kind)
    }
}

/// System-level notification channel. Delivery is best-effort.
pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, message: &str);
}

/// Emits alerts as `warn` events on the `alert` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, title: &str, message: &str) {
        tracing::warn!(target: "alert", title, "{message}");
    }
}
