//! Persisted user settings: a small JSON key-value file.
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use eyre::{Result, WrapErr};
use serde::{Deserialize, Serialize};

use crate::alert::AlertThresholds;
use crate::config::{DEFAULT_HIGH_GWEI, DEFAULT_LOW_GWEI};
use crate::data::KlineInterval;
use crate::network::Network;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Zh,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    #[serde(rename = "net")]
    pub network: Network,
    pub theme: Theme,
    #[serde(rename = "lang")]
    pub language: Language,
    pub enable_alert: bool,
    pub high_gwei: f64,
    pub low_gwei: f64,
    pub kline_interval: KlineInterval,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            network: Network::default(),
            theme: Theme::default(),
            language: Language::default(),
            enable_alert: true,
            high_gwei: DEFAULT_HIGH_GWEI,
            low_gwei: DEFAULT_LOW_GWEI,
            kline_interval: KlineInterval::default(),
        }
    }
}

impl Settings {
    /// Thresholds from the stored values, or the defaults if they do not
    /// form a valid pair.
    pub fn thresholds(&self) -> AlertThresholds {
        AlertThresholds::new(self.high_gwei, self.low_gwei, self.enable_alert).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "invalid stored alert thresholds, using defaults");
            AlertThresholds::default().with_enabled(self.enable_alert)
        })
    }

    pub fn set_thresholds(&mut self, thresholds: &AlertThresholds) {
        self.high_gwei = thresholds.high_gwei();
        self.low_gwei = thresholds.low_gwei();
        self.enable_alert = thresholds.enabled;
    }
}

/// Reads once at startup, rewrites the whole file on every change.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file yields defaults. An unreadable or malformed one is an
    /// error, so the caller can avoid overwriting it.
    pub fn load(&self) -> Result<Settings> {
        let body = match fs::read_to_string(&self.path) {
            Ok(body) => body,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Settings::default()),
            Err(e) => {
                return Err(e).wrap_err_with(|| format!("reading settings from {}", self.path.display()));
            }
        };
        serde_json::from_str(&body).wrap_err_with(|| format!("parsing settings in {}", self.path.display()))
    }

    pub fn save(&self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .wrap_err_with(|| format!("creating settings directory {}", parent.display()))?;
        }
        let body = serde_json::to_string_pretty(settings)?;
        fs::write(&self.path, body)
            .wrap_err_with(|| format!("writing settings to {}", self.path.display()))?;
        tracing::debug!(path = %self.path.display(), "settings saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("absent.json"));
        assert_eq!(store.load().unwrap(), Settings::default());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("nested/settings.json"));
        let settings = Settings {
            network: Network::Testnet,
            theme: Theme::Light,
            language: Language::Zh,
            enable_alert: false,
            high_gwei: 30.0,
            low_gwei: 1.0,
            kline_interval: KlineInterval::Hour,
        };
        store.save(&settings).unwrap();
        assert_eq!(store.load().unwrap(), settings);
    }

    #[test]
    fn reads_partial_file_with_short_key_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"net":"testnet","highGwei":12.5,"lang":"zh"}"#).unwrap();
        let settings = SettingsStore::new(&path).load().unwrap();
        assert_eq!(settings.network, Network::Testnet);
        assert_eq!(settings.high_gwei, 12.5);
        assert_eq!(settings.low_gwei, DEFAULT_LOW_GWEI);
        assert_eq!(settings.language, Language::Zh);
        assert!(settings.enable_alert);
    }

    #[test]
    fn malformed_file_is_reported_and_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "not json").unwrap();
        let err = SettingsStore::new(&path).load().unwrap_err();
        assert!(format!("{err:#}").contains("parsing settings"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "not json");
    }

    #[test]
    fn crossed_thresholds_fall_back_to_defaults() {
        let settings = Settings {
            high_gwei: 0.1,
            low_gwei: 5.0,
            enable_alert: false,
            ..Settings::default()
        };
        let t = settings.thresholds();
        assert_eq!(t.high_gwei(), DEFAULT_HIGH_GWEI);
        assert_eq!(t.low_gwei(), DEFAULT_LOW_GWEI);
        assert!(!t.enabled);
    }
}
