//! Configuration parameters for the MantleSight dashboard
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use url::Url;

use crate::network::Network;

/// Chain considered stale after this long without a successful chain fetch
pub const STALE_AFTER: Duration = Duration::from_secs(20);

// ========================= POLLING =========================
pub const GAS_INTERVAL: Duration = Duration::from_secs(7);
pub const PRICE_INTERVAL: Duration = Duration::from_secs(7);
pub const BLOCK_INTERVAL: Duration = Duration::from_secs(7);
pub const SUPPLY_INTERVAL: Duration = Duration::from_secs(10);
pub const TPS_INTERVAL: Duration = Duration::from_secs(10);
pub const ROLLUP_INTERVAL: Duration = Duration::from_secs(10);
pub const KLINE_INTERVAL: Duration = Duration::from_secs(60);
/// Offset between the first ticks of consecutive metric families
pub const SCHEDULE_STAGGER: Duration = Duration::from_millis(250);

// ========================= TPS =========================
/// Number of most recent blocks the TPS estimate is taken over
pub const DEFAULT_TPS_WINDOW: u64 = 30;
/// Upper bound on concurrent block requests issued by one TPS estimate
pub const TPS_FETCH_CONCURRENCY: usize = 8;

// ========================= ALERTS =========================
pub const DEFAULT_HIGH_GWEI: f64 = 20.0;
pub const DEFAULT_LOW_GWEI: f64 = 0.5;
/// Minimum spacing between two alert firings
pub const ALERT_COOLDOWN: Duration = Duration::from_secs(10);
/// How long the in-dashboard toast stays visible
pub const TOAST_DURATION: Duration = Duration::from_secs(4);

// ========================= MARKET =========================
/// Number of candles requested per kline fetch
pub const KLINE_LIMIT: u32 = 50;

pub const DEFAULT_SETTINGS_FILE: &str = "mantlesight.settings.json";
pub const DEFAULT_LOG_FILE: &str = "mantlesight.log";

#[derive(Parser, Debug)]
#[command(name = "mantlesight", version, about = "Mantle network dashboard", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Network to watch [default: persisted selection, else mainnet]
    #[arg(long, global = true, env = "MANTLESIGHT_NETWORK", value_enum)]
    pub network: Option<Network>,

    /// Custom RPC endpoint for the selected network
    #[arg(long, global = true, env = "MANTLESIGHT_RPC_URL")]
    pub rpc_url: Option<Url>,

    /// Settings file holding network, theme, language and alert thresholds
    #[arg(long, global = true, env = "MANTLESIGHT_SETTINGS", default_value = DEFAULT_SETTINGS_FILE)]
    pub settings: PathBuf,

    /// Log file used while the dashboard owns the terminal
    #[arg(long, env = "MANTLESIGHT_LOG_FILE", default_value = DEFAULT_LOG_FILE)]
    pub log_file: PathBuf,

    /// Number of recent blocks the TPS estimate covers
    #[arg(long, global = true, env = "MANTLESIGHT_TPS_WINDOW", default_value_t = DEFAULT_TPS_WINDOW)]
    pub tps_window: u64,

    /// High gas alert threshold in gwei (persisted)
    #[arg(long, env = "MANTLESIGHT_HIGH_GWEI")]
    pub high_gwei: Option<f64>,

    /// Low gas alert threshold in gwei (persisted)
    #[arg(long, env = "MANTLESIGHT_LOW_GWEI")]
    pub low_gwei: Option<f64>,

    /// Disable gas alerts (persisted)
    #[arg(long)]
    pub no_alerts: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run every fetcher once and print the results
    Probe {
        /// Probe both mainnet and testnet
        #[arg(long)]
        all_networks: bool,
    },
}

impl Cli {
    /// Loads `.env` (if any) before parsing so env fallbacks see it.
    pub fn load() -> Self {
        dotenvy::dotenv().ok();
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_overrides() {
        let cli = Cli::try_parse_from([
            "mantlesight",
            "--network",
            "testnet",
            "--high-gwei",
            "30",
            "--tps-window",
            "10",
        ])
        .unwrap();
        assert_eq!(cli.network, Some(Network::Testnet));
        assert_eq!(cli.high_gwei, Some(30.0));
        assert_eq!(cli.tps_window, 10);
        assert!(cli.command.is_none());
    }

    #[test]
    fn parses_probe() {
        let cli = Cli::try_parse_from(["mantlesight", "probe", "--all-networks"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Probe { all_networks: true })));
    }
}
