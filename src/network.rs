use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::rpc::MantleRpcClient;

pub const MAINNET_RPC: &str = "https://rpc.mantle.xyz";
pub const TESTNET_RPC: &str = "https://rpc.testnet.mantle.xyz";
pub const MAINNET_EXPLORER: &str = "https://explorer.mantle.xyz";
pub const TESTNET_EXPLORER: &str = "https://explorer.testnet.mantle.xyz";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
}

impl Network {
    pub fn chain_id(self) -> u64 {
        match self {
            Network::Mainnet => 5000,
            Network::Testnet => 5001,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Network::Mainnet => "Mantle",
            Network::Testnet => "Mantle Testnet",
        }
    }

    pub fn default_rpc_url(self) -> Url {
        let raw = match self {
            Network::Mainnet => MAINNET_RPC,
            Network::Testnet => TESTNET_RPC,
        };
        // Both constants are valid absolute URLs.
        Url::parse(raw).unwrap_or_else(|_| unreachable!("invalid built-in rpc url {raw}"))
    }

    pub fn explorer_url(self) -> &'static str {
        match self {
            Network::Mainnet => MAINNET_EXPLORER,
            Network::Testnet => TESTNET_EXPLORER,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Network::Mainnet => Network::Testnet,
            Network::Testnet => Network::Mainnet,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Mainnet => f.write_str("mainnet"),
            Network::Testnet => f.write_str("testnet"),
        }
    }
}

/// Endpoint selection for a network, honouring an optional override that
/// only applies to the network it was configured for.
#[derive(Debug, Clone, Default)]
pub struct Endpoints {
    pub rpc_override: Option<(Network, Url)>,
}

impl Endpoints {
    pub fn rpc_url(&self, network: Network) -> Url {
        match &self.rpc_override {
            Some((net, url)) if *net == network => url.clone(),
            _ => network.default_rpc_url(),
        }
    }
}

/// Builds a fresh client handle bound to `network`'s endpoint. Connection
/// errors only surface once the handle is used.
pub fn create_client(network: Network, endpoints: &Endpoints) -> MantleRpcClient {
    MantleRpcClient::new(network, endpoints.rpc_url(network))
}
