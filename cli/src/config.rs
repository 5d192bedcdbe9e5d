//! CLI configuration: JSON file, then environment, then flags.

use std::path::Path;

use anyhow::{Context, Result};
use chainhistory_core::{HistoryError, NetworkProfile};
use chainhistory_rpc::{HttpClientConfig, RetryConfig};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::logging::LogConfig;

pub const ENV_RPC_URL: &str = "CHAINHISTORY_RPC_URL";
pub const ENV_NETWORK: &str = "CHAINHISTORY_NETWORK";

/// Top-level configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CliConfig {
    #[serde(default = "default_network")]
    pub network: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpc_url: Option<String>,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub rpc: RpcSettings,
    /// Extra (or overriding) network profiles.
    #[serde(default)]
    pub networks: Vec<NetworkProfile>,
}

/// Node connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcSettings {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Largest block range per `eth_getLogs` request (0 = unlimited).
    #[serde(default = "default_max_block_range")]
    pub max_block_range: u64,
}

fn default_network() -> String {
    "mainnet".into()
}
fn default_max_retries() -> u32 {
    3
}
fn default_backoff_ms() -> u64 {
    250
}
fn default_timeout_ms() -> u64 {
    30_000
}
fn default_max_block_range() -> u64 {
    chainhistory_rpc::DEFAULT_MAX_BLOCK_RANGE
}

impl Default for RpcSettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_ms: default_backoff_ms(),
            timeout_ms: default_timeout_ms(),
            max_block_range: default_max_block_range(),
        }
    }
}

impl RpcSettings {
    pub fn http_config(&self) -> HttpClientConfig {
        HttpClientConfig {
            retry: RetryConfig {
                max_retries: self.max_retries,
                initial_backoff: Duration::from_millis(self.backoff_ms),
                ..RetryConfig::default()
            },
            request_timeout: Duration::from_millis(self.timeout_ms),
        }
    }
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            network: default_network(),
            rpc_url: None,
            log: LogConfig::default(),
            rpc: RpcSettings::default(),
            networks: vec![],
        }
    }
}

impl CliConfig {
    /// Load from `path`, or defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Apply `CHAINHISTORY_*` environment variables.
    pub fn apply_env(&mut self) {
        self.apply_overrides(std::env::var(ENV_NETWORK).ok(), std::env::var(ENV_RPC_URL).ok());
    }

    /// Replace the network and/or RPC URL when given.
    pub fn apply_overrides(&mut self, network: Option<String>, rpc_url: Option<String>) {
        if let Some(network) = network.filter(|n| !n.is_empty()) {
            self.network = network;
        }
        if let Some(url) = rpc_url.filter(|u| !u.is_empty()) {
            self.rpc_url = Some(url);
        }
    }

    /// The profile for the selected network: configured profiles first,
    /// then the built-in table.
    pub fn profile(&self) -> Result<NetworkProfile, HistoryError> {
        self.networks
            .iter()
            .find(|p| p.name == self.network)
            .cloned()
            .or_else(|| NetworkProfile::builtin(&self.network))
            .ok_or_else(|| HistoryError::UnknownNetwork(self.network.clone()))
    }

    /// Every profile the CLI knows about, configured ones last.
    pub fn all_profiles(&self) -> Vec<NetworkProfile> {
        let mut profiles = vec![NetworkProfile::mainnet()];
        for p in &self.networks {
            match profiles.iter_mut().find(|known| known.name == p.name) {
                Some(known) => *known = p.clone(),
                None => profiles.push(p.clone()),
            }
        }
        profiles
    }
}
