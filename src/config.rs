use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use crate::ledger::Network;

#[derive(Debug, Deserialize)]
pub struct AppConfigRaw {
    pub network_magic: u64,
    pub genesis_timestamp: i64,
    pub feed_listen: String,
    pub api_listen: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub network: Network,
    pub genesis_timestamp: i64,
    pub feed_listen: String,
    pub api_listen: String,
}

impl AppConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file at {}", path.display()))?;
        let raw: AppConfigRaw = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse config file at {}", path.display()))?;
        let network = Network::from_magic(raw.network_magic)
            .with_context(|| format!("unknown network magic {}", raw.network_magic))?;
        Ok(AppConfig {
            network,
            genesis_timestamp: raw.genesis_timestamp,
            feed_listen: raw.feed_listen,
            api_listen: raw.api_listen,
        })
    }
}
