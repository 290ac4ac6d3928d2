//! Node configuration and genesis description

use crate::pool::PoolConfig;
use crate::storage::StorageConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default number of transactions included per block
pub const DEFAULT_MAX_TRANSACTIONS_PER_BLOCK: usize = 25;

/// Default seconds between produced blocks
pub const DEFAULT_BLOCK_INTERVAL_SECS: u64 = 10;

/// Default API port
pub const DEFAULT_API_PORT: u16 = 3000;

/// Default number of rejected or expired ids remembered for lookups
pub const DEFAULT_FAILED_HISTORY: usize = 10_000;

/// A funded account at height 0
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenesisAccount {
    pub address: String,
    pub balance: u64,
}

/// A delegate registered at height 0
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenesisDelegate {
    pub public_key: String,
    pub username: String,
}

/// Initial ledger contents
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Genesis {
    #[serde(default)]
    pub accounts: Vec<GenesisAccount>,
    #[serde(default)]
    pub delegates: Vec<GenesisDelegate>,
}

impl Genesis {
    /// Load a genesis file
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Write a genesis file
    pub fn save(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Node settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub max_transactions_per_block: usize,
    pub block_interval_secs: u64,
    pub api_port: u16,
    /// Rejected and expired transactions kept for status lookups, oldest dropped first
    pub max_failed_history: usize,
    pub genesis_path: Option<PathBuf>,
    pub pool: PoolConfig,
    pub storage: StorageConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            max_transactions_per_block: DEFAULT_MAX_TRANSACTIONS_PER_BLOCK,
            block_interval_secs: DEFAULT_BLOCK_INTERVAL_SECS,
            api_port: DEFAULT_API_PORT,
            max_failed_history: DEFAULT_FAILED_HISTORY,
            genesis_path: None,
            pool: PoolConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Load settings from a JSON file; missing fields take their defaults
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = NodeConfig::default();
        assert_eq!(config.max_transactions_per_block, 25);
        assert_eq!(config.pool.max_size, 1000);
        assert_eq!(config.max_failed_history, DEFAULT_FAILED_HISTORY);
    }

    #[test]
    fn test_partial_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.json");
        fs::write(&path, r#"{"max_transactions_per_block": 3, "api_port": 8080}"#).unwrap();

        let config = NodeConfig::load(&path).unwrap();
        assert_eq!(config.max_transactions_per_block, 3);
        assert_eq!(config.api_port, 8080);
        assert_eq!(config.block_interval_secs, DEFAULT_BLOCK_INTERVAL_SECS);
    }

    #[test]
    fn test_genesis_roundtrip_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("genesis.json");
        let genesis = Genesis {
            accounts: vec![GenesisAccount {
                address: "1abc".to_string(),
                balance: 5,
            }],
            delegates: vec![],
        };
        genesis.save(&path).unwrap();
        assert_eq!(Genesis::load(&path).unwrap(), genesis);
    }
}
