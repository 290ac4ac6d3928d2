//! CLI commands for the ledger node
//!
//! Implements the command handlers behind the `ledger` binary.

use crate::config::{Genesis, GenesisAccount, NodeConfig};
use crate::core::COIN;
use crate::crypto::{is_valid_address, KeyPair};
use crate::node::Node;
use crate::storage::{Storage, StorageConfig};
use std::path::{Path, PathBuf};

/// Result type for CLI operations
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Node settings file inside the data directory
pub const CONFIG_FILE: &str = "node.json";

/// Genesis file inside the data directory
pub const GENESIS_FILE: &str = "genesis.json";

/// Balance given to each genesis account when none is specified
pub const DEFAULT_GENESIS_BALANCE: u64 = 1_000_000 * COIN;

pub fn config_path(data_dir: &Path) -> PathBuf {
    data_dir.join(CONFIG_FILE)
}

/// Load the node settings for `data_dir`, falling back to defaults rooted there
pub fn load_config(data_dir: &Path) -> CliResult<NodeConfig> {
    let path = config_path(data_dir);
    if path.exists() {
        return NodeConfig::load(&path);
    }

    Ok(NodeConfig {
        storage: StorageConfig {
            data_dir: data_dir.to_path_buf(),
            ..Default::default()
        },
        ..Default::default()
    })
}

/// Build a node from the latest snapshot, or from genesis on first start
pub fn load_node(config: NodeConfig) -> CliResult<(Node, Storage)> {
    let storage = Storage::new(config.storage.clone())?;

    if storage.exists() {
        log::info!("Loading ledger snapshot from {:?}", config.storage.data_dir);
        let state = storage.load()?;
        return Ok((Node::with_state(config, state), storage));
    }

    let genesis = match &config.genesis_path {
        Some(path) => Genesis::load(path)?,
        None => {
            log::warn!("No genesis file configured, starting with an empty ledger");
            Genesis::default()
        }
    };

    let node = Node::from_genesis(config, &genesis)?;
    storage.save(node.state())?;
    Ok((node, storage))
}

/// Initialize a data directory with a genesis file and node settings
pub fn cmd_init(data_dir: &Path, fund: &[String], balance: Option<u64>) -> CliResult<()> {
    let config_file = config_path(data_dir);
    if config_file.exists() {
        println!("⚠️  Ledger already initialized at {:?}", data_dir);
        return Ok(());
    }

    std::fs::create_dir_all(data_dir)?;
    let balance = balance.unwrap_or(DEFAULT_GENESIS_BALANCE);

    let mut addresses = Vec::new();
    for address in fund {
        if !is_valid_address(address) {
            return Err(format!("Invalid address: {}", address).into());
        }
        addresses.push(address.clone());
    }

    if addresses.is_empty() {
        let keypair = KeyPair::generate();
        println!("🔐 Generated genesis key pair");
        println!("   📍 Address: {}", keypair.address());
        println!("   🔑 Public Key: {}", keypair.public_key_hex());
        println!("   🗝️  Private Key: {}", keypair.private_key_hex());
        println!("   ⚠️  Store the private key safely, it is not written to disk.");
        addresses.push(keypair.address());
    }

    let genesis = Genesis {
        accounts: addresses
            .into_iter()
            .map(|address| GenesisAccount { address, balance })
            .collect(),
        delegates: Vec::new(),
    };
    let genesis_path = data_dir.join(GENESIS_FILE);
    genesis.save(&genesis_path)?;

    let config = NodeConfig {
        genesis_path: Some(genesis_path.clone()),
        storage: StorageConfig {
            data_dir: data_dir.to_path_buf(),
            ..Default::default()
        },
        ..Default::default()
    };
    std::fs::write(&config_file, serde_json::to_string_pretty(&config)?)?;

    println!("✅ Ledger initialized!");
    println!("   📁 Data directory: {:?}", data_dir);
    println!("   🧾 Genesis: {:?}", genesis_path);
    println!("   💰 Funded accounts: {}", genesis.accounts.len());

    Ok(())
}

/// Derive or generate a key pair and print its address
pub fn cmd_keygen(secret: Option<&str>) -> CliResult<()> {
    let keypair = match secret {
        Some(passphrase) => KeyPair::from_secret(passphrase)?,
        None => KeyPair::generate(),
    };

    println!("🔐 Key pair");
    println!("   📍 Address: {}", keypair.address());
    println!("   🔑 Public Key: {}", keypair.public_key_hex());
    if secret.is_none() {
        println!("   🗝️  Private Key: {}", keypair.private_key_hex());
    }

    Ok(())
}

/// Display the persisted ledger state
pub fn cmd_status(data_dir: &Path) -> CliResult<()> {
    let config = load_config(data_dir)?;
    let storage = Storage::new(config.storage.clone())?;

    if !storage.exists() {
        println!("📭 No ledger snapshot in {:?}. Run `ledger start` first.", data_dir);
        return Ok(());
    }

    let state = storage.load()?;
    let stats = storage.stats()?;

    println!("⛓️  Ledger Status");
    println!("   ├─ Height: {}", state.height);
    println!("   ├─ Confirmed transactions: {}", state.confirmed.len());
    println!("   ├─ Accounts: {}", state.accounts.len());
    println!("   ├─ Total supply: {}", state.accounts.total_supply());
    println!("   ├─ Multisig accounts: {}", state.registry.len());
    println!("   ├─ Dapps: {}", state.dapps.len());
    println!("   ├─ Snapshot size: {} bytes", stats.file_size);
    println!("   └─ Backups: {}", stats.backup_count);

    Ok(())
}
