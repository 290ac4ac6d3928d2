//! Multisig-Ledger: an account-based ledger node with multisignature accounts
//!
//! This crate provides:
//! - Eight transaction types with content-derived ids and a fixed fee schedule
//! - ECDSA signatures (secp256k1) and Base58Check addresses
//! - Multisignature accounts: keysgroup registration and signature quorums
//! - Dapp registration with in/out transfers and per-dapp balances
//! - A pending pool with lifetime expiry and dependency deferral
//! - Deterministic block confirmation with commit-time re-validation
//! - JSON snapshot persistence, a REST API and a WebSocket event feed
//!
//! # Example
//!
//! ```rust
//! use multisig_ledger::config::{Genesis, GenesisAccount, NodeConfig};
//! use multisig_ledger::core::{TransactionBuilder, COIN};
//! use multisig_ledger::{KeyPair, Node};
//!
//! let alice = KeyPair::generate();
//! let bob = KeyPair::generate();
//! let genesis = Genesis {
//!     accounts: vec![GenesisAccount { address: alice.address(), balance: 10 * COIN }],
//!     delegates: vec![],
//! };
//! let mut node = Node::from_genesis(NodeConfig::default(), &genesis).unwrap();
//!
//! let tx = TransactionBuilder::transfer(&bob.address(), COIN).sign(&alice).unwrap();
//! let id = node.submit_transaction(tx).unwrap();
//!
//! let summary = node.on_block_produced();
//! assert_eq!(summary.confirmed, vec![id]);
//! assert_eq!(node.balance(&bob.address()), COIN);
//! ```

pub mod api;
pub mod cli;
pub mod config;
pub mod core;
pub mod crypto;
pub mod dapp;
pub mod multisig;
pub mod node;
pub mod pool;
pub mod storage;

// Re-export commonly used types
pub use api::{create_router, ApiState};
pub use config::{Genesis, NodeConfig};
pub use core::{ErrorKind, LedgerError, LedgerState, Transaction, TransactionBuilder, COIN};
pub use crypto::KeyPair;
pub use dapp::{Dapp, DependencyLedger};
pub use multisig::{MultisigPolicy, MultisigRegistry, SignatureQuorumTracker};
pub use node::Node;
pub use pool::{BlockSummary, ConfirmationEngine, PendingTransactionPool, TransactionStatus};
pub use storage::Storage;
