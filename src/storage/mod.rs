//! JSON snapshot persistence for committed ledger state

pub mod persistence;

pub use persistence::{Storage, StorageConfig, StorageError, StorageStats};
