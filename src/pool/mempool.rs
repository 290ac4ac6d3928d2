//! Pending transaction pool
//!
//! Holds transactions between submission and block inclusion. Entries are
//! indexed by id and by sender address and carry a submission sequence
//! number so the confirmation engine can apply them in arrival order.

use crate::core::Transaction;
use crate::core::LedgerError;
use crate::multisig::MultisigPolicy;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

// =============================================================================
// Configuration
// =============================================================================

/// Default maximum pool transaction count
pub const DEFAULT_POOL_SIZE: usize = 1000;

/// Pool limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Maximum number of pending transactions
    pub max_size: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_POOL_SIZE,
        }
    }
}

// =============================================================================
// Error Types
// =============================================================================

/// Pool errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("Transaction already in pool: {0}")]
    DuplicateTransaction(String),
    #[error("Transaction pool full")]
    PoolFull,
}

impl From<PoolError> for LedgerError {
    fn from(e: PoolError) -> Self {
        match e {
            PoolError::PoolFull => LedgerError::PoolFull,
            PoolError::DuplicateTransaction(id) => {
                LedgerError::InvalidTransaction(format!("duplicate transaction {}", id))
            }
        }
    }
}

// =============================================================================
// Lifecycle
// =============================================================================

/// Transaction lifecycle state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Created,
    PendingSignatures,
    Ready,
    Included,
    Confirmed,
    Rejected,
    Expired,
}

impl TransactionStatus {
    /// `Confirmed`, `Rejected` and `Expired` never change again
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Confirmed | TransactionStatus::Rejected | TransactionStatus::Expired
        )
    }

    /// Coarse status reported to API clients
    pub fn label(&self) -> &'static str {
        match self {
            TransactionStatus::Created
            | TransactionStatus::PendingSignatures
            | TransactionStatus::Ready
            | TransactionStatus::Included => "pending",
            TransactionStatus::Confirmed => "confirmed",
            TransactionStatus::Rejected => "rejected",
            TransactionStatus::Expired => "expired",
        }
    }
}

// =============================================================================
// Pool Entry
// =============================================================================

/// A pending transaction with its pool metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolEntry {
    pub tx: Transaction,
    pub status: TransactionStatus,
    /// Submission order, strictly increasing
    pub sequence: u64,
    /// Wall-clock arrival time
    pub received_at: DateTime<Utc>,
    /// Monotonic clock reading (seconds) at admission
    pub admitted_at: u64,
    /// Signer policy governing this transaction, if any
    pub policy: Option<MultisigPolicy>,
}

impl PoolEntry {
    /// Seconds after admission at which a `PendingSignatures` entry expires
    pub fn lifetime_secs(&self) -> Option<u64> {
        self.policy.as_ref().map(|p| p.lifetime_secs())
    }

    /// Whether the entry is still waiting for signatures past its lifetime
    pub fn is_expired(&self, now: u64) -> bool {
        if self.status != TransactionStatus::PendingSignatures {
            return false;
        }
        match self.lifetime_secs() {
            Some(lifetime) => now.saturating_sub(self.admitted_at) >= lifetime,
            None => false,
        }
    }

    /// Signatures required before the entry becomes `Ready`
    pub fn signatures_required(&self) -> usize {
        self.policy.as_ref().map(|p| p.min as usize).unwrap_or(0)
    }
}

/// Pool statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct PoolStats {
    pub total: usize,
    pub pending_signatures: usize,
    pub ready: usize,
    pub max_size: usize,
}

// =============================================================================
// Pool
// =============================================================================

/// Transactions awaiting signatures or inclusion
#[derive(Debug, Default)]
pub struct PendingTransactionPool {
    /// Entries indexed by transaction id
    entries: HashMap<String, PoolEntry>,
    /// Sender address -> transaction ids
    by_sender: HashMap<String, Vec<String>>,
    /// Transaction ids in order of arrival
    by_time: Vec<String>,
    next_sequence: u64,
    config: PoolConfig,
}

impl PendingTransactionPool {
    pub fn new() -> Self {
        Self::with_config(PoolConfig::default())
    }

    pub fn with_config(config: PoolConfig) -> Self {
        Self {
            entries: HashMap::new(),
            by_sender: HashMap::new(),
            by_time: Vec::new(),
            next_sequence: 0,
            config,
        }
    }

    /// Add a transaction in the given initial state
    pub fn insert(
        &mut self,
        tx: Transaction,
        status: TransactionStatus,
        policy: Option<MultisigPolicy>,
        admitted_at: u64,
    ) -> Result<&PoolEntry, PoolError> {
        if self.entries.contains_key(&tx.id) {
            return Err(PoolError::DuplicateTransaction(tx.id));
        }
        if self.entries.len() >= self.config.max_size {
            return Err(PoolError::PoolFull);
        }

        let id = tx.id.clone();
        self.by_sender
            .entry(tx.sender_id.clone())
            .or_default()
            .push(id.clone());
        self.by_time.push(id.clone());

        let entry = PoolEntry {
            tx,
            status,
            sequence: self.next_sequence,
            received_at: Utc::now(),
            admitted_at,
            policy,
        };
        self.next_sequence += 1;

        log::debug!("Pool accepted {} as {:?}", id, status);
        Ok(self.entries.entry(id).or_insert(entry))
    }

    /// Remove an entry, returning it
    pub fn remove(&mut self, id: &str) -> Option<PoolEntry> {
        let entry = self.entries.remove(id)?;
        self.by_time.retain(|t| t != id);
        if let Some(ids) = self.by_sender.get_mut(&entry.tx.sender_id) {
            ids.retain(|t| t != id);
            if ids.is_empty() {
                self.by_sender.remove(&entry.tx.sender_id);
            }
        }
        Some(entry)
    }

    pub fn get(&self, id: &str) -> Option<&PoolEntry> {
        self.entries.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut PoolEntry> {
        self.entries.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Entries sent from `address`, oldest first
    pub fn by_sender(&self, address: &str) -> Vec<&PoolEntry> {
        self.by_sender
            .get(address)
            .map(|ids| ids.iter().filter_map(|id| self.entries.get(id)).collect())
            .unwrap_or_default()
    }

    /// All entries in submission order
    pub fn entries(&self) -> Vec<&PoolEntry> {
        self.by_time
            .iter()
            .filter_map(|id| self.entries.get(id))
            .collect()
    }

    /// Ids of entries in `status`, in submission order
    pub fn ids_with_status(&self, status: TransactionStatus) -> Vec<String> {
        self.by_time
            .iter()
            .filter(|id| self.entries.get(*id).map(|e| e.status) == Some(status))
            .cloned()
            .collect()
    }

    /// Ids of `PendingSignatures` entries whose lifetime elapsed at `now`
    pub fn expired_ids(&self, now: u64) -> Vec<String> {
        self.by_time
            .iter()
            .filter(|id| self.entries.get(*id).is_some_and(|e| e.is_expired(now)))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> PoolStats {
        let count = |status| self.entries.values().filter(|e| e.status == status).count();
        PoolStats {
            total: self.entries.len(),
            pending_signatures: count(TransactionStatus::PendingSignatures),
            ready: count(TransactionStatus::Ready),
            max_size: self.config.max_size,
        }
    }
}
