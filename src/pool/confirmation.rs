//! Block-production tick
//!
//! On each tick the engine expires stale `PendingSignatures` entries, puts
//! `Ready` entries from senders that became multisig since admission back
//! under the confirmed signer policy, then walks `Ready` entries in
//! submission order, re-validates each against a
//! working copy of the committed state and applies it. The working copy
//! replaces the committed state only after the whole batch is processed.

use crate::core::{
    dependencies, ErrorKind, LedgerError, LedgerState, Transaction, TransactionValidator,
};
use crate::multisig::is_quorum_met;
use crate::pool::mempool::{PendingTransactionPool, TransactionStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whether the dapp or in-transfer a transaction references exists yet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyStatus {
    /// Every reference is confirmed
    Satisfied,
    /// Some reference is still waiting in the pool
    Pending,
    /// Some reference is neither confirmed nor pending
    Missing,
}

/// Resolve the references of `tx` against confirmed state and the pool
pub fn dependency_status(
    tx: &Transaction,
    state: &LedgerState,
    pool: &PendingTransactionPool,
) -> DependencyStatus {
    let mut status = DependencyStatus::Satisfied;
    for id in dependencies(tx) {
        if state.dapps.dapp(id).is_some() || state.dapps.in_transfer_dapp(id).is_some() {
            continue;
        }
        match pool.get(id) {
            Some(entry) if !entry.status.is_terminal() => status = DependencyStatus::Pending,
            _ => return DependencyStatus::Missing,
        }
    }
    status
}

/// Gate `Ready` entries admitted without a signer policy whose sender now
/// has a confirmed registration. Entries short of quorum go back to
/// `PendingSignatures` with their lifetime starting at `now`.
fn regate_new_multisig_senders(
    state: &LedgerState,
    pool: &mut PendingTransactionPool,
    now: u64,
) -> Vec<String> {
    let mut regated = Vec::new();
    for id in pool.ids_with_status(TransactionStatus::Ready) {
        let Some(entry) = pool.get_mut(&id) else {
            continue;
        };
        if entry.policy.is_some() || entry.tx.multisig_asset().is_some() {
            continue;
        }
        let Some(registration) = state.registry.lookup(&entry.tx.sender_id) else {
            continue;
        };

        let policy = registration.policy.clone();
        if !is_quorum_met(&policy, &entry.tx) {
            entry.status = TransactionStatus::PendingSignatures;
            entry.admitted_at = now;
            regated.push(id);
        }
        entry.policy = Some(policy);
    }
    regated
}

/// A transaction that failed commit re-validation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RejectedTransaction {
    pub id: String,
    pub kind: ErrorKind,
    pub reason: String,
}

/// What one tick did
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlockSummary {
    pub height: u64,
    pub timestamp: DateTime<Utc>,
    /// Confirmed ids in application order
    pub confirmed: Vec<String>,
    pub rejected: Vec<RejectedTransaction>,
    pub expired: Vec<String>,
    /// Kept `Ready` because a dependency is still pending
    pub deferred: Vec<String>,
}

/// Summary plus the transactions that left the pool unconfirmed
#[derive(Debug, Clone)]
pub struct BlockOutcome {
    pub summary: BlockSummary,
    pub rejected: Vec<(Transaction, LedgerError)>,
    pub expired: Vec<Transaction>,
}

/// Harvests `Ready` transactions into blocks
#[derive(Clone)]
pub struct ConfirmationEngine {
    validator: TransactionValidator,
    max_transactions_per_block: usize,
}

impl ConfirmationEngine {
    pub fn new(validator: TransactionValidator, max_transactions_per_block: usize) -> Self {
        Self {
            validator,
            max_transactions_per_block,
        }
    }

    /// Produce one block at monotonic time `now` (seconds)
    pub fn tick(
        &self,
        state: &mut LedgerState,
        pool: &mut PendingTransactionPool,
        now: u64,
    ) -> BlockOutcome {
        let height = state.height + 1;
        let mut summary = BlockSummary {
            height,
            timestamp: Utc::now(),
            confirmed: Vec::new(),
            rejected: Vec::new(),
            expired: Vec::new(),
            deferred: Vec::new(),
        };
        let mut rejected = Vec::new();
        let mut expired = Vec::new();

        for id in pool.expired_ids(now) {
            if let Some(entry) = pool.remove(&id) {
                log::info!(
                    "Transaction {} expired with {}/{} signatures",
                    id,
                    entry.tx.signature_count(),
                    entry.signatures_required()
                );
                summary.expired.push(id);
                expired.push(entry.tx);
            }
        }

        for id in regate_new_multisig_senders(state, pool, now) {
            log::info!("Transaction {} now needs multisig signatures", id);
        }

        let mut working = state.clone();

        for id in pool.ids_with_status(TransactionStatus::Ready) {
            if summary.confirmed.len() + summary.rejected.len() >= self.max_transactions_per_block
            {
                break;
            }

            let Some(entry) = pool.get_mut(&id) else {
                continue;
            };
            entry.status = TransactionStatus::Included;
            let tx = entry.tx.clone();

            let result = self
                .validator
                .check_state(&tx, &working)
                .and_then(|_| working.apply(&tx, height));

            match result {
                Ok(()) => {
                    pool.remove(&id);
                    summary.confirmed.push(id);
                }
                Err(e)
                    if e.is_transient()
                        && dependency_status(&tx, &working, pool) == DependencyStatus::Pending =>
                {
                    log::debug!("Deferring {}: {}", id, e);
                    if let Some(entry) = pool.get_mut(&id) {
                        entry.status = TransactionStatus::Ready;
                    }
                    summary.deferred.push(id);
                }
                Err(e) => {
                    log::warn!("Rejecting {} at height {}: {}", id, height, e);
                    pool.remove(&id);
                    summary.rejected.push(RejectedTransaction {
                        id,
                        kind: e.kind(),
                        reason: e.to_string(),
                    });
                    rejected.push((tx, e));
                }
            }
        }

        working.height = height;
        *state = working;

        log::info!(
            "Block {} produced: {} confirmed, {} rejected, {} expired, {} deferred",
            height,
            summary.confirmed.len(),
            summary.rejected.len(),
            summary.expired.len(),
            summary.deferred.len()
        );

        BlockOutcome {
            summary,
            rejected,
            expired,
        }
    }
}
