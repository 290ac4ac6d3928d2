//! Ledger node
//!
//! Composes the validator, pool, quorum tracker and confirmation engine
//! around the committed ledger state. This is the boundary the API and CLI
//! talk to: submit transactions and signatures, look transactions up and
//! produce blocks.

use crate::config::{Genesis, NodeConfig};
use crate::core::{
    Account, Clock, ErrorKind, LedgerError, LedgerState, MonotonicClock, Transaction,
    TransactionValidator,
};
use crate::crypto::{Secp256k1Verifier, SignatureVerifier};
use crate::dapp::Dapp;
use crate::multisig::{MultisigRegistration, QuorumError, SignatureQuorumTracker};
use crate::pool::{
    dependency_status, BlockSummary, ConfirmationEngine, DependencyStatus, PendingTransactionPool,
    PoolEntry, PoolStats, TransactionStatus,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// A transaction that left the pool without being confirmed
#[derive(Debug, Clone, Serialize)]
pub struct FailedTransaction {
    pub id: String,
    pub status: TransactionStatus,
    pub signatures: usize,
    pub kind: ErrorKind,
    pub reason: String,
    pub height: u64,
    pub at: DateTime<Utc>,
}

/// Lookup result for a transaction id
#[derive(Debug, Clone, Serialize)]
pub struct TransactionView {
    pub id: String,
    /// `pending`, `confirmed`, `rejected`, `expired` or `unknown`
    pub status: &'static str,
    /// Detailed lifecycle state, absent for unknown ids
    pub state: Option<TransactionStatus>,
    pub transaction: Option<Transaction>,
    /// Block height for confirmed, rejected or expired transactions
    pub height: Option<u64>,
    pub signatures: usize,
    pub signatures_required: usize,
    pub reason: Option<String>,
}

impl TransactionView {
    fn unknown(id: &str) -> Self {
        Self {
            id: id.to_string(),
            status: "unknown",
            state: None,
            transaction: None,
            height: None,
            signatures: 0,
            signatures_required: 0,
            reason: None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.state.is_none()
    }
}

/// Ledger node state machine
pub struct Node {
    config: NodeConfig,
    state: LedgerState,
    pool: PendingTransactionPool,
    validator: TransactionValidator,
    tracker: SignatureQuorumTracker,
    engine: ConfirmationEngine,
    clock: Arc<dyn Clock>,
    failed: HashMap<String, FailedTransaction>,
    /// Failure ids, oldest first
    failed_order: VecDeque<String>,
}

impl Node {
    /// Create a node over an existing ledger state
    pub fn new(
        config: NodeConfig,
        state: LedgerState,
        verifier: Arc<dyn SignatureVerifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let validator = TransactionValidator::new(verifier);
        let tracker = SignatureQuorumTracker::new(validator.verifier());
        let engine = ConfirmationEngine::new(validator.clone(), config.max_transactions_per_block);
        let pool = PendingTransactionPool::with_config(config.pool.clone());

        Self {
            config,
            state,
            pool,
            validator,
            tracker,
            engine,
            clock,
            failed: HashMap::new(),
            failed_order: VecDeque::new(),
        }
    }

    /// Create a node over restored state with the production verifier and clock
    pub fn with_state(config: NodeConfig, state: LedgerState) -> Self {
        Self::new(
            config,
            state,
            Arc::new(Secp256k1Verifier),
            Arc::new(MonotonicClock::new()),
        )
    }

    /// Create a node from a genesis description
    pub fn from_genesis(config: NodeConfig, genesis: &Genesis) -> Result<Self, LedgerError> {
        let state = LedgerState::from_genesis(genesis)?;
        Ok(Self::with_state(config, state))
    }

    // =========================================================================
    // Submission
    // =========================================================================

    /// Admit a transaction into the pool.
    ///
    /// Resubmitting a pending or confirmed id returns that id. Member
    /// signatures attached to the transaction are recorded as if they had
    /// been submitted one by one.
    pub fn submit_transaction(&mut self, mut tx: Transaction) -> Result<String, LedgerError> {
        self.validator.validate_stateless(&tx)?;

        if self.pool.contains(&tx.id) || self.state.is_confirmed(&tx.id) {
            return Ok(tx.id);
        }
        if let Some(failed) = self.failed.get(&tx.id) {
            return Err(match failed.status {
                TransactionStatus::Expired => LedgerError::Expired(tx.id),
                _ => LedgerError::AlreadyRejected(tx.id),
            });
        }

        let admission = self.validator.authorize(&tx, &self.state)?;

        if let Err(e) = self.validator.check_state(&tx, &self.state) {
            let pending = e.is_transient()
                && dependency_status(&tx, &self.state, &self.pool) == DependencyStatus::Pending;
            if !pending {
                return Err(e);
            }
            log::debug!("Accepting {} ahead of its dependency: {}", tx.id, e);
        }

        let attached = std::mem::take(&mut tx.signatures);
        let id = tx.id.clone();
        let now = self.clock.now_secs();
        self.pool
            .insert(tx, admission.status, admission.policy, now)?;

        for signature in attached {
            if let Err(e) = self.tracker.submit_signature(
                &mut self.pool,
                &id,
                &signature.signer_pubkey,
                &signature.signature,
            ) {
                self.pool.remove(&id);
                return Err(e.into());
            }
        }

        log::info!("Transaction {} accepted as {:?}", id, self.status_of(&id));
        Ok(id)
    }

    /// Record a keysgroup member's signature on a pending transaction
    pub fn submit_signature(
        &mut self,
        transaction_id: &str,
        signer_public_key: &str,
        signature_hex: &str,
    ) -> Result<TransactionStatus, LedgerError> {
        if !self.pool.contains(transaction_id) {
            return Err(QuorumError::UnknownTransaction(transaction_id.to_string()).into());
        }
        Ok(self.tracker.submit_signature(
            &mut self.pool,
            transaction_id,
            signer_public_key,
            signature_hex,
        )?)
    }

    // =========================================================================
    // Blocks
    // =========================================================================

    /// Run one confirmation tick
    pub fn on_block_produced(&mut self) -> BlockSummary {
        let now = self.clock.now_secs();
        let outcome = self.engine.tick(&mut self.state, &mut self.pool, now);
        let height = outcome.summary.height;
        let at = outcome.summary.timestamp;

        for (transaction, error) in outcome.rejected {
            self.record_failure(FailedTransaction {
                id: transaction.id,
                status: TransactionStatus::Rejected,
                signatures: transaction.signatures.len(),
                kind: error.kind(),
                reason: error.to_string(),
                height,
                at,
            });
        }

        for transaction in outcome.expired {
            let reason = LedgerError::Expired(transaction.id.clone());
            self.record_failure(FailedTransaction {
                id: transaction.id,
                status: TransactionStatus::Expired,
                signatures: transaction.signatures.len(),
                kind: reason.kind(),
                reason: reason.to_string(),
                height,
                at,
            });
        }

        outcome.summary
    }

    fn record_failure(&mut self, failure: FailedTransaction) {
        if self.config.max_failed_history == 0 {
            return;
        }
        while self.failed_order.len() >= self.config.max_failed_history {
            match self.failed_order.pop_front() {
                Some(oldest) => {
                    self.failed.remove(&oldest);
                }
                None => break,
            }
        }
        self.failed_order.push_back(failure.id.clone());
        self.failed.insert(failure.id.clone(), failure);
    }

    // =========================================================================
    // Queries
    // =========================================================================

    fn status_of(&self, id: &str) -> Option<TransactionStatus> {
        self.pool.get(id).map(|e| e.status)
    }

    /// Look a transaction up in the pool, the ledger or the failure log
    pub fn get_transaction(&self, id: &str) -> TransactionView {
        if let Some(entry) = self.pool.get(id) {
            return TransactionView {
                id: id.to_string(),
                status: entry.status.label(),
                state: Some(entry.status),
                transaction: Some(entry.tx.clone()),
                height: None,
                signatures: entry.tx.signature_count(),
                signatures_required: entry.signatures_required(),
                reason: None,
            };
        }

        if let Some(confirmed) = self.state.confirmed_transaction(id) {
            return TransactionView {
                id: id.to_string(),
                status: TransactionStatus::Confirmed.label(),
                state: Some(TransactionStatus::Confirmed),
                transaction: Some(confirmed.transaction.clone()),
                height: Some(confirmed.height),
                signatures: confirmed.transaction.signature_count(),
                signatures_required: 0,
                reason: None,
            };
        }

        if let Some(failed) = self.failed.get(id) {
            return TransactionView {
                id: id.to_string(),
                status: failed.status.label(),
                state: Some(failed.status),
                transaction: None,
                height: Some(failed.height),
                signatures: failed.signatures,
                signatures_required: 0,
                reason: Some(failed.reason.clone()),
            };
        }

        TransactionView::unknown(id)
    }

    pub fn pool_entries(&self) -> Vec<&PoolEntry> {
        self.pool.entries()
    }

    /// Pool entries sent by `address`, oldest first
    pub fn pending_from(&self, address: &str) -> Vec<&PoolEntry> {
        self.pool.by_sender(address)
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    pub fn account(&self, address: &str) -> Option<&Account> {
        self.state.accounts.get(address)
    }

    pub fn balance(&self, address: &str) -> u64 {
        self.state.accounts.balance(address)
    }

    pub fn multisig(&self, address: &str) -> Option<&MultisigRegistration> {
        self.state.registry.lookup(address)
    }

    /// Multisig accounts whose keysgroup includes `public_key`
    pub fn memberships(&self, public_key: &str) -> Vec<&MultisigRegistration> {
        self.state.registry.memberships(public_key)
    }

    pub fn dapp(&self, id: &str) -> Option<&Dapp> {
        self.state.dapps.dapp(id)
    }

    pub fn dapps(&self) -> Vec<&Dapp> {
        self.state.dapps.list()
    }

    pub fn height(&self) -> u64 {
        self.state.height
    }

    pub fn state(&self) -> &LedgerState {
        &self.state
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }
}
