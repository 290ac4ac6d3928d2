//! Ledger-wide error type and its classification

use crate::crypto::KeyError;
use crate::dapp::DappError;
use crate::multisig::{QuorumError, RegistryError};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// How a caller should treat a failure
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed or semantically invalid; never retried
    Validation,
    /// Lost against existing state or a competing transaction
    Conflict,
    /// A referenced dapp or in-transfer is not confirmed yet
    DependencyNotReady,
    /// Account or dapp balance would go negative
    InsufficientBalance,
    /// Lifetime elapsed before quorum
    Expired,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Conflict => "conflict",
            ErrorKind::DependencyNotReady => "dependency_not_ready",
            ErrorKind::InsufficientBalance => "insufficient_balance",
            ErrorKind::Expired => "expired",
        };
        f.write_str(name)
    }
}

/// Errors surfaced by submission, signing and commit-time re-validation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),
    #[error("Invalid sender signature")]
    InvalidSignature,
    #[error("Missing or invalid second signature")]
    InvalidSecondSignature,
    #[error("Invalid fee: expected {expected}, got {actual}")]
    FeeMismatch { expected: u64, actual: u64 },
    #[error("Unknown account: {0}")]
    UnknownAccount(String),
    #[error("Insufficient balance: have {have}, need {need}")]
    InsufficientBalance { have: u64, need: u64 },
    #[error("Transaction {0} was already rejected")]
    AlreadyRejected(String),
    #[error("Transaction pool is full")]
    PoolFull,
    #[error("Account already has a second signature")]
    AlreadyHasSecondSignature,
    #[error("Account is already a delegate")]
    AlreadyDelegate,
    #[error("Delegate name already taken: {0}")]
    DuplicateUsername(String),
    #[error("Delegate not found: {0}")]
    UnknownDelegate(String),
    #[error("Already voted for delegate: {0}")]
    AlreadyVoted(String),
    #[error("Not voted for delegate: {0}")]
    NotVoted(String),
    #[error("Maximum number of votes exceeded")]
    VoteLimitExceeded,
    #[error("Transaction {0} expired before reaching quorum")]
    Expired(String),
    #[error("Dependency not confirmed: {0}")]
    DependencyNotReady(String),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Quorum(#[from] QuorumError),
    #[error(transparent)]
    Dapp(#[from] DappError),
    #[error("Key error: {0}")]
    Key(String),
}

impl From<KeyError> for LedgerError {
    fn from(e: KeyError) -> Self {
        LedgerError::Key(e.to_string())
    }
}

impl LedgerError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::InvalidTransaction(_)
            | LedgerError::InvalidSignature
            | LedgerError::InvalidSecondSignature
            | LedgerError::FeeMismatch { .. }
            | LedgerError::UnknownAccount(_)
            | LedgerError::UnknownDelegate(_)
            | LedgerError::NotVoted(_)
            | LedgerError::VoteLimitExceeded
            | LedgerError::Key(_) => ErrorKind::Validation,
            LedgerError::AlreadyRejected(_)
            | LedgerError::PoolFull
            | LedgerError::AlreadyHasSecondSignature
            | LedgerError::AlreadyDelegate
            | LedgerError::DuplicateUsername(_)
            | LedgerError::AlreadyVoted(_) => ErrorKind::Conflict,
            LedgerError::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
            LedgerError::Expired(_) => ErrorKind::Expired,
            LedgerError::DependencyNotReady(_) => ErrorKind::DependencyNotReady,
            LedgerError::Registry(e) => e.kind(),
            LedgerError::Quorum(e) => e.kind(),
            LedgerError::Dapp(e) => e.kind(),
        }
    }

    /// Whether the transaction could still succeed in a later block
    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::DependencyNotReady
    }
}
