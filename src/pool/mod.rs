//! Pending transactions and block confirmation
//!
//! The pool holds transactions from submission until a tick includes,
//! rejects or expires them. The confirmation engine runs those ticks.

pub mod confirmation;
pub mod mempool;

pub use confirmation::{
    dependency_status, BlockOutcome, BlockSummary, ConfirmationEngine, DependencyStatus,
    RejectedTransaction,
};
pub use mempool::{
    PendingTransactionPool, PoolConfig, PoolEntry, PoolError, PoolStats, TransactionStatus,
    DEFAULT_POOL_SIZE,
};
