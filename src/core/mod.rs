//! Core ledger components
//!
//! This module contains the fundamental building blocks:
//! - Transactions (eight types, content-derived ids, fee schedule)
//! - Accounts (balances, second keys, delegates, votes)
//! - Committed ledger state and how confirmed transactions change it
//! - Admission rules (stateless, authorization and state checks)
//! - The error taxonomy shared by every component
//! - Monotonic clocks for lifetime expiry

pub mod account;
pub mod clock;
pub mod error;
pub mod state;
pub mod transaction;
pub mod validator;

pub use account::{
    validate_username, Account, AccountStore, Vote, MAX_VOTES_PER_ACCOUNT,
    MAX_VOTES_PER_TRANSACTION,
};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use error::{ErrorKind, LedgerError};
pub use state::{ConfirmedTransaction, LedgerState};
pub use transaction::{
    MultisignatureAsset, Transaction, TransactionAsset, TransactionBuilder, TransactionType, COIN,
    DAPP_FEE, DELEGATE_FEE, IN_TRANSFER_FEE, MULTISIGNATURE_FEE, OUT_TRANSFER_FEE,
    SECOND_SIGNATURE_FEE, TRANSFER_FEE, VOTE_FEE,
};
pub use validator::{dependencies, Admission, TransactionValidator};
