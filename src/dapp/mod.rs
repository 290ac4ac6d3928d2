//! Dapps and application-scoped transfers
//!
//! Provides:
//! - Dapp registration payloads and records
//! - The dependency ledger tracking confirmed dapps, in-transfers and
//!   out-transfers, with the per-dapp balance invariant
//!   `total_out <= total_in`

pub mod dapp;
pub mod ledger;

pub use dapp::{Dapp, DappAsset, DappError, MAX_CATEGORY};
pub use ledger::DependencyLedger;
