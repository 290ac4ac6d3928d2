//! Multisignature accounts
//!
//! An account becomes multisig once a type 4 transaction naming its
//! keysgroup, `min` and `lifetime` is confirmed. Afterwards every
//! transaction it sends waits in the pool until `min` distinct members
//! have signed it.
//!
//! # Example
//!
//! ```ignore
//! use multisig_ledger::multisig::{sign_transaction, MultisigPolicy};
//!
//! // A 2-of-3 policy
//! let policy = MultisigPolicy::new(vec![pk1, pk2, pk3], 2, 24)?;
//!
//! // Members sign the pending transaction's signing hash
//! let signature = sign_transaction(&pending_tx, &member_keys)?;
//! node.submit_signature(&pending_tx.id, &signature.signer_pubkey, &signature.signature)?;
//! ```

pub mod quorum;
pub mod registry;

pub use quorum::{
    is_quorum_met, sign_transaction, MultisigSignature, QuorumError, SignatureQuorumTracker,
};
pub use registry::{
    MultisigPolicy, MultisigRegistration, MultisigRegistry, RegistryError, MAX_KEYSGROUP_SIZE,
    MAX_LIFETIME_HOURS, MIN_LIFETIME_HOURS,
};
