//! Signature collection for pending multisig transactions
//!
//! Member signatures arrive one at a time. Each is checked against the
//! signer policy captured when the transaction was admitted and recorded on
//! the pooled transaction. The entry becomes `Ready` once the number of
//! distinct valid member signatures reaches the policy's `min`.

use crate::core::{ErrorKind, Transaction};
use crate::crypto::{KeyError, KeyPair, SignatureVerifier};
use crate::pool::{PendingTransactionPool, TransactionStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use super::registry::MultisigPolicy;

/// Signature collection errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QuorumError {
    #[error("No pending transaction with id {0}")]
    UnknownTransaction(String),
    #[error("Signer is not a keysgroup member: {0}")]
    NotAMember(String),
    #[error("Member already signed: {0}")]
    DuplicateSignature(String),
    #[error("Signature does not verify for {0}")]
    InvalidSignature(String),
}

impl QuorumError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            QuorumError::DuplicateSignature(_) => ErrorKind::Conflict,
            _ => ErrorKind::Validation,
        }
    }
}

/// A single signature from a keysgroup member
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct MultisigSignature {
    /// Public key of the signer (hex)
    pub signer_pubkey: String,
    /// Signature over the transaction's signing hash (hex)
    pub signature: String,
    /// When the signature was added
    #[serde(default = "Utc::now")]
    pub signed_at: DateTime<Utc>,
}

impl MultisigSignature {
    pub fn new(signer_pubkey: String, signature: String) -> Self {
        Self {
            signer_pubkey,
            signature,
            signed_at: Utc::now(),
        }
    }
}

/// Sign a pending transaction as a keysgroup member
pub fn sign_transaction(tx: &Transaction, member: &KeyPair) -> Result<MultisigSignature, KeyError> {
    let signature = member.sign_hex(&tx.signing_hash())?;
    Ok(MultisigSignature::new(member.public_key_hex(), signature))
}

/// Whether `tx` carries at least `policy.min` distinct member signatures
pub fn is_quorum_met(policy: &MultisigPolicy, tx: &Transaction) -> bool {
    let mut signers: Vec<&str> = tx
        .signatures
        .iter()
        .map(|s| s.signer_pubkey.as_str())
        .filter(|k| policy.is_member(k))
        .collect();
    signers.sort_unstable();
    signers.dedup();
    signers.len() >= policy.min as usize
}

/// Accumulates member signatures on pooled transactions
#[derive(Clone)]
pub struct SignatureQuorumTracker {
    verifier: Arc<dyn SignatureVerifier>,
}

impl SignatureQuorumTracker {
    pub fn new(verifier: Arc<dyn SignatureVerifier>) -> Self {
        Self { verifier }
    }

    /// Record a member signature and re-evaluate readiness.
    ///
    /// Returns the entry's status after the signature is recorded.
    pub fn submit_signature(
        &self,
        pool: &mut PendingTransactionPool,
        transaction_id: &str,
        signer_public_key: &str,
        signature_hex: &str,
    ) -> Result<TransactionStatus, QuorumError> {
        let entry = pool
            .get_mut(transaction_id)
            .filter(|e| !e.status.is_terminal())
            .ok_or_else(|| QuorumError::UnknownTransaction(transaction_id.to_string()))?;

        let policy = match entry.policy.as_ref() {
            Some(policy) if policy.is_member(signer_public_key) => policy,
            _ => return Err(QuorumError::NotAMember(signer_public_key.to_string())),
        };

        if entry.tx.has_signature_from(signer_public_key) {
            return Err(QuorumError::DuplicateSignature(
                signer_public_key.to_string(),
            ));
        }

        if !self
            .verifier
            .verify(&entry.tx.signing_hash(), signature_hex, signer_public_key)
        {
            return Err(QuorumError::InvalidSignature(signer_public_key.to_string()));
        }

        entry.tx.signatures.push(MultisigSignature::new(
            signer_public_key.to_string(),
            signature_hex.to_string(),
        ));

        if entry.status == TransactionStatus::PendingSignatures && is_quorum_met(policy, &entry.tx)
        {
            entry.status = TransactionStatus::Ready;
            log::info!(
                "Transaction {} reached quorum ({} of {})",
                transaction_id,
                entry.tx.signature_count(),
                policy.keysgroup.len()
            );
        } else {
            log::debug!(
                "Signature {}/{} recorded for {}",
                entry.tx.signature_count(),
                policy.min,
                transaction_id
            );
        }

        Ok(entry.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TransactionBuilder;
    use crate::crypto::Secp256k1Verifier;

    struct Fixture {
        pool: PendingTransactionPool,
        tracker: SignatureQuorumTracker,
        members: Vec<KeyPair>,
        tx_id: String,
    }

    fn fixture(n: usize, min: u8) -> Fixture {
        let members: Vec<KeyPair> = (0..n).map(|_| KeyPair::generate()).collect();
        let policy = MultisigPolicy::new(
            members.iter().map(|m| m.public_key_hex()).collect(),
            min,
            24,
        )
        .unwrap();

        let sender = KeyPair::generate();
        let tx = TransactionBuilder::transfer("1recipient", 10)
            .sign(&sender)
            .unwrap();
        let tx_id = tx.id.clone();

        let mut pool = PendingTransactionPool::new();
        pool.insert(tx, TransactionStatus::PendingSignatures, Some(policy), 0)
            .unwrap();

        Fixture {
            pool,
            tracker: SignatureQuorumTracker::new(Arc::new(Secp256k1Verifier)),
            members,
            tx_id,
        }
    }

    fn sign(f: &mut Fixture, member: usize) -> Result<TransactionStatus, QuorumError> {
        let sig = sign_transaction(&f.pool.get(&f.tx_id).unwrap().tx, &f.members[member]).unwrap();
        let id = f.tx_id.clone();
        f.tracker
            .submit_signature(&mut f.pool, &id, &sig.signer_pubkey, &sig.signature)
    }

    #[test]
    fn test_ready_at_threshold() {
        let mut f = fixture(3, 2);

        assert_eq!(sign(&mut f, 0).unwrap(), TransactionStatus::PendingSignatures);
        assert_eq!(sign(&mut f, 1).unwrap(), TransactionStatus::Ready);
        // Late signatures are recorded without changing the state
        assert_eq!(sign(&mut f, 2).unwrap(), TransactionStatus::Ready);
        assert_eq!(f.pool.get(&f.tx_id).unwrap().tx.signature_count(), 3);
    }

    #[test]
    fn test_duplicate_signature_not_counted() {
        let mut f = fixture(3, 2);

        sign(&mut f, 0).unwrap();
        assert_eq!(
            sign(&mut f, 0).unwrap_err(),
            QuorumError::DuplicateSignature(f.members[0].public_key_hex())
        );
        let entry = f.pool.get(&f.tx_id).unwrap();
        assert_eq!(entry.tx.signature_count(), 1);
        assert_eq!(entry.status, TransactionStatus::PendingSignatures);
    }

    #[test]
    fn test_non_member_rejected() {
        let mut f = fixture(2, 1);
        let outsider = KeyPair::generate();
        let sig = sign_transaction(&f.pool.get(&f.tx_id).unwrap().tx, &outsider).unwrap();
        let id = f.tx_id.clone();

        let err = f
            .tracker
            .submit_signature(&mut f.pool, &id, &sig.signer_pubkey, &sig.signature)
            .unwrap_err();
        assert!(matches!(err, QuorumError::NotAMember(_)));
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_invalid_signature_rejected() {
        let mut f = fixture(2, 1);
        let member = f.members[0].public_key_hex();
        let forged = f.members[1]
            .sign_hex(&f.pool.get(&f.tx_id).unwrap().tx.signing_hash())
            .unwrap();
        let id = f.tx_id.clone();

        let err = f
            .tracker
            .submit_signature(&mut f.pool, &id, &member, &forged)
            .unwrap_err();
        assert_eq!(err, QuorumError::InvalidSignature(member));
        assert_eq!(f.pool.get(&f.tx_id).unwrap().tx.signature_count(), 0);
    }

    #[test]
    fn test_unknown_transaction() {
        let mut f = fixture(1, 1);
        let member = f.members[0].public_key_hex();
        let err = f
            .tracker
            .submit_signature(&mut f.pool, "missing", &member, "00")
            .unwrap_err();
        assert_eq!(err, QuorumError::UnknownTransaction("missing".to_string()));
    }

    #[test]
    fn test_quorum_ignores_outsiders() {
        let members: Vec<KeyPair> = (0..2).map(|_| KeyPair::generate()).collect();
        let policy =
            MultisigPolicy::new(members.iter().map(|m| m.public_key_hex()).collect(), 2, 1)
                .unwrap();
        let mut tx = TransactionBuilder::transfer("1r", 1)
            .sign(&KeyPair::generate())
            .unwrap();

        tx.signatures.push(sign_transaction(&tx, &members[0]).unwrap());
        tx.signatures
            .push(sign_transaction(&tx, &KeyPair::generate()).unwrap());
        assert!(!is_quorum_met(&policy, &tx));

        tx.signatures.push(sign_transaction(&tx, &members[1]).unwrap());
        assert!(is_quorum_met(&policy, &tx));
    }
}
