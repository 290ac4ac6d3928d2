//! Transaction admission rules
//!
//! Checks come in three layers:
//! - [`TransactionValidator::validate_stateless`]: format, fee and sender
//!   signature; needs no ledger state.
//! - [`TransactionValidator::authorize`]: second signature and signer
//!   policy, judged once against the state at admission.
//! - [`TransactionValidator::check_state`]: balance and type-specific
//!   preconditions. Run at admission and again at commit.

use crate::core::account::{validate_username, Vote, MAX_VOTES_PER_TRANSACTION};
use crate::core::error::LedgerError;
use crate::core::state::LedgerState;
use crate::core::transaction::{Transaction, TransactionAsset};
use crate::crypto::{
    address_from_public_key_hex, is_valid_address, public_key_from_hex, SignatureVerifier,
};
use crate::multisig::MultisigPolicy;
use crate::pool::TransactionStatus;
use std::sync::Arc;

/// Initial pool state and signer policy decided at admission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    pub status: TransactionStatus,
    pub policy: Option<MultisigPolicy>,
}

/// Type-specific admission and commit rules
#[derive(Clone)]
pub struct TransactionValidator {
    verifier: Arc<dyn SignatureVerifier>,
}

impl TransactionValidator {
    pub fn new(verifier: Arc<dyn SignatureVerifier>) -> Self {
        Self { verifier }
    }

    pub fn verifier(&self) -> Arc<dyn SignatureVerifier> {
        Arc::clone(&self.verifier)
    }

    /// Checks that depend only on the transaction itself
    pub fn validate_stateless(&self, tx: &Transaction) -> Result<(), LedgerError> {
        if tx.asset.expected_type() != tx.tx_type {
            return Err(LedgerError::InvalidTransaction(format!(
                "asset does not match {}",
                tx.tx_type
            )));
        }

        if tx.id != tx.calculate_id() {
            return Err(LedgerError::InvalidTransaction("id mismatch".to_string()));
        }

        let expected = tx.expected_fee();
        if tx.fee != expected {
            return Err(LedgerError::FeeMismatch {
                expected,
                actual: tx.fee,
            });
        }

        let address = address_from_public_key_hex(&tx.sender_public_key)?;
        if address != tx.sender_id {
            return Err(LedgerError::InvalidTransaction(
                "sender_id does not match sender_public_key".to_string(),
            ));
        }

        if !self
            .verifier
            .verify(&tx.signing_hash(), &tx.signature, &tx.sender_public_key)
        {
            return Err(LedgerError::InvalidSignature);
        }

        if tx.tx_type.carries_amount() {
            if tx.amount == 0 {
                return Err(LedgerError::InvalidTransaction(
                    "amount must be positive".to_string(),
                ));
            }
        } else if tx.amount != 0 {
            return Err(LedgerError::InvalidTransaction(format!(
                "{} cannot carry an amount",
                tx.tx_type
            )));
        }

        match (&tx.recipient_id, tx.tx_type.requires_recipient()) {
            (Some(recipient), true) if !is_valid_address(recipient) => {
                return Err(LedgerError::InvalidTransaction(format!(
                    "invalid recipient: {}",
                    recipient
                )))
            }
            (None, true) => {
                return Err(LedgerError::InvalidTransaction(
                    "recipient required".to_string(),
                ))
            }
            (Some(_), false) => {
                return Err(LedgerError::InvalidTransaction(format!(
                    "{} cannot have a recipient",
                    tx.tx_type
                )))
            }
            _ => {}
        }

        self.validate_asset(tx)
    }

    fn validate_asset(&self, tx: &Transaction) -> Result<(), LedgerError> {
        match &tx.asset {
            TransactionAsset::None => Ok(()),
            TransactionAsset::Signature { public_key } => {
                public_key_from_hex(public_key)?;
                Ok(())
            }
            TransactionAsset::Delegate { username } => validate_username(username),
            TransactionAsset::Votes { votes } => validate_votes(votes),
            TransactionAsset::Multisignature(asset) => {
                MultisigPolicy::from_asset(asset, &tx.sender_public_key)?;
                Ok(())
            }
            TransactionAsset::Dapp(asset) => {
                asset.validate()?;
                Ok(())
            }
            TransactionAsset::InTransfer { dapp_id } => require_reference("dapp_id", dapp_id),
            TransactionAsset::OutTransfer {
                dapp_id,
                transaction_id,
            } => {
                require_reference("dapp_id", dapp_id)?;
                require_reference("transaction_id", transaction_id)
            }
        }
    }

    /// Decide the signer policy and initial state.
    ///
    /// A multisig sender, or a type 4 registration, starts in
    /// `PendingSignatures`; everything else is `Ready` at once.
    pub fn authorize(
        &self,
        tx: &Transaction,
        state: &LedgerState,
    ) -> Result<Admission, LedgerError> {
        let account = state
            .accounts
            .get(&tx.sender_id)
            .ok_or_else(|| LedgerError::UnknownAccount(tx.sender_id.clone()))?;

        match (&account.second_public_key, &tx.sign_signature) {
            (Some(second_key), Some(signature)) => {
                if !self
                    .verifier
                    .verify(&tx.signing_hash(), signature, second_key)
                {
                    return Err(LedgerError::InvalidSecondSignature);
                }
            }
            (Some(_), None) | (None, Some(_)) => return Err(LedgerError::InvalidSecondSignature),
            (None, None) => {}
        }

        let policy = match tx.multisig_asset() {
            Some(asset) => Some(MultisigPolicy::from_asset(asset, &tx.sender_public_key)?),
            None => state
                .registry
                .lookup(&tx.sender_id)
                .map(|registration| registration.policy.clone()),
        };

        let status = if policy.is_some() {
            TransactionStatus::PendingSignatures
        } else {
            TransactionStatus::Ready
        };

        Ok(Admission { status, policy })
    }

    /// State-dependent preconditions, re-checked at commit
    pub fn check_state(&self, tx: &Transaction, state: &LedgerState) -> Result<(), LedgerError> {
        state.accounts.check_debit(&tx.sender_id, tx.sender_debit())?;

        match &tx.asset {
            TransactionAsset::None => {}
            TransactionAsset::Signature { .. } => {
                state.accounts.check_second_signature(&tx.sender_id)?;
            }
            TransactionAsset::Delegate { username } => {
                state.accounts.check_delegate(&tx.sender_id, username)?;
            }
            TransactionAsset::Votes { votes } => {
                state.accounts.check_votes(&tx.sender_id, votes)?;
            }
            TransactionAsset::Multisignature(_) => {
                state.registry.check_available(&tx.sender_id)?;
            }
            TransactionAsset::Dapp(asset) => {
                state.dapps.check_register_dapp(asset)?;
            }
            TransactionAsset::InTransfer { dapp_id } => {
                state.dapps.check_in_transfer(dapp_id, tx.amount)?;
            }
            TransactionAsset::OutTransfer {
                dapp_id,
                transaction_id,
            } => {
                state
                    .dapps
                    .check_out_transfer(dapp_id, transaction_id, tx.amount)?;
            }
        }
        Ok(())
    }
}

/// Ids of confirmed records a transaction depends on
pub fn dependencies(tx: &Transaction) -> Vec<&str> {
    match &tx.asset {
        TransactionAsset::InTransfer { dapp_id } => vec![dapp_id.as_str()],
        TransactionAsset::OutTransfer {
            dapp_id,
            transaction_id,
        } => vec![dapp_id.as_str(), transaction_id.as_str()],
        _ => Vec::new(),
    }
}

fn require_reference(field: &str, value: &str) -> Result<(), LedgerError> {
    if value.is_empty() || hex::decode(value).is_err() {
        return Err(LedgerError::InvalidTransaction(format!(
            "{} must be a transaction id",
            field
        )));
    }
    Ok(())
}

fn validate_votes(votes: &[String]) -> Result<(), LedgerError> {
    if votes.is_empty() || votes.len() > MAX_VOTES_PER_TRANSACTION {
        return Err(LedgerError::InvalidTransaction(format!(
            "votes must contain 1-{} entries",
            MAX_VOTES_PER_TRANSACTION
        )));
    }

    let mut keys: Vec<&str> = Vec::with_capacity(votes.len());
    for entry in votes {
        let vote = Vote::parse(entry).ok_or_else(|| {
            LedgerError::InvalidTransaction(format!("vote must start with + or -: {}", entry))
        })?;
        public_key_from_hex(vote.public_key())?;
        if keys.contains(&vote.public_key()) {
            return Err(LedgerError::InvalidTransaction(format!(
                "duplicate vote for {}",
                vote.public_key()
            )));
        }
        keys.push(vote.public_key());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transaction::{TransactionBuilder, COIN};
    use crate::crypto::{KeyPair, Secp256k1Verifier};
    use crate::dapp::{DappAsset, DappError};

    fn validator() -> TransactionValidator {
        TransactionValidator::new(Arc::new(Secp256k1Verifier))
    }

    fn funded(keys: &[&KeyPair]) -> LedgerState {
        let mut state = LedgerState::default();
        for kp in keys {
            state.accounts.credit(&kp.address(), 1000 * COIN);
        }
        state
    }

    #[test]
    fn test_stateless_accepts_valid_transfer() {
        let alice = KeyPair::generate();
        let bob = KeyPair::generate();
        let tx = TransactionBuilder::transfer(&bob.address(), COIN)
            .sign(&alice)
            .unwrap();
        assert!(validator().validate_stateless(&tx).is_ok());
    }

    #[test]
    fn test_stateless_rejects_tampering() {
        let alice = KeyPair::generate();
        let bob = KeyPair::generate();
        let tx = TransactionBuilder::transfer(&bob.address(), COIN)
            .sign(&alice)
            .unwrap();

        let mut wrong_fee = tx.clone();
        wrong_fee.fee += 1;
        wrong_fee.id = wrong_fee.calculate_id();
        assert!(matches!(
            validator().validate_stateless(&wrong_fee),
            Err(LedgerError::FeeMismatch { .. })
        ));

        let mut wrong_amount = tx.clone();
        wrong_amount.amount = 2 * COIN;
        wrong_amount.id = wrong_amount.calculate_id();
        assert_eq!(
            validator().validate_stateless(&wrong_amount).unwrap_err(),
            LedgerError::InvalidSignature
        );

        let mut wrong_id = tx.clone();
        wrong_id.id = "00".repeat(32);
        assert!(validator().validate_stateless(&wrong_id).is_err());

        let zero = TransactionBuilder::transfer(&bob.address(), 0)
            .sign(&alice)
            .unwrap();
        assert!(validator().validate_stateless(&zero).is_err());

        let bad_recipient = TransactionBuilder::transfer("nowhere", 1)
            .sign(&alice)
            .unwrap();
        assert!(validator().validate_stateless(&bad_recipient).is_err());
    }

    #[test]
    fn test_stateless_asset_rules() {
        let alice = KeyPair::generate();
        let delegate = KeyPair::generate();

        let bad_name = TransactionBuilder::delegate("Bad Name").sign(&alice).unwrap();
        assert!(validator().validate_stateless(&bad_name).is_err());

        let key = delegate.public_key_hex();
        let dup_votes = TransactionBuilder::vote(vec![format!("+{}", key), format!("-{}", key)])
            .sign(&alice)
            .unwrap();
        assert!(validator().validate_stateless(&dup_votes).is_err());

        let too_many: Vec<String> = (0..34)
            .map(|_| format!("+{}", KeyPair::generate().public_key_hex()))
            .collect();
        let votes = TransactionBuilder::vote(too_many).sign(&alice).unwrap();
        assert!(validator().validate_stateless(&votes).is_err());

        let self_member =
            TransactionBuilder::multisignature(1, 1, vec![format!("+{}", alice.public_key_hex())])
                .sign(&alice)
                .unwrap();
        assert!(validator().validate_stateless(&self_member).is_err());

        let bad_dapp = TransactionBuilder::dapp(DappAsset::new("x", "https://x/app.tar", 0))
            .sign(&alice)
            .unwrap();
        assert!(matches!(
            validator().validate_stateless(&bad_dapp),
            Err(LedgerError::Dapp(DappError::InvalidDapp(_)))
        ));
    }

    #[test]
    fn test_authorize_plain_and_multisig() {
        let alice = KeyPair::generate();
        let member = KeyPair::generate();
        let bob = KeyPair::generate();
        let mut state = funded(&[&alice]);

        let transfer = TransactionBuilder::transfer(&bob.address(), COIN)
            .sign(&alice)
            .unwrap();
        let admission = validator().authorize(&transfer, &state).unwrap();
        assert_eq!(admission.status, TransactionStatus::Ready);
        assert!(admission.policy.is_none());

        let registration =
            TransactionBuilder::multisignature(1, 2, vec![format!("+{}", member.public_key_hex())])
                .sign(&alice)
                .unwrap();
        let admission = validator().authorize(&registration, &state).unwrap();
        assert_eq!(admission.status, TransactionStatus::PendingSignatures);
        assert_eq!(admission.policy.as_ref().unwrap().lifetime, 2);

        let policy = MultisigPolicy::new(vec![member.public_key_hex()], 1, 1).unwrap();
        state
            .registry
            .register(&alice.address(), policy.clone(), &registration.id, 1)
            .unwrap();
        let admission = validator().authorize(&transfer, &state).unwrap();
        assert_eq!(admission.status, TransactionStatus::PendingSignatures);
        assert_eq!(admission.policy, Some(policy));
    }

    #[test]
    fn test_authorize_second_signature() {
        let alice = KeyPair::generate();
        let second = KeyPair::generate();
        let bob = KeyPair::generate();
        let mut state = funded(&[&alice]);
        state
            .accounts
            .set_second_public_key(&alice.address(), &second.public_key_hex())
            .unwrap();

        let unsigned = TransactionBuilder::transfer(&bob.address(), COIN)
            .sign(&alice)
            .unwrap();
        assert_eq!(
            validator().authorize(&unsigned, &state).unwrap_err(),
            LedgerError::InvalidSecondSignature
        );

        let signed = TransactionBuilder::transfer(&bob.address(), COIN)
            .sign_with_second(&alice, &second)
            .unwrap();
        assert!(validator().authorize(&signed, &state).is_ok());

        let wrong = TransactionBuilder::transfer(&bob.address(), COIN)
            .sign_with_second(&alice, &KeyPair::generate())
            .unwrap();
        assert!(validator().authorize(&wrong, &state).is_err());
    }

    #[test]
    fn test_unknown_sender() {
        let stranger = KeyPair::generate();
        let tx = TransactionBuilder::transfer(&KeyPair::generate().address(), 1)
            .sign(&stranger)
            .unwrap();
        assert!(matches!(
            validator().authorize(&tx, &LedgerState::default()),
            Err(LedgerError::UnknownAccount(_))
        ));
    }

    #[test]
    fn test_check_state_rules() {
        let alice = KeyPair::generate();
        let bob = KeyPair::generate();
        let state = funded(&[&alice]);

        let too_much = TransactionBuilder::transfer(&bob.address(), 1000 * COIN)
            .sign(&alice)
            .unwrap();
        assert!(matches!(
            validator().check_state(&too_much, &state),
            Err(LedgerError::InsufficientBalance { .. })
        ));

        let in_transfer = TransactionBuilder::in_transfer(&"ab".repeat(32), COIN)
            .sign(&alice)
            .unwrap();
        let err = validator().check_state(&in_transfer, &state).unwrap_err();
        assert!(err.is_transient());
        assert_eq!(dependencies(&in_transfer).len(), 1);

        let vote = TransactionBuilder::vote(vec![format!("+{}", bob.public_key_hex())])
            .sign(&alice)
            .unwrap();
        assert!(matches!(
            validator().check_state(&vote, &state),
            Err(LedgerError::UnknownDelegate(_))
        ));
    }
}
