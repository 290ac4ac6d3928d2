//! Committed ledger state
//!
//! Everything a confirmed transaction can change lives here: balances,
//! delegates, votes, multisig registrations and dapps. The confirmation
//! engine clones this state, applies a block's worth of transactions to the
//! clone and swaps it in once the batch is done.

use crate::config::Genesis;
use crate::core::account::AccountStore;
use crate::core::error::LedgerError;
use crate::core::transaction::{Transaction, TransactionAsset};
use crate::crypto::address_from_public_key_hex;
use crate::dapp::DependencyLedger;
use crate::multisig::{MultisigPolicy, MultisigRegistry};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A transaction and the block it was confirmed in
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConfirmedTransaction {
    pub transaction: Transaction,
    pub height: u64,
    pub confirmed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerState {
    pub accounts: AccountStore,
    pub registry: MultisigRegistry,
    pub dapps: DependencyLedger,
    /// Number of blocks produced so far
    pub height: u64,
    pub confirmed: HashMap<String, ConfirmedTransaction>,
}

impl LedgerState {
    /// Build the height 0 state from a genesis description
    pub fn from_genesis(genesis: &Genesis) -> Result<Self, LedgerError> {
        let mut state = Self::default();

        for account in &genesis.accounts {
            state.accounts.credit(&account.address, account.balance);
        }

        for delegate in &genesis.delegates {
            let address = address_from_public_key_hex(&delegate.public_key)?;
            state.accounts.credit(&address, 0);
            state.accounts.learn_public_key(&address, &delegate.public_key);
            state
                .accounts
                .register_delegate(&address, &delegate.public_key, &delegate.username)?;
        }

        log::info!(
            "Genesis state: {} accounts, {} delegates, supply {}",
            state.accounts.len(),
            genesis.delegates.len(),
            state.accounts.total_supply()
        );
        Ok(state)
    }

    pub fn is_confirmed(&self, id: &str) -> bool {
        self.confirmed.contains_key(id)
    }

    pub fn confirmed_transaction(&self, id: &str) -> Option<&ConfirmedTransaction> {
        self.confirmed.get(id)
    }

    /// Apply a transaction's side effects at `height`.
    ///
    /// The sender debit is checked first and every type-specific mutator
    /// checks before it writes, so a failure leaves the state untouched.
    pub fn apply(&mut self, tx: &Transaction, height: u64) -> Result<(), LedgerError> {
        self.accounts.check_debit(&tx.sender_id, tx.sender_debit())?;

        match &tx.asset {
            TransactionAsset::None => {}
            TransactionAsset::Signature { public_key } => {
                self.accounts
                    .set_second_public_key(&tx.sender_id, public_key)?;
            }
            TransactionAsset::Delegate { username } => {
                self.accounts
                    .register_delegate(&tx.sender_id, &tx.sender_public_key, username)?;
            }
            TransactionAsset::Votes { votes } => {
                self.accounts.apply_votes(&tx.sender_id, votes)?;
            }
            TransactionAsset::Multisignature(asset) => {
                let policy = MultisigPolicy::from_asset(asset, &tx.sender_public_key)?;
                self.registry
                    .register(&tx.sender_id, policy, &tx.id, height)?;
            }
            TransactionAsset::Dapp(asset) => {
                self.dapps
                    .register_dapp(&tx.id, &tx.sender_id, asset.clone(), height)?;
            }
            TransactionAsset::InTransfer { dapp_id } => {
                self.dapps.record_in_transfer(&tx.id, dapp_id, tx.amount)?;
            }
            TransactionAsset::OutTransfer {
                dapp_id,
                transaction_id,
            } => {
                self.dapps
                    .record_out_transfer(&tx.id, dapp_id, transaction_id, tx.amount)?;
            }
        }

        self.accounts.debit(&tx.sender_id, tx.sender_debit())?;
        self.accounts
            .learn_public_key(&tx.sender_id, &tx.sender_public_key);

        if let Some(recipient) = &tx.recipient_id {
            self.accounts.credit(recipient, tx.amount);
        }

        self.confirmed.insert(
            tx.id.clone(),
            ConfirmedTransaction {
                transaction: tx.clone(),
                height,
                confirmed_at: Utc::now(),
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GenesisAccount, GenesisDelegate};
    use crate::core::transaction::{TransactionBuilder, COIN, TRANSFER_FEE};
    use crate::crypto::KeyPair;
    use crate::dapp::DappAsset;

    fn state_for(kp: &KeyPair, balance: u64) -> LedgerState {
        let genesis = Genesis {
            accounts: vec![GenesisAccount {
                address: kp.address(),
                balance,
            }],
            delegates: vec![],
        };
        LedgerState::from_genesis(&genesis).unwrap()
    }

    #[test]
    fn test_genesis_with_delegates() {
        let delegate = KeyPair::generate();
        let genesis = Genesis {
            accounts: vec![],
            delegates: vec![GenesisDelegate {
                public_key: delegate.public_key_hex(),
                username: "genesis_1".to_string(),
            }],
        };
        let state = LedgerState::from_genesis(&genesis).unwrap();
        assert!(state.accounts.is_delegate_key(&delegate.public_key_hex()));
        assert_eq!(state.height, 0);
    }

    #[test]
    fn test_apply_transfer() {
        let alice = KeyPair::generate();
        let bob = KeyPair::generate();
        let mut state = state_for(&alice, 10 * COIN);

        let tx = TransactionBuilder::transfer(&bob.address(), COIN)
            .sign(&alice)
            .unwrap();
        state.apply(&tx, 1).unwrap();

        assert_eq!(state.accounts.balance(&bob.address()), COIN);
        assert_eq!(
            state.accounts.balance(&alice.address()),
            9 * COIN - TRANSFER_FEE
        );
        assert_eq!(state.confirmed_transaction(&tx.id).unwrap().height, 1);
        assert_eq!(
            state.accounts.get(&alice.address()).unwrap().public_key,
            Some(alice.public_key_hex())
        );
    }

    #[test]
    fn test_failed_apply_leaves_state_untouched() {
        let alice = KeyPair::generate();
        let mut state = state_for(&alice, 100 * COIN);

        let tx = TransactionBuilder::out_transfer(&"ab".repeat(32), &"cd".repeat(32), &alice.address(), 5)
            .sign(&alice)
            .unwrap();
        assert!(state.apply(&tx, 1).is_err());
        assert_eq!(state.accounts.balance(&alice.address()), 100 * COIN);
        assert!(!state.is_confirmed(&tx.id));
    }

    #[test]
    fn test_apply_dapp_flow() {
        let alice = KeyPair::generate();
        let mut state = state_for(&alice, 100 * COIN);

        let dapp = TransactionBuilder::dapp(DappAsset::new("app", "https://x.io/app.zip", 0))
            .sign(&alice)
            .unwrap();
        state.apply(&dapp, 1).unwrap();

        let deposit = TransactionBuilder::in_transfer(&dapp.id, 10 * COIN)
            .sign(&alice)
            .unwrap();
        state.apply(&deposit, 2).unwrap();

        let withdraw = TransactionBuilder::out_transfer(&dapp.id, &deposit.id, &alice.address(), 4 * COIN)
            .sign(&alice)
            .unwrap();
        state.apply(&withdraw, 3).unwrap();

        assert_eq!(state.dapps.available_balance(&dapp.id), Some(6 * COIN));
    }
}
