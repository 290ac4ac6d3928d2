//! Accounts, delegates and votes
//!
//! Balances are tracked per address. Everything here is mutated only by
//! confirmed transactions; the `check_*` methods test a change without
//! applying it.

use crate::core::error::LedgerError;
use crate::crypto::is_valid_address;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Maximum delegates a single account may vote for
pub const MAX_VOTES_PER_ACCOUNT: usize = 101;

/// Maximum vote entries in one transaction
pub const MAX_VOTES_PER_TRANSACTION: usize = 33;

pub const MAX_USERNAME_LENGTH: usize = 20;

/// A ledger account
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    pub address: String,
    pub balance: u64,
    /// Learned from the first outgoing transaction
    pub public_key: Option<String>,
    pub second_public_key: Option<String>,
    /// Delegate name, set once the account registers as a delegate
    pub username: Option<String>,
    /// Public keys of delegates this account votes for
    pub votes: Vec<String>,
}

impl Account {
    pub fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
            ..Default::default()
        }
    }

    pub fn is_delegate(&self) -> bool {
        self.username.is_some()
    }
}

/// A parsed vote entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vote<'a> {
    Add(&'a str),
    Remove(&'a str),
}

impl<'a> Vote<'a> {
    /// Parse `+<pubkey>` or `-<pubkey>`
    pub fn parse(entry: &'a str) -> Option<Self> {
        if let Some(key) = entry.strip_prefix('+') {
            Some(Vote::Add(key))
        } else {
            entry.strip_prefix('-').map(Vote::Remove)
        }
    }

    pub fn public_key(&self) -> &'a str {
        match self {
            Vote::Add(key) | Vote::Remove(key) => key,
        }
    }
}

/// Check a delegate name's format
pub fn validate_username(username: &str) -> Result<(), LedgerError> {
    if username.is_empty() || username.len() > MAX_USERNAME_LENGTH {
        return Err(LedgerError::InvalidTransaction(format!(
            "username must be 1-{} characters",
            MAX_USERNAME_LENGTH
        )));
    }
    let allowed = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit() || "!@$&_.".contains(c);
    if !username.chars().all(allowed) {
        return Err(LedgerError::InvalidTransaction(format!(
            "username contains invalid characters: {}",
            username
        )));
    }
    if is_valid_address(username) {
        return Err(LedgerError::InvalidTransaction(
            "username cannot be an address".to_string(),
        ));
    }
    Ok(())
}

/// Address -> account, plus the delegate name index
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AccountStore {
    accounts: HashMap<String, Account>,
    /// Delegate username -> public key
    delegates: HashMap<String, String>,
    /// Delegate public key -> username
    delegate_keys: HashMap<String, String>,
}

impl AccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, address: &str) -> Option<&Account> {
        self.accounts.get(address)
    }

    pub fn exists(&self, address: &str) -> bool {
        self.accounts.contains_key(address)
    }

    pub fn balance(&self, address: &str) -> u64 {
        self.accounts.get(address).map(|a| a.balance).unwrap_or(0)
    }

    fn account_mut(&mut self, address: &str) -> &mut Account {
        self.accounts
            .entry(address.to_string())
            .or_insert_with(|| Account::new(address))
    }

    fn existing_mut(&mut self, address: &str) -> Result<&mut Account, LedgerError> {
        self.accounts
            .get_mut(address)
            .ok_or_else(|| LedgerError::UnknownAccount(address.to_string()))
    }

    /// Add funds, creating the account if needed
    pub fn credit(&mut self, address: &str, amount: u64) {
        let account = self.account_mut(address);
        account.balance = account.balance.saturating_add(amount);
    }

    pub fn check_debit(&self, address: &str, amount: u64) -> Result<(), LedgerError> {
        let account = self
            .accounts
            .get(address)
            .ok_or_else(|| LedgerError::UnknownAccount(address.to_string()))?;
        if account.balance < amount {
            return Err(LedgerError::InsufficientBalance {
                have: account.balance,
                need: amount,
            });
        }
        Ok(())
    }

    pub fn debit(&mut self, address: &str, amount: u64) -> Result<(), LedgerError> {
        self.check_debit(address, amount)?;
        let account = self.existing_mut(address)?;
        account.balance -= amount;
        Ok(())
    }

    /// Record the public key behind an address the first time it is seen
    pub fn learn_public_key(&mut self, address: &str, public_key: &str) {
        let account = self.account_mut(address);
        if account.public_key.is_none() {
            account.public_key = Some(public_key.to_string());
        }
    }

    // =========================================================================
    // Second signature
    // =========================================================================

    pub fn check_second_signature(&self, address: &str) -> Result<(), LedgerError> {
        match self.accounts.get(address) {
            None => Err(LedgerError::UnknownAccount(address.to_string())),
            Some(a) if a.second_public_key.is_some() => Err(LedgerError::AlreadyHasSecondSignature),
            Some(_) => Ok(()),
        }
    }

    pub fn set_second_public_key(
        &mut self,
        address: &str,
        public_key: &str,
    ) -> Result<(), LedgerError> {
        self.check_second_signature(address)?;
        self.existing_mut(address)?.second_public_key = Some(public_key.to_string());
        Ok(())
    }

    // =========================================================================
    // Delegates
    // =========================================================================

    pub fn check_delegate(&self, address: &str, username: &str) -> Result<(), LedgerError> {
        let account = self
            .accounts
            .get(address)
            .ok_or_else(|| LedgerError::UnknownAccount(address.to_string()))?;
        if account.is_delegate() {
            return Err(LedgerError::AlreadyDelegate);
        }
        if self.delegates.contains_key(username) {
            return Err(LedgerError::DuplicateUsername(username.to_string()));
        }
        Ok(())
    }

    pub fn register_delegate(
        &mut self,
        address: &str,
        public_key: &str,
        username: &str,
    ) -> Result<(), LedgerError> {
        self.check_delegate(address, username)?;
        self.existing_mut(address)?.username = Some(username.to_string());
        self.delegates
            .insert(username.to_string(), public_key.to_string());
        self.delegate_keys
            .insert(public_key.to_string(), username.to_string());
        log::info!("Delegate registered: {} ({})", username, address);
        Ok(())
    }

    pub fn is_delegate_key(&self, public_key: &str) -> bool {
        self.delegate_keys.contains_key(public_key)
    }

    pub fn delegate_by_username(&self, username: &str) -> Option<&str> {
        self.delegates.get(username).map(String::as_str)
    }

    // =========================================================================
    // Votes
    // =========================================================================

    /// Check vote entries against the voter's current votes.
    /// Entry formats are assumed to be validated already.
    pub fn check_votes(&self, address: &str, votes: &[String]) -> Result<(), LedgerError> {
        let account = self
            .accounts
            .get(address)
            .ok_or_else(|| LedgerError::UnknownAccount(address.to_string()))?;

        let mut count = account.votes.len();
        for entry in votes {
            match Vote::parse(entry) {
                Some(Vote::Add(key)) => {
                    if !self.is_delegate_key(key) {
                        return Err(LedgerError::UnknownDelegate(key.to_string()));
                    }
                    if account.votes.iter().any(|v| v == key) {
                        return Err(LedgerError::AlreadyVoted(key.to_string()));
                    }
                    count += 1;
                }
                Some(Vote::Remove(key)) => {
                    if !account.votes.iter().any(|v| v == key) {
                        return Err(LedgerError::NotVoted(key.to_string()));
                    }
                    count -= 1;
                }
                None => {
                    return Err(LedgerError::InvalidTransaction(format!(
                        "invalid vote entry: {}",
                        entry
                    )))
                }
            }
        }

        if count > MAX_VOTES_PER_ACCOUNT {
            return Err(LedgerError::VoteLimitExceeded);
        }
        Ok(())
    }

    pub fn apply_votes(&mut self, address: &str, votes: &[String]) -> Result<(), LedgerError> {
        self.check_votes(address, votes)?;
        let account = self.existing_mut(address)?;
        for vote in votes.iter().filter_map(|v| Vote::parse(v)) {
            match vote {
                Vote::Add(key) => account.votes.push(key.to_string()),
                Vote::Remove(key) => account.votes.retain(|v| v != key),
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Sum of all balances, saturating at `u64::MAX`
    pub fn total_supply(&self) -> u64 {
        self.accounts
            .values()
            .fold(0u64, |total, a| total.saturating_add(a.balance))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;

    #[test]
    fn test_credit_and_debit() {
        let mut store = AccountStore::new();
        store.credit("1alice", 100);

        assert_eq!(store.balance("1alice"), 100);
        store.debit("1alice", 40).unwrap();
        assert_eq!(store.balance("1alice"), 60);
        assert_eq!(
            store.debit("1alice", 61).unwrap_err(),
            LedgerError::InsufficientBalance { have: 60, need: 61 }
        );
        assert!(matches!(
            store.debit("1nobody", 1),
            Err(LedgerError::UnknownAccount(_))
        ));
    }

    #[test]
    fn test_total_supply_saturates() {
        let mut store = AccountStore::new();
        store.credit("1alice", u64::MAX - 1);
        store.credit("1bob", 10);
        assert_eq!(store.total_supply(), u64::MAX);
    }

    #[test]
    fn test_second_public_key_once() {
        let mut store = AccountStore::new();
        store.credit("1alice", 1);
        store.set_second_public_key("1alice", "02aa").unwrap();
        assert_eq!(
            store.set_second_public_key("1alice", "02bb").unwrap_err(),
            LedgerError::AlreadyHasSecondSignature
        );
        assert_eq!(
            store.get("1alice").unwrap().second_public_key.as_deref(),
            Some("02aa")
        );
    }

    #[test]
    fn test_delegate_registration() {
        let mut store = AccountStore::new();
        store.credit("1alice", 1);
        store.credit("1bob", 1);

        store.register_delegate("1alice", "02aa", "genesis_1").unwrap();
        assert!(store.is_delegate_key("02aa"));
        assert_eq!(store.delegate_by_username("genesis_1"), Some("02aa"));

        assert_eq!(
            store.check_delegate("1alice", "other").unwrap_err(),
            LedgerError::AlreadyDelegate
        );
        assert_eq!(
            store.check_delegate("1bob", "genesis_1").unwrap_err(),
            LedgerError::DuplicateUsername("genesis_1".to_string())
        );
    }

    #[test]
    fn test_votes() {
        let mut store = AccountStore::new();
        store.credit("1voter", 1);
        store.credit("1delegate", 1);
        store.register_delegate("1delegate", "02dd", "dd").unwrap();

        assert!(matches!(
            store.check_votes("1voter", &["+02ee".to_string()]),
            Err(LedgerError::UnknownDelegate(_))
        ));
        assert!(matches!(
            store.check_votes("1voter", &["-02dd".to_string()]),
            Err(LedgerError::NotVoted(_))
        ));

        store.apply_votes("1voter", &["+02dd".to_string()]).unwrap();
        assert_eq!(store.get("1voter").unwrap().votes, vec!["02dd".to_string()]);
        assert!(matches!(
            store.check_votes("1voter", &["+02dd".to_string()]),
            Err(LedgerError::AlreadyVoted(_))
        ));

        store.apply_votes("1voter", &["-02dd".to_string()]).unwrap();
        assert!(store.get("1voter").unwrap().votes.is_empty());
    }

    #[test]
    fn test_username_format() {
        assert!(validate_username("genesis_1").is_ok());
        assert!(validate_username("a!@$&_.").is_ok());
        assert!(validate_username("").is_err());
        assert!(validate_username("UPPER").is_err());
        assert!(validate_username(&"x".repeat(21)).is_err());
        assert!(validate_username(&KeyPair::generate().address()).is_err());
    }

    #[test]
    fn test_vote_parse() {
        assert_eq!(Vote::parse("+02ab"), Some(Vote::Add("02ab")));
        assert_eq!(Vote::parse("-02ab").map(|v| v.public_key()), Some("02ab"));
        assert_eq!(Vote::parse("02ab"), None);
    }
}
