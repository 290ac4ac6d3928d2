//! Multisig account registry
//!
//! Maps an account address to its signing policy. Holds no signature or
//! quorum logic; the quorum tracker reads policies from here.

use crate::core::MultisignatureAsset;
use crate::core::ErrorKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Largest keysgroup a multisig account may register
pub const MAX_KEYSGROUP_SIZE: usize = 15;

/// Lifetime bounds in hours
pub const MIN_LIFETIME_HOURS: u8 = 1;
pub const MAX_LIFETIME_HOURS: u8 = 72;

/// Errors related to multisig registration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Account already has a multisignature registration: {0}")]
    AlreadyRegistered(String),
    #[error("Invalid threshold: {0}")]
    InvalidThreshold(String),
    #[error("Invalid keysgroup: {0}")]
    InvalidKeysgroup(String),
    #[error("Invalid lifetime: {0} hours (allowed {MIN_LIFETIME_HOURS}-{MAX_LIFETIME_HOURS})")]
    InvalidLifetime(u8),
    #[error("Duplicate keysgroup member: {0}")]
    DuplicateMember(String),
}

impl RegistryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RegistryError::AlreadyRegistered(_) => ErrorKind::Conflict,
            _ => ErrorKind::Validation,
        }
    }
}

/// Keysgroup, threshold and lifetime governing an account's transactions
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct MultisigPolicy {
    /// Member public keys (hex)
    pub keysgroup: Vec<String>,
    /// Signatures required (M in M-of-N)
    pub min: u8,
    /// Hours a pending transaction may wait for signatures
    pub lifetime: u8,
}

impl MultisigPolicy {
    /// Create a validated policy
    ///
    /// # Errors
    /// Returns error unless `1 <= min <= |keysgroup| <= MAX_KEYSGROUP_SIZE`,
    /// members are unique hex keys and the lifetime is in range.
    pub fn new(keysgroup: Vec<String>, min: u8, lifetime: u8) -> Result<Self, RegistryError> {
        if keysgroup.is_empty() || keysgroup.len() > MAX_KEYSGROUP_SIZE {
            return Err(RegistryError::InvalidKeysgroup(format!(
                "size {} outside 1-{}",
                keysgroup.len(),
                MAX_KEYSGROUP_SIZE
            )));
        }

        if min == 0 || min as usize > keysgroup.len() {
            return Err(RegistryError::InvalidThreshold(format!(
                "min {} with {} members",
                min,
                keysgroup.len()
            )));
        }

        if !(MIN_LIFETIME_HOURS..=MAX_LIFETIME_HOURS).contains(&lifetime) {
            return Err(RegistryError::InvalidLifetime(lifetime));
        }

        for key in &keysgroup {
            if key.len() != 66 || hex::decode(key).is_err() {
                return Err(RegistryError::InvalidKeysgroup(format!(
                    "not a public key: {}",
                    key
                )));
            }
        }

        let mut sorted = keysgroup.clone();
        sorted.sort();
        if let Some(pair) = sorted.windows(2).find(|w| w[0] == w[1]) {
            return Err(RegistryError::DuplicateMember(pair[0].clone()));
        }

        Ok(Self {
            keysgroup,
            min,
            lifetime,
        })
    }

    /// Build a policy from a type 4 payload sent by `sender_public_key`.
    ///
    /// Every entry must carry the `+` marker and the sender may not list
    /// itself as a member.
    pub fn from_asset(
        asset: &MultisignatureAsset,
        sender_public_key: &str,
    ) -> Result<Self, RegistryError> {
        if let Some(bad) = asset.keysgroup.iter().find(|k| !k.starts_with('+')) {
            return Err(RegistryError::InvalidKeysgroup(format!(
                "entry must start with '+': {}",
                bad
            )));
        }

        let members = asset.member_keys();
        if members.iter().any(|k| k == sender_public_key) {
            return Err(RegistryError::InvalidKeysgroup(
                "keysgroup cannot contain the sender".to_string(),
            ));
        }

        Self::new(members, asset.min, asset.lifetime)
    }

    /// Check if a public key is a member
    pub fn is_member(&self, public_key: &str) -> bool {
        self.keysgroup.iter().any(|k| k == public_key)
    }

    /// Lifetime in seconds
    pub fn lifetime_secs(&self) -> u64 {
        self.lifetime as u64 * 3600
    }

    /// Get description like "2-of-3"
    pub fn description(&self) -> String {
        format!("{}-of-{}", self.min, self.keysgroup.len())
    }
}

/// A confirmed multisig registration
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct MultisigRegistration {
    pub account: String,
    pub policy: MultisigPolicy,
    /// Type 4 transaction that created it
    pub transaction_id: String,
    pub registered_at_height: u64,
}

/// Account address -> registration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MultisigRegistry {
    registrations: HashMap<String, MultisigRegistration>,
}

impl MultisigRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a policy for an account
    pub fn register(
        &mut self,
        account: &str,
        policy: MultisigPolicy,
        transaction_id: &str,
        height: u64,
    ) -> Result<&MultisigRegistration, RegistryError> {
        self.check_available(account)?;

        log::info!(
            "Multisig registered for {} ({})",
            account,
            policy.description()
        );

        let registration = MultisigRegistration {
            account: account.to_string(),
            policy,
            transaction_id: transaction_id.to_string(),
            registered_at_height: height,
        };
        Ok(self
            .registrations
            .entry(account.to_string())
            .or_insert(registration))
    }

    /// Fails if `account` already has a registration
    pub fn check_available(&self, account: &str) -> Result<(), RegistryError> {
        if self.registrations.contains_key(account) {
            return Err(RegistryError::AlreadyRegistered(account.to_string()));
        }
        Ok(())
    }

    /// Registration for an account, if any
    pub fn lookup(&self, account: &str) -> Option<&MultisigRegistration> {
        self.registrations.get(account)
    }

    pub fn is_multisig(&self, account: &str) -> bool {
        self.registrations.contains_key(account)
    }

    /// Accounts a public key is a member of
    pub fn memberships(&self, public_key: &str) -> Vec<&MultisigRegistration> {
        self.registrations
            .values()
            .filter(|r| r.policy.is_member(public_key))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;

    fn members(n: usize) -> Vec<String> {
        (0..n).map(|_| KeyPair::generate().public_key_hex()).collect()
    }

    #[test]
    fn test_policy_creation() {
        let policy = MultisigPolicy::new(members(3), 2, 24).unwrap();
        assert_eq!(policy.description(), "2-of-3");
        assert_eq!(policy.lifetime_secs(), 24 * 3600);
    }

    #[test]
    fn test_policy_validation() {
        assert!(MultisigPolicy::new(members(3), 0, 24).is_err());
        assert!(MultisigPolicy::new(members(3), 4, 24).is_err());
        assert!(MultisigPolicy::new(vec![], 1, 24).is_err());
        assert!(MultisigPolicy::new(members(16), 2, 24).is_err());
        assert!(matches!(
            MultisigPolicy::new(members(2), 1, 0),
            Err(RegistryError::InvalidLifetime(0))
        ));
        assert!(MultisigPolicy::new(members(2), 1, 73).is_err());
        assert!(MultisigPolicy::new(vec!["not-a-key".to_string()], 1, 1).is_err());

        let key = KeyPair::generate().public_key_hex();
        assert!(matches!(
            MultisigPolicy::new(vec![key.clone(), key], 1, 1),
            Err(RegistryError::DuplicateMember(_))
        ));

        assert!(MultisigPolicy::new(members(15), 15, 72).is_ok());
    }

    #[test]
    fn test_policy_from_asset() {
        let sender = KeyPair::generate();
        let keys = members(2);
        let asset = MultisignatureAsset {
            min: 2,
            lifetime: 1,
            keysgroup: keys.iter().map(|k| format!("+{}", k)).collect(),
        };
        let policy = MultisigPolicy::from_asset(&asset, &sender.public_key_hex()).unwrap();
        assert!(policy.is_member(&keys[0]));

        let unmarked = MultisignatureAsset {
            keysgroup: keys.clone(),
            ..asset.clone()
        };
        assert!(MultisigPolicy::from_asset(&unmarked, &sender.public_key_hex()).is_err());

        let with_sender = MultisignatureAsset {
            min: 1,
            lifetime: 1,
            keysgroup: vec![format!("+{}", sender.public_key_hex())],
        };
        assert!(MultisigPolicy::from_asset(&with_sender, &sender.public_key_hex()).is_err());
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = MultisigRegistry::new();
        let keys = members(3);
        let policy = MultisigPolicy::new(keys.clone(), 2, 24).unwrap();

        registry.register("1account", policy.clone(), "tx1", 5).unwrap();

        let reg = registry.lookup("1account").unwrap();
        assert_eq!(reg.policy, policy);
        assert_eq!(reg.registered_at_height, 5);
        assert!(registry.is_multisig("1account"));
        assert!(registry.lookup("1other").is_none());
        assert_eq!(registry.memberships(&keys[1]).len(), 1);
    }

    #[test]
    fn test_second_registration_rejected() {
        let mut registry = MultisigRegistry::new();
        let policy = MultisigPolicy::new(members(2), 1, 1).unwrap();

        registry.register("1account", policy.clone(), "tx1", 1).unwrap();
        let err = registry.register("1account", policy, "tx2", 2).unwrap_err();

        assert_eq!(err, RegistryError::AlreadyRegistered("1account".to_string()));
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(registry.lookup("1account").unwrap().transaction_id, "tx1");
        assert_eq!(registry.len(), 1);
    }
}
