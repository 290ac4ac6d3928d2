//! Transaction model
//!
//! Eight transaction types share one envelope. The type-specific payload
//! lives in [`TransactionAsset`]. Ids are content-derived: the SHA-256 of the
//! canonical JSON of the signed body plus the sender's signatures. Multisig
//! member signatures are collected afterwards and never change the id.

use crate::crypto::{sha256, sha256_hex, KeyError, KeyPair};
use crate::dapp::DappAsset;
use crate::multisig::MultisigSignature;
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Fees
// =============================================================================

/// Base units per coin
pub const COIN: u64 = 100_000_000;

pub const TRANSFER_FEE: u64 = COIN / 10;
pub const SECOND_SIGNATURE_FEE: u64 = 5 * COIN;
pub const DELEGATE_FEE: u64 = 25 * COIN;
pub const VOTE_FEE: u64 = COIN;
/// Charged per keysgroup member plus one
pub const MULTISIGNATURE_FEE: u64 = 5 * COIN;
pub const DAPP_FEE: u64 = 25 * COIN;
pub const IN_TRANSFER_FEE: u64 = COIN / 10;
pub const OUT_TRANSFER_FEE: u64 = COIN / 10;

// =============================================================================
// Transaction Type
// =============================================================================

/// Transaction type, numbered 0..=7 on the wire
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Transfer,
    SecondSignature,
    Delegate,
    Vote,
    Multisignature,
    Dapp,
    InTransfer,
    OutTransfer,
}

impl TransactionType {
    /// Numeric type code
    pub fn code(&self) -> u8 {
        match self {
            TransactionType::Transfer => 0,
            TransactionType::SecondSignature => 1,
            TransactionType::Delegate => 2,
            TransactionType::Vote => 3,
            TransactionType::Multisignature => 4,
            TransactionType::Dapp => 5,
            TransactionType::InTransfer => 6,
            TransactionType::OutTransfer => 7,
        }
    }

    /// Whether this type moves a positive amount
    pub fn carries_amount(&self) -> bool {
        matches!(
            self,
            TransactionType::Transfer | TransactionType::InTransfer | TransactionType::OutTransfer
        )
    }

    /// Whether this type names a recipient account
    pub fn requires_recipient(&self) -> bool {
        matches!(self, TransactionType::Transfer | TransactionType::OutTransfer)
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "type {}", self.code())
    }
}

// =============================================================================
// Assets
// =============================================================================

/// Payload of a multisignature registration (type 4)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MultisignatureAsset {
    /// Signatures required for the account's later transactions
    pub min: u8,
    /// Hours a transaction may wait for signatures
    pub lifetime: u8,
    /// Members as `+<public key hex>`
    pub keysgroup: Vec<String>,
}

impl MultisignatureAsset {
    /// Member keys without the `+` marker. Entries lacking it are kept
    /// verbatim so validation can report them.
    pub fn member_keys(&self) -> Vec<String> {
        self.keysgroup
            .iter()
            .map(|k| k.strip_prefix('+').unwrap_or(k).to_string())
            .collect()
    }
}

/// Type-specific payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransactionAsset {
    #[default]
    None,
    /// Registers a second public key
    Signature { public_key: String },
    /// Registers the sender as a delegate
    Delegate { username: String },
    /// `+<pubkey>` adds a vote, `-<pubkey>` removes one
    Votes { votes: Vec<String> },
    Multisignature(MultisignatureAsset),
    Dapp(DappAsset),
    InTransfer { dapp_id: String },
    /// `transaction_id` is the in-transfer this withdrawal is drawn against
    OutTransfer {
        dapp_id: String,
        transaction_id: String,
    },
}

impl TransactionAsset {
    /// The transaction type this payload belongs to
    pub fn expected_type(&self) -> TransactionType {
        match self {
            TransactionAsset::None => TransactionType::Transfer,
            TransactionAsset::Signature { .. } => TransactionType::SecondSignature,
            TransactionAsset::Delegate { .. } => TransactionType::Delegate,
            TransactionAsset::Votes { .. } => TransactionType::Vote,
            TransactionAsset::Multisignature(_) => TransactionType::Multisignature,
            TransactionAsset::Dapp(_) => TransactionType::Dapp,
            TransactionAsset::InTransfer { .. } => TransactionType::InTransfer,
            TransactionAsset::OutTransfer { .. } => TransactionType::OutTransfer,
        }
    }
}

// =============================================================================
// Transaction
// =============================================================================

/// A signed ledger transaction
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    /// Content-derived id (hex SHA-256)
    pub id: String,
    #[serde(rename = "type")]
    pub tx_type: TransactionType,
    /// Client timestamp in milliseconds
    pub timestamp: u64,
    pub sender_public_key: String,
    pub sender_id: String,
    #[serde(default)]
    pub recipient_id: Option<String>,
    pub amount: u64,
    pub fee: u64,
    #[serde(default)]
    pub asset: TransactionAsset,
    /// Sender's signature over [`Transaction::signing_hash`]
    pub signature: String,
    /// Second-passphrase signature, required once type 1 is confirmed
    #[serde(default)]
    pub sign_signature: Option<String>,
    /// Multisig member signatures collected after submission
    #[serde(default)]
    pub signatures: Vec<MultisigSignature>,
}

#[derive(Serialize)]
struct SigningBody<'a> {
    tx_type: u8,
    timestamp: u64,
    sender_public_key: &'a str,
    sender_id: &'a str,
    recipient_id: &'a Option<String>,
    amount: u64,
    fee: u64,
    asset: &'a TransactionAsset,
}

#[derive(Serialize)]
struct IdentityBody<'a> {
    body: SigningBody<'a>,
    signature: &'a str,
    sign_signature: &'a Option<String>,
}

impl Transaction {
    fn signing_body(&self) -> SigningBody<'_> {
        SigningBody {
            tx_type: self.tx_type.code(),
            timestamp: self.timestamp,
            sender_public_key: &self.sender_public_key,
            sender_id: &self.sender_id,
            recipient_id: &self.recipient_id,
            amount: self.amount,
            fee: self.fee,
            asset: &self.asset,
        }
    }

    /// Digest signed by the sender, the second key and multisig members
    pub fn signing_hash(&self) -> Vec<u8> {
        let bytes = serde_json::to_vec(&self.signing_body()).unwrap_or_default();
        sha256(&bytes)
    }

    /// Recompute the content-derived id
    pub fn calculate_id(&self) -> String {
        let identity = IdentityBody {
            body: self.signing_body(),
            signature: &self.signature,
            sign_signature: &self.sign_signature,
        };
        let bytes = serde_json::to_vec(&identity).unwrap_or_default();
        sha256_hex(&bytes)
    }

    /// Fee required by the schedule for this transaction
    pub fn expected_fee(&self) -> u64 {
        match (&self.tx_type, &self.asset) {
            (TransactionType::Transfer, _) => TRANSFER_FEE,
            (TransactionType::SecondSignature, _) => SECOND_SIGNATURE_FEE,
            (TransactionType::Delegate, _) => DELEGATE_FEE,
            (TransactionType::Vote, _) => VOTE_FEE,
            (TransactionType::Multisignature, TransactionAsset::Multisignature(asset)) => {
                MULTISIGNATURE_FEE * (asset.keysgroup.len() as u64 + 1)
            }
            (TransactionType::Multisignature, _) => MULTISIGNATURE_FEE,
            (TransactionType::Dapp, _) => DAPP_FEE,
            (TransactionType::InTransfer, _) => IN_TRANSFER_FEE,
            (TransactionType::OutTransfer, _) => OUT_TRANSFER_FEE,
        }
    }

    /// Amount leaving the sender's account on confirmation.
    /// Out-transfers are paid from the dapp balance, so only the fee applies.
    pub fn sender_debit(&self) -> u64 {
        match self.tx_type {
            TransactionType::OutTransfer => self.fee,
            _ => self.amount.saturating_add(self.fee),
        }
    }

    /// Multisig registration payload, if this is a type 4 transaction
    pub fn multisig_asset(&self) -> Option<&MultisignatureAsset> {
        match &self.asset {
            TransactionAsset::Multisignature(asset) => Some(asset),
            _ => None,
        }
    }

    /// Number of collected member signatures
    pub fn signature_count(&self) -> usize {
        self.signatures.len()
    }

    /// Public keys of members who have signed
    pub fn signed_by(&self) -> Vec<&str> {
        self.signatures
            .iter()
            .map(|s| s.signer_pubkey.as_str())
            .collect()
    }

    /// Whether `public_key` already contributed a member signature
    pub fn has_signature_from(&self, public_key: &str) -> bool {
        self.signatures.iter().any(|s| s.signer_pubkey == public_key)
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Builds and signs transactions for any of the eight types
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    tx_type: TransactionType,
    timestamp: Option<u64>,
    recipient_id: Option<String>,
    amount: u64,
    asset: TransactionAsset,
}

impl TransactionBuilder {
    fn with(tx_type: TransactionType, asset: TransactionAsset) -> Self {
        Self {
            tx_type,
            timestamp: None,
            recipient_id: None,
            amount: 0,
            asset,
        }
    }

    /// Type 0: move `amount` to `recipient`
    pub fn transfer(recipient: &str, amount: u64) -> Self {
        let mut builder = Self::with(TransactionType::Transfer, TransactionAsset::None);
        builder.recipient_id = Some(recipient.to_string());
        builder.amount = amount;
        builder
    }

    /// Type 1: register a second public key
    pub fn second_signature(public_key: &str) -> Self {
        Self::with(
            TransactionType::SecondSignature,
            TransactionAsset::Signature {
                public_key: public_key.to_string(),
            },
        )
    }

    /// Type 2: register as delegate
    pub fn delegate(username: &str) -> Self {
        Self::with(
            TransactionType::Delegate,
            TransactionAsset::Delegate {
                username: username.to_string(),
            },
        )
    }

    /// Type 3: cast or remove votes
    pub fn vote(votes: Vec<String>) -> Self {
        Self::with(TransactionType::Vote, TransactionAsset::Votes { votes })
    }

    /// Type 4: turn the sender into a multisig account
    pub fn multisignature(min: u8, lifetime: u8, keysgroup: Vec<String>) -> Self {
        Self::with(
            TransactionType::Multisignature,
            TransactionAsset::Multisignature(MultisignatureAsset {
                min,
                lifetime,
                keysgroup,
            }),
        )
    }

    /// Type 5: register a dapp
    pub fn dapp(asset: DappAsset) -> Self {
        Self::with(TransactionType::Dapp, TransactionAsset::Dapp(asset))
    }

    /// Type 6: deposit `amount` into a dapp
    pub fn in_transfer(dapp_id: &str, amount: u64) -> Self {
        let mut builder = Self::with(
            TransactionType::InTransfer,
            TransactionAsset::InTransfer {
                dapp_id: dapp_id.to_string(),
            },
        );
        builder.amount = amount;
        builder
    }

    /// Type 7: withdraw `amount` from a dapp to `recipient`
    pub fn out_transfer(dapp_id: &str, in_transfer_id: &str, recipient: &str, amount: u64) -> Self {
        let mut builder = Self::with(
            TransactionType::OutTransfer,
            TransactionAsset::OutTransfer {
                dapp_id: dapp_id.to_string(),
                transaction_id: in_transfer_id.to_string(),
            },
        );
        builder.recipient_id = Some(recipient.to_string());
        builder.amount = amount;
        builder
    }

    /// Override the client timestamp (milliseconds)
    pub fn timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    fn unsigned(self, sender: &KeyPair) -> Transaction {
        let timestamp = self
            .timestamp
            .unwrap_or_else(|| chrono::Utc::now().timestamp_millis().max(0) as u64);
        let mut tx = Transaction {
            id: String::new(),
            tx_type: self.tx_type,
            timestamp,
            sender_public_key: sender.public_key_hex(),
            sender_id: sender.address(),
            recipient_id: self.recipient_id,
            amount: self.amount,
            fee: 0,
            asset: self.asset,
            signature: String::new(),
            sign_signature: None,
            signatures: Vec::new(),
        };
        tx.fee = tx.expected_fee();
        tx
    }

    /// Sign with the sender's key
    pub fn sign(self, sender: &KeyPair) -> Result<Transaction, KeyError> {
        let mut tx = self.unsigned(sender);
        tx.signature = sender.sign_hex(&tx.signing_hash())?;
        tx.id = tx.calculate_id();
        Ok(tx)
    }

    /// Sign with the sender's key and the registered second key
    pub fn sign_with_second(
        self,
        sender: &KeyPair,
        second: &KeyPair,
    ) -> Result<Transaction, KeyError> {
        let mut tx = self.unsigned(sender);
        let digest = tx.signing_hash();
        tx.signature = sender.sign_hex(&digest)?;
        tx.sign_signature = Some(second.sign_hex(&digest)?);
        tx.id = tx.calculate_id();
        Ok(tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_builder() {
        let sender = KeyPair::generate();
        let tx = TransactionBuilder::transfer("1recipient", 500)
            .timestamp(1)
            .sign(&sender)
            .unwrap();

        assert_eq!(tx.tx_type, TransactionType::Transfer);
        assert_eq!(tx.fee, TRANSFER_FEE);
        assert_eq!(tx.sender_id, sender.address());
        assert_eq!(tx.id, tx.calculate_id());
        assert_eq!(tx.sender_debit(), 500 + TRANSFER_FEE);
    }

    #[test]
    fn test_id_is_content_derived() {
        let sender = KeyPair::from_secret("alpha").unwrap();
        let a = TransactionBuilder::transfer("1r", 10).timestamp(7).sign(&sender).unwrap();
        let b = TransactionBuilder::transfer("1r", 10).timestamp(7).sign(&sender).unwrap();
        let c = TransactionBuilder::transfer("1r", 11).timestamp(7).sign(&sender).unwrap();

        assert_eq!(a.signing_hash(), b.signing_hash());
        assert_ne!(a.signing_hash(), c.signing_hash());
        assert_ne!(a.id, c.id);
    }

    #[test]
    fn test_member_signatures_do_not_change_id() {
        let sender = KeyPair::generate();
        let mut tx = TransactionBuilder::vote(vec!["+02ab".to_string()])
            .sign(&sender)
            .unwrap();
        let id = tx.id.clone();
        tx.signatures
            .push(MultisigSignature::new("02ff".to_string(), "00".to_string()));

        assert_eq!(tx.calculate_id(), id);
    }

    #[test]
    fn test_multisignature_fee_scales_with_keysgroup() {
        let sender = KeyPair::generate();
        let keysgroup: Vec<String> = (0..3)
            .map(|_| format!("+{}", KeyPair::generate().public_key_hex()))
            .collect();
        let tx = TransactionBuilder::multisignature(2, 24, keysgroup)
            .sign(&sender)
            .unwrap();

        assert_eq!(tx.fee, MULTISIGNATURE_FEE * 4);
        assert_eq!(tx.multisig_asset().unwrap().member_keys().len(), 3);
        assert!(!tx.multisig_asset().unwrap().member_keys()[0].starts_with('+'));
    }

    #[test]
    fn test_out_transfer_debits_fee_only() {
        let sender = KeyPair::generate();
        let tx = TransactionBuilder::out_transfer("dapp", "intx", "1r", 1000)
            .sign(&sender)
            .unwrap();
        assert_eq!(tx.sender_debit(), OUT_TRANSFER_FEE);
        assert_eq!(tx.recipient_id.as_deref(), Some("1r"));
    }

    #[test]
    fn test_asset_serialization_shape() {
        let asset = TransactionAsset::InTransfer {
            dapp_id: "abc".to_string(),
        };
        let json = serde_json::to_string(&asset).unwrap();
        assert!(json.contains("\"kind\":\"in_transfer\""));
        let back: TransactionAsset = serde_json::from_str(&json).unwrap();
        assert_eq!(back.expected_type(), TransactionType::InTransfer);
    }
}
