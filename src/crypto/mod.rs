//! Cryptographic utilities for the ledger
//!
//! This module provides:
//! - SHA-256 hashing and Base58Check addresses
//! - ECDSA key management (secp256k1), passphrase-derived key pairs
//! - The [`SignatureVerifier`] capability used by the engine

pub mod hash;
pub mod keys;
pub mod verifier;

pub use hash::{
    base58check_decode, base58check_encode, double_sha256, is_valid_address, sha256, sha256_hex,
};
pub use keys::{
    address_from_public_key_hex, public_key_from_hex, public_key_to_address, sign_message,
    verify_signature, KeyError, KeyPair,
};
pub use verifier::{Secp256k1Verifier, SignatureVerifier};
