//! Hashing utilities for the ledger
//!
//! SHA-256 based helpers used for transaction ids, signing digests
//! and address checksums.

use sha2::{Digest, Sha256};

/// Computes SHA-256 hash of the input data
pub fn sha256(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

/// Computes double SHA-256 hash (SHA-256 of SHA-256)
pub fn double_sha256(data: &[u8]) -> Vec<u8> {
    sha256(&sha256(data))
}

/// Computes SHA-256 hash and returns it as a hex string
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// Base58Check encoding: `payload || first 4 bytes of double SHA-256`
pub fn base58check_encode(version: u8, payload: &[u8]) -> String {
    let mut bytes = Vec::with_capacity(payload.len() + 5);
    bytes.push(version);
    bytes.extend_from_slice(payload);
    let checksum = double_sha256(&bytes);
    bytes.extend_from_slice(&checksum[..4]);
    bs58::encode(bytes).into_string()
}

/// Decode a Base58Check string into `(version, payload)` if the checksum holds
pub fn base58check_decode(encoded: &str) -> Option<(u8, Vec<u8>)> {
    let bytes = bs58::decode(encoded).into_vec().ok()?;
    if bytes.len() < 5 {
        return None;
    }
    let (body, checksum) = bytes.split_at(bytes.len() - 4);
    if double_sha256(body)[..4] != *checksum {
        return None;
    }
    Some((body[0], body[1..].to_vec()))
}

/// Whether `address` is a well-formed account address
pub fn is_valid_address(address: &str) -> bool {
    matches!(base58check_decode(address), Some((0x00, payload)) if payload.len() == 20)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256() {
        let data = b"hello world";
        let hash = sha256(data);
        assert_eq!(hash.len(), 32);
        assert_eq!(
            sha256_hex(data),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_double_sha256() {
        let hash = double_sha256(b"hello world");
        assert_eq!(hash.len(), 32);
        assert_ne!(hash, sha256(b"hello world"));
    }

    #[test]
    fn test_base58check_decode() {
        let encoded = base58check_encode(0x00, &[7u8; 20]);
        assert_eq!(base58check_decode(&encoded), Some((0x00, vec![7u8; 20])));
        assert!(is_valid_address(&encoded));
        assert!(!is_valid_address("guestbook"));

        let mut tampered = encoded.clone();
        tampered.pop();
        tampered.push(if encoded.ends_with('2') { '3' } else { '2' });
        assert!(base58check_decode(&tampered).is_none());
    }

    #[test]
    fn test_base58check_is_deterministic() {
        let a = base58check_encode(0x00, &[1u8; 20]);
        let b = base58check_encode(0x00, &[1u8; 20]);
        assert_eq!(a, b);
        // Version byte 0x00 encodes to a leading '1'
        assert!(a.starts_with('1'));
    }
}
