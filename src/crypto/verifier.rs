//! Signature verification capability
//!
//! The engine never touches curve arithmetic directly; it asks a
//! [`SignatureVerifier`] whether a hex signature over a digest is valid
//! for a hex public key.

use super::keys::{public_key_from_hex, verify_signature};

/// Pure signature check used by the validator and the quorum tracker
pub trait SignatureVerifier: Send + Sync {
    /// Returns `true` only for a well-formed signature that verifies.
    /// Malformed keys or signatures are simply invalid.
    fn verify(&self, digest: &[u8], signature_hex: &str, public_key_hex: &str) -> bool;
}

/// secp256k1 ECDSA verifier over compact signatures
#[derive(Debug, Clone, Copy, Default)]
pub struct Secp256k1Verifier;

impl SignatureVerifier for Secp256k1Verifier {
    fn verify(&self, digest: &[u8], signature_hex: &str, public_key_hex: &str) -> bool {
        let Ok(public_key) = public_key_from_hex(public_key_hex) else {
            return false;
        };
        let Ok(signature) = hex::decode(signature_hex) else {
            return false;
        };
        verify_signature(&public_key, digest, &signature).unwrap_or(false)
    }
}
