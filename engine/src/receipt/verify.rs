//! # Signature Verification Capability
//!
//! Raw receipt cryptography is not this engine's business. The purchase
//! flow consumes a [`SignatureVerifier`] — `verify(payload, signature)`
//! — constructed with whatever key material the deployment injects.
//! Provider public keys are passed in explicitly at construction; the
//! engine never reads them from ambient process state.

use sha2::{Digest, Sha256};

/// Verifies that `signature` is a valid signature over `payload`.
///
/// Implementations wrap a provider's verification scheme with its
/// public key baked in at construction (RSA-SHA1 with the Google Play
/// license key, Apple's root certificate chain, ...).
pub trait SignatureVerifier: Send + Sync {
    fn verify(&self, payload: &[u8], signature: &[u8]) -> bool;
}

/// Deterministic digest-based verifier for development and tests.
///
/// Treats `sha256(key || payload)` as the expected signature. This is
/// obviously not provider cryptography — it exists so that development
/// environments without provider keys can exercise the full receipt
/// path end to end. Production deployments supply a real
/// [`SignatureVerifier`] implementation instead.
#[derive(Clone, Debug)]
pub struct DigestVerifier {
    key: Vec<u8>,
}

impl DigestVerifier {
    pub fn new(key: impl Into<Vec<u8>>) -> Self {
        Self { key: key.into() }
    }

    /// Produces the signature [`verify`](SignatureVerifier::verify)
    /// expects for `payload`. Used by test and tooling clients.
    pub fn sign(&self, payload: &[u8]) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(&self.key);
        hasher.update(payload);
        hasher.finalize().to_vec()
    }
}

impl SignatureVerifier for DigestVerifier {
    fn verify(&self, payload: &[u8], signature: &[u8]) -> bool {
        self.sign(payload) == signature
    }
}
