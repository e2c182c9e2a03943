//! # Receipt Verifier Adapter
//!
//! Normalizes provider-specific receipt formats into one shape before
//! anything reaches the purchase state machine:
//!
//! ```text
//! google.rs — receipt JSON + detached base64 signature
//! apple.rs  — base64 legacy property format with nested purchase-info
//! verify.rs — the SignatureVerifier capability and the dev verifier
//! ```
//!
//! The [`ReceiptGateway`] owns one verifier per provider, each
//! constructed with explicit key material. Parsing and verification are
//! separate steps: the purchase flow resolves the catalog item *between*
//! them, because a signature rejection is recorded against the item's
//! real-money currency.

use thiserror::Error;

use crate::purchase::status::PaymentProvider;

pub mod apple;
pub mod google;
pub mod verify;

pub use verify::{DigestVerifier, SignatureVerifier};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Receipt payloads that never made it past parsing. No state is
/// touched when these surface.
#[derive(Debug, Error)]
pub enum ReceiptError {
    #[error("malformed receipt: {0}")]
    Malformed(String),
}

// ---------------------------------------------------------------------------
// NormalizedReceipt
// ---------------------------------------------------------------------------

/// A provider receipt reduced to what the purchase flow needs.
#[derive(Clone, Debug)]
pub struct NormalizedReceipt {
    /// Which provider issued the receipt.
    pub provider: PaymentProvider,

    /// Provider transaction id — the replay-protection key.
    pub transaction_id: String,

    /// Provider product id, resolved against the catalog.
    pub product_id: String,

    /// Raw payload persisted on the purchase row for audit.
    pub annotation: String,

    /// The exact bytes the provider signed.
    payload: Vec<u8>,

    /// The decoded signature.
    signature: Vec<u8>,
}

impl NormalizedReceipt {
    /// The decoded signature bytes, for fraud-review logging.
    pub fn signature_bytes(&self) -> &[u8] {
        &self.signature
    }
}

// ---------------------------------------------------------------------------
// ReceiptGateway
// ---------------------------------------------------------------------------

/// Parses and verifies provider receipts.
pub struct ReceiptGateway {
    google: Box<dyn SignatureVerifier>,
    apple: Box<dyn SignatureVerifier>,
}

impl ReceiptGateway {
    /// Builds a gateway from per-provider verifiers. Key material lives
    /// inside the verifiers; the gateway never sees it.
    pub fn new(google: Box<dyn SignatureVerifier>, apple: Box<dyn SignatureVerifier>) -> Self {
        Self { google, apple }
    }

    /// Parses a Google Play receipt. The signature is decoded here but
    /// checked later via [`verify`](Self::verify).
    pub fn parse_google(
        &self,
        receipt_json: &str,
        signature_b64: &str,
    ) -> Result<NormalizedReceipt, ReceiptError> {
        let receipt = google::parse(receipt_json)?;
        let signature = BASE64
            .decode(signature_b64.trim())
            .map_err(|e| ReceiptError::Malformed(format!("invalid signature encoding: {}", e)))?;

        Ok(NormalizedReceipt {
            provider: PaymentProvider::GooglePlay,
            transaction_id: receipt.order_id,
            product_id: receipt.product_id,
            annotation: receipt_json.to_string(),
            payload: receipt_json.as_bytes().to_vec(),
            signature,
        })
    }

    /// Parses an Apple legacy receipt.
    pub fn parse_apple(&self, receipt_data_b64: &str) -> Result<NormalizedReceipt, ReceiptError> {
        let receipt = apple::parse(receipt_data_b64)?;
        let signature = BASE64
            .decode(receipt.signature.trim())
            .map_err(|e| ReceiptError::Malformed(format!("invalid signature encoding: {}", e)))?;

        Ok(NormalizedReceipt {
            provider: PaymentProvider::Apple,
            transaction_id: receipt.transaction_id,
            product_id: receipt.product_id,
            annotation: receipt.purchase_info_raw.clone(),
            payload: receipt.purchase_info_raw.into_bytes(),
            signature,
        })
    }

    /// Checks the receipt's signature with the verifier for its
    /// provider.
    pub fn verify(&self, receipt: &NormalizedReceipt) -> bool {
        let verifier = match receipt.provider {
            PaymentProvider::GooglePlay => &self.google,
            PaymentProvider::Apple => &self.apple,
            // No other provider issues receipts through this gateway.
            _ => return false,
        };
        verifier.verify(&receipt.payload, &receipt.signature)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
