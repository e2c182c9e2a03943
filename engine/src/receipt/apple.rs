//! # Apple Receipts (legacy transaction format)
//!
//! An iOS client submits its receipt as base64. Decoded, it is Apple's
//! legacy property-list-flavored text:
//!
//! ```text
//! {
//!     "signature" = "...base64...";
//!     "purchase-info" = "...base64...";
//!     "environment" = "Sandbox";
//! }
//! ```
//!
//! The `purchase-info` value is itself base64 of another fragment in
//! the same format carrying `product-id` and `transaction-id`. The
//! fragments are close enough to JSON that a two-substitution rewrite
//! (`;` → `,`, `" = "` → `": "`) turns them into parseable objects.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use super::ReceiptError;

/// The fields of an Apple receipt the engine consumes.
#[derive(Clone, Debug)]
pub struct AppleReceipt {
    /// Provider transaction id (replay key).
    pub transaction_id: String,

    /// App Store product id, resolved against the catalog.
    pub product_id: String,

    /// Base64 signature over the decoded `purchase-info` bytes.
    pub signature: String,

    /// The decoded receipt text.
    pub receipt_raw: String,

    /// The decoded `purchase-info` fragment — the bytes the signature
    /// covers. Persisted verbatim for audit.
    pub purchase_info_raw: String,
}

/// Parses a base64 receipt into its commerce-relevant fields.
pub fn parse(receipt_data_b64: &str) -> Result<AppleReceipt, ReceiptError> {
    let receipt_raw = decode_base64_text(receipt_data_b64)?;
    let receipt = parse_fragment(&receipt_raw)?;

    let signature = field(&receipt, "signature")?;
    let purchase_info_b64 = field(&receipt, "purchase-info")?;

    let purchase_info_raw = decode_base64_text(&purchase_info_b64)?;
    let purchase_info = parse_fragment(&purchase_info_raw)?;

    Ok(AppleReceipt {
        transaction_id: field(&purchase_info, "transaction-id")?,
        product_id: field(&purchase_info, "product-id")?,
        signature,
        receipt_raw,
        purchase_info_raw,
    })
}

fn decode_base64_text(encoded: &str) -> Result<String, ReceiptError> {
    let bytes = BASE64
        .decode(encoded.trim())
        .map_err(|e| ReceiptError::Malformed(format!("invalid base64: {}", e)))?;
    String::from_utf8(bytes)
        .map_err(|_| ReceiptError::Malformed("receipt data is not UTF-8".to_string()))
}

/// Rewrites a legacy property-list fragment into JSON and parses it.
fn parse_fragment(raw: &str) -> Result<serde_json::Value, ReceiptError> {
    // Drop the trailing `;` of the last entry, then rewrite the
    // remaining separators and the ` = ` assignments.
    let mut text = raw.to_string();
    if let Some(pos) = text.rfind(';') {
        text.remove(pos);
    }
    let text = text.replace(';', ",").replace("\" = \"", "\": \"");

    let value: serde_json::Value =
        serde_json::from_str(&text).map_err(|e| ReceiptError::Malformed(e.to_string()))?;
    if !value.is_object() {
        return Err(ReceiptError::Malformed(
            "receipt fragment is not an object".to_string(),
        ));
    }
    Ok(value)
}

fn field(fragment: &serde_json::Value, name: &str) -> Result<String, ReceiptError> {
    fragment
        .get(name)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| ReceiptError::Malformed(format!("missing {}", name)))
}

/// Assembles a syntactically valid legacy receipt, signing the
/// purchase-info fragment with `sign`. Test helper shared with the
/// purchase-flow tests.
#[cfg(test)]
pub(crate) fn encode_test_receipt(
    product_id: &str,
    transaction_id: &str,
    sign: impl Fn(&[u8]) -> Vec<u8>,
) -> String {
    let purchase_info = format!(
        "{{\n\"product-id\" = \"{}\";\n\"transaction-id\" = \"{}\";\n\"quantity\" = \"1\";\n}}",
        product_id, transaction_id
    );
    let signature = BASE64.encode(sign(purchase_info.as_bytes()));
    let purchase_info_b64 = BASE64.encode(purchase_info.as_bytes());
    let receipt = format!(
        "{{\n\"signature\" = \"{}\";\n\"purchase-info\" = \"{}\";\n\"environment\" = \"Sandbox\";\n}}",
        signature, purchase_info_b64
    );
    BASE64.encode(receipt.as_bytes())
}
