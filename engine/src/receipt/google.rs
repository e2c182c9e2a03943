//! # Google Play Receipts
//!
//! A Google Play purchase arrives as the raw receipt JSON plus a
//! detached base64 signature over exactly those bytes. The JSON carries
//! the provider order id (our replay key) and the product id (resolved
//! against the catalog).

use serde::Deserialize;

use super::ReceiptError;

/// The fields of a Google Play receipt the engine consumes. Unknown
/// fields are ignored; `orderId` and `productId` are required.
#[derive(Clone, Debug, Deserialize)]
pub struct GooglePlayReceipt {
    #[serde(rename = "orderId")]
    pub order_id: String,

    #[serde(rename = "productId")]
    pub product_id: String,

    #[serde(rename = "packageName", default)]
    pub package_name: Option<String>,

    #[serde(rename = "purchaseTime", default)]
    pub purchase_time: Option<i64>,

    #[serde(rename = "purchaseToken", default)]
    pub purchase_token: Option<String>,
}

/// Parses the receipt JSON. The raw string must be kept verbatim by the
/// caller — the provider signed those exact bytes.
pub fn parse(receipt_json: &str) -> Result<GooglePlayReceipt, ReceiptError> {
    serde_json::from_str(receipt_json).map_err(|e| ReceiptError::Malformed(e.to_string()))
}
