//! # Purchase Records
//!
//! A [`Purchase`] is the durable record of one purchase attempt. Rows
//! are written for every attempt that reaches the provider boundary —
//! including rejected receipts — and are never deleted; once a row
//! reaches a terminal status it is immutable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::status::{PaymentProvider, TransactionStatus};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Violations of the purchase lifecycle.
#[derive(Debug, Error)]
pub enum PurchaseError {
    /// The requested status change is not an edge of the status graph.
    #[error("invalid status transition {from} -> {to} (order {order_id})")]
    InvalidTransition {
        order_id: String,
        from: TransactionStatus,
        to: TransactionStatus,
    },
}

// ---------------------------------------------------------------------------
// Purchase
// ---------------------------------------------------------------------------

/// One purchase attempt by one account.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Purchase {
    /// Unique order id, generated server-side.
    pub order_id: String,

    /// Provider-assigned transaction id. A fresh UUID for
    /// virtual-currency purchases (which have no external provider).
    pub transaction_id: String,

    /// Current lifecycle state.
    pub status: TransactionStatus,

    /// Payment source.
    pub provider: PaymentProvider,

    /// Currency the purchase was priced in ("RM" for external receipts).
    pub currency: String,

    /// Owning account id.
    pub account: String,

    /// When the purchase row was created.
    pub purchase_date: DateTime<Utc>,

    /// Raw provider payload, kept verbatim for audit. Empty for
    /// virtual-currency purchases.
    pub annotation: String,
}

impl Purchase {
    /// Creates a purchase row in `Init` with a fresh order id.
    pub fn new(
        account: &str,
        provider: PaymentProvider,
        currency: &str,
        transaction_id: &str,
    ) -> Self {
        Self {
            order_id: Uuid::new_v4().to_string(),
            transaction_id: transaction_id.to_string(),
            status: TransactionStatus::Init,
            provider,
            currency: currency.to_string(),
            account: account.to_string(),
            purchase_date: Utc::now(),
            annotation: String::new(),
        }
    }

    /// Attaches the raw provider payload for audit.
    pub fn with_annotation(mut self, annotation: &str) -> Self {
        self.annotation = annotation.to_string();
        self
    }

    /// Moves the purchase to `next`, validating against the status graph.
    pub fn transition(&mut self, next: TransactionStatus) -> Result<(), PurchaseError> {
        if !self.status.can_transition_to(next) {
            return Err(PurchaseError::InvalidTransition {
                order_id: self.order_id.clone(),
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_purchase_starts_in_init() {
        let p = Purchase::new("acct", PaymentProvider::GooglePlay, "RM", "txn-1");
        assert_eq!(p.status, TransactionStatus::Init);
        assert_eq!(p.provider, PaymentProvider::GooglePlay);
        assert!(!p.order_id.is_empty());
    }

    #[test]
    fn valid_transition_succeeds() {
        let mut p = Purchase::new("acct", PaymentProvider::VirtualCurrency, "GC", "txn-1");
        p.transition(TransactionStatus::Succeeded).unwrap();
        assert_eq!(p.status, TransactionStatus::Succeeded);
    }

    #[test]
    fn invalid_transition_rejected_and_state_unchanged() {
        let mut p = Purchase::new("acct", PaymentProvider::Apple, "RM", "txn-1");
        p.transition(TransactionStatus::Failed).unwrap();

        let err = p.transition(TransactionStatus::Succeeded).unwrap_err();
        assert!(matches!(err, PurchaseError::InvalidTransition { .. }));
        assert_eq!(p.status, TransactionStatus::Failed);
    }

    #[test]
    fn order_ids_are_unique() {
        let a = Purchase::new("acct", PaymentProvider::None, "GC", "");
        let b = Purchase::new("acct", PaymentProvider::None, "GC", "");
        assert_ne!(a.order_id, b.order_id);
    }
}
