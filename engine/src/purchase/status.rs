//! # Purchase Lifecycle States
//!
//! Every purchase row carries a [`TransactionStatus`] and a
//! [`PaymentProvider`]. The status graph:
//!
//! ```text
//!  CreateCart ──► Init ──► Approved ──► Succeeded
//!                  │  │                    │
//!                  │  └──► Succeeded       ├──► DisputePending ──► Refunded
//!                  │                       │          │
//!                  ├──► FailedByProvider   │          └──► RefundFailed
//!                  └──► Failed             ├──► ChargedBack
//!                                          └──► Revoked
//! ```
//!
//! The core purchase flows only exercise `Init → Succeeded` and
//! `Init → FailedByProvider` (plus `Init → Failed` when a grant cannot
//! be applied); the dispute/refund branches exist for back-office
//! bookkeeping that happens outside this engine.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// TransactionStatus
// ---------------------------------------------------------------------------

/// Lifecycle state of a purchase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionStatus {
    /// Cart assembled, nothing committed yet.
    CreateCart,
    /// Purchase recorded, fulfillment not yet applied.
    Init,
    /// Provider approved payment; awaiting fulfillment.
    Approved,
    /// Items and currency were granted. Terminal for the purchase flow;
    /// dispute bookkeeping may still branch off it.
    Succeeded,
    /// The payment provider rejected the transaction (bad signature,
    /// declined payment). Persisted for fraud/audit review.
    FailedByProvider,
    /// A post-success dispute was opened.
    DisputePending,
    /// Refund issued for a disputed purchase.
    Refunded,
    /// Refund was attempted and failed.
    RefundFailed,
    /// The provider reversed the charge.
    ChargedBack,
    /// The grant was administratively revoked.
    Revoked,
    /// Fulfillment failed on our side after the purchase was recorded.
    Failed,
}

impl TransactionStatus {
    /// Returns `true` for states with no further transition in the
    /// purchase flow itself.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Succeeded
                | TransactionStatus::Refunded
                | TransactionStatus::RefundFailed
                | TransactionStatus::ChargedBack
                | TransactionStatus::Revoked
                | TransactionStatus::Failed
                | TransactionStatus::FailedByProvider
        )
    }

    /// Whether the status graph permits moving from `self` to `next`.
    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        use TransactionStatus::*;
        matches!(
            (self, next),
            (CreateCart, Init)
                | (Init, Approved)
                | (Init, Succeeded)
                | (Init, FailedByProvider)
                | (Init, Failed)
                | (Approved, Succeeded)
                | (Approved, Failed)
                | (Succeeded, DisputePending)
                | (Succeeded, ChargedBack)
                | (Succeeded, Revoked)
                | (DisputePending, Refunded)
                | (DisputePending, RefundFailed)
        )
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionStatus::CreateCart => "CreateCart",
            TransactionStatus::Init => "Init",
            TransactionStatus::Approved => "Approved",
            TransactionStatus::Succeeded => "Succeeded",
            TransactionStatus::FailedByProvider => "FailedByProvider",
            TransactionStatus::DisputePending => "DisputePending",
            TransactionStatus::Refunded => "Refunded",
            TransactionStatus::RefundFailed => "RefundFailed",
            TransactionStatus::ChargedBack => "ChargedBack",
            TransactionStatus::Revoked => "Revoked",
            TransactionStatus::Failed => "Failed",
        };
        write!(f, "{}", name)
    }
}

// ---------------------------------------------------------------------------
// PaymentProvider
// ---------------------------------------------------------------------------

/// Where the money for a purchase came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentProvider {
    /// No payment attached (administrative grants).
    None,
    /// Paid with an in-game currency balance.
    VirtualCurrency,
    GooglePlay,
    Apple,
    Amazon,
    CreditCard,
}

impl PaymentProvider {
    /// Stable lowercase tag used in the receipt-replay index key.
    pub fn storage_tag(&self) -> &'static str {
        match self {
            PaymentProvider::None => "none",
            PaymentProvider::VirtualCurrency => "vc",
            PaymentProvider::GooglePlay => "googleplay",
            PaymentProvider::Apple => "apple",
            PaymentProvider::Amazon => "amazon",
            PaymentProvider::CreditCard => "creditcard",
        }
    }

    /// Providers whose transaction ids are subject to replay protection.
    pub fn is_external(&self) -> bool {
        matches!(
            self,
            PaymentProvider::GooglePlay
                | PaymentProvider::Apple
                | PaymentProvider::Amazon
                | PaymentProvider::CreditCard
        )
    }
}

impl fmt::Display for PaymentProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PaymentProvider::None => "None",
            PaymentProvider::VirtualCurrency => "VirtualCurrency",
            PaymentProvider::GooglePlay => "GooglePlay",
            PaymentProvider::Apple => "Apple",
            PaymentProvider::Amazon => "Amazon",
            PaymentProvider::CreditCard => "CreditCard",
        };
        write!(f, "{}", name)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use TransactionStatus::*;

    #[test]
    fn core_flow_transitions_allowed() {
        assert!(Init.can_transition_to(Succeeded));
        assert!(Init.can_transition_to(FailedByProvider));
        assert!(Init.can_transition_to(Failed));
        assert!(CreateCart.can_transition_to(Init));
    }

    #[test]
    fn dispute_branches_only_after_success() {
        assert!(Succeeded.can_transition_to(DisputePending));
        assert!(DisputePending.can_transition_to(Refunded));
        assert!(DisputePending.can_transition_to(RefundFailed));
        assert!(!Init.can_transition_to(Refunded));
        assert!(!Failed.can_transition_to(DisputePending));
    }

    #[test]
    fn no_resurrection_from_terminal_failures() {
        for terminal in [Failed, FailedByProvider, Refunded, ChargedBack, Revoked] {
            assert!(terminal.is_terminal());
            assert!(!terminal.can_transition_to(Succeeded));
            assert!(!terminal.can_transition_to(Init));
        }
    }

    #[test]
    fn replay_protection_applies_to_external_providers() {
        assert!(PaymentProvider::GooglePlay.is_external());
        assert!(PaymentProvider::Apple.is_external());
        assert!(!PaymentProvider::VirtualCurrency.is_external());
        assert!(!PaymentProvider::None.is_external());
    }

    #[test]
    fn storage_tags_are_distinct() {
        let tags = [
            PaymentProvider::None,
            PaymentProvider::VirtualCurrency,
            PaymentProvider::GooglePlay,
            PaymentProvider::Apple,
            PaymentProvider::Amazon,
            PaymentProvider::CreditCard,
        ]
        .map(|p| p.storage_tag());
        let unique: std::collections::HashSet<_> = tags.iter().collect();
        assert_eq!(unique.len(), tags.len());
    }
}
