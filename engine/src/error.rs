//! # Service Error Taxonomy
//!
//! [`ApiError`] is the single error surface the transport layer sees.
//! Module-level errors (ledger, catalog, grant, ...) carry the precise
//! failure; the orchestration layer folds them into this taxonomy so
//! every caller-visible failure has a stable numeric code, a name, and
//! an HTTP mapping.
//!
//! The numeric codes are wire-compatible with the client SDKs this
//! backend serves; they are contractual and must not be renumbered.

use thiserror::Error;

// ---------------------------------------------------------------------------
// ApiError
// ---------------------------------------------------------------------------

/// A caller-visible failure. Every variant maps to a numeric error code
/// and an HTTP status; the transport layer renders them into the uniform
/// error envelope.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or malformed input. No state was mutated.
    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    /// The request did not resolve to an account.
    #[error("not authenticated: {0}")]
    NotAuthenticated(String),

    /// No catalog item matched the requested id (and scope).
    #[error("item not found: {0}")]
    ItemNotFound(String),

    /// The item exists but carries no real-money price, so there is no
    /// provider purchase to validate against.
    #[error("purchase does not exist for item {0}")]
    PurchaseDoesNotExist(String),

    /// The currency code is unusable for this purchase: unknown, not a
    /// price option for the item, or the reserved real-money code.
    #[error("invalid virtual currency: {0}")]
    InvalidVirtualCurrency(String),

    /// Client-supplied price disagrees with the catalog.
    #[error("wrong price: client sent {client}, catalog price is {catalog}")]
    WrongPrice { client: u64, catalog: u64 },

    /// The account cannot afford the purchase. Balance unchanged.
    #[error("insufficient funds: available {available}, price {price} ({currency})")]
    InsufficientFunds {
        currency: String,
        available: u64,
        price: u64,
    },

    /// The receipt failed provider signature verification.
    #[error("invalid receipt: {0}")]
    InvalidReceipt(String),

    /// The provider transaction id was already fulfilled.
    #[error("receipt already used: transaction {0}")]
    ReceiptAlreadyUsed(String),

    /// Consume request exceeds the remaining uses of the instance.
    #[error("no remaining uses on item instance {0}")]
    NoRemainingUses(String),

    /// The currency's mutation policy rejects this client-initiated
    /// change (`remotely_mutable = false` or over the direct limit).
    #[error("currency {0} cannot be changed by the client")]
    CurrencyNotMutable(String),

    /// Unlock target is not a container item.
    #[error("item {0} is not a container")]
    InvalidContainerItem(String),

    /// The account owns no usable instance of the container.
    #[error("container not owned: {0}")]
    ContainerNotOwned(String),

    /// The container requires an unlock key the account does not own.
    #[error("key not owned: {0}")]
    KeyNotOwned(String),

    /// Catch-all for unexpected internal failures (storage, codec).
    #[error("unknown error: {0}")]
    Unknown(String),
}

impl ApiError {
    /// The contractual numeric error code for this failure.
    pub fn error_code(&self) -> u32 {
        match self {
            ApiError::InvalidParams(_) => 1000,
            ApiError::InvalidContainerItem(_) => 1017,
            ApiError::ContainerNotOwned(_) => 1018,
            ApiError::KeyNotOwned(_) => 1019,
            ApiError::InvalidReceipt(_) => 1021,
            ApiError::ReceiptAlreadyUsed(_) => 1022,
            ApiError::Unknown(_) => 1039,
            ApiError::ItemNotFound(_) => 1047,
            ApiError::InvalidVirtualCurrency(_) => 1051,
            ApiError::WrongPrice { .. } => 1053,
            ApiError::InsufficientFunds { .. } => 1059,
            ApiError::NoRemainingUses(_) => 1062,
            ApiError::NotAuthenticated(_) => 1074,
            ApiError::PurchaseDoesNotExist(_) => 1080,
            ApiError::CurrencyNotMutable(_) => 1082,
        }
    }

    /// Short PascalCase name of the error, as clients know it.
    pub fn error_name(&self) -> &'static str {
        match self {
            ApiError::InvalidParams(_) => "InvalidParams",
            ApiError::InvalidContainerItem(_) => "InvalidContainerItem",
            ApiError::ContainerNotOwned(_) => "ContainerNotOwned",
            ApiError::KeyNotOwned(_) => "KeyNotOwned",
            ApiError::InvalidReceipt(_) => "InvalidReceipt",
            ApiError::ReceiptAlreadyUsed(_) => "ReceiptAlreadyUsed",
            ApiError::Unknown(_) => "UnknownError",
            ApiError::ItemNotFound(_) => "ItemNotFound",
            ApiError::InvalidVirtualCurrency(_) => "InvalidVirtualCurrency",
            ApiError::WrongPrice { .. } => "WrongPrice",
            ApiError::InsufficientFunds { .. } => "InsufficientFunds",
            ApiError::NoRemainingUses(_) => "NoRemainingUses",
            ApiError::NotAuthenticated(_) => "NotAuthenticated",
            ApiError::PurchaseDoesNotExist(_) => "PurchaseDoesNotExist",
            ApiError::CurrencyNotMutable(_) => "APINotEnabledForGameClientAccess",
        }
    }

    /// The HTTP status code the transport layer should answer with
    /// (unless the client asked for errors-as-200).
    pub fn http_status(&self) -> u16 {
        400
    }

    /// The envelope status label: "Error" for unexpected failures,
    /// "BadRequest" for everything the caller could have avoided.
    pub fn status_label(&self) -> &'static str {
        match self {
            ApiError::Unknown(_) => "Error",
            _ => "BadRequest",
        }
    }
}

// ---------------------------------------------------------------------------
// Conversions from module errors
// ---------------------------------------------------------------------------

use crate::catalog::store::CatalogError;
use crate::grant::GrantError;
use crate::inventory::InventoryError;
use crate::ledger::balance::LedgerError;
use crate::purchase::record::PurchaseError;
use crate::receipt::ReceiptError;
use crate::store::db::{CommitError, StoreError};

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::ItemNotFound { item_id, .. } => ApiError::ItemNotFound(item_id),
            CatalogError::CatalogNotFound(name) => ApiError::ItemNotFound(name),
            other => ApiError::Unknown(other.to_string()),
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::UnknownCurrency(code) => ApiError::InvalidVirtualCurrency(code),
            LedgerError::InsufficientFunds {
                currency,
                available,
                requested,
            } => ApiError::InsufficientFunds {
                currency,
                available,
                price: requested,
            },
            LedgerError::NotMutable(code) => ApiError::CurrencyNotMutable(code),
            LedgerError::ExceedsDirectLimit { currency, .. } => {
                ApiError::CurrencyNotMutable(currency)
            }
            other => ApiError::Unknown(other.to_string()),
        }
    }
}

impl From<InventoryError> for ApiError {
    fn from(err: InventoryError) -> Self {
        match err {
            InventoryError::NotFound(id) => ApiError::ItemNotFound(id),
            InventoryError::NoRemainingUses { instance_id, .. } => {
                ApiError::NoRemainingUses(instance_id)
            }
            other => ApiError::Unknown(other.to_string()),
        }
    }
}

impl From<CommitError> for ApiError {
    fn from(err: CommitError) -> Self {
        match err {
            CommitError::InsufficientFunds {
                currency,
                available,
                requested,
            } => ApiError::InsufficientFunds {
                currency,
                available,
                price: requested,
            },
            other => ApiError::Unknown(other.to_string()),
        }
    }
}

impl From<ReceiptError> for ApiError {
    fn from(err: ReceiptError) -> Self {
        match err {
            ReceiptError::Malformed(msg) => ApiError::InvalidParams(msg),
        }
    }
}

impl From<GrantError> for ApiError {
    fn from(err: GrantError) -> Self {
        ApiError::Unknown(err.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Unknown(err.to_string())
    }
}

impl From<PurchaseError> for ApiError {
    fn from(err: PurchaseError) -> Self {
        ApiError::Unknown(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(ApiError::InvalidParams("x".into()).error_code(), 1000);
        assert_eq!(ApiError::InvalidReceipt("x".into()).error_code(), 1021);
        assert_eq!(ApiError::ReceiptAlreadyUsed("x".into()).error_code(), 1022);
        assert_eq!(ApiError::ItemNotFound("x".into()).error_code(), 1047);
        assert_eq!(
            ApiError::WrongPrice {
                client: 1,
                catalog: 2
            }
            .error_code(),
            1053
        );
        assert_eq!(
            ApiError::InsufficientFunds {
                currency: "GC".into(),
                available: 0,
                price: 25
            }
            .error_code(),
            1059
        );
        assert_eq!(ApiError::NotAuthenticated("x".into()).error_code(), 1074);
        assert_eq!(ApiError::PurchaseDoesNotExist("x".into()).error_code(), 1080);
        assert_eq!(ApiError::CurrencyNotMutable("GV".into()).error_code(), 1082);
    }

    #[test]
    fn unknown_error_uses_error_label() {
        assert_eq!(ApiError::Unknown("boom".into()).status_label(), "Error");
        assert_eq!(
            ApiError::InvalidParams("x".into()).status_label(),
            "BadRequest"
        );
    }

    #[test]
    fn mutation_policy_maps_to_client_access_code() {
        let err = ApiError::CurrencyNotMutable("GV".into());
        assert_eq!(err.error_name(), "APINotEnabledForGameClientAccess");
        assert_eq!(err.error_code(), 1082);
    }
}
