//! # Currency Reference Data
//!
//! A [`CurrencyType`] is operator-created, immutable reference data: the
//! short code players see ("GC"), the amount a fresh account is seeded
//! with, and the mutation policy that governs what clients may do to
//! balances directly.
//!
//! The reserved code `RM` marks real-money pricing and is never a
//! spendable balance — see [`crate::config::REAL_MONEY_CODE`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{KEY_SEPARATOR, MAX_CURRENCY_CODE_LEN, REAL_MONEY_CODE};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Validation failures for currency reference data.
#[derive(Debug, Error)]
pub enum CurrencyError {
    /// The code is empty, too long, or contains invalid characters.
    #[error("invalid currency code: {0:?}")]
    InvalidCode(String),
}

// ---------------------------------------------------------------------------
// CurrencyType
// ---------------------------------------------------------------------------

/// An operator-defined virtual currency.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyType {
    /// Short unique identifier, e.g. "GC". Doubles as the storage key.
    pub code: String,

    /// Balance a player's row is seeded with on first access.
    pub initial_deposit: u64,

    /// Operator-facing description.
    pub description: String,

    /// When `false`, all client-initiated balance changes are rejected.
    /// Purchase-driven debits and bundle credits are unaffected.
    pub remotely_mutable: bool,

    /// Cap on the magnitude of a single client-initiated *addition*.
    /// 0 means unlimited. Subtractions and purchase-driven credits are
    /// not capped by this field.
    pub direct_transaction_limit: u64,
}

impl CurrencyType {
    /// Creates a freely mutable currency with no direct-transaction cap.
    pub fn new(code: &str, initial_deposit: u64, description: &str) -> Self {
        Self {
            code: code.to_string(),
            initial_deposit,
            description: description.to_string(),
            remotely_mutable: true,
            direct_transaction_limit: 0,
        }
    }

    /// Returns `true` if this is the reserved real-money pricing code.
    pub fn is_real_money(&self) -> bool {
        self.code == REAL_MONEY_CODE
    }

    /// Validates the currency code: non-empty, at most
    /// [`MAX_CURRENCY_CODE_LEN`] bytes, ASCII alphanumeric (storage keys
    /// must never contain the composite-key separator).
    pub fn validate(&self) -> Result<(), CurrencyError> {
        validate_code(&self.code)
    }
}

/// Shared code check used by the store before persisting and by request
/// validation before lookups.
pub fn validate_code(code: &str) -> Result<(), CurrencyError> {
    let ok = !code.is_empty()
        && code.len() <= MAX_CURRENCY_CODE_LEN
        && code.bytes().all(|b| b.is_ascii_alphanumeric())
        && !code.as_bytes().contains(&KEY_SEPARATOR);
    if ok {
        Ok(())
    } else {
        Err(CurrencyError::InvalidCode(code.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
