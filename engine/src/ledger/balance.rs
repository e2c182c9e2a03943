//! # Per-Account Currency Balances
//!
//! A [`UserCurrency`] row is one `(account, currency)` balance. Rows are
//! created lazily on first access, seeded with the currency's
//! `initial_deposit`, and can never go negative: a debit that would
//! underflow is rejected before any mutation.
//!
//! The [`Ledger`] is the only mutation path. All writes go through the
//! storage layer's compare-and-swap loop, so two requests racing on the
//! same balance serialize instead of losing updates — the engine itself
//! holds no locks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::db::{CommerceDb, StoreError};

use super::currency::CurrencyType;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// No such currency is defined.
    #[error("unknown currency: {0}")]
    UnknownCurrency(String),

    /// A debit exceeded the available balance. Nothing was mutated.
    #[error("insufficient funds: available {available}, requested {requested} ({currency})")]
    InsufficientFunds {
        currency: String,
        available: u64,
        requested: u64,
    },

    /// A credit would overflow the balance.
    #[error("balance overflow: current {current}, credit {credit} ({currency})")]
    Overflow {
        currency: String,
        current: u64,
        credit: u64,
    },

    /// The currency rejects client-initiated balance changes.
    #[error("currency {0} is not remotely mutable")]
    NotMutable(String),

    /// A client-initiated addition exceeded the per-transaction cap.
    #[error("amount {requested} exceeds direct transaction limit {limit} ({currency})")]
    ExceedsDirectLimit {
        currency: String,
        limit: u64,
        requested: u64,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

// ---------------------------------------------------------------------------
// UserCurrency
// ---------------------------------------------------------------------------

/// One account's balance in one currency.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCurrency {
    /// Currency code this balance is denominated in.
    pub currency: String,

    /// Whole-unit balance. Never negative by construction.
    pub amount: u64,

    /// Timestamp of the last balance-modifying operation.
    pub last_updated: DateTime<Utc>,
}

impl UserCurrency {
    /// A fresh row seeded with the currency's initial deposit.
    pub fn seeded(currency: &CurrencyType) -> Self {
        Self {
            currency: currency.code.clone(),
            amount: currency.initial_deposit,
            last_updated: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// DirectAdjustment
// ---------------------------------------------------------------------------

/// Outcome of a client-initiated add/subtract.
///
/// `balance_change` reports the requested delta (negative for
/// subtraction) even when the subtraction clamped at zero, matching
/// what clients are shown.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DirectAdjustment {
    pub balance_change: i64,
    pub balance: u64,
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// Mutation interface over persisted balances.
#[derive(Clone, Debug)]
pub struct Ledger {
    db: CommerceDb,
}

impl Ledger {
    pub fn new(db: CommerceDb) -> Self {
        Self { db }
    }

    /// Looks up the currency definition, or fails with `UnknownCurrency`.
    pub fn currency(&self, code: &str) -> Result<CurrencyType, LedgerError> {
        self.db
            .get_currency(code)?
            .ok_or_else(|| LedgerError::UnknownCurrency(code.to_string()))
    }

    /// Returns the account's balance row, creating and persisting a
    /// seeded row on first access.
    pub fn get_or_create(&self, account: &str, code: &str) -> Result<UserCurrency, LedgerError> {
        let currency = self.currency(code)?;
        self.db.update_balance(account, code, |current| {
            Ok(current.unwrap_or_else(|| UserCurrency::seeded(&currency)))
        })
    }

    /// Current balance amount, seeding the row if needed.
    pub fn balance(&self, account: &str, code: &str) -> Result<u64, LedgerError> {
        Ok(self.get_or_create(account, code)?.amount)
    }

    /// Whether the account could pay `amount` right now.
    pub fn can_afford(&self, account: &str, code: &str, amount: u64) -> Result<bool, LedgerError> {
        Ok(self.balance(account, code)? >= amount)
    }

    /// Adds `amount` to the balance. Engine-internal path: the mutation
    /// policy does not apply here.
    pub fn credit(&self, account: &str, code: &str, amount: u64) -> Result<u64, LedgerError> {
        let currency = self.currency(code)?;
        let row = self.db.update_balance(account, code, |current| -> Result<UserCurrency, LedgerError> {
            let mut row = current.unwrap_or_else(|| UserCurrency::seeded(&currency));
            row.amount = row
                .amount
                .checked_add(amount)
                .ok_or_else(|| LedgerError::Overflow {
                    currency: currency.code.clone(),
                    current: row.amount,
                    credit: amount,
                })?;
            row.last_updated = Utc::now();
            Ok(row)
        })?;
        Ok(row.amount)
    }

    /// Subtracts `amount` from the balance. Fails with
    /// [`LedgerError::InsufficientFunds`] — and mutates nothing — when
    /// the balance cannot cover it.
    pub fn debit(&self, account: &str, code: &str, amount: u64) -> Result<u64, LedgerError> {
        let currency = self.currency(code)?;
        let row = self.db.update_balance(account, code, |current| -> Result<UserCurrency, LedgerError> {
            let mut row = current.unwrap_or_else(|| UserCurrency::seeded(&currency));
            if row.amount < amount {
                return Err(LedgerError::InsufficientFunds {
                    currency: currency.code.clone(),
                    available: row.amount,
                    requested: amount,
                });
            }
            row.amount -= amount;
            row.last_updated = Utc::now();
            Ok(row)
        })?;
        Ok(row.amount)
    }

    /// Client-initiated add/subtract (`AddUserVirtualCurrency` /
    /// `SubtractUserVirtualCurrency`), subject to the currency's
    /// mutation policy:
    ///
    /// - the direct-transaction limit caps a single *addition*;
    /// - a currency with `remotely_mutable = false` rejects both
    ///   directions;
    /// - subtraction clamps the resulting balance at zero rather than
    ///   failing.
    pub fn adjust_direct(
        &self,
        account: &str,
        code: &str,
        amount: u64,
        subtract: bool,
    ) -> Result<DirectAdjustment, LedgerError> {
        let currency = self.currency(code)?;

        if currency.direct_transaction_limit != 0
            && amount > currency.direct_transaction_limit
            && !subtract
        {
            return Err(LedgerError::ExceedsDirectLimit {
                currency: currency.code.clone(),
                limit: currency.direct_transaction_limit,
                requested: amount,
            });
        }
        if !currency.remotely_mutable {
            return Err(LedgerError::NotMutable(currency.code.clone()));
        }

        let row = self.db.update_balance(account, code, |current| -> Result<UserCurrency, LedgerError> {
            let mut row = current.unwrap_or_else(|| UserCurrency::seeded(&currency));
            row.amount = if subtract {
                row.amount.saturating_sub(amount)
            } else {
                row.amount
                    .checked_add(amount)
                    .ok_or_else(|| LedgerError::Overflow {
                        currency: currency.code.clone(),
                        current: row.amount,
                        credit: amount,
                    })?
            };
            row.last_updated = Utc::now();
            Ok(row)
        })?;

        let balance_change = if subtract {
            -(amount as i64)
        } else {
            amount as i64
        };
        Ok(DirectAdjustment {
            balance_change,
            balance: row.amount,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
