//! # Currency Ledger
//!
//! Reference currency definitions and per-account balances:
//!
//! ```text
//! currency.rs — CurrencyType: codes, initial deposits, mutation policy
//! balance.rs  — UserCurrency rows and the Ledger mutation interface
//! ```
//!
//! Invariant held across the module: a balance is a `u64` and can never
//! go negative. Debits that would underflow are rejected with no
//! mutation; the client-facing subtract path clamps at zero instead.

pub mod balance;
pub mod currency;

pub use balance::{DirectAdjustment, Ledger, LedgerError, UserCurrency};
pub use currency::{CurrencyError, CurrencyType};
