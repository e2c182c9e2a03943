//! # Engine Configuration & Constants
//!
//! Every magic number in the commerce engine lives here. Handlers,
//! stores, and the grant engine all read from this module instead of
//! scattering literals through the codebase.

// ---------------------------------------------------------------------------
// Currency
// ---------------------------------------------------------------------------

/// The reserved pseudo-currency code for real-money pricing.
///
/// Items carry an `RM` price entry when they are purchasable through an
/// external payment provider (Google Play, Apple). The code is never a
/// spendable virtual currency: `PurchaseItem` rejects it outright and
/// `GetUserInventory` filters it from the balance map.
pub const REAL_MONEY_CODE: &str = "RM";

/// Maximum length of a currency code. Codes are short operator-assigned
/// identifiers ("GC", "GV", "RM") and double as storage keys.
pub const MAX_CURRENCY_CODE_LEN: usize = 2;

/// Inclusive bounds on a single client-initiated balance adjustment
/// (`AddUserVirtualCurrency` / `SubtractUserVirtualCurrency`).
pub const DIRECT_ADJUST_MIN: u64 = 1;
pub const DIRECT_ADJUST_MAX: u64 = 1_000_000;

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Maximum length of a catalog name (the catalog "version" string).
pub const MAX_CATALOG_NAME_LEN: usize = 32;

/// Maximum length of an item identifier within a catalog.
pub const MAX_ITEM_ID_LEN: usize = 64;

// ---------------------------------------------------------------------------
// Granting
// ---------------------------------------------------------------------------

/// Sentinel for a durable inventory entry: the item never runs out of
/// uses and is not consumable.
pub const DURABLE_USES: i64 = -1;

/// Upper bound on nested bundle expansion.
///
/// Catalogs are operator-authored, so a bundle chain deeper than this is
/// a data error (most likely a cycle). The grant engine reports it as a
/// typed error instead of recursing unboundedly.
pub const MAX_BUNDLE_DEPTH: usize = 8;

// ---------------------------------------------------------------------------
// Storage keys
// ---------------------------------------------------------------------------

/// Separator byte for composite storage keys (`account \x00 code`,
/// `catalog \x00 item_id`, ...). Identifiers are validated to never
/// contain it, which keeps composite keys unambiguous and makes sled's
/// lexicographic prefix scans line up with per-owner grouping.
pub const KEY_SEPARATOR: u8 = 0x00;
