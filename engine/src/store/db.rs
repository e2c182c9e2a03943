//! # Commerce Storage Engine
//!
//! The persistence layer for the commerce engine, built on sled's
//! embedded key-value store. All durable state flows through this module.
//!
//! ## Tree Layout
//!
//! sled organizes data into named "trees", each an independent B+ tree
//! with its own keyspace:
//!
//! | Tree         | Key                          | Value                     |
//! |--------------|------------------------------|---------------------------|
//! | `currencies` | `code` (UTF-8)               | `bincode(CurrencyType)`   |
//! | `catalogs`   | `name` (UTF-8)               | `bincode(Catalog)`        |
//! | `items`      | `catalog \0 item_id`         | `bincode(CatalogItem)`    |
//! | `balances`   | `account \0 code`            | `bincode(UserCurrency)`   |
//! | `inventory`  | `account \0 instance_id`     | `bincode(InventoryEntry)` |
//! | `purchases`  | `order_id` (UTF-8)           | `bincode(Purchase)`       |
//! | `receipts`   | `provider_tag \0 txn_id`     | `order_id` (UTF-8)        |
//! | `accounts`   | `account_id` (UTF-8)         | `bincode(Account)`        |
//! | `sessions`   | `session_ticket` (UTF-8)     | `account_id` (UTF-8)      |
//!
//! Composite keys put the owner first, so sled's lexicographic ordering
//! makes per-owner prefix scans (an account's inventory, a catalog's
//! items) natural and returns them already sorted by the second
//! component.
//!
//! ## Concurrency
//!
//! The engine runs requests share-nothing; every correctness guarantee
//! comes from this layer:
//!
//! - balance mutations are `compare_and_swap` read-modify-write loops,
//!   so concurrent debits cannot lose updates;
//! - the receipt replay index is insert-if-absent
//!   (`compare_and_swap(None, ..)`), the moral equivalent of a unique
//!   constraint on `(provider, transaction_id)`;
//! - [`CommerceDb::commit_purchase`] applies a debit, the purchase row,
//!   all inventory rows, and all bundle credits in one serializable
//!   multi-tree transaction. Either everything lands or nothing does.

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::transaction::{ConflictableTransactionError, TransactionError, Transactional};
use sled::{Db, Tree};
use std::path::Path;

use crate::account::Account;
use crate::catalog::item::{Catalog, CatalogItem};
use crate::config::KEY_SEPARATOR;
use crate::inventory::InventoryEntry;
use crate::ledger::balance::UserCurrency;
use crate::ledger::currency::CurrencyType;
use crate::purchase::record::Purchase;
use crate::purchase::status::PaymentProvider;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("codec error: {0}")]
    Codec(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Failures of the atomic purchase commit. The balance variants are
/// aborts raised inside the transaction; nothing was written.
#[derive(Debug, thiserror::Error)]
pub enum CommitError {
    #[error("insufficient balance: available {available}, requested {requested} ({currency})")]
    InsufficientFunds {
        currency: String,
        available: u64,
        requested: u64,
    },

    #[error("balance overflow crediting {amount} {currency}")]
    Overflow { currency: String, amount: u64 },

    #[error(transparent)]
    Store(StoreError),
}

impl From<TransactionError<CommitError>> for CommitError {
    fn from(err: TransactionError<CommitError>) -> Self {
        match err {
            TransactionError::Abort(inner) => inner,
            TransactionError::Storage(e) => CommitError::Store(StoreError::Sled(e)),
        }
    }
}

// ---------------------------------------------------------------------------
// Encoding helpers
// ---------------------------------------------------------------------------

fn encode<T: Serialize>(value: &T) -> StoreResult<Vec<u8>> {
    bincode::serialize(value).map_err(|e| StoreError::Codec(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StoreResult<T> {
    bincode::deserialize(bytes).map_err(|e| StoreError::Codec(e.to_string()))
}

/// Joins two identifiers into a composite storage key. Identifiers are
/// validated elsewhere to never contain the separator.
pub fn composite_key(owner: &str, member: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(owner.len() + 1 + member.len());
    key.extend_from_slice(owner.as_bytes());
    key.push(KEY_SEPARATOR);
    key.extend_from_slice(member.as_bytes());
    key
}

fn prefix_key(owner: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(owner.len() + 1);
    key.extend_from_slice(owner.as_bytes());
    key.push(KEY_SEPARATOR);
    key
}

// ---------------------------------------------------------------------------
// PurchaseCommit
// ---------------------------------------------------------------------------

/// Everything a fulfilled purchase writes, applied as one transaction.
pub struct PurchaseCommit<'a> {
    /// The purchase row in its final status. Overwrites any earlier
    /// `Init` row with the same order id.
    pub purchase: &'a Purchase,

    /// Virtual-currency debit to apply, if any. Re-checked inside the
    /// transaction so two concurrent purchases cannot both spend the
    /// same balance.
    pub debit: Option<(&'a CurrencyType, u64)>,

    /// Bundled currency payouts, in grant order.
    pub credits: &'a [(CurrencyType, u64)],

    /// Inventory rows produced by the grant plan.
    pub entries: &'a [InventoryEntry],
}

// ---------------------------------------------------------------------------
// CommerceDb
// ---------------------------------------------------------------------------

/// Persistent storage for accounts, catalogs, balances, inventory, and
/// purchases.
///
/// sled is inherently thread-safe: trees support lock-free concurrent
/// reads and serialized writes, so `CommerceDb` can be cloned and shared
/// across request handlers without external synchronization.
#[derive(Clone, Debug)]
pub struct CommerceDb {
    db: Db,
    currencies: Tree,
    catalogs: Tree,
    items: Tree,
    balances: Tree,
    inventory: Tree,
    purchases: Tree,
    receipts: Tree,
    accounts: Tree,
    sessions: Tree,
}

impl CommerceDb {
    /// Opens (or creates) a database at the given filesystem path.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Creates a temporary in-memory database, cleaned up on drop.
    /// Ideal for tests — no filesystem side effects.
    pub fn open_temporary() -> StoreResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> StoreResult<Self> {
        Ok(Self {
            currencies: db.open_tree("currencies")?,
            catalogs: db.open_tree("catalogs")?,
            items: db.open_tree("items")?,
            balances: db.open_tree("balances")?,
            inventory: db.open_tree("inventory")?,
            purchases: db.open_tree("purchases")?,
            receipts: db.open_tree("receipts")?,
            accounts: db.open_tree("accounts")?,
            sessions: db.open_tree("sessions")?,
            db,
        })
    }

    /// Flushes all dirty pages to disk.
    pub fn flush(&self) -> StoreResult<()> {
        self.db.flush()?;
        Ok(())
    }

    // -- Currencies ---------------------------------------------------------

    pub fn put_currency(&self, currency: &CurrencyType) -> StoreResult<()> {
        self.currencies
            .insert(currency.code.as_bytes(), encode(currency)?)?;
        Ok(())
    }

    pub fn get_currency(&self, code: &str) -> StoreResult<Option<CurrencyType>> {
        match self.currencies.get(code.as_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// All currencies, ordered by code.
    pub fn list_currencies(&self) -> StoreResult<Vec<CurrencyType>> {
        let mut out = Vec::new();
        for row in self.currencies.iter() {
            let (_, bytes) = row?;
            out.push(decode(&bytes)?);
        }
        Ok(out)
    }

    // -- Catalogs & items ---------------------------------------------------

    pub fn put_catalog(&self, catalog: &Catalog) -> StoreResult<()> {
        self.catalogs
            .insert(catalog.name.as_bytes(), encode(catalog)?)?;
        Ok(())
    }

    pub fn get_catalog(&self, name: &str) -> StoreResult<Option<Catalog>> {
        match self.catalogs.get(name.as_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn list_catalogs(&self) -> StoreResult<Vec<Catalog>> {
        let mut out = Vec::new();
        for row in self.catalogs.iter() {
            let (_, bytes) = row?;
            out.push(decode(&bytes)?);
        }
        Ok(out)
    }

    pub fn put_item(&self, item: &CatalogItem) -> StoreResult<()> {
        let key = composite_key(&item.catalog, &item.item_id);
        self.items.insert(key, encode(item)?)?;
        Ok(())
    }

    pub fn get_item(&self, catalog: &str, item_id: &str) -> StoreResult<Option<CatalogItem>> {
        match self.items.get(composite_key(catalog, item_id))? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// All items of one catalog, ordered by item id (key order).
    pub fn items_in_catalog(&self, catalog: &str) -> StoreResult<Vec<CatalogItem>> {
        let mut out = Vec::new();
        for row in self.items.scan_prefix(prefix_key(catalog)) {
            let (_, bytes) = row?;
            out.push(decode(&bytes)?);
        }
        Ok(out)
    }

    // -- Balances -----------------------------------------------------------

    pub fn get_balance(&self, account: &str, code: &str) -> StoreResult<Option<UserCurrency>> {
        match self.balances.get(composite_key(account, code))? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Atomic read-modify-write of one balance row.
    ///
    /// `apply` receives the current row (or `None` if the account has
    /// never touched the currency) and returns the replacement. The
    /// write is a `compare_and_swap` against the bytes that were read;
    /// on contention the whole closure re-runs against fresh state, so
    /// concurrent mutations serialize instead of losing updates.
    pub fn update_balance<E, F>(&self, account: &str, code: &str, apply: F) -> Result<UserCurrency, E>
    where
        E: From<StoreError>,
        F: Fn(Option<UserCurrency>) -> Result<UserCurrency, E>,
    {
        let key = composite_key(account, code);
        loop {
            let current = self.balances.get(&key).map_err(StoreError::from)?;
            let row = match &current {
                Some(bytes) => Some(decode::<UserCurrency>(bytes)?),
                None => None,
            };
            let next = apply(row)?;
            let encoded = encode(&next)?;
            let swap = self
                .balances
                .compare_and_swap(&key, current, Some(encoded))
                .map_err(StoreError::from)?;
            if swap.is_ok() {
                return Ok(next);
            }
            // Lost the race; retry against the fresh row.
        }
    }

    // -- Inventory ----------------------------------------------------------

    pub fn insert_entry(&self, entry: &InventoryEntry) -> StoreResult<()> {
        let key = composite_key(&entry.account, &entry.instance_id);
        self.inventory.insert(key, encode(entry)?)?;
        Ok(())
    }

    pub fn get_entry(&self, account: &str, instance_id: &str) -> StoreResult<Option<InventoryEntry>> {
        match self.inventory.get(composite_key(account, instance_id))? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// All inventory rows of one account, ordered by instance id.
    pub fn entries_for_account(&self, account: &str) -> StoreResult<Vec<InventoryEntry>> {
        let mut out = Vec::new();
        for row in self.inventory.scan_prefix(prefix_key(account)) {
            let (_, bytes) = row?;
            out.push(decode(&bytes)?);
        }
        Ok(out)
    }

    /// Conditionally replaces (or deletes, when `new` is `None`) an
    /// inventory row. Returns `false` if the row changed since `old`
    /// was read — the caller re-reads and retries.
    pub fn replace_entry(
        &self,
        old: &InventoryEntry,
        new: Option<&InventoryEntry>,
    ) -> StoreResult<bool> {
        let key = composite_key(&old.account, &old.instance_id);
        let expected = encode(old)?;
        let replacement = match new {
            Some(entry) => Some(encode(entry)?),
            None => None,
        };
        let swap = self
            .inventory
            .compare_and_swap(key, Some(expected), replacement)?;
        Ok(swap.is_ok())
    }

    // -- Purchases ----------------------------------------------------------

    pub fn put_purchase(&self, purchase: &Purchase) -> StoreResult<()> {
        self.purchases
            .insert(purchase.order_id.as_bytes(), encode(purchase)?)?;
        Ok(())
    }

    pub fn get_purchase(&self, order_id: &str) -> StoreResult<Option<Purchase>> {
        match self.purchases.get(order_id.as_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// All purchase rows of one account, in order id order. Audit and
    /// back-office listing; not on any hot path.
    pub fn purchases_for_account(&self, account: &str) -> StoreResult<Vec<Purchase>> {
        let mut out = Vec::new();
        for row in self.purchases.iter() {
            let (_, bytes) = row?;
            let purchase: Purchase = decode(&bytes)?;
            if purchase.account == account {
                out.push(purchase);
            }
        }
        Ok(out)
    }

    // -- Receipt replay index -----------------------------------------------

    /// Reserves a provider transaction id for fulfillment.
    ///
    /// Insert-if-absent on `(provider, transaction_id)`: exactly one of
    /// any number of concurrent callers wins the reservation. Returns
    /// `false` if the transaction id was already reserved — the receipt
    /// is a replay.
    pub fn reserve_receipt(
        &self,
        provider: PaymentProvider,
        transaction_id: &str,
        order_id: &str,
    ) -> StoreResult<bool> {
        let key = composite_key(provider.storage_tag(), transaction_id);
        let swap = self.receipts.compare_and_swap(
            key,
            None::<&[u8]>,
            Some(order_id.as_bytes().to_vec()),
        )?;
        Ok(swap.is_ok())
    }

    /// Looks up the order that fulfilled a provider transaction id.
    pub fn receipt_order(
        &self,
        provider: PaymentProvider,
        transaction_id: &str,
    ) -> StoreResult<Option<String>> {
        let key = composite_key(provider.storage_tag(), transaction_id);
        Ok(self
            .receipts
            .get(key)?
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
    }

    // -- Accounts & sessions ------------------------------------------------

    /// Persists an account and indexes its current session ticket.
    pub fn put_account(&self, account: &Account) -> StoreResult<()> {
        self.accounts
            .insert(account.id.as_bytes(), encode(account)?)?;
        self.sessions.insert(
            account.session_ticket.as_bytes(),
            account.id.as_bytes().to_vec(),
        )?;
        Ok(())
    }

    pub fn get_account(&self, id: &str) -> StoreResult<Option<Account>> {
        match self.accounts.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Resolves a session ticket to its account. Stale index entries
    /// (ticket rotated since) and inactive accounts resolve to `None`.
    pub fn account_by_ticket(&self, ticket: &str) -> StoreResult<Option<Account>> {
        let id = match self.sessions.get(ticket.as_bytes())? {
            Some(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            None => return Ok(None),
        };
        let account = match self.get_account(&id)? {
            Some(account) => account,
            None => return Ok(None),
        };
        if account.active && account.session_ticket == ticket {
            Ok(Some(account))
        } else {
            Ok(None)
        }
    }

    // -- Atomic purchase commit ---------------------------------------------

    /// Applies a fulfilled purchase as one serializable transaction:
    /// the optional virtual-currency debit, every bundle credit, every
    /// inventory row, and the purchase row itself.
    ///
    /// The debit is re-validated inside the transaction: a concurrent
    /// purchase that spent the balance first aborts this one with
    /// [`CommitError::InsufficientFunds`] and no writes are applied.
    pub fn commit_purchase(&self, commit: PurchaseCommit<'_>) -> Result<(), CommitError> {
        let account = commit.purchase.account.as_str();

        let result = (&self.balances, &self.inventory, &self.purchases).transaction(
            |(balances, inventory, purchases)| {
                let now = Utc::now();

                if let Some((currency, amount)) = commit.debit {
                    let key = composite_key(account, &currency.code);
                    let mut row = match balances.get(&key)? {
                        Some(bytes) => tx_decode::<UserCurrency>(&bytes)?,
                        None => UserCurrency::seeded(currency),
                    };
                    if row.amount < amount {
                        return Err(ConflictableTransactionError::Abort(
                            CommitError::InsufficientFunds {
                                currency: currency.code.clone(),
                                available: row.amount,
                                requested: amount,
                            },
                        ));
                    }
                    row.amount -= amount;
                    row.last_updated = now;
                    balances.insert(key, tx_encode(&row)?)?;
                }

                for (currency, amount) in commit.credits {
                    let key = composite_key(account, &currency.code);
                    let mut row = match balances.get(&key)? {
                        Some(bytes) => tx_decode::<UserCurrency>(&bytes)?,
                        None => UserCurrency::seeded(currency),
                    };
                    row.amount = row.amount.checked_add(*amount).ok_or_else(|| {
                        ConflictableTransactionError::Abort(CommitError::Overflow {
                            currency: currency.code.clone(),
                            amount: *amount,
                        })
                    })?;
                    row.last_updated = now;
                    balances.insert(key, tx_encode(&row)?)?;
                }

                for entry in commit.entries {
                    let key = composite_key(&entry.account, &entry.instance_id);
                    inventory.insert(key, tx_encode(entry)?)?;
                }

                purchases.insert(
                    commit.purchase.order_id.as_bytes(),
                    tx_encode(commit.purchase)?,
                )?;

                Ok(())
            },
        );

        result.map_err(CommitError::from)
    }

    /// Applies a purchase-less grant (container unlock) atomically:
    /// every credit and every inventory row in one transaction.
    pub fn commit_grant(
        &self,
        account: &str,
        credits: &[(CurrencyType, u64)],
        entries: &[InventoryEntry],
    ) -> Result<(), CommitError> {
        let result =
            (&self.balances, &self.inventory).transaction(|(balances, inventory)| {
                let now = Utc::now();

                for (currency, amount) in credits {
                    let key = composite_key(account, &currency.code);
                    let mut row = match balances.get(&key)? {
                        Some(bytes) => tx_decode::<UserCurrency>(&bytes)?,
                        None => UserCurrency::seeded(currency),
                    };
                    row.amount = row.amount.checked_add(*amount).ok_or_else(|| {
                        ConflictableTransactionError::Abort(CommitError::Overflow {
                            currency: currency.code.clone(),
                            amount: *amount,
                        })
                    })?;
                    row.last_updated = now;
                    balances.insert(key, tx_encode(&row)?)?;
                }

                for entry in entries {
                    let key = composite_key(&entry.account, &entry.instance_id);
                    inventory.insert(key, tx_encode(entry)?)?;
                }

                Ok(())
            });

        result.map_err(CommitError::from)
    }
}

/// bincode encode inside a transaction closure; codec failures abort.
fn tx_encode<T: Serialize>(
    value: &T,
) -> Result<Vec<u8>, ConflictableTransactionError<CommitError>> {
    bincode::serialize(value).map_err(|e| {
        ConflictableTransactionError::Abort(CommitError::Store(StoreError::Codec(e.to_string())))
    })
}

/// bincode decode inside a transaction closure; codec failures abort.
fn tx_decode<T: DeserializeOwned>(
    bytes: &[u8],
) -> Result<T, ConflictableTransactionError<CommitError>> {
    bincode::deserialize(bytes).map_err(|e| {
        ConflictableTransactionError::Abort(CommitError::Store(StoreError::Codec(e.to_string())))
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::purchase::status::TransactionStatus;

    fn gold() -> CurrencyType {
        CurrencyType::new("GC", 100, "Gold Coins")
    }

    fn entry_for(account: &str, item_id: &str) -> InventoryEntry {
        InventoryEntry::granted(account, item_id, "main", "", None, -1, None, None)
    }

    #[test]
    fn currency_roundtrip() {
        let db = CommerceDb::open_temporary().unwrap();
        db.put_currency(&gold()).unwrap();

        let loaded = db.get_currency("GC").unwrap().expect("currency");
        assert_eq!(loaded, gold());
        assert!(db.get_currency("XX").unwrap().is_none());
    }

    #[test]
    fn items_scan_is_ordered_and_scoped() {
        let db = CommerceDb::open_temporary().unwrap();
        db.put_item(&CatalogItem::new("main", "sword")).unwrap();
        db.put_item(&CatalogItem::new("main", "axe")).unwrap();
        db.put_item(&CatalogItem::new("next", "axe")).unwrap();

        let items = db.items_in_catalog("main").unwrap();
        let ids: Vec<_> = items.iter().map(|i| i.item_id.as_str()).collect();
        assert_eq!(ids, vec!["axe", "sword"]);
    }

    #[test]
    fn update_balance_creates_and_mutates() {
        let db = CommerceDb::open_temporary().unwrap();
        let currency = gold();

        let row = db
            .update_balance::<StoreError, _>("acct", "GC", |current| {
                let mut row = current.unwrap_or_else(|| UserCurrency::seeded(&currency));
                row.amount += 25;
                Ok(row)
            })
            .unwrap();
        assert_eq!(row.amount, 125); // 100 initial deposit + 25

        let loaded = db.get_balance("acct", "GC").unwrap().expect("row");
        assert_eq!(loaded.amount, 125);
    }

    #[test]
    fn replace_entry_detects_concurrent_change() {
        let db = CommerceDb::open_temporary().unwrap();
        let entry = entry_for("acct", "potion");
        db.insert_entry(&entry).unwrap();

        let mut stale = entry.clone();
        stale.remaining_uses = 99; // no longer matches the stored bytes
        assert!(!db.replace_entry(&stale, None).unwrap());

        assert!(db.replace_entry(&entry, None).unwrap());
        assert!(db.get_entry("acct", &entry.instance_id).unwrap().is_none());
    }

    #[test]
    fn receipt_reservation_is_exactly_once() {
        let db = CommerceDb::open_temporary().unwrap();

        assert!(db
            .reserve_receipt(PaymentProvider::GooglePlay, "txn-1", "order-1")
            .unwrap());
        assert!(!db
            .reserve_receipt(PaymentProvider::GooglePlay, "txn-1", "order-2")
            .unwrap());

        // A different provider with the same transaction id is distinct.
        assert!(db
            .reserve_receipt(PaymentProvider::Apple, "txn-1", "order-3")
            .unwrap());

        let order = db
            .receipt_order(PaymentProvider::GooglePlay, "txn-1")
            .unwrap();
        assert_eq!(order.as_deref(), Some("order-1"));
    }

    #[test]
    fn commit_purchase_applies_everything() {
        let db = CommerceDb::open_temporary().unwrap();
        let currency = gold();
        db.put_currency(&currency).unwrap();

        let mut purchase = Purchase::new(
            "acct",
            PaymentProvider::VirtualCurrency,
            "GC",
            "txn-vc",
        );
        purchase.transition(TransactionStatus::Succeeded).unwrap();

        let entries = vec![entry_for("acct", "sword")];
        let credits = vec![(CurrencyType::new("GV", 0, "Gems"), 10)];

        db.commit_purchase(PurchaseCommit {
            purchase: &purchase,
            debit: Some((&currency, 25)),
            credits: &credits,
            entries: &entries,
        })
        .unwrap();

        // Debit landed against the seeded initial deposit.
        assert_eq!(db.get_balance("acct", "GC").unwrap().unwrap().amount, 75);
        // Credit landed.
        assert_eq!(db.get_balance("acct", "GV").unwrap().unwrap().amount, 10);
        // Inventory landed.
        assert_eq!(db.entries_for_account("acct").unwrap().len(), 1);
        // Purchase row landed in its final status.
        let stored = db.get_purchase(&purchase.order_id).unwrap().unwrap();
        assert_eq!(stored.status, TransactionStatus::Succeeded);
    }

    #[test]
    fn commit_purchase_insufficient_funds_writes_nothing() {
        let db = CommerceDb::open_temporary().unwrap();
        let currency = CurrencyType::new("GC", 0, "Gold Coins");
        db.put_currency(&currency).unwrap();

        let mut purchase =
            Purchase::new("acct", PaymentProvider::VirtualCurrency, "GC", "txn-vc");
        purchase.transition(TransactionStatus::Succeeded).unwrap();
        let entries = vec![entry_for("acct", "sword")];

        let err = db
            .commit_purchase(PurchaseCommit {
                purchase: &purchase,
                debit: Some((&currency, 25)),
                credits: &[],
                entries: &entries,
            })
            .unwrap_err();

        assert!(matches!(err, CommitError::InsufficientFunds { .. }));
        assert!(db.entries_for_account("acct").unwrap().is_empty());
        assert!(db.get_purchase(&purchase.order_id).unwrap().is_none());
    }

    #[test]
    fn session_resolution_checks_rotation_and_active() {
        let db = CommerceDb::open_temporary().unwrap();
        let mut account = Account::new("p1", "Android");
        db.put_account(&account).unwrap();

        let old_ticket = account.session_ticket.clone();
        assert!(db.account_by_ticket(&old_ticket).unwrap().is_some());

        // Rotate the ticket; the stale index entry must stop resolving.
        account.session_ticket = uuid::Uuid::new_v4().to_string();
        db.put_account(&account).unwrap();
        assert!(db.account_by_ticket(&old_ticket).unwrap().is_none());
        assert!(db
            .account_by_ticket(&account.session_ticket)
            .unwrap()
            .is_some());

        // Deactivated accounts resolve nothing.
        account.active = false;
        db.put_account(&account).unwrap();
        assert!(db
            .account_by_ticket(&account.session_ticket)
            .unwrap()
            .is_none());
    }
}
