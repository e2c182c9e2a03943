//! # Player Inventory
//!
//! One [`InventoryEntry`] per granted inventory unit, carrying its
//! remaining uses, optional expiration, and provenance (the purchase
//! that granted it, and the bundle parent when it arrived inside one).
//!
//! `remaining_uses` encoding:
//!
//! - `-1` — durable: the item never runs out and cannot be consumed;
//! - `0`  — exhausted: the row is invisible to inventory listings and
//!          only still exists transiently (consume deletes at zero);
//! - `>0` — consumable with that many uses left.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::catalog::item::CatalogItem;
use crate::config::DURABLE_USES;
use crate::store::db::{CommerceDb, StoreError};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from inventory operations.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// No matching inventory entry for the account.
    #[error("inventory entry not found: {0}")]
    NotFound(String),

    /// The consume request exceeds the entry's remaining uses (durable
    /// entries always land here).
    #[error("no remaining uses: instance {instance_id} has {remaining}, requested {requested}")]
    NoRemainingUses {
        instance_id: String,
        remaining: i64,
        requested: u32,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

// ---------------------------------------------------------------------------
// InventoryEntry
// ---------------------------------------------------------------------------

/// One granted inventory unit owned by one account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryEntry {
    /// Unique instance id (UUID).
    pub instance_id: String,

    /// Owning account id.
    pub account: String,

    /// The catalog item this instance was granted from.
    pub item_id: String,

    /// Catalog the item was resolved in. Together with `item_id` this
    /// pins the exact item definition the grant used.
    pub catalog: String,

    /// Item class, denormalized for inventory listings.
    pub item_class: String,

    /// Order id of the purchase that granted this entry, if any.
    pub purchase_order: Option<String>,

    /// See the module docs for the encoding.
    pub remaining_uses: i64,

    /// When the instance expires, if the item declares a usage period.
    pub expiration: Option<DateTime<Utc>>,

    /// Item id of the bundle that carried this entry, if it was granted
    /// as part of one.
    pub bundle_parent: Option<String>,

    /// Grant time.
    pub granted_at: DateTime<Utc>,
}

impl InventoryEntry {
    /// Creates an entry with a fresh instance id.
    #[allow(clippy::too_many_arguments)]
    pub fn granted(
        account: &str,
        item_id: &str,
        catalog: &str,
        item_class: &str,
        purchase_order: Option<&str>,
        remaining_uses: i64,
        expiration: Option<DateTime<Utc>>,
        bundle_parent: Option<&str>,
    ) -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
            account: account.to_string(),
            item_id: item_id.to_string(),
            catalog: catalog.to_string(),
            item_class: item_class.to_string(),
            purchase_order: purchase_order.map(str::to_string),
            remaining_uses,
            expiration,
            bundle_parent: bundle_parent.map(str::to_string),
            granted_at: Utc::now(),
        }
    }

    /// Builds the entry a grant of `item` produces.
    ///
    /// Remaining uses: durable (`-1`) when the item has no usage count;
    /// otherwise the full count when the item is a container or not
    /// consumed on purchase; otherwise `0` (consumed immediately).
    pub fn from_grant(
        item: &CatalogItem,
        account: &str,
        purchase_order: Option<&str>,
        bundle_parent: Option<&str>,
    ) -> Self {
        let remaining_uses = if item.usage_count == 0 {
            DURABLE_USES
        } else if item.is_container || !item.consume_on_purchase {
            i64::from(item.usage_count)
        } else {
            0
        };
        let expiration = (item.usage_period > 0)
            .then(|| Utc::now() + Duration::seconds(i64::from(item.usage_period)));

        Self::granted(
            account,
            &item.item_id,
            &item.catalog,
            &item.item_class,
            purchase_order,
            remaining_uses,
            expiration,
            bundle_parent,
        )
    }

    /// Exhausted entries are filtered from listings.
    pub fn is_active(&self) -> bool {
        self.remaining_uses != 0
    }

    /// Client-facing representation for inventory listings.
    pub fn user_representation(&self) -> ItemInstanceView {
        ItemInstanceView {
            item_id: self.item_id.clone(),
            item_instance_id: self.instance_id.clone(),
            item_class: self.item_class.clone(),
            catalog_version: self.catalog.clone(),
            unit_price: 0,
            remaining_uses: (self.remaining_uses > 0).then_some(self.remaining_uses),
            bundle_parent: self.bundle_parent.clone(),
        }
    }
}

/// Wire representation of one inventory instance.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ItemInstanceView {
    pub item_id: String,
    pub item_instance_id: String,
    pub item_class: String,
    pub catalog_version: String,
    pub unit_price: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_uses: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bundle_parent: Option<String>,
}

// ---------------------------------------------------------------------------
// Selector
// ---------------------------------------------------------------------------

/// How a consume/unlock request names its target entry.
#[derive(Clone, Debug)]
pub enum ItemSelector {
    /// By exact instance id.
    Instance(String),
    /// By item id — the first active instance of that item wins.
    ItemId(String),
}

// ---------------------------------------------------------------------------
// Inventory
// ---------------------------------------------------------------------------

/// Outcome of a successful consume.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConsumeOutcome {
    pub instance_id: String,
    pub remaining_uses: i64,
}

/// Access to one account's granted items.
#[derive(Clone, Debug)]
pub struct Inventory {
    db: CommerceDb,
}

impl Inventory {
    pub fn new(db: CommerceDb) -> Self {
        Self { db }
    }

    /// Active entries (excludes exhausted rows), ordered by instance id.
    pub fn entries(&self, account: &str) -> Result<Vec<InventoryEntry>, InventoryError> {
        Ok(self
            .db
            .entries_for_account(account)?
            .into_iter()
            .filter(InventoryEntry::is_active)
            .collect())
    }

    /// Resolves a selector to an active entry.
    pub fn find(
        &self,
        account: &str,
        selector: &ItemSelector,
    ) -> Result<InventoryEntry, InventoryError> {
        match selector {
            ItemSelector::Instance(instance_id) => self
                .db
                .get_entry(account, instance_id)?
                .filter(InventoryEntry::is_active)
                .ok_or_else(|| InventoryError::NotFound(instance_id.clone())),
            ItemSelector::ItemId(item_id) => self
                .entries(account)?
                .into_iter()
                .find(|e| &e.item_id == item_id)
                .ok_or_else(|| InventoryError::NotFound(item_id.clone())),
        }
    }

    /// Consumes `count` uses from the selected entry.
    ///
    /// Durable entries (`-1`) cannot be consumed and requests beyond the
    /// remaining uses are rejected whole — partial consumes never
    /// happen. An entry that reaches zero uses is deleted.
    ///
    /// The decrement is a compare-and-swap against the bytes that were
    /// read; on contention the operation retries against fresh state,
    /// so two racing consumes cannot both spend the same use.
    pub fn consume(
        &self,
        account: &str,
        selector: &ItemSelector,
        count: u32,
    ) -> Result<ConsumeOutcome, InventoryError> {
        loop {
            let entry = self.find(account, selector)?;

            if entry.remaining_uses < i64::from(count) {
                return Err(InventoryError::NoRemainingUses {
                    instance_id: entry.instance_id.clone(),
                    remaining: entry.remaining_uses,
                    requested: count,
                });
            }

            let remaining = entry.remaining_uses - i64::from(count);
            let replaced = if remaining == 0 {
                self.db.replace_entry(&entry, None)?
            } else {
                let mut updated = entry.clone();
                updated.remaining_uses = remaining;
                self.db.replace_entry(&entry, Some(&updated))?
            };

            if replaced {
                return Ok(ConsumeOutcome {
                    instance_id: entry.instance_id,
                    remaining_uses: remaining,
                });
            }
            // Entry changed under us; retry with fresh state.
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn inventory() -> (Inventory, CommerceDb) {
        let db = CommerceDb::open_temporary().unwrap();
        (Inventory::new(db.clone()), db)
    }

    fn consumable(account: &str, item_id: &str, uses: i64) -> InventoryEntry {
        InventoryEntry::granted(account, item_id, "main", "", None, uses, None, None)
    }

    // -- remaining_uses computation ------------------------------------------

    #[test]
    fn durable_item_gets_sentinel() {
        let item = CatalogItem::new("main", "sword");
        let entry = InventoryEntry::from_grant(&item, "acct", None, None);
        assert_eq!(entry.remaining_uses, DURABLE_USES);
        assert!(entry.expiration.is_none());
    }

    #[test]
    fn consumable_keeps_uses_unless_consumed_on_purchase() {
        let mut item = CatalogItem::new("main", "potion");
        item.usage_count = 3;

        let kept = InventoryEntry::from_grant(&item, "acct", None, None);
        assert_eq!(kept.remaining_uses, 3);

        item.consume_on_purchase = true;
        let consumed = InventoryEntry::from_grant(&item, "acct", None, None);
        assert_eq!(consumed.remaining_uses, 0);
        assert!(!consumed.is_active());
    }

    #[test]
    fn container_keeps_uses_even_when_consume_on_purchase() {
        let mut item = CatalogItem::new("main", "chest");
        item.usage_count = 1;
        item.is_container = true;
        item.consume_on_purchase = true;

        let entry = InventoryEntry::from_grant(&item, "acct", None, None);
        assert_eq!(entry.remaining_uses, 1);
    }

    #[test]
    fn usage_period_sets_expiration() {
        let mut item = CatalogItem::new("main", "boost");
        item.usage_count = 1;
        item.usage_period = 3600;

        let entry = InventoryEntry::from_grant(&item, "acct", None, None);
        let expiration = entry.expiration.expect("expiration");
        assert!(expiration > Utc::now());
    }

    // -- listings -------------------------------------------------------------

    #[test]
    fn listings_exclude_exhausted_entries() {
        let (inventory, db) = inventory();
        db.insert_entry(&consumable("acct", "potion", 2)).unwrap();
        db.insert_entry(&consumable("acct", "spent", 0)).unwrap();
        db.insert_entry(&consumable("acct", "sword", -1)).unwrap();

        let ids: Vec<_> = inventory
            .entries("acct")
            .unwrap()
            .into_iter()
            .map(|e| e.item_id)
            .collect();
        assert_eq!(ids.len(), 2);
        assert!(!ids.contains(&"spent".to_string()));
    }

    // -- consume --------------------------------------------------------------

    #[test]
    fn consume_decrements_and_deletes_at_zero() {
        let (inventory, db) = inventory();
        let entry = consumable("acct", "potion", 2);
        db.insert_entry(&entry).unwrap();
        let selector = ItemSelector::Instance(entry.instance_id.clone());

        let outcome = inventory.consume("acct", &selector, 1).unwrap();
        assert_eq!(outcome.remaining_uses, 1);

        let outcome = inventory.consume("acct", &selector, 1).unwrap();
        assert_eq!(outcome.remaining_uses, 0);
        // Row deleted at zero.
        assert!(db.get_entry("acct", &entry.instance_id).unwrap().is_none());
    }

    #[test]
    fn consume_rejects_overdraw_whole() {
        let (inventory, db) = inventory();
        let entry = consumable("acct", "potion", 2);
        db.insert_entry(&entry).unwrap();
        let selector = ItemSelector::Instance(entry.instance_id.clone());

        let err = inventory.consume("acct", &selector, 3).unwrap_err();
        assert!(matches!(
            err,
            InventoryError::NoRemainingUses {
                remaining: 2,
                requested: 3,
                ..
            }
        ));
        // Untouched.
        assert_eq!(
            db.get_entry("acct", &entry.instance_id)
                .unwrap()
                .unwrap()
                .remaining_uses,
            2
        );
    }

    #[test]
    fn durable_entries_cannot_be_consumed() {
        let (inventory, db) = inventory();
        let entry = consumable("acct", "sword", -1);
        db.insert_entry(&entry).unwrap();

        let err = inventory
            .consume("acct", &ItemSelector::Instance(entry.instance_id), 1)
            .unwrap_err();
        assert!(matches!(err, InventoryError::NoRemainingUses { .. }));
    }

    #[test]
    fn consume_by_item_id_finds_active_instance() {
        let (inventory, db) = inventory();
        db.insert_entry(&consumable("acct", "potion", 5)).unwrap();

        let outcome = inventory
            .consume("acct", &ItemSelector::ItemId("potion".into()), 2)
            .unwrap();
        assert_eq!(outcome.remaining_uses, 3);
    }

    #[test]
    fn consume_unknown_selector_not_found() {
        let (inventory, _db) = inventory();
        assert!(matches!(
            inventory.consume("acct", &ItemSelector::ItemId("ghost".into()), 1),
            Err(InventoryError::NotFound(_))
        ));
    }

    #[test]
    fn representation_hides_sentinel_uses() {
        let durable = consumable("acct", "sword", -1);
        assert!(durable.user_representation().remaining_uses.is_none());

        let consumable_entry = consumable("acct", "potion", 4);
        assert_eq!(
            consumable_entry.user_representation().remaining_uses,
            Some(4)
        );
    }
}
