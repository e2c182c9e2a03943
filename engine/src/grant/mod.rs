//! # Grant Engine
//!
//! Turns a catalog item into durable inventory and currency for an
//! account. Granting is split into two phases:
//!
//! 1. **plan** — a read-only recursive walk of the bundle graph that
//!    produces a [`GrantPlan`]: every inventory row to insert and every
//!    currency credit to apply;
//! 2. **commit** — the storage layer applies the whole plan in one
//!    serializable transaction (see
//!    [`CommerceDb::commit_purchase`](crate::store::db::CommerceDb::commit_purchase)),
//!    together with the purchase row and any virtual-currency debit.
//!
//! A partially applied grant is therefore impossible: either the full
//! expansion lands or nothing does.
//!
//! ## Expansion rules
//!
//! - Every grant writes one row for the top-level item.
//! - Non-containers recurse into their bundled items (resolved in the
//!   *same catalog* — catalogs are independent namespaces) and, when
//!   `usage_count >= 1`, credit each bundled currency scaled by the
//!   usage count. Bundle-edge quantity is display metadata, not a grant
//!   multiplier.
//! - Containers stop at their own row; their bundle is deferred until
//!   an explicit unlock ([`GrantEngine::plan_unlock`]).
//! - Recursion is bounded by [`MAX_BUNDLE_DEPTH`]; a cyclic catalog is
//!   a typed error, not a stack overflow.

use thiserror::Error;

use crate::catalog::item::CatalogItem;
use crate::catalog::store::{CatalogError, CatalogScope, CatalogStore};
use crate::config::MAX_BUNDLE_DEPTH;
use crate::inventory::{InventoryEntry, ItemInstanceView};
use crate::ledger::currency::CurrencyType;
use crate::store::db::{CommerceDb, StoreError};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failures while planning a grant. Nothing has been written when any
/// of these surface.
#[derive(Debug, Error)]
pub enum GrantError {
    /// Bundle nesting exceeded [`MAX_BUNDLE_DEPTH`] — almost certainly
    /// a cycle in the catalog data.
    #[error("bundle expansion for {item_id} exceeded depth {depth}")]
    DepthExceeded { item_id: String, depth: usize },

    /// A bundle edge references an item id missing from the catalog.
    #[error("item {item_id} bundles unknown item {bundled} (catalog {catalog})")]
    MissingBundledItem {
        item_id: String,
        bundled: String,
        catalog: String,
    },

    /// A bundle payout references an undefined currency.
    #[error("item {item_id} bundles unknown currency {currency}")]
    UnknownCurrency { item_id: String, currency: String },

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

// ---------------------------------------------------------------------------
// GrantPlan
// ---------------------------------------------------------------------------

/// Everything one grant will write, in grant order.
#[derive(Debug, Default)]
pub struct GrantPlan {
    /// Inventory rows to insert: the top-level item first, then each
    /// recursively granted sub-item.
    pub entries: Vec<InventoryEntry>,

    /// Currency payouts to credit, already resolved to their currency
    /// definitions.
    pub credits: Vec<(CurrencyType, u64)>,
}

impl GrantPlan {
    /// Client-facing descriptors of the granted instances, one per
    /// inventory row in grant order.
    pub fn granted(&self) -> Vec<ItemInstanceView> {
        self.entries
            .iter()
            .map(InventoryEntry::user_representation)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// GrantEngine
// ---------------------------------------------------------------------------

/// Plans bundle expansions. Stateless: safe to clone and share.
#[derive(Clone, Debug)]
pub struct GrantEngine {
    catalog: CatalogStore,
    db: CommerceDb,
}

impl GrantEngine {
    pub fn new(db: CommerceDb) -> Self {
        Self {
            catalog: CatalogStore::new(db.clone()),
            db,
        }
    }

    /// Plans the grant of `item` to `account`, tagged with the granting
    /// purchase for provenance.
    pub fn plan(
        &self,
        item: &CatalogItem,
        account: &str,
        purchase_order: Option<&str>,
    ) -> Result<GrantPlan, GrantError> {
        let mut plan = GrantPlan::default();
        self.expand(item, account, purchase_order, None, 0, &mut plan)?;
        Ok(plan)
    }

    /// Plans the deferred half of a container grant: its bundled items
    /// expand with full grant semantics and its bundled currencies are
    /// credited flat (one unlock pays one bundle). The container's own
    /// row is *not* part of the plan — the caller consumes a use of the
    /// already-owned instance instead.
    pub fn plan_unlock(
        &self,
        container: &CatalogItem,
        account: &str,
        purchase_order: Option<&str>,
    ) -> Result<GrantPlan, GrantError> {
        let mut plan = GrantPlan::default();
        for bundled in &container.bundled_items {
            let sub = self.resolve_bundled(container, &bundled.item_id)?;
            self.expand(
                &sub,
                account,
                purchase_order,
                Some(&container.item_id),
                1,
                &mut plan,
            )?;
        }
        for payout in &container.bundled_currencies {
            let currency = self.resolve_currency(container, &payout.currency)?;
            plan.credits.push((currency, payout.amount));
        }
        Ok(plan)
    }

    fn expand(
        &self,
        item: &CatalogItem,
        account: &str,
        purchase_order: Option<&str>,
        bundle_parent: Option<&str>,
        depth: usize,
        plan: &mut GrantPlan,
    ) -> Result<(), GrantError> {
        if depth > MAX_BUNDLE_DEPTH {
            return Err(GrantError::DepthExceeded {
                item_id: item.item_id.clone(),
                depth,
            });
        }

        plan.entries.push(InventoryEntry::from_grant(
            item,
            account,
            purchase_order,
            bundle_parent,
        ));

        // Containers defer their bundle until unlocked.
        if item.is_container {
            return Ok(());
        }

        for bundled in &item.bundled_items {
            let sub = self.resolve_bundled(item, &bundled.item_id)?;
            self.expand(
                &sub,
                account,
                purchase_order,
                Some(&item.item_id),
                depth + 1,
                plan,
            )?;
        }

        // Bundled currency payouts scale with the item's usage count;
        // a durable item (usage_count 0) pays nothing.
        if item.usage_count >= 1 {
            for payout in &item.bundled_currencies {
                let currency = self.resolve_currency(item, &payout.currency)?;
                let amount = payout.amount * u64::from(item.usage_count);
                plan.credits.push((currency, amount));
            }
        }

        Ok(())
    }

    /// Bundled items resolve in the owning item's catalog only.
    fn resolve_bundled(
        &self,
        owner: &CatalogItem,
        bundled_id: &str,
    ) -> Result<CatalogItem, GrantError> {
        match self
            .catalog
            .resolve_item(bundled_id, &CatalogScope::Named(owner.catalog.clone()))
        {
            Ok(item) => Ok(item),
            Err(CatalogError::ItemNotFound { .. }) => Err(GrantError::MissingBundledItem {
                item_id: owner.item_id.clone(),
                bundled: bundled_id.to_string(),
                catalog: owner.catalog.clone(),
            }),
            Err(other) => Err(other.into()),
        }
    }

    fn resolve_currency(
        &self,
        owner: &CatalogItem,
        code: &str,
    ) -> Result<CurrencyType, GrantError> {
        self.db
            .get_currency(code)?
            .ok_or_else(|| GrantError::UnknownCurrency {
                item_id: owner.item_id.clone(),
                currency: code.to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::item::{BundleCurrency, BundleItem, Catalog};
    use crate::config::DURABLE_USES;
    use crate::ledger::currency::CurrencyType;

    /// Seeds a catalog with:
    /// - `bundle_a`: usage_count 1, bundles item B (qty 2) + 10 GC
    /// - `item_b`: durable
    /// - `chest`: container (usage 1) bundling item B + 50 GC, key `chest_key`
    /// - `chest_key`: consumable key (usage 1)
    fn engine() -> (GrantEngine, CommerceDb) {
        let db = CommerceDb::open_temporary().unwrap();
        db.put_currency(&CurrencyType::new("GC", 0, "Gold Coins"))
            .unwrap();
        let catalog = CatalogStore::new(db.clone());
        catalog.create_catalog(&Catalog::new("main")).unwrap();

        let mut bundle_a = CatalogItem::new("main", "bundle_a");
        bundle_a.usage_count = 1;
        bundle_a.bundled_items = vec![BundleItem {
            item_id: "item_b".into(),
            quantity: 2,
        }];
        bundle_a.bundled_currencies = vec![BundleCurrency {
            currency: "GC".into(),
            amount: 10,
        }];
        catalog.insert_item(&bundle_a).unwrap();

        catalog.insert_item(&CatalogItem::new("main", "item_b")).unwrap();

        let mut chest = CatalogItem::new("main", "chest");
        chest.is_container = true;
        chest.usage_count = 1;
        chest.unlock_key = Some("chest_key".into());
        chest.bundled_items = vec![BundleItem {
            item_id: "item_b".into(),
            quantity: 1,
        }];
        chest.bundled_currencies = vec![BundleCurrency {
            currency: "GC".into(),
            amount: 50,
        }];
        catalog.insert_item(&chest).unwrap();

        let mut key = CatalogItem::new("main", "chest_key");
        key.usage_count = 1;
        catalog.insert_item(&key).unwrap();

        (GrantEngine::new(db.clone()), db)
    }

    fn item(db: &CommerceDb, id: &str) -> CatalogItem {
        db.get_item("main", id).unwrap().unwrap()
    }

    #[test]
    fn bundle_expansion_is_deterministic() {
        let (engine, db) = engine();
        let plan = engine
            .plan(&item(&db, "bundle_a"), "acct", Some("order-1"))
            .unwrap();

        // One row for A, one for B — quantity on the edge does not
        // multiply the grant.
        assert_eq!(plan.entries.len(), 2);
        assert_eq!(plan.entries[0].item_id, "bundle_a");
        assert_eq!(plan.entries[1].item_id, "item_b");
        assert_eq!(plan.entries[1].bundle_parent.as_deref(), Some("bundle_a"));
        assert_eq!(plan.entries[1].remaining_uses, DURABLE_USES);

        // 10 GC scaled by usage_count 1.
        assert_eq!(plan.credits.len(), 1);
        assert_eq!(plan.credits[0].0.code, "GC");
        assert_eq!(plan.credits[0].1, 10);

        // Provenance rides on every row.
        assert!(plan
            .entries
            .iter()
            .all(|e| e.purchase_order.as_deref() == Some("order-1")));
    }

    #[test]
    fn currency_payout_scales_with_usage_count() {
        let (engine, db) = engine();
        let mut multi = item(&db, "bundle_a");
        multi.usage_count = 3;

        let plan = engine.plan(&multi, "acct", None).unwrap();
        assert_eq!(plan.credits[0].1, 30);
    }

    #[test]
    fn durable_bundle_pays_no_currency() {
        let (engine, db) = engine();
        let mut durable = item(&db, "bundle_a");
        durable.usage_count = 0;

        let plan = engine.plan(&durable, "acct", None).unwrap();
        // Sub-item still granted, currency payout skipped.
        assert_eq!(plan.entries.len(), 2);
        assert!(plan.credits.is_empty());
    }

    #[test]
    fn container_short_circuits() {
        let (engine, db) = engine();
        let plan = engine.plan(&item(&db, "chest"), "acct", None).unwrap();

        assert_eq!(plan.entries.len(), 1);
        assert_eq!(plan.entries[0].item_id, "chest");
        assert!(plan.credits.is_empty());
    }

    #[test]
    fn unlock_plan_grants_deferred_bundle() {
        let (engine, db) = engine();
        let plan = engine
            .plan_unlock(&item(&db, "chest"), "acct", None)
            .unwrap();

        assert_eq!(plan.entries.len(), 1);
        assert_eq!(plan.entries[0].item_id, "item_b");
        assert_eq!(plan.entries[0].bundle_parent.as_deref(), Some("chest"));
        assert_eq!(plan.credits.len(), 1);
        assert_eq!(plan.credits[0].1, 50);
    }

    #[test]
    fn nested_bundles_expand_recursively() {
        let (engine, db) = engine();
        let catalog = CatalogStore::new(db.clone());

        // outer bundles bundle_a, which bundles item_b.
        let mut outer = CatalogItem::new("main", "outer");
        outer.bundled_items = vec![BundleItem {
            item_id: "bundle_a".into(),
            quantity: 1,
        }];
        catalog.insert_item(&outer).unwrap();

        let plan = engine.plan(&item(&db, "outer"), "acct", None).unwrap();
        let ids: Vec<_> = plan.entries.iter().map(|e| e.item_id.as_str()).collect();
        assert_eq!(ids, vec!["outer", "bundle_a", "item_b"]);
        // bundle_a's payout still applies within the nested grant.
        assert_eq!(plan.credits[0].1, 10);
    }

    #[test]
    fn bundle_cycle_is_a_typed_error() {
        let (engine, db) = engine();
        let catalog = CatalogStore::new(db.clone());

        let mut ouro = CatalogItem::new("main", "ouro");
        ouro.bundled_items = vec![BundleItem {
            item_id: "ouro".into(),
            quantity: 1,
        }];
        catalog.insert_item(&ouro).unwrap();

        let err = engine.plan(&item(&db, "ouro"), "acct", None).unwrap_err();
        assert!(matches!(err, GrantError::DepthExceeded { .. }));
    }

    #[test]
    fn missing_bundled_item_is_reported() {
        let (engine, db) = engine();
        let catalog = CatalogStore::new(db.clone());

        let mut broken = CatalogItem::new("main", "broken");
        broken.bundled_items = vec![BundleItem {
            item_id: "ghost".into(),
            quantity: 1,
        }];
        catalog.insert_item(&broken).unwrap();

        let err = engine.plan(&item(&db, "broken"), "acct", None).unwrap_err();
        assert!(matches!(
            err,
            GrantError::MissingBundledItem { ref bundled, .. } if bundled == "ghost"
        ));
    }

    #[test]
    fn bundled_items_resolve_in_owning_catalog_only() {
        let (engine, db) = engine();
        let catalog = CatalogStore::new(db.clone());

        // "other" catalog has an item bundling item_b, which only
        // exists in "main" — the grant must not cross namespaces.
        catalog.create_catalog(&Catalog::new("other")).unwrap();
        let mut cross = CatalogItem::new("other", "cross");
        cross.bundled_items = vec![BundleItem {
            item_id: "item_b".into(),
            quantity: 1,
        }];
        catalog.insert_item(&cross).unwrap();

        let cross = db.get_item("other", "cross").unwrap().unwrap();
        let err = engine.plan(&cross, "acct", None).unwrap_err();
        assert!(matches!(err, GrantError::MissingBundledItem { .. }));
    }

    #[test]
    fn granted_views_match_entries() {
        let (engine, db) = engine();
        let plan = engine.plan(&item(&db, "bundle_a"), "acct", None).unwrap();
        let views = plan.granted();
        assert_eq!(views.len(), plan.entries.len());
        assert_eq!(views[0].item_id, "bundle_a");
        assert_eq!(views[0].catalog_version, "main");
        assert_eq!(views[0].unit_price, 0);
    }
}
