//! # Catalog Store
//!
//! Read-facing interface over catalogs and their items, plus the
//! operator-side insert path used by seeding and tests.
//!
//! Catalog scoping is explicit everywhere: callers pass a
//! [`CatalogScope`], either naming a catalog or opting into the
//! "latest catalog wins" strategy. Latest-wins exists for clients that
//! look items up by bare id (external receipt product ids, unscoped
//! `PurchaseItem` calls); anything that needs determinism names the
//! catalog.

use thiserror::Error;

use crate::store::db::{CommerceDb, StoreError};

use super::item::{Catalog, CatalogItem};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from catalog lookups and inserts.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// No catalog with the requested name.
    #[error("catalog not found: {0}")]
    CatalogNotFound(String),

    /// No item with the requested id in the requested scope.
    #[error("item not found: {item_id} ({scope})")]
    ItemNotFound { item_id: String, scope: String },

    /// A container must have `usage_count > 0` to ever be unlockable.
    #[error("container item {0} has no uses")]
    ContainerWithoutUses(String),

    /// Structural validation failure on insert.
    #[error("invalid item: {0}")]
    InvalidItem(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

// ---------------------------------------------------------------------------
// CatalogScope
// ---------------------------------------------------------------------------

/// How an item id should be resolved to a catalog.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CatalogScope {
    /// Search every catalog containing the item and pick the one with
    /// the highest `created` timestamp.
    Latest,
    /// Resolve within exactly one named catalog.
    Named(String),
}

impl CatalogScope {
    /// Builds a scope from an optional client-supplied catalog version.
    pub fn from_request(catalog_version: Option<&str>) -> Self {
        match catalog_version {
            Some(name) if !name.is_empty() => CatalogScope::Named(name.to_string()),
            _ => CatalogScope::Latest,
        }
    }

    fn describe(&self) -> String {
        match self {
            CatalogScope::Latest => "latest catalog".to_string(),
            CatalogScope::Named(name) => format!("catalog {}", name),
        }
    }
}

// ---------------------------------------------------------------------------
// CatalogStore
// ---------------------------------------------------------------------------

/// Typed access to catalogs and items. Read-only from the commerce
/// engine's perspective; the insert methods exist for seeding.
#[derive(Clone, Debug)]
pub struct CatalogStore {
    db: CommerceDb,
}

impl CatalogStore {
    pub fn new(db: CommerceDb) -> Self {
        Self { db }
    }

    /// Persists a catalog header.
    pub fn create_catalog(&self, catalog: &Catalog) -> Result<(), CatalogError> {
        self.db.put_catalog(catalog)?;
        Ok(())
    }

    /// Validates and persists an item into its catalog. The catalog
    /// must already exist.
    pub fn insert_item(&self, item: &CatalogItem) -> Result<(), CatalogError> {
        item.validate()?;
        if self.db.get_catalog(&item.catalog)?.is_none() {
            return Err(CatalogError::CatalogNotFound(item.catalog.clone()));
        }
        self.db.put_item(item)?;
        Ok(())
    }

    /// Looks up a catalog header by name.
    pub fn get_catalog(&self, name: &str) -> Result<Catalog, CatalogError> {
        self.db
            .get_catalog(name)?
            .ok_or_else(|| CatalogError::CatalogNotFound(name.to_string()))
    }

    /// Resolves an item id in the given scope.
    ///
    /// `Latest` scans every catalog that carries the id and picks the
    /// most recently created one — deliberate non-determinism for
    /// unscoped lookups, documented at the call sites that opt in.
    pub fn resolve_item(
        &self,
        item_id: &str,
        scope: &CatalogScope,
    ) -> Result<CatalogItem, CatalogError> {
        match scope {
            CatalogScope::Named(name) => {
                // A missing catalog and a missing item are the same
                // failure from the caller's perspective.
                self.db
                    .get_item(name, item_id)?
                    .ok_or_else(|| CatalogError::ItemNotFound {
                        item_id: item_id.to_string(),
                        scope: scope.describe(),
                    })
            }
            CatalogScope::Latest => {
                let mut found: Option<(Catalog, CatalogItem)> = None;
                for catalog in self.db.list_catalogs()? {
                    if let Some(item) = self.db.get_item(&catalog.name, item_id)? {
                        let newer = match &found {
                            Some((current, _)) => catalog.created > current.created,
                            None => true,
                        };
                        if newer {
                            found = Some((catalog, item));
                        }
                    }
                }
                found
                    .map(|(_, item)| item)
                    .ok_or_else(|| CatalogError::ItemNotFound {
                        item_id: item_id.to_string(),
                        scope: scope.describe(),
                    })
            }
        }
    }

    /// The price of an item in one currency, if it has one.
    pub fn get_price(&self, item: &CatalogItem, currency_code: &str) -> Option<u64> {
        item.price_in(currency_code)
    }

    /// All items of a catalog, ordered by item id for display.
    pub fn list_items(&self, catalog_name: &str) -> Result<Vec<CatalogItem>, CatalogError> {
        // Distinguish "empty catalog" from "no such catalog".
        self.get_catalog(catalog_name)?;
        Ok(self.db.items_in_catalog(catalog_name)?)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
