//! # Catalog Data Model
//!
//! A [`Catalog`] is a named, timestamped collection of purchasable
//! items; each catalog is an independent item namespace. A
//! [`CatalogItem`] owns its sub-entities inline — prices, bundle edges,
//! currency payouts, and freeform attributes have no identity outside
//! the item that declares them.
//!
//! Items are immutable reference data from the commerce engine's
//! perspective: the purchase and grant paths only ever read them.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{KEY_SEPARATOR, MAX_CATALOG_NAME_LEN, MAX_ITEM_ID_LEN};

use super::store::CatalogError;

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// A named, versioned collection of items.
///
/// The `created` timestamp drives the "latest catalog wins" resolution
/// strategy for unscoped item lookups.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Catalog {
    /// Catalog name; clients address it as the "catalog version".
    pub name: String,

    /// Marks the catalog served to clients that ask for no version at
    /// the storefront level.
    pub is_default: bool,

    /// Creation time. Tie-breaker for unscoped lookups: highest wins.
    pub created: DateTime<Utc>,
}

impl Catalog {
    /// Creates a non-default catalog stamped with the current time.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            is_default: false,
            created: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Sub-entities
// ---------------------------------------------------------------------------

/// One price option for an item, in one currency.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemPrice {
    /// Currency code ("GC", "RM", ...).
    pub currency: String,
    /// Price in whole units of that currency.
    pub price: u64,
}

/// A nested item reference: granting the owning item also grants this
/// one (unless the owner is a container).
///
/// `quantity` is metadata on the bundle edge — it is surfaced to
/// clients but does not multiply the recursive grant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleItem {
    /// Item id of the bundled item, resolved in the owner's catalog.
    pub item_id: String,
    /// Declared quantity, for display.
    #[serde(default = "default_bundle_quantity")]
    pub quantity: u32,
}

fn default_bundle_quantity() -> u32 {
    1
}

/// A currency payout granted with the owning item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleCurrency {
    /// Currency code to credit.
    pub currency: String,
    /// Amount per usage-count unit; the grant engine scales this by the
    /// owning item's `usage_count`.
    pub amount: u64,
}

/// Freeform key/value attribute attached to an item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemAttribute {
    pub key: String,
    pub value: String,
}

// ---------------------------------------------------------------------------
// CatalogItem
// ---------------------------------------------------------------------------

/// A purchasable item inside one catalog.
///
/// `item_id` is unique within the owning catalog only; the same id in
/// another catalog is a different item. Everything but the two
/// identifiers defaults, which keeps operator seed files down to the
/// fields that matter.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CatalogItem {
    /// Identifier within the catalog. Also the provider product id for
    /// externally purchased items.
    pub item_id: String,

    /// Name of the owning catalog.
    pub catalog: String,

    /// Classification string for client-side grouping ("shields", ...).
    #[serde(default)]
    pub item_class: String,

    /// Display name.
    #[serde(default)]
    pub display_name: String,

    /// Display description.
    #[serde(default)]
    pub description: String,

    /// Optional image URL for storefront display.
    #[serde(default)]
    pub item_image_url: Option<String>,

    /// Number of uses a granted instance starts with. 0 = durable.
    #[serde(default)]
    pub usage_count: u32,

    /// Lifetime of a granted instance in seconds. 0 = never expires.
    #[serde(default)]
    pub usage_period: u32,

    /// When `true`, a purchased (non-container) instance is consumed
    /// immediately and lands in the inventory with 0 uses.
    #[serde(default)]
    pub consume_on_purchase: bool,

    /// Whether instances of this item stack in client inventories.
    #[serde(default)]
    pub is_stackable: bool,

    /// Whether instances can be traded between players.
    #[serde(default)]
    pub is_tradeable: bool,

    /// Containers defer their bundle until explicitly unlocked.
    #[serde(default)]
    pub is_container: bool,

    /// Item id of the key required to unlock this container, if any.
    #[serde(default)]
    pub unlock_key: Option<String>,

    /// Price options, one per currency.
    #[serde(default)]
    pub prices: Vec<ItemPrice>,

    /// Nested items granted (or deferred, for containers) with this one.
    #[serde(default)]
    pub bundled_items: Vec<BundleItem>,

    /// Currency payouts granted (or deferred) with this item.
    #[serde(default)]
    pub bundled_currencies: Vec<BundleCurrency>,

    /// Freeform attributes surfaced in the catalog representation.
    #[serde(default)]
    pub attributes: Vec<ItemAttribute>,
}

impl CatalogItem {
    /// Creates a minimal durable item with no prices or bundle.
    pub fn new(catalog: &str, item_id: &str) -> Self {
        Self {
            item_id: item_id.to_string(),
            catalog: catalog.to_string(),
            item_class: String::new(),
            display_name: String::new(),
            description: String::new(),
            item_image_url: None,
            usage_count: 0,
            usage_period: 0,
            consume_on_purchase: false,
            is_stackable: false,
            is_tradeable: false,
            is_container: false,
            unlock_key: None,
            prices: Vec::new(),
            bundled_items: Vec::new(),
            bundled_currencies: Vec::new(),
            attributes: Vec::new(),
        }
    }

    /// Returns `true` if granted instances carry a finite use count.
    pub fn is_consumable(&self) -> bool {
        self.usage_count > 0
    }

    /// Looks up this item's price in the given currency.
    pub fn price_in(&self, currency_code: &str) -> Option<u64> {
        self.prices
            .iter()
            .find(|p| p.currency == currency_code)
            .map(|p| p.price)
    }

    /// Returns `true` if the item bundles anything at all.
    pub fn has_bundle(&self) -> bool {
        !self.bundled_items.is_empty() || !self.bundled_currencies.is_empty()
    }

    /// Validates structural invariants before the item is persisted.
    ///
    /// - ids and the catalog name are non-empty, bounded, and free of
    ///   the composite-key separator;
    /// - a container must have `usage_count > 0` — a container without
    ///   uses could never be unlocked.
    pub fn validate(&self) -> Result<(), CatalogError> {
        if !valid_identifier(&self.item_id, MAX_ITEM_ID_LEN) {
            return Err(CatalogError::InvalidItem(format!(
                "invalid item id {:?}",
                self.item_id
            )));
        }
        if !valid_identifier(&self.catalog, MAX_CATALOG_NAME_LEN) {
            return Err(CatalogError::InvalidItem(format!(
                "invalid catalog name {:?}",
                self.catalog
            )));
        }
        if self.is_container && self.usage_count == 0 {
            return Err(CatalogError::ContainerWithoutUses(self.item_id.clone()));
        }
        Ok(())
    }

    /// Builds the client-facing catalog representation of this item.
    pub fn catalog_representation(&self) -> CatalogItemView {
        let virtual_currency_prices: BTreeMap<String, u64> = self
            .prices
            .iter()
            .map(|p| (p.currency.clone(), p.price))
            .collect();

        let consumable = if self.usage_count > 0 {
            Some(ConsumableView {
                usage_count: self.usage_count,
                usage_period: (self.usage_period > 0).then_some(self.usage_period),
            })
        } else {
            None
        };

        let attributes: BTreeMap<String, String> = self
            .attributes
            .iter()
            .map(|a| (a.key.clone(), a.value.clone()))
            .collect();

        let bundle = if self.has_bundle() {
            let bundled_virtual_currencies: BTreeMap<String, u64> = self
                .bundled_currencies
                .iter()
                .map(|bc| (bc.currency.clone(), bc.amount))
                .collect();
            Some(BundleView {
                bundled_virtual_currencies: (!bundled_virtual_currencies.is_empty())
                    .then_some(bundled_virtual_currencies),
                bundled_items: (!self.bundled_items.is_empty())
                    .then(|| self.bundled_items.iter().map(|b| b.item_id.clone()).collect()),
                bundled_items_quantity: (!self.bundled_items.is_empty())
                    .then(|| self.bundled_items.iter().map(|b| b.quantity).collect()),
            })
        } else {
            None
        };

        CatalogItemView {
            item_id: self.item_id.clone(),
            item_class: self.item_class.clone(),
            catalog_version: self.catalog.clone(),
            display_name: self.display_name.clone(),
            description: self.description.clone(),
            is_stackable: self.is_stackable,
            is_tradable: self.is_tradeable,
            virtual_currency_prices: (!virtual_currency_prices.is_empty())
                .then_some(virtual_currency_prices),
            consumable,
            attributes: (!attributes.is_empty()).then_some(attributes),
            bundle,
        }
    }
}

/// Identifier check shared by items and catalog names.
fn valid_identifier(s: &str, max_len: usize) -> bool {
    !s.is_empty() && s.len() <= max_len && !s.as_bytes().contains(&KEY_SEPARATOR)
}

// ---------------------------------------------------------------------------
// Wire representations
// ---------------------------------------------------------------------------

/// Client-facing item representation returned by `GetCatalogItems`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CatalogItemView {
    pub item_id: String,
    pub item_class: String,
    pub catalog_version: String,
    pub display_name: String,
    pub description: String,
    pub is_stackable: bool,
    pub is_tradable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub virtual_currency_prices: Option<BTreeMap<String, u64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consumable: Option<ConsumableView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bundle: Option<BundleView>,
}

/// Usage policy sub-object of [`CatalogItemView`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConsumableView {
    pub usage_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage_period: Option<u32>,
}

/// Bundle sub-object of [`CatalogItemView`]. `bundled_items` and
/// `bundled_items_quantity` are parallel arrays.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BundleView {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bundled_virtual_currencies: Option<BTreeMap<String, u64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bundled_items: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bundled_items_quantity: Option<Vec<u32>>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
