//! # Purchase Flows
//!
//! [`PurchaseEngine`] is the orchestration layer: it strings the
//! catalog store, currency ledger, receipt gateway, and grant engine
//! together into the two purchase flows and the container unlock.
//!
//! Both purchase flows end in one atomic commit
//! ([`CommerceDb::commit_purchase`]) that applies the debit (if any),
//! the grant, and the purchase row together — a paid-but-ungranted
//! account cannot exist.
//!
//! ## Virtual currency
//!
//! resolve item → reject the reserved real-money code → price-integrity
//! check against the catalog → affordability check → atomic
//! debit + grant + `Succeeded` row. Every precondition fails fast with
//! no side effect.
//!
//! ## External receipt (Google Play / Apple)
//!
//! parse → resolve the provider product id against the *latest* catalog
//! → require a real-money price → verify the signature (a rejection
//! persists a `FailedByProvider` row for fraud review, unlike malformed
//! input which leaves no trace) → reserve the `(provider,
//! transaction_id)` replay key → durable `Init` row → atomic
//! grant + `Succeeded` row. A grant that cannot be applied moves the
//! row to terminal `Failed`; the replay reservation stays, so the
//! receipt cannot be re-fulfilled without operator involvement.

use uuid::Uuid;

use crate::catalog::store::{CatalogError, CatalogScope, CatalogStore};
use crate::config::REAL_MONEY_CODE;
use crate::error::ApiError;
use crate::grant::GrantEngine;
use crate::inventory::{ConsumeOutcome, Inventory, InventoryError, ItemInstanceView, ItemSelector};
use crate::ledger::Ledger;
use crate::receipt::{NormalizedReceipt, ReceiptGateway};
use crate::store::db::{CommerceDb, PurchaseCommit};

use super::record::Purchase;
use super::status::{PaymentProvider, TransactionStatus};

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// A virtual-currency purchase request, already shape-validated by the
/// transport layer.
#[derive(Clone, Debug)]
pub struct PurchaseItemRequest {
    pub item_id: String,
    /// Currency code the client wants to pay with.
    pub currency: String,
    /// The price the client believes it is paying. Must match the
    /// catalog exactly — defense against stale-client tampering.
    pub price: u64,
    /// Optional explicit catalog; latest-wins when absent.
    pub catalog_version: Option<String>,
}

// ---------------------------------------------------------------------------
// PurchaseEngine
// ---------------------------------------------------------------------------

/// The transactional commerce engine.
pub struct PurchaseEngine {
    db: CommerceDb,
    catalog: CatalogStore,
    ledger: Ledger,
    inventory: Inventory,
    grants: GrantEngine,
    receipts: ReceiptGateway,
}

impl PurchaseEngine {
    pub fn new(db: CommerceDb, receipts: ReceiptGateway) -> Self {
        Self {
            catalog: CatalogStore::new(db.clone()),
            ledger: Ledger::new(db.clone()),
            inventory: Inventory::new(db.clone()),
            grants: GrantEngine::new(db.clone()),
            receipts,
            db,
        }
    }

    pub fn catalog(&self) -> &CatalogStore {
        &self.catalog
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    pub fn db(&self) -> &CommerceDb {
        &self.db
    }

    // -- Virtual-currency purchase ------------------------------------------

    /// Purchases an item with a virtual-currency balance. Returns the
    /// granted instance descriptors in grant order.
    pub fn purchase_item(
        &self,
        account: &str,
        request: &PurchaseItemRequest,
    ) -> Result<Vec<ItemInstanceView>, ApiError> {
        let scope = CatalogScope::from_request(request.catalog_version.as_deref());
        let item = self.catalog.resolve_item(&request.item_id, &scope)?;

        // Real money is never spendable as a virtual currency.
        if request.currency == REAL_MONEY_CODE {
            return Err(ApiError::InvalidVirtualCurrency(request.currency.clone()));
        }

        let catalog_price = item
            .price_in(&request.currency)
            .ok_or_else(|| ApiError::InvalidVirtualCurrency(request.currency.clone()))?;

        if request.price != catalog_price {
            return Err(ApiError::WrongPrice {
                client: request.price,
                catalog: catalog_price,
            });
        }

        let currency = self.ledger.currency(&request.currency)?;
        let available = self.ledger.balance(account, &request.currency)?;
        if available < catalog_price {
            return Err(ApiError::InsufficientFunds {
                currency: currency.code.clone(),
                available,
                price: catalog_price,
            });
        }

        // VC purchases are synchronous: there is no pending external
        // step, so the row is born in its final status and commits
        // together with the debit and the grant.
        let mut purchase = Purchase::new(
            account,
            PaymentProvider::VirtualCurrency,
            &currency.code,
            &Uuid::new_v4().to_string(),
        );
        purchase.transition(TransactionStatus::Succeeded)?;

        let plan = self.grants.plan(&item, account, Some(&purchase.order_id))?;
        self.db.commit_purchase(PurchaseCommit {
            purchase: &purchase,
            debit: Some((&currency, catalog_price)),
            credits: &plan.credits,
            entries: &plan.entries,
        })?;

        tracing::info!(
            order_id = %purchase.order_id,
            account = %account,
            item_id = %item.item_id,
            catalog = %item.catalog,
            currency = %currency.code,
            price = catalog_price,
            granted = plan.entries.len(),
            "virtual currency purchase fulfilled"
        );

        Ok(plan.granted())
    }

    // -- External receipts --------------------------------------------------

    /// Validates and fulfills a Google Play purchase.
    pub fn redeem_google_receipt(
        &self,
        account: &str,
        receipt_json: &str,
        signature_b64: &str,
    ) -> Result<(), ApiError> {
        let receipt = self.receipts.parse_google(receipt_json, signature_b64)?;
        self.redeem_external(account, receipt)
    }

    /// Validates and fulfills an Apple purchase.
    pub fn redeem_apple_receipt(
        &self,
        account: &str,
        receipt_data_b64: &str,
    ) -> Result<(), ApiError> {
        let receipt = self.receipts.parse_apple(receipt_data_b64)?;
        self.redeem_external(account, receipt)
    }

    fn redeem_external(
        &self,
        account: &str,
        receipt: NormalizedReceipt,
    ) -> Result<(), ApiError> {
        // Provider product ids resolve against the latest catalog —
        // store listings always reference the newest item definitions.
        let item = self
            .catalog
            .resolve_item(&receipt.product_id, &CatalogScope::Latest)
            .map_err(|err| match err {
                CatalogError::ItemNotFound { .. } => {
                    ApiError::ItemNotFound(receipt.product_id.clone())
                }
                other => other.into(),
            })?;

        // The item must be purchasable for real money at all.
        if item.price_in(REAL_MONEY_CODE).is_none() {
            return Err(ApiError::PurchaseDoesNotExist(item.item_id.clone()));
        }

        // A failed signature is persisted for fraud/audit review —
        // deliberately unlike malformed input, which leaves no record.
        if !self.receipts.verify(&receipt) {
            let mut rejected = Purchase::new(
                account,
                receipt.provider,
                REAL_MONEY_CODE,
                &receipt.transaction_id,
            )
            .with_annotation(&receipt.annotation);
            rejected.transition(TransactionStatus::FailedByProvider)?;
            self.db.put_purchase(&rejected)?;

            tracing::warn!(
                order_id = %rejected.order_id,
                account = %account,
                provider = %receipt.provider,
                transaction_id = %receipt.transaction_id,
                signature = %hex::encode(receipt.signature_bytes()),
                "receipt rejected by signature verification"
            );
            return Err(ApiError::InvalidReceipt(
                "signature verification failed".to_string(),
            ));
        }

        let purchase = Purchase::new(
            account,
            receipt.provider,
            REAL_MONEY_CODE,
            &receipt.transaction_id,
        )
        .with_annotation(&receipt.annotation);

        // The replay reservation is the idempotency boundary: exactly
        // one caller per (provider, transaction id) gets past it.
        if !self
            .db
            .reserve_receipt(receipt.provider, &receipt.transaction_id, &purchase.order_id)?
        {
            tracing::warn!(
                account = %account,
                provider = %receipt.provider,
                transaction_id = %receipt.transaction_id,
                "replayed receipt rejected"
            );
            return Err(ApiError::ReceiptAlreadyUsed(receipt.transaction_id.clone()));
        }

        // Durable Init row before fulfillment; the commit below
        // overwrites it with the Succeeded row atomically.
        self.db.put_purchase(&purchase)?;

        let plan = match self.grants.plan(&item, account, Some(&purchase.order_id)) {
            Ok(plan) => plan,
            Err(err) => {
                self.mark_failed(purchase);
                return Err(err.into());
            }
        };

        let mut fulfilled = purchase.clone();
        fulfilled.transition(TransactionStatus::Succeeded)?;

        if let Err(err) = self.db.commit_purchase(PurchaseCommit {
            purchase: &fulfilled,
            debit: None,
            credits: &plan.credits,
            entries: &plan.entries,
        }) {
            self.mark_failed(purchase);
            return Err(err.into());
        }

        tracing::info!(
            order_id = %fulfilled.order_id,
            account = %account,
            provider = %receipt.provider,
            transaction_id = %receipt.transaction_id,
            item_id = %item.item_id,
            granted = plan.entries.len(),
            "receipt validated and fulfilled"
        );

        Ok(())
    }

    /// Moves an `Init` row to terminal `Failed` after a grant that
    /// could not be applied (the grant itself wrote nothing). Best
    /// effort: a failure here only loses the status update, not money.
    fn mark_failed(&self, mut purchase: Purchase) {
        if purchase.transition(TransactionStatus::Failed).is_ok() {
            if let Err(err) = self.db.put_purchase(&purchase) {
                tracing::error!(
                    order_id = %purchase.order_id,
                    error = %err,
                    "failed to persist Failed status"
                );
            }
        }
    }

    // -- Consume & unlock ---------------------------------------------------

    /// Consumes uses from an owned inventory instance.
    pub fn consume_item(
        &self,
        account: &str,
        selector: &ItemSelector,
        count: u32,
    ) -> Result<ConsumeOutcome, ApiError> {
        Ok(self.inventory.consume(account, selector, count)?)
    }

    /// Opens an owned container: consumes its unlock key (when the
    /// container declares one) and one use of the container itself,
    /// then grants the deferred bundle.
    pub fn unlock_container(
        &self,
        account: &str,
        selector: &ItemSelector,
    ) -> Result<Vec<ItemInstanceView>, ApiError> {
        let entry = self.inventory.find(account, selector).map_err(|err| match err {
            InventoryError::NotFound(id) => ApiError::ContainerNotOwned(id),
            other => other.into(),
        })?;

        // The entry pins the exact item definition it was granted from.
        let item = self
            .catalog
            .resolve_item(&entry.item_id, &CatalogScope::Named(entry.catalog.clone()))?;

        if !item.is_container {
            return Err(ApiError::InvalidContainerItem(item.item_id.clone()));
        }

        if let Some(key_id) = &item.unlock_key {
            self.inventory
                .consume(account, &ItemSelector::ItemId(key_id.clone()), 1)
                .map_err(|err| match err {
                    InventoryError::NotFound(_) | InventoryError::NoRemainingUses { .. } => {
                        ApiError::KeyNotOwned(key_id.clone())
                    }
                    other => other.into(),
                })?;
        }

        self.inventory
            .consume(account, &ItemSelector::Instance(entry.instance_id.clone()), 1)
            .map_err(|err| match err {
                InventoryError::NoRemainingUses { .. } => {
                    ApiError::NoRemainingUses(entry.instance_id.clone())
                }
                other => other.into(),
            })?;

        let plan = self
            .grants
            .plan_unlock(&item, account, entry.purchase_order.as_deref())?;
        self.db.commit_grant(account, &plan.credits, &plan.entries)?;

        tracing::info!(
            account = %account,
            container = %item.item_id,
            granted = plan.entries.len(),
            "container unlocked"
        );

        Ok(plan.granted())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
