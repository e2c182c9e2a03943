//! # Client Commerce API
//!
//! Builds the axum router for the client-facing commerce endpoints.
//! Every endpoint is a POST with a JSON body, authenticated by the
//! `X-Authorization` session ticket, and answers with the uniform
//! envelope:
//!
//! ```text
//! success: { "code": 200, "status": "OK", "data": { ... } }
//! failure: { "code": 400, "status": "BadRequest", "errorCode": 1059,
//!            "errorMessage": "...", "errorDetails": {} }
//! ```
//!
//! Clients that cannot handle non-200 responses set the
//! `X-HttpErrorAsSuccess` header; logical errors then ship in a 200.
//!
//! | Path                         | Description                          |
//! |------------------------------|--------------------------------------|
//! | `/GetCatalogItems`           | Items of one catalog version         |
//! | `/GetUserInventory`          | Inventory + virtual currency balances|
//! | `/PurchaseItem`              | Virtual-currency purchase            |
//! | `/ValidateGooglePlayPurchase`| Google Play receipt redemption       |
//! | `/ValidateIOSReceipt`        | Apple receipt redemption             |
//! | `/AddUserVirtualCurrency`    | Client-initiated credit              |
//! | `/SubtractUserVirtualCurrency`| Client-initiated debit              |
//! | `/ConsumeItem`               | Spend uses of an owned instance      |
//! | `/UnlockContainerItem`       | Open an owned container              |
//! | `/health` (GET)              | Liveness probe                       |

use axum::{
    extract::State,
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use arcadia_engine::catalog::store::CatalogError;
use arcadia_engine::config::{DIRECT_ADJUST_MAX, DIRECT_ADJUST_MIN};
use arcadia_engine::error::ApiError;
use arcadia_engine::inventory::ItemSelector;
use arcadia_engine::purchase::{PurchaseEngine, PurchaseItemRequest};

use crate::metrics::SharedMetrics;
use crate::session::resolve_session;

/// Header that masks logical errors behind HTTP 200.
pub const ERROR_AS_SUCCESS_HEADER: &str = "x-httperrorassuccess";

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state, cheap to clone.
#[derive(Clone)]
pub struct AppState {
    /// The commerce engine, shared across handlers.
    pub engine: Arc<PurchaseEngine>,
    /// Prometheus metric handles.
    pub metrics: SharedMetrics,
    /// Server version string reported by `/health`.
    pub version: String,
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full client API router.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/GetCatalogItems", post(get_catalog_items))
        .route("/GetUserInventory", post(get_user_inventory))
        .route("/PurchaseItem", post(purchase_item))
        .route("/ValidateGooglePlayPurchase", post(validate_google_play))
        .route("/ValidateIOSReceipt", post(validate_ios_receipt))
        .route("/AddUserVirtualCurrency", post(add_user_virtual_currency))
        .route(
            "/SubtractUserVirtualCurrency",
            post(subtract_user_virtual_currency),
        )
        .route("/ConsumeItem", post(consume_item))
        .route("/UnlockContainerItem", post(unlock_container_item))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

fn success(data: Value) -> Response {
    (
        StatusCode::OK,
        Json(json!({ "code": 200, "status": "OK", "data": data })),
    )
        .into_response()
}

fn failure(err: &ApiError, errors_as_success: bool) -> Response {
    let code = if errors_as_success {
        200
    } else {
        err.http_status()
    };
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST);
    (
        status,
        Json(json!({
            "code": code,
            "status": err.status_label(),
            "errorCode": err.error_code(),
            "errorMessage": err.to_string(),
            "errorDetails": {},
        })),
    )
        .into_response()
}

fn wants_errors_as_success(headers: &HeaderMap) -> bool {
    headers.contains_key(ERROR_AS_SUCCESS_HEADER)
}

/// Deserializes the request body into the endpoint's typed request.
/// Missing bodies and shape mismatches both surface as `InvalidParams`.
fn parse_body<T: serde::de::DeserializeOwned>(body: Option<Json<Value>>) -> Result<T, ApiError> {
    let Json(value) = body.ok_or_else(|| {
        ApiError::InvalidParams("request body must be application/json".to_string())
    })?;
    serde_json::from_value(value).map_err(|e| ApiError::InvalidParams(e.to_string()))
}

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PurchaseItemBody {
    item_id: String,
    virtual_currency: String,
    price: u64,
    #[serde(default)]
    catalog_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ValidateGooglePlayBody {
    receipt_json: String,
    signature: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ValidateIosReceiptBody {
    receipt_data: String,
    /// Display currency of the store transaction; recorded by the
    /// provider, not consulted by fulfillment.
    #[allow(dead_code)]
    currency_code: String,
    #[allow(dead_code)]
    purchase_price: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AdjustCurrencyBody {
    virtual_currency: String,
    amount: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetCatalogItemsBody {
    catalog_version: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ConsumeItemBody {
    #[serde(default)]
    item_instance_id: Option<String>,
    #[serde(default)]
    item_id: Option<String>,
    consume_count: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct UnlockContainerBody {
    #[serde(default)]
    item_instance_id: Option<String>,
    #[serde(default)]
    item_id: Option<String>,
}

fn selector_from(
    item_instance_id: Option<String>,
    item_id: Option<String>,
) -> Result<ItemSelector, ApiError> {
    match (item_instance_id, item_id) {
        (Some(instance), _) => Ok(ItemSelector::Instance(instance)),
        (None, Some(item)) => Ok(ItemSelector::ItemId(item)),
        (None, None) => Err(ApiError::InvalidParams(
            "missing ItemInstanceId or ItemId".to_string(),
        )),
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health` — liveness probe for orchestrators. Deliberately does
/// not touch storage.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "version": state.version,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })),
    )
}

/// `POST /GetCatalogItems` — all items of one catalog version.
async fn get_catalog_items(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<Value>>,
) -> Response {
    let mask = wants_errors_as_success(&headers);
    let _account = match resolve_session(state.engine.db(), &headers) {
        Ok(account) => account,
        Err(err) => return failure(&err, mask),
    };
    let request: GetCatalogItemsBody = match parse_body(body) {
        Ok(request) => request,
        Err(err) => return failure(&err, mask),
    };

    match state.engine.catalog().list_items(&request.catalog_version) {
        Ok(items) => {
            let views: Vec<_> = items
                .iter()
                .map(|item| item.catalog_representation())
                .collect();
            success(json!({ "Catalog": views }))
        }
        Err(CatalogError::CatalogNotFound(_)) => failure(
            &ApiError::InvalidParams("could not find catalog".to_string()),
            mask,
        ),
        Err(err) => failure(&err.into(), mask),
    }
}

/// `POST /GetUserInventory` — active inventory plus all virtual
/// currency balances (the real-money pseudo-currency is excluded).
async fn get_user_inventory(
    State(state): State<AppState>,
    headers: HeaderMap,
    _body: Option<Json<Value>>,
) -> Response {
    let mask = wants_errors_as_success(&headers);
    let account = match resolve_session(state.engine.db(), &headers) {
        Ok(account) => account,
        Err(err) => return failure(&err, mask),
    };

    let result = (|| -> Result<Value, ApiError> {
        let inventory: Vec<_> = state
            .engine
            .inventory()
            .entries(&account.id)?
            .iter()
            .map(|entry| entry.user_representation())
            .collect();

        let mut balances = BTreeMap::new();
        for currency in state.engine.db().list_currencies().map_err(ApiError::from)? {
            if currency.is_real_money() {
                continue;
            }
            let row = state.engine.ledger().get_or_create(&account.id, &currency.code)?;
            balances.insert(currency.code, row.amount);
        }

        Ok(json!({ "Inventory": inventory, "VirtualCurrency": balances }))
    })();

    match result {
        Ok(data) => success(data),
        Err(err) => failure(&err, mask),
    }
}

/// `POST /PurchaseItem` — virtual-currency purchase.
async fn purchase_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<Value>>,
) -> Response {
    let mask = wants_errors_as_success(&headers);
    let started = Instant::now();
    let account = match resolve_session(state.engine.db(), &headers) {
        Ok(account) => account,
        Err(err) => return failure(&err, mask),
    };
    let request: PurchaseItemBody = match parse_body(body) {
        Ok(request) => request,
        Err(err) => return failure(&err, mask),
    };

    let result = state.engine.purchase_item(
        &account.id,
        &PurchaseItemRequest {
            item_id: request.item_id,
            currency: request.virtual_currency,
            price: request.price,
            catalog_version: request.catalog_version,
        },
    );

    state
        .metrics
        .purchase_latency_seconds
        .observe(started.elapsed().as_secs_f64());

    match result {
        Ok(items) => {
            state.metrics.purchases_succeeded_total.inc();
            state.metrics.items_granted_total.inc_by(items.len() as u64);
            success(json!({ "Items": items }))
        }
        Err(err) => {
            state.metrics.purchases_failed_total.inc();
            failure(&err, mask)
        }
    }
}

/// Shared tail of the two receipt endpoints.
fn finish_receipt(
    state: &AppState,
    started: Instant,
    result: Result<(), ApiError>,
    mask: bool,
) -> Response {
    state
        .metrics
        .purchase_latency_seconds
        .observe(started.elapsed().as_secs_f64());

    match result {
        Ok(()) => {
            state.metrics.purchases_succeeded_total.inc();
            success(json!({}))
        }
        Err(err) => {
            match err {
                ApiError::InvalidReceipt(_) => state.metrics.receipts_rejected_total.inc(),
                ApiError::ReceiptAlreadyUsed(_) => state.metrics.receipts_replayed_total.inc(),
                _ => {}
            }
            state.metrics.purchases_failed_total.inc();
            failure(&err, mask)
        }
    }
}

/// `POST /ValidateGooglePlayPurchase` — Google Play receipt redemption.
async fn validate_google_play(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<Value>>,
) -> Response {
    let mask = wants_errors_as_success(&headers);
    let started = Instant::now();
    let account = match resolve_session(state.engine.db(), &headers) {
        Ok(account) => account,
        Err(err) => return failure(&err, mask),
    };
    let request: ValidateGooglePlayBody = match parse_body(body) {
        Ok(request) => request,
        Err(err) => return failure(&err, mask),
    };

    let result =
        state
            .engine
            .redeem_google_receipt(&account.id, &request.receipt_json, &request.signature);
    finish_receipt(&state, started, result, mask)
}

/// `POST /ValidateIOSReceipt` — Apple receipt redemption.
async fn validate_ios_receipt(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<Value>>,
) -> Response {
    let mask = wants_errors_as_success(&headers);
    let started = Instant::now();
    let account = match resolve_session(state.engine.db(), &headers) {
        Ok(account) => account,
        Err(err) => return failure(&err, mask),
    };
    let request: ValidateIosReceiptBody = match parse_body(body) {
        Ok(request) => request,
        Err(err) => return failure(&err, mask),
    };

    let result = state
        .engine
        .redeem_apple_receipt(&account.id, &request.receipt_data);
    finish_receipt(&state, started, result, mask)
}

/// Shared implementation of the two direct-adjustment endpoints.
async fn adjust_currency(
    state: AppState,
    headers: HeaderMap,
    body: Option<Json<Value>>,
    subtract: bool,
) -> Response {
    let mask = wants_errors_as_success(&headers);
    let account = match resolve_session(state.engine.db(), &headers) {
        Ok(account) => account,
        Err(err) => return failure(&err, mask),
    };
    let request: AdjustCurrencyBody = match parse_body(body) {
        Ok(request) => request,
        Err(err) => return failure(&err, mask),
    };

    if request.amount < DIRECT_ADJUST_MIN || request.amount > DIRECT_ADJUST_MAX {
        return failure(
            &ApiError::InvalidParams("invalid amount".to_string()),
            mask,
        );
    }

    match state.engine.ledger().adjust_direct(
        &account.id,
        &request.virtual_currency,
        request.amount,
        subtract,
    ) {
        Ok(adjustment) => success(json!({
            "PlayFabId": account.id,
            "VirtualCurrency": request.virtual_currency,
            "BalanceChange": adjustment.balance_change,
            "Balance": adjustment.balance,
        })),
        Err(err) => failure(&err.into(), mask),
    }
}

/// `POST /AddUserVirtualCurrency`.
async fn add_user_virtual_currency(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<Value>>,
) -> Response {
    adjust_currency(state, headers, body, false).await
}

/// `POST /SubtractUserVirtualCurrency`.
async fn subtract_user_virtual_currency(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<Value>>,
) -> Response {
    adjust_currency(state, headers, body, true).await
}

/// `POST /ConsumeItem` — spend uses of an owned inventory instance.
async fn consume_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<Value>>,
) -> Response {
    let mask = wants_errors_as_success(&headers);
    let account = match resolve_session(state.engine.db(), &headers) {
        Ok(account) => account,
        Err(err) => return failure(&err, mask),
    };
    let request: ConsumeItemBody = match parse_body(body) {
        Ok(request) => request,
        Err(err) => return failure(&err, mask),
    };
    if request.consume_count == 0 {
        return failure(
            &ApiError::InvalidParams("ConsumeCount must be at least 1".to_string()),
            mask,
        );
    }
    let selector = match selector_from(request.item_instance_id, request.item_id) {
        Ok(selector) => selector,
        Err(err) => return failure(&err, mask),
    };

    match state
        .engine
        .consume_item(&account.id, &selector, request.consume_count)
    {
        Ok(outcome) => success(json!({
            "ItemInstanceId": outcome.instance_id,
            "RemainingUses": outcome.remaining_uses,
        })),
        Err(err) => failure(&err, mask),
    }
}

/// `POST /UnlockContainerItem` — open an owned container, consuming
/// its key (when required) and one container use.
async fn unlock_container_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<Value>>,
) -> Response {
    let mask = wants_errors_as_success(&headers);
    let account = match resolve_session(state.engine.db(), &headers) {
        Ok(account) => account,
        Err(err) => return failure(&err, mask),
    };
    let request: UnlockContainerBody = match parse_body(body) {
        Ok(request) => request,
        Err(err) => return failure(&err, mask),
    };
    let selector = match selector_from(request.item_instance_id, request.item_id) {
        Ok(selector) => selector,
        Err(err) => return failure(&err, mask),
    };

    match state.engine.unlock_container(&account.id, &selector) {
        Ok(items) => {
            state.metrics.items_granted_total.inc_by(items.len() as u64);
            success(json!({ "Items": items }))
        }
        Err(err) => failure(&err, mask),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use arcadia_engine::account::Account;
    use arcadia_engine::catalog::item::{Catalog, CatalogItem, ItemPrice};
    use arcadia_engine::catalog::store::CatalogStore;
    use arcadia_engine::ledger::currency::CurrencyType;
    use arcadia_engine::receipt::{DigestVerifier, ReceiptGateway};
    use arcadia_engine::store::db::CommerceDb;
    use axum::body::Body;
    use axum::http::Request;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine as _;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    const GOOGLE_KEY: &[u8] = b"google-test-key";

    /// Seeds a world and returns the router plus a valid session ticket.
    fn test_router() -> (Router, String) {
        let db = CommerceDb::open_temporary().expect("temp db");
        db.put_currency(&CurrencyType::new("GC", 0, "Gold Coins"))
            .unwrap();
        db.put_currency(&CurrencyType::new("RM", 0, "Real Money"))
            .unwrap();

        let catalog = CatalogStore::new(db.clone());
        catalog.create_catalog(&Catalog::new("main")).unwrap();
        let mut shield = CatalogItem::new("main", "shield_level_5");
        shield.display_name = "Level 5 Shield".into();
        shield.prices = vec![
            ItemPrice {
                currency: "GC".into(),
                price: 25,
            },
            ItemPrice {
                currency: "RM".into(),
                price: 199,
            },
        ];
        catalog.insert_item(&shield).unwrap();

        let mut potion = CatalogItem::new("main", "potion");
        potion.usage_count = 3;
        potion.prices = vec![ItemPrice {
            currency: "GC".into(),
            price: 5,
        }];
        catalog.insert_item(&potion).unwrap();

        let account = Account::new("tester", "Test");
        db.put_account(&account).unwrap();
        let ticket = account.session_ticket.clone();

        let gateway = ReceiptGateway::new(
            Box::new(DigestVerifier::new(GOOGLE_KEY.to_vec())),
            Box::new(DigestVerifier::new(b"apple-test-key".to_vec())),
        );
        let state = AppState {
            engine: Arc::new(PurchaseEngine::new(db, gateway)),
            metrics: Arc::new(crate::metrics::CommerceMetrics::new()),
            version: "0.1.0-test".into(),
        };
        (create_router(state), ticket)
    }

    /// POSTs a JSON body with the given session ticket and returns
    /// (status, parsed envelope).
    async fn post(
        router: &Router,
        path: &str,
        ticket: Option<&str>,
        body: Value,
        extra_headers: &[(&str, &str)],
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/json");
        if let Some(ticket) = ticket {
            builder = builder.header("X-Authorization", ticket);
        }
        for (name, value) in extra_headers {
            builder = builder.header(*name, *value);
        }
        let request = builder
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn credit(router: &Router, ticket: &str, amount: u64) {
        let (status, envelope) = post(
            router,
            "/AddUserVirtualCurrency",
            Some(ticket),
            json!({ "VirtualCurrency": "GC", "Amount": amount }),
            &[],
        )
        .await;
        assert_eq!(status, StatusCode::OK, "credit failed: {envelope}");
    }

    // -- Envelope & auth ------------------------------------------------------

    #[tokio::test]
    async fn missing_session_ticket_rejected() {
        let (router, _) = test_router();
        let (status, envelope) = post(
            &router,
            "/GetUserInventory",
            None,
            json!({}),
            &[],
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(envelope["errorCode"], 1074);
        assert_eq!(envelope["status"], "BadRequest");
        assert!(envelope["errorMessage"].is_string());
    }

    #[tokio::test]
    async fn error_as_success_header_masks_http_code() {
        let (router, _) = test_router();
        let (status, envelope) = post(
            &router,
            "/GetUserInventory",
            None,
            json!({}),
            &[("X-HttpErrorAsSuccess", "1")],
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(envelope["code"], 200);
        assert_eq!(envelope["errorCode"], 1074);
    }

    #[tokio::test]
    async fn malformed_body_is_invalid_params() {
        let (router, ticket) = test_router();
        let (status, envelope) = post(
            &router,
            "/PurchaseItem",
            Some(&ticket),
            json!({ "ItemId": "shield_level_5" }),
            &[],
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(envelope["errorCode"], 1000);
    }

    // -- PurchaseItem ---------------------------------------------------------

    #[tokio::test]
    async fn purchase_flow_insufficient_then_success() {
        let (router, ticket) = test_router();
        let purchase = json!({
            "ItemId": "shield_level_5",
            "VirtualCurrency": "GC",
            "Price": 25
        });

        let (status, envelope) =
            post(&router, "/PurchaseItem", Some(&ticket), purchase.clone(), &[]).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(envelope["errorCode"], 1059);

        credit(&router, &ticket, 25).await;

        let (status, envelope) =
            post(&router, "/PurchaseItem", Some(&ticket), purchase, &[]).await;
        assert_eq!(status, StatusCode::OK, "purchase failed: {envelope}");
        let items = envelope["data"]["Items"].as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["ItemId"], "shield_level_5");
        assert_eq!(items[0]["CatalogVersion"], "main");
    }

    #[tokio::test]
    async fn purchase_wrong_price_rejected() {
        let (router, ticket) = test_router();
        credit(&router, &ticket, 100).await;

        let (_, envelope) = post(
            &router,
            "/PurchaseItem",
            Some(&ticket),
            json!({ "ItemId": "shield_level_5", "VirtualCurrency": "GC", "Price": 1 }),
            &[],
        )
        .await;
        assert_eq!(envelope["errorCode"], 1053);
    }

    #[tokio::test]
    async fn purchase_with_real_money_code_rejected() {
        let (router, ticket) = test_router();
        let (_, envelope) = post(
            &router,
            "/PurchaseItem",
            Some(&ticket),
            json!({ "ItemId": "shield_level_5", "VirtualCurrency": "RM", "Price": 199 }),
            &[],
        )
        .await;
        assert_eq!(envelope["errorCode"], 1051);
    }

    // -- Currency adjustment --------------------------------------------------

    #[tokio::test]
    async fn adjust_currency_response_shape() {
        let (router, ticket) = test_router();
        let (status, envelope) = post(
            &router,
            "/AddUserVirtualCurrency",
            Some(&ticket),
            json!({ "VirtualCurrency": "GC", "Amount": 100 }),
            &[],
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let data = &envelope["data"];
        assert_eq!(data["VirtualCurrency"], "GC");
        assert_eq!(data["BalanceChange"], 100);
        assert_eq!(data["Balance"], 100);
        assert!(data["PlayFabId"].is_string());

        let (_, envelope) = post(
            &router,
            "/SubtractUserVirtualCurrency",
            Some(&ticket),
            json!({ "VirtualCurrency": "GC", "Amount": 30 }),
            &[],
        )
        .await;
        assert_eq!(envelope["data"]["BalanceChange"], -30);
        assert_eq!(envelope["data"]["Balance"], 70);
    }

    #[tokio::test]
    async fn adjust_amount_bounds_enforced() {
        let (router, ticket) = test_router();

        for amount in [json!(0), json!(1_000_001)] {
            let (_, envelope) = post(
                &router,
                "/AddUserVirtualCurrency",
                Some(&ticket),
                json!({ "VirtualCurrency": "GC", "Amount": amount }),
                &[],
            )
            .await;
            assert_eq!(envelope["errorCode"], 1000, "amount {amount}");
        }
    }

    // -- Inventory ------------------------------------------------------------

    #[tokio::test]
    async fn inventory_lists_items_and_excludes_real_money() {
        let (router, ticket) = test_router();
        credit(&router, &ticket, 25).await;
        post(
            &router,
            "/PurchaseItem",
            Some(&ticket),
            json!({ "ItemId": "shield_level_5", "VirtualCurrency": "GC", "Price": 25 }),
            &[],
        )
        .await;

        let (status, envelope) =
            post(&router, "/GetUserInventory", Some(&ticket), json!({}), &[]).await;
        assert_eq!(status, StatusCode::OK);

        let inventory = envelope["data"]["Inventory"].as_array().unwrap();
        assert_eq!(inventory.len(), 1);
        assert_eq!(inventory[0]["ItemId"], "shield_level_5");

        let balances = envelope["data"]["VirtualCurrency"].as_object().unwrap();
        assert_eq!(balances.get("GC").unwrap(), 0);
        assert!(balances.get("RM").is_none());
    }

    // -- Catalog --------------------------------------------------------------

    #[tokio::test]
    async fn catalog_items_returned_with_prices() {
        let (router, ticket) = test_router();
        let (status, envelope) = post(
            &router,
            "/GetCatalogItems",
            Some(&ticket),
            json!({ "CatalogVersion": "main" }),
            &[],
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let items = envelope["data"]["Catalog"].as_array().unwrap();
        assert_eq!(items.len(), 2);
        // Ordered by item id: potion before shield_level_5.
        assert_eq!(items[0]["ItemId"], "potion");
        assert_eq!(items[1]["VirtualCurrencyPrices"]["GC"], 25);
        assert_eq!(items[1]["VirtualCurrencyPrices"]["RM"], 199);
    }

    #[tokio::test]
    async fn unknown_catalog_version_is_invalid_params() {
        let (router, ticket) = test_router();
        let (_, envelope) = post(
            &router,
            "/GetCatalogItems",
            Some(&ticket),
            json!({ "CatalogVersion": "ghost" }),
            &[],
        )
        .await;
        assert_eq!(envelope["errorCode"], 1000);
    }

    // -- Receipts -------------------------------------------------------------

    #[tokio::test]
    async fn google_receipt_validates_then_replays() {
        let (router, ticket) = test_router();
        let receipt_json =
            r#"{"orderId": "gp-100", "productId": "shield_level_5", "purchaseState": 0}"#;
        let signature = BASE64.encode(
            DigestVerifier::new(GOOGLE_KEY.to_vec()).sign(receipt_json.as_bytes()),
        );
        let body = json!({ "ReceiptJson": receipt_json, "Signature": signature });

        let (status, envelope) = post(
            &router,
            "/ValidateGooglePlayPurchase",
            Some(&ticket),
            body.clone(),
            &[],
        )
        .await;
        assert_eq!(status, StatusCode::OK, "validate failed: {envelope}");
        assert_eq!(envelope["data"], json!({}));

        let (status, envelope) = post(
            &router,
            "/ValidateGooglePlayPurchase",
            Some(&ticket),
            body,
            &[],
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(envelope["errorCode"], 1022);
    }

    #[tokio::test]
    async fn forged_google_signature_is_invalid_receipt() {
        let (router, ticket) = test_router();
        let receipt_json = r#"{"orderId": "gp-200", "productId": "shield_level_5"}"#;
        let (_, envelope) = post(
            &router,
            "/ValidateGooglePlayPurchase",
            Some(&ticket),
            json!({ "ReceiptJson": receipt_json, "Signature": BASE64.encode(b"forged") }),
            &[],
        )
        .await;
        assert_eq!(envelope["errorCode"], 1021);
    }

    // -- Consume --------------------------------------------------------------

    #[tokio::test]
    async fn consume_item_decrements_uses() {
        let (router, ticket) = test_router();
        credit(&router, &ticket, 5).await;
        post(
            &router,
            "/PurchaseItem",
            Some(&ticket),
            json!({ "ItemId": "potion", "VirtualCurrency": "GC", "Price": 5 }),
            &[],
        )
        .await;

        let (status, envelope) = post(
            &router,
            "/ConsumeItem",
            Some(&ticket),
            json!({ "ItemId": "potion", "ConsumeCount": 1 }),
            &[],
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(envelope["data"]["RemainingUses"], 2);
    }

    #[tokio::test]
    async fn consume_requires_a_selector() {
        let (router, ticket) = test_router();
        let (_, envelope) = post(
            &router,
            "/ConsumeItem",
            Some(&ticket),
            json!({ "ConsumeCount": 1 }),
            &[],
        )
        .await;
        assert_eq!(envelope["errorCode"], 1000);
    }
}
