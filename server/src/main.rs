// Copyright (c) 2026 Arcadia Works. MIT License.
// See LICENSE for details.

//! # Arcadia Commerce Server
//!
//! Entry point for the `arcadia-server` binary. Parses CLI arguments,
//! initializes logging and metrics, opens the embedded database, and
//! serves the client commerce API plus a Prometheus metrics listener.
//!
//! Subcommands:
//!
//! - `run`     — start the server
//! - `seed`    — load currencies/catalogs/items/accounts from JSON
//! - `version` — print build version information

mod api;
mod cli;
mod logging;
mod metrics;
mod session;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use std::sync::Arc;
use tokio::signal;

use arcadia_engine::account::Account;
use arcadia_engine::catalog::item::{Catalog, CatalogItem};
use arcadia_engine::catalog::store::CatalogStore;
use arcadia_engine::ledger::currency::CurrencyType;
use arcadia_engine::purchase::PurchaseEngine;
use arcadia_engine::receipt::{DigestVerifier, ReceiptGateway};
use arcadia_engine::store::db::CommerceDb;

use api::AppState;
use cli::{ArcadiaCli, Commands, RunArgs, SeedArgs};
use logging::LogFormat;
use metrics::CommerceMetrics;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = ArcadiaCli::parse();

    match cli.command {
        Commands::Run(args) => run_server(args).await,
        Commands::Seed(args) => seed_database(args),
        Commands::Version => {
            println!("arcadia-server {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Starts the commerce API and the metrics listener.
async fn run_server(args: RunArgs) -> Result<()> {
    logging::init_logging(
        "arcadia_server=info,arcadia_engine=info,tower_http=warn",
        LogFormat::from_str_lossy(&args.log_format),
    );

    tracing::info!(
        port = args.port,
        metrics_port = args.metrics_port,
        data_dir = %args.data_dir.display(),
        "starting arcadia-server"
    );

    let db_path = args.data_dir.join("db");
    std::fs::create_dir_all(&args.data_dir)
        .with_context(|| format!("failed to create data directory {}", args.data_dir.display()))?;
    let db = CommerceDb::open(&db_path)
        .with_context(|| format!("failed to open database at {}", db_path.display()))?;

    if args.google_key == "dev-google-key" || args.apple_key == "dev-apple-key" {
        tracing::warn!(
            "running with development receipt verifier keys; provider receipts will NOT \
             be verified against real provider signatures"
        );
    }
    let gateway = ReceiptGateway::new(
        Box::new(DigestVerifier::new(args.google_key.into_bytes())),
        Box::new(DigestVerifier::new(args.apple_key.into_bytes())),
    );

    let metrics = Arc::new(CommerceMetrics::new());
    let state = AppState {
        engine: Arc::new(PurchaseEngine::new(db, gateway)),
        metrics: metrics.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    let app = api::create_router(state);
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(metrics);

    let api_listener = tokio::net::TcpListener::bind(("0.0.0.0", args.port))
        .await
        .with_context(|| format!("failed to bind API port {}", args.port))?;
    let metrics_listener = tokio::net::TcpListener::bind(("0.0.0.0", args.metrics_port))
        .await
        .with_context(|| format!("failed to bind metrics port {}", args.metrics_port))?;

    tracing::info!(port = args.port, "commerce API listening");
    tracing::info!(port = args.metrics_port, "metrics listening");

    tokio::select! {
        result = axum::serve(api_listener, app) => {
            result.context("API server exited")?;
        }
        result = axum::serve(metrics_listener, metrics_router) => {
            result.context("metrics server exited")?;
        }
        _ = signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Seeding
// ---------------------------------------------------------------------------

/// JSON seed file: operator reference data plus optional dev accounts.
#[derive(Debug, Deserialize)]
struct SeedFile {
    #[serde(default)]
    currencies: Vec<SeedCurrency>,
    #[serde(default)]
    catalogs: Vec<SeedCatalog>,
    #[serde(default)]
    items: Vec<CatalogItem>,
    #[serde(default)]
    accounts: Vec<SeedAccount>,
}

#[derive(Debug, Deserialize)]
struct SeedCurrency {
    code: String,
    #[serde(default)]
    initial_deposit: u64,
    #[serde(default)]
    description: String,
    #[serde(default = "default_true")]
    remotely_mutable: bool,
    #[serde(default)]
    direct_transaction_limit: u64,
}

#[derive(Debug, Deserialize)]
struct SeedCatalog {
    name: String,
    #[serde(default)]
    is_default: bool,
}

#[derive(Debug, Deserialize)]
struct SeedAccount {
    #[serde(default)]
    display_name: String,
    #[serde(default = "default_origination")]
    origination: String,
    /// Fixed session ticket for development environments; generated
    /// when absent.
    #[serde(default)]
    session_ticket: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_origination() -> String {
    "Seed".to_string()
}

/// Loads a seed file into the database.
fn seed_database(args: SeedArgs) -> Result<()> {
    logging::init_logging("arcadia_server=info", LogFormat::Pretty);

    let db_path = args.data_dir.join("db");
    std::fs::create_dir_all(&args.data_dir)
        .with_context(|| format!("failed to create data directory {}", args.data_dir.display()))?;
    let db = CommerceDb::open(&db_path)
        .with_context(|| format!("failed to open database at {}", db_path.display()))?;

    let text = std::fs::read_to_string(&args.file)
        .with_context(|| format!("failed to read seed file {}", args.file.display()))?;
    let seed: SeedFile = serde_json::from_str(&text)
        .with_context(|| format!("invalid seed file {}", args.file.display()))?;

    apply_seed(&db, seed)?;
    db.flush().context("failed to flush database")?;
    Ok(())
}

fn apply_seed(db: &CommerceDb, seed: SeedFile) -> Result<()> {
    for entry in seed.currencies {
        let currency = CurrencyType {
            code: entry.code,
            initial_deposit: entry.initial_deposit,
            description: entry.description,
            remotely_mutable: entry.remotely_mutable,
            direct_transaction_limit: entry.direct_transaction_limit,
        };
        currency
            .validate()
            .with_context(|| format!("invalid currency {}", currency.code))?;
        db.put_currency(&currency)?;
        tracing::info!(code = %currency.code, "seeded currency");
    }

    let catalog_store = CatalogStore::new(db.clone());
    for entry in seed.catalogs {
        let mut catalog = Catalog::new(&entry.name);
        catalog.is_default = entry.is_default;
        catalog_store
            .create_catalog(&catalog)
            .with_context(|| format!("failed to seed catalog {}", entry.name))?;
        tracing::info!(name = %catalog.name, "seeded catalog");
    }

    for item in seed.items {
        catalog_store
            .insert_item(&item)
            .with_context(|| format!("failed to seed item {} ({})", item.item_id, item.catalog))?;
        tracing::info!(item_id = %item.item_id, catalog = %item.catalog, "seeded item");
    }

    for entry in seed.accounts {
        let mut account = Account::new(&entry.display_name, &entry.origination);
        if let Some(ticket) = entry.session_ticket {
            account.session_ticket = ticket;
        }
        db.put_account(&account)?;
        tracing::info!(
            account_id = %account.id,
            session_ticket = %account.session_ticket,
            "seeded account"
        );
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_file_applies_end_to_end() {
        let db = CommerceDb::open_temporary().unwrap();
        let seed: SeedFile = serde_json::from_str(
            r#"{
                "currencies": [
                    { "code": "GC", "description": "Gold Coins" },
                    { "code": "RM", "remotely_mutable": false }
                ],
                "catalogs": [ { "name": "main", "is_default": true } ],
                "items": [
                    {
                        "item_id": "shield_level_5",
                        "catalog": "main",
                        "prices": [ { "currency": "GC", "price": 25 } ]
                    }
                ],
                "accounts": [
                    { "display_name": "dev", "session_ticket": "dev-ticket" }
                ]
            }"#,
        )
        .unwrap();

        apply_seed(&db, seed).unwrap();

        let gc = db.get_currency("GC").unwrap().unwrap();
        assert!(gc.remotely_mutable);
        let rm = db.get_currency("RM").unwrap().unwrap();
        assert!(!rm.remotely_mutable);

        let item = db.get_item("main", "shield_level_5").unwrap().unwrap();
        assert_eq!(item.price_in("GC"), Some(25));

        let account = db.account_by_ticket("dev-ticket").unwrap().unwrap();
        assert_eq!(account.display_name, "dev");
    }

    #[test]
    fn seed_rejects_invalid_currency_code() {
        let db = CommerceDb::open_temporary().unwrap();
        let seed: SeedFile =
            serde_json::from_str(r#"{ "currencies": [ { "code": "TOOLONG" } ] }"#).unwrap();
        assert!(apply_seed(&db, seed).is_err());
    }

    #[test]
    fn seed_rejects_item_for_missing_catalog() {
        let db = CommerceDb::open_temporary().unwrap();
        let seed: SeedFile = serde_json::from_str(
            r#"{ "items": [ { "item_id": "x", "catalog": "nowhere" } ] }"#,
        )
        .unwrap();
        assert!(apply_seed(&db, seed).is_err());
    }
}
