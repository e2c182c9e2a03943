//! # CLI Interface
//!
//! Command-line argument structure for `arcadia-server` using `clap`
//! derive. Three subcommands: `run`, `seed`, and `version`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Arcadia game-backend commerce server.
///
/// Serves the client commerce API (catalog, inventory, currency,
/// purchases, receipt validation) backed by an embedded sled database,
/// and exposes Prometheus metrics on a dedicated port.
#[derive(Parser, Debug)]
#[command(
    name = "arcadia-server",
    about = "Arcadia game-backend commerce server",
    version,
    propagate_version = true
)]
pub struct ArcadiaCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the commerce server.
    Run(RunArgs),
    /// Load currencies, catalogs, items, and accounts from a JSON seed
    /// file into the database.
    Seed(SeedArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Data directory holding the embedded database. Created on first
    /// run if it does not exist.
    #[arg(long, short = 'd', env = "ARCADIA_DATA_DIR", default_value = "./arcadia-data")]
    pub data_dir: PathBuf,

    /// Port for the client commerce API.
    #[arg(long, env = "ARCADIA_PORT", default_value_t = 8310)]
    pub port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "ARCADIA_METRICS_PORT", default_value_t = 8311)]
    pub metrics_port: u16,

    /// Key material for the Google Play receipt verifier.
    ///
    /// Development default; production deployments must inject the
    /// real provider key material.
    #[arg(long, env = "ARCADIA_GOOGLE_KEY", default_value = "dev-google-key")]
    pub google_key: String,

    /// Key material for the Apple receipt verifier.
    #[arg(long, env = "ARCADIA_APPLE_KEY", default_value = "dev-apple-key")]
    pub apple_key: String,

    /// Log output format: "pretty" or "json".
    #[arg(long, env = "ARCADIA_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,
}

/// Arguments for the `seed` subcommand.
#[derive(Parser, Debug)]
pub struct SeedArgs {
    /// Data directory holding the embedded database.
    #[arg(long, short = 'd', env = "ARCADIA_DATA_DIR", default_value = "./arcadia-data")]
    pub data_dir: PathBuf,

    /// Path to the JSON seed file.
    pub file: PathBuf,
}
