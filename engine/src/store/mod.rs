//! # Persistence
//!
//! sled-backed storage for every durable entity. See [`db`] for the
//! tree layout and the concurrency contract (compare-and-swap balances,
//! insert-if-absent replay index, multi-tree purchase transactions).

pub mod db;

pub use db::{CommerceDb, CommitError, PurchaseCommit, StoreError};
