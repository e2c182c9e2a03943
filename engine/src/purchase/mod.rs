//! # Purchase State Machine
//!
//! Records purchase attempts and drives them to a terminal state:
//!
//! ```text
//! status.rs — TransactionStatus graph, PaymentProvider
//! record.rs — the durable Purchase row
//! engine.rs — PurchaseEngine: the two purchase flows and unlock
//! ```
//!
//! Replay protection and atomicity both live in the storage layer; this
//! module sequences the checks and owns the status transitions.

pub mod engine;
pub mod record;
pub mod status;

pub use engine::{PurchaseEngine, PurchaseItemRequest};
pub use record::{Purchase, PurchaseError};
pub use status::{PaymentProvider, TransactionStatus};
