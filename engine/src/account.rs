//! # Player Accounts
//!
//! The [`Account`] is the root aggregate of the commerce engine: every
//! balance, inventory entry, and purchase hangs off one. Authentication
//! flows (device login, username/password, social linking) live outside
//! this crate — the engine only needs the resolved account and the
//! session ticket the server resolves it from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A player account.
///
/// `id` and `session_ticket` are both UUIDs; the ticket rotates on
/// login (handled by the auth layer), the id never changes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Account {
    /// Stable account identifier.
    pub id: String,

    /// Display name shown to other players. May be empty.
    pub display_name: String,

    /// Current session ticket. Presented by clients in the
    /// `X-Authorization` header and resolved back to this account.
    pub session_ticket: String,

    /// Where the account was first created ("Android", "iOS", ...).
    pub origination: String,

    /// Account creation time.
    pub created: DateTime<Utc>,

    /// Most recent login time.
    pub last_login: DateTime<Utc>,

    /// Deactivated accounts keep their rows but resolve no sessions.
    pub active: bool,
}

impl Account {
    /// Creates a new active account with a fresh id and session ticket.
    pub fn new(display_name: &str, origination: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            display_name: display_name.to_string(),
            session_ticket: Uuid::new_v4().to_string(),
            origination: origination.to_string(),
            created: now,
            last_login: now,
            active: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_account_is_active_with_distinct_ids() {
        let account = Account::new("player one", "Android");
        assert!(account.active);
        assert_ne!(account.id, account.session_ticket);
        assert_eq!(account.origination, "Android");
    }
}
