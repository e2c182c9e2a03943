//! # Session Resolution
//!
//! Every commerce endpoint requires a resolved account. Clients present
//! their session ticket in the `X-Authorization` header; this module
//! resolves it against the sessions index. Login and ticket issuance
//! live in the auth service — by the time a request reaches this
//! server, the ticket either resolves or the request is rejected.

use axum::http::HeaderMap;

use arcadia_engine::account::Account;
use arcadia_engine::error::ApiError;
use arcadia_engine::store::db::CommerceDb;

/// Header carrying the session ticket.
pub const AUTHORIZATION_HEADER: &str = "x-authorization";

/// Resolves the request's session ticket to an account.
pub fn resolve_session(db: &CommerceDb, headers: &HeaderMap) -> Result<Account, ApiError> {
    let ticket = headers
        .get(AUTHORIZATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::NotAuthenticated("missing session ticket".to_string()))?;

    match db.account_by_ticket(ticket) {
        Ok(Some(account)) => Ok(account),
        Ok(None) => Err(ApiError::NotAuthenticated(
            "session ticket did not resolve".to_string(),
        )),
        Err(err) => Err(ApiError::Unknown(err.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn missing_header_rejected() {
        let db = CommerceDb::open_temporary().unwrap();
        let headers = HeaderMap::new();
        assert!(matches!(
            resolve_session(&db, &headers),
            Err(ApiError::NotAuthenticated(_))
        ));
    }

    #[test]
    fn valid_ticket_resolves() {
        let db = CommerceDb::open_temporary().unwrap();
        let account = Account::new("p1", "Test");
        db.put_account(&account).unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION_HEADER,
            HeaderValue::from_str(&account.session_ticket).unwrap(),
        );
        let resolved = resolve_session(&db, &headers).unwrap();
        assert_eq!(resolved.id, account.id);
    }

    #[test]
    fn unknown_ticket_rejected() {
        let db = CommerceDb::open_temporary().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION_HEADER, HeaderValue::from_static("bogus"));
        assert!(matches!(
            resolve_session(&db, &headers),
            Err(ApiError::NotAuthenticated(_))
        ));
    }
}
