//! Persisted authorization-code records
//!
//! An [`AuthorizationCode`] is the single-use projection of a successful
//! `/authorize` call. It is created when the code is minted, consumed by an
//! atomic fetch-and-delete at `/token` redemption, and otherwise destroyed by
//! the expiry sweep. A code re-presented after removal fails as
//! `invalid_grant` - that atomicity is the anti-replay linchpin of the whole
//! authorization-code flow.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::request::Parameters;

/// Single-use, short-lived authorization code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationCode {
    /// Opaque code value handed to the client in the redirect.
    pub code: String,
    /// Internal id of the client the code was minted for.
    pub client_id: String,
    /// Resource-owner identifier (the authenticated end user).
    pub subject: String,
    /// Scopes approved at authorization time.
    pub scopes: HashSet<String>,
    /// Full multi-map snapshot of the original `/authorize` parameters,
    /// including `redirect_uri`, `code_challenge` and `code_challenge_method`.
    pub request_parameters: Parameters,
    /// Authentication-flow transaction the code belongs to.
    pub transaction_id: String,
    /// Version of the flow context captured at authorization time.
    pub context_version: i32,
    /// When the code was minted.
    pub created_at: DateTime<Utc>,
    /// Hard expiry; redemption after this instant fails.
    pub expire_at: DateTime<Utc>,
}

impl AuthorizationCode {
    /// Whether the code is past its expiry at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expire_at <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn expiry_is_inclusive_at_the_boundary() {
        let now = Utc::now();
        let code = AuthorizationCode {
            code: "abc".into(),
            client_id: "c1".into(),
            subject: "user-1".into(),
            scopes: HashSet::new(),
            request_parameters: Parameters::new(),
            transaction_id: "tx".into(),
            context_version: 0,
            created_at: now,
            expire_at: now,
        };
        assert!(code.is_expired(now));
        assert!(!code.is_expired(now - Duration::seconds(1)));
    }
}
