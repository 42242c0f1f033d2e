//! Pushed authorization request records (RFC 9126)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::request::Parameters;

/// URN prefix of every `request_uri` minted by the gateway.
pub const REQUEST_URI_PREFIX: &str = "urn:ietf:params:oauth:request_uri:";

/// Persisted pushed authorization request.
///
/// Unlike an authorization code, a PAR record is not single-use, but
/// `expire_at` must be re-checked on every read - an expired record is
/// indistinguishable from an absent one to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushedAuthorizationRequest {
    /// Opaque identifier; the wire `request_uri` is
    /// [`REQUEST_URI_PREFIX`] followed by this value.
    pub id: String,
    /// Internal id of the registering client (not the public `client_id`).
    pub client: String,
    /// Pushed parameter snapshot.
    pub parameters: Parameters,
    /// Hard expiry of the record.
    pub expire_at: DateTime<Utc>,
}

impl PushedAuthorizationRequest {
    /// The wire-level `request_uri` for this record.
    #[must_use]
    pub fn request_uri(&self) -> String {
        format!("{REQUEST_URI_PREFIX}{}", self.id)
    }

    /// Whether the record is still readable at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expire_at <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Parameters;

    #[test]
    fn request_uri_carries_urn_prefix() {
        let par = PushedAuthorizationRequest {
            id: "abc-123".into(),
            client: "internal-client".into(),
            parameters: Parameters::new(),
            expire_at: Utc::now(),
        };
        assert_eq!(
            par.request_uri(),
            "urn:ietf:params:oauth:request_uri:abc-123"
        );
    }
}
