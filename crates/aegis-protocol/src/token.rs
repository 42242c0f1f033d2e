//! Token representations
//!
//! [`TokenClaims`] is the in-memory decoded/verified JWT view; it is never
//! persisted directly. [`AccessToken`] is the persisted record the online
//! introspection path consults for revocation. [`TokenResponse`] is the
//! in-memory shape handed back to the (out-of-scope) HTTP layer after a
//! successful grant.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Decoded JWT claim set used by the gateway.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Token identifier; the storage key for the persisted record.
    pub jti: String,
    /// Issuer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    /// Subject (resource owner), absent for client-only tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    /// Audience: the public client id the token was issued to.
    pub aud: String,
    /// Owning security domain.
    pub domain: String,
    /// Issued-at, seconds since epoch.
    pub iat: i64,
    /// Expiry, seconds since epoch.
    pub exp: i64,
    /// Space-separated granted scopes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Any additional claims.
    #[serde(flatten)]
    pub additional: HashMap<String, serde_json::Value>,
}

impl TokenClaims {
    /// Issued-at as a UTC instant. `None` when `iat` is out of range.
    #[must_use]
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp(self.iat, 0)
    }

    /// Expiry as a UTC instant. `None` when `exp` is out of range.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp(self.exp, 0)
    }
}

/// Persisted access-token record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessToken {
    /// JWT id; lookup key for introspection's revocation check.
    pub jti: String,
    /// Owning security domain.
    pub domain: String,
    /// Internal client id the token belongs to.
    pub client: String,
    /// Resource-owner identifier, absent for client-only tokens.
    pub subject: Option<String>,
    /// When the token was issued.
    pub created_at: DateTime<Utc>,
    /// Store-side expiry; a record expired here is treated as revoked.
    pub expire_at: DateTime<Utc>,
}

/// In-memory token set produced by a successful grant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    /// Serialized access token.
    pub access_token: String,
    /// Always `Bearer` for tokens minted here.
    pub token_type: String,
    /// Lifetime in seconds.
    pub expires_in: i64,
    /// Space-separated granted scopes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Additional response members (e.g. `id_token`).
    #[serde(flatten)]
    pub additional: HashMap<String, serde_json::Value>,
}

impl TokenResponse {
    /// Bearer response with no extra members.
    #[must_use]
    pub fn bearer(access_token: String, expires_in: i64, scope: Option<String>) -> Self {
        Self {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in,
            scope,
            additional: HashMap::new(),
        }
    }
}
