//! Tenant-scoped OAuth client registrations

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// OAuth 2.0 grant type.
///
/// Extension grants (RFC 6749 §4.5) carry their full URN/identifier; a tenant
/// may deploy several extension grants with distinct identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum GrantType {
    /// `authorization_code`
    AuthorizationCode,
    /// `client_credentials`
    ClientCredentials,
    /// `refresh_token`
    RefreshToken,
    /// Any other grant identifier (extension grants).
    Extension(String),
}

impl GrantType {
    /// Wire-level `grant_type` string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::ClientCredentials => "client_credentials",
            Self::RefreshToken => "refresh_token",
            Self::Extension(s) => s,
        }
    }
}

impl From<String> for GrantType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "authorization_code" => Self::AuthorizationCode,
            "client_credentials" => Self::ClientCredentials,
            "refresh_token" => Self::RefreshToken,
            _ => Self::Extension(s),
        }
    }
}

impl From<&str> for GrantType {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl From<GrantType> for String {
    fn from(g: GrantType) -> Self {
        g.as_str().to_string()
    }
}

impl fmt::Display for GrantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tenant-scoped OAuth application registration.
///
/// A grant is rejected whenever its type is absent from
/// [`authorized_grant_types`](Client::authorized_grant_types); scope and
/// redirect-URI checks are likewise driven entirely by this record.
#[derive(Clone, Serialize, Deserialize)]
pub struct Client {
    /// Internal identifier (storage key); distinct from the public client id.
    pub id: String,
    /// Owning security domain (tenant).
    pub domain: String,
    /// Public OAuth `client_id`.
    pub client_id: String,
    /// Client secret, when the client is confidential.
    pub client_secret: Option<String>,
    /// Grant types this client may use.
    pub authorized_grant_types: HashSet<GrantType>,
    /// Scopes this client may request.
    pub scopes: HashSet<String>,
    /// Registered redirect URIs; token-step matching is exact string equality.
    pub redirect_uris: Vec<String>,
    /// Required `alg` for signed request objects (RFC 9101), if registered.
    pub request_object_signing_alg: Option<String>,
    /// Client JWK set used to verify request-object signatures.
    pub jwk_set: Option<serde_json::Value>,
    /// Access-token validity in seconds.
    pub token_validity_secs: i64,
    /// ID-token validity in seconds.
    pub id_token_validity_secs: i64,
}

impl Client {
    /// Whether the client registered the given wire-level grant type.
    #[must_use]
    pub fn is_authorized_grant(&self, grant_type: &str) -> bool {
        self.authorized_grant_types
            .iter()
            .any(|g| g.as_str() == grant_type)
    }

    /// Whether `uri` exactly matches a registered redirect URI.
    #[must_use]
    pub fn has_redirect_uri(&self, uri: &str) -> bool {
        self.redirect_uris.iter().any(|u| u == uri)
    }
}

impl Default for Client {
    fn default() -> Self {
        Self {
            id: String::new(),
            domain: String::new(),
            client_id: String::new(),
            client_secret: None,
            authorized_grant_types: HashSet::new(),
            scopes: HashSet::new(),
            redirect_uris: Vec::new(),
            request_object_signing_alg: None,
            jwk_set: None,
            token_validity_secs: 7200,
            id_token_validity_secs: 14400,
        }
    }
}

// Manual Debug impl to prevent client_secret exposure in logs
impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("id", &self.id)
            .field("domain", &self.domain)
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("authorized_grant_types", &self.authorized_grant_types)
            .field("scopes", &self.scopes)
            .field("redirect_uris", &self.redirect_uris)
            .field("request_object_signing_alg", &self.request_object_signing_alg)
            .finish_non_exhaustive()
    }
}
