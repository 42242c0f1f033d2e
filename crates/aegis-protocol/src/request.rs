//! Ephemeral request value objects
//!
//! [`AuthorizationRequest`] and [`TokenRequest`] are created per HTTP request
//! and never persisted as-is; the [`AuthorizationCode`](crate::code) record is
//! the persisted projection that survives between the `/authorize` and
//! `/token` steps.
//!
//! [`Parameters`] is the ordered multi-map both carry: duplicate keys are
//! allowed (OAuth query strings permit repeats) and lookups are first-wins.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Ordered multi-map of request parameters.
///
/// Insertion order is preserved, duplicate keys are allowed, and [`get`]
/// returns the first value registered for a key.
///
/// # Example
///
/// ```rust
/// use aegis_protocol::Parameters;
///
/// let mut params = Parameters::new();
/// params.put("scope", "openid");
/// params.put("scope", "profile");
/// assert_eq!(params.get("scope"), Some("openid"));
/// assert_eq!(params.get_all("scope"), vec!["openid", "profile"]);
/// ```
///
/// [`get`]: Parameters::get
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameters(Vec<(String, String)>);

impl Parameters {
    /// Create an empty parameter map.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// First value registered for `key`, if any.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// All values registered for `key`, in insertion order.
    #[must_use]
    pub fn get_all(&self, key: &str) -> Vec<&str> {
        self.0
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Whether any value is registered for `key`.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.iter().any(|(k, _)| k == key)
    }

    /// Append a value for `key` (duplicates allowed).
    pub fn put(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.push((key.into(), value.into()));
    }

    /// Register `value` only if no value exists for `key` yet.
    ///
    /// This is the carry-over semantic of the authorization-code flow: the
    /// current token request's explicit parameters take precedence over the
    /// parameters restored from the stored authorization request.
    pub fn put_if_absent(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        if !self.contains_key(&key) {
            self.0.push((key, value.into()));
        }
    }

    /// Merge `other` into `self` with put-if-absent semantics, preserving
    /// `other`'s ordering for the keys that are actually absorbed.
    pub fn merge_absent(&mut self, other: &Parameters) {
        for (k, v) in &other.0 {
            self.put_if_absent(k.clone(), v.clone());
        }
    }

    /// Iterate over all entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of entries (counting duplicates).
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the map holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Parameters {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Validated view of an `/authorize` call, produced by the authorization
/// request resolver before an authorization code is minted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthorizationRequest {
    /// Public client identifier (`client_id` parameter).
    pub client_id: String,
    /// Requested scopes; order-irrelevant.
    pub scopes: HashSet<String>,
    /// Redirect URI supplied by the client, if any.
    pub redirect_uri: Option<String>,
    /// Full parameter snapshot of the call, including `code_challenge` and
    /// `code_challenge_method` when PKCE is in play.
    pub parameters: Parameters,
}

impl AuthorizationRequest {
    /// Convenience accessor into the raw parameter snapshot.
    #[must_use]
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters.get(key)
    }
}

/// A `/token` endpoint call, prior to grant-specific processing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenRequest {
    /// Public client identifier.
    pub client_id: String,
    /// Wire-level `grant_type` value.
    pub grant_type: String,
    /// Requested scopes; empty means "default to the client registration".
    pub scopes: HashSet<String>,
    /// Subject established by the grant (set during granting, not by the caller).
    pub subject: Option<String>,
    /// Raw request parameters (`code`, `code_verifier`, `redirect_uri`, ...).
    pub parameters: Parameters,
    /// Data restored from the authentication-flow context, keyed for
    /// downstream claim templating. Populated during granting.
    #[serde(default, skip_serializing_if = "std::collections::HashMap::is_empty")]
    pub context: std::collections::HashMap<String, serde_json::Value>,
}

impl TokenRequest {
    /// Convenience accessor into the raw parameters (first-wins).
    #[must_use]
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_wins_lookup() {
        let mut p = Parameters::new();
        p.put("a", "1");
        p.put("a", "2");
        p.put("b", "3");
        assert_eq!(p.get("a"), Some("1"));
        assert_eq!(p.get_all("a"), vec!["1", "2"]);
        assert_eq!(p.get("b"), Some("3"));
        assert_eq!(p.get("c"), None);
    }

    #[test]
    fn put_if_absent_keeps_existing() {
        let mut p = Parameters::new();
        p.put("redirect_uri", "https://cb");
        p.put_if_absent("redirect_uri", "https://other");
        p.put_if_absent("state", "xyz");
        assert_eq!(p.get("redirect_uri"), Some("https://cb"));
        assert_eq!(p.get("state"), Some("xyz"));
        assert_eq!(p.len(), 2);
    }

    #[test]
    fn merge_absent_prefers_current_request() {
        let mut current: Parameters = [("code", "c1"), ("redirect_uri", "https://cb")]
            .into_iter()
            .collect();
        let stored: Parameters = [("redirect_uri", "https://orig"), ("nonce", "n1")]
            .into_iter()
            .collect();
        current.merge_absent(&stored);
        assert_eq!(current.get("redirect_uri"), Some("https://cb"));
        assert_eq!(current.get("nonce"), Some("n1"));
    }

    #[test]
    fn insertion_order_preserved() {
        let p: Parameters = [("z", "1"), ("a", "2"), ("m", "3")].into_iter().collect();
        let keys: Vec<&str> = p.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }
}
