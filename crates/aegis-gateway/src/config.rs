//! Gateway configuration
//!
//! Plain serde-deserializable settings with sensible defaults. The embedding
//! process owns where these come from (file, environment, management plane);
//! the engine only reads them.

use serde::{Deserialize, Serialize};

/// Tunables for the protocol engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Issuer identifier stamped into minted tokens and used as the audience
    /// of synthesized pushed-authorization request objects.
    pub issuer: String,

    /// Authorization-code lifetime in seconds.
    pub code_validity_secs: i64,

    /// Pushed-authorization-request lifetime in milliseconds (RFC 9126
    /// recommends short lifetimes; 60 seconds by default).
    pub par_validity_ms: i64,

    /// Introspection freshness window in seconds: a verified token whose
    /// issued-at is within this window skips the revocation lookup entirely.
    /// The revocation-latency exposure is bounded by this value; set to 0 to
    /// always consult the token store.
    pub introspection_freshness_secs: i64,

    /// Whether a failure to restore the authentication-flow context aborts
    /// authorization-code redemption (`true`) or substitutes an empty
    /// context (`false`).
    pub exit_on_error: bool,

    /// Sharding tags for this gateway instance. `!`-prefixed entries are
    /// exclusions. `None` (or empty) matches every domain.
    pub sharding_tags: Option<Vec<String>>,

    /// Default access-token validity in seconds when the client registration
    /// does not override it.
    pub access_token_validity_secs: i64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            issuer: "https://gateway.local".to_string(),
            code_validity_secs: 600,
            par_validity_ms: 60_000,
            introspection_freshness_secs: 10,
            exit_on_error: false,
            sharding_tags: None,
            access_token_validity_secs: 7200,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_applied_on_partial_input() {
        let config: GatewayConfig =
            serde_json::from_str(r#"{"issuer":"https://am.example.com"}"#).unwrap();
        assert_eq!(config.issuer, "https://am.example.com");
        assert_eq!(config.par_validity_ms, 60_000);
        assert_eq!(config.introspection_freshness_secs, 10);
        assert!(!config.exit_on_error);
    }
}
