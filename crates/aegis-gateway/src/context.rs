//! Authentication-flow context
//!
//! The flow context carries data collected across the interactive
//! authentication steps (MFA state, consent, enrichment data). It is restored
//! by `(transaction_id, version)` during authorization-code redemption so its
//! data map can feed downstream claim templating.

use std::collections::HashMap;

use async_trait::async_trait;
use dashmap::DashMap;

use aegis_protocol::{OAuth2Error, OAuth2Result};

/// Snapshot of an authentication flow.
#[derive(Debug, Clone, Default)]
pub struct AuthenticationFlowContext {
    /// Transaction the context belongs to.
    pub transaction_id: String,
    /// Version captured when the authorization code was minted.
    pub version: i32,
    /// Arbitrary data collected during the flow.
    pub data: HashMap<String, serde_json::Value>,
}

/// Collaborator boundary: flow-context persistence.
#[async_trait]
pub trait FlowContextService: Send + Sync {
    /// Restore the context stored for `(transaction_id, version)`.
    ///
    /// # Errors
    ///
    /// Any failure to locate or load the context. Whether the caller treats
    /// that as fatal is a configured resilience policy, not this trait's
    /// concern.
    async fn restore(
        &self,
        transaction_id: &str,
        version: i32,
    ) -> OAuth2Result<AuthenticationFlowContext>;
}

/// In-memory flow-context store for embedding and tests.
#[derive(Debug, Default)]
pub struct InMemoryFlowContextService {
    contexts: DashMap<(String, i32), AuthenticationFlowContext>,
}

impl InMemoryFlowContextService {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a context snapshot.
    pub fn save(&self, context: AuthenticationFlowContext) {
        self.contexts
            .insert((context.transaction_id.clone(), context.version), context);
    }
}

#[async_trait]
impl FlowContextService for InMemoryFlowContextService {
    async fn restore(
        &self,
        transaction_id: &str,
        version: i32,
    ) -> OAuth2Result<AuthenticationFlowContext> {
        self.contexts
            .get(&(transaction_id.to_string(), version))
            .map(|entry| entry.clone())
            .ok_or_else(|| {
                OAuth2Error::server_error(format!(
                    "No authentication flow context found for transaction {transaction_id} (version {version})"
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn restore_is_versioned() {
        let store = InMemoryFlowContextService::new();
        store.save(AuthenticationFlowContext {
            transaction_id: "tx-1".into(),
            version: 2,
            data: [("mfa".to_string(), serde_json::json!(true))].into(),
        });

        let restored = store.restore("tx-1", 2).await.unwrap();
        assert_eq!(restored.data["mfa"], serde_json::json!(true));
        assert!(store.restore("tx-1", 1).await.is_err());
        assert!(store.restore("tx-2", 2).await.is_err());
    }
}
