//! Authorization-code minting
//!
//! Bridges a resolved `/authorize` request to the persisted single-use
//! [`AuthorizationCode`] projection redeemed later at `/token`.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::debug;
use uuid::Uuid;

use aegis_protocol::{AuthorizationCode, AuthorizationRequest, Client, OAuth2Result};

use crate::config::GatewayConfig;
use crate::storage::AuthorizationCodeStore;

/// Mints authorization codes for successfully resolved authorization requests.
pub struct AuthorizationCodeService {
    store: Arc<dyn AuthorizationCodeStore>,
    validity: Duration,
}

impl AuthorizationCodeService {
    /// Service persisting through `store` with the given code lifetime.
    pub fn new(store: Arc<dyn AuthorizationCodeStore>, validity_secs: i64) -> Self {
        Self {
            store,
            validity: Duration::seconds(validity_secs.max(1)),
        }
    }

    /// Service with the code lifetime taken from the gateway configuration
    /// (`code_validity_secs`).
    pub fn from_config(store: Arc<dyn AuthorizationCodeStore>, config: &GatewayConfig) -> Self {
        Self::new(store, config.code_validity_secs)
    }

    /// Mint and persist a code for `request`, snapshotting the full parameter
    /// multi-map so redemption can re-check `redirect_uri` and PKCE.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub async fn create(
        &self,
        request: &AuthorizationRequest,
        client: &Client,
        subject: &str,
        transaction_id: &str,
        context_version: i32,
    ) -> OAuth2Result<AuthorizationCode> {
        let now = Utc::now();
        let code = AuthorizationCode {
            code: Uuid::new_v4().to_string(),
            client_id: client.id.clone(),
            subject: subject.to_string(),
            scopes: request.scopes.clone(),
            request_parameters: request.parameters.clone(),
            transaction_id: transaction_id.to_string(),
            context_version,
            created_at: now,
            expire_at: now + self.validity,
        };
        self.store.create(code.clone()).await?;
        debug!(
            domain = %client.domain,
            client_id = %client.client_id,
            transaction_id = %transaction_id,
            "Authorization code created"
        );
        Ok(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryAuthorizationCodeStore;

    #[tokio::test]
    async fn code_lifetime_comes_from_the_configuration() {
        let config = GatewayConfig {
            code_validity_secs: 120,
            ..GatewayConfig::default()
        };
        let service = AuthorizationCodeService::from_config(
            Arc::new(InMemoryAuthorizationCodeStore::new()),
            &config,
        );
        let client = Client {
            id: "internal-1".into(),
            ..Client::default()
        };

        let code = service
            .create(&AuthorizationRequest::default(), &client, "user-1", "tx", 0)
            .await
            .unwrap();
        assert_eq!((code.expire_at - code.created_at).num_seconds(), 120);
    }
}
