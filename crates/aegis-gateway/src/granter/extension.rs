//! Extension grants (RFC 6749 §4.5)
//!
//! One granter instance wraps one deployed tenant extension-grant provider.
//! A granter answers to its composite grant type `"{grant_type}~{id}"`
//! unconditionally, and to the bare grant type only when it is the oldest
//! deployed grant for the domain - the backward-compatibility rule for
//! legacy clients that never learned the composite discriminator. The
//! oldest-grant cutoff is pushed in by the lifecycle manager, never computed
//! here, so all granters share one source of truth.

use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use aegis_protocol::{Client, ExtensionGrant, OAuth2Result, TokenRequest, TokenResponse};

use super::{GranterSupport, TokenGranter};
use crate::plugins::ExtensionGrantProvider;

/// Granter for one deployed extension grant.
pub struct ExtensionTokenGranter {
    support: GranterSupport,
    grant: ExtensionGrant,
    provider: std::sync::Arc<dyn ExtensionGrantProvider>,
    min_date: RwLock<Option<DateTime<Utc>>>,
}

impl ExtensionTokenGranter {
    /// Granter wrapping `provider` configured by `grant`.
    pub fn new(
        support: GranterSupport,
        grant: ExtensionGrant,
        provider: std::sync::Arc<dyn ExtensionGrantProvider>,
    ) -> Self {
        Self {
            support,
            grant,
            provider,
            min_date: RwLock::new(None),
        }
    }

    /// The configuration record this granter was deployed from.
    #[must_use]
    pub fn grant_config(&self) -> &ExtensionGrant {
        &self.grant
    }

    /// Receive the recomputed oldest-grant cutoff from the manager.
    pub fn set_min_date(&self, min_date: Option<DateTime<Utc>>) {
        *self.min_date.write().expect("min_date lock poisoned") = min_date;
    }

    fn is_oldest(&self) -> bool {
        *self.min_date.read().expect("min_date lock poisoned") == Some(self.grant.created_at)
    }
}

#[async_trait]
impl TokenGranter for ExtensionTokenGranter {
    fn can_handle(&self, grant_type: &str) -> bool {
        if grant_type == format!("{}~{}", self.grant.grant_type, self.grant.id) {
            return true;
        }
        grant_type == self.grant.grant_type && self.is_oldest()
    }

    async fn grant(&self, request: TokenRequest, client: &Client) -> OAuth2Result<TokenResponse> {
        // Clients register the base grant type, not the composite form.
        let mut normalized = request;
        normalized.grant_type = self.grant.grant_type.clone();
        let mut request = self.support.resolve(normalized, client)?;

        let user = self.provider.grant(&request).await?;
        debug!(
            domain = %self.grant.domain,
            grant = %self.grant.id,
            client_id = %client.client_id,
            user = user.is_some(),
            "Extension grant validated"
        );

        match user {
            // The grant is allowed to mint users: the asserted identity is
            // taken as-is without a repository lookup.
            Some(user) if self.grant.create_user => {
                request.subject = Some(user.id.clone());
                self.support.issue(&request, client, Some(&user)).await
            }
            // Otherwise the asserted subject must map to a known user.
            Some(user) => {
                let user = self.support.resolve_resource_owner(&user.id).await?;
                request.subject = Some(user.id.clone());
                self.support.issue(&request, client, Some(&user)).await
            }
            // No asserted resource owner: issue a client-only token.
            None => self.support.issue(&request, client, None).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryUserRepository;
    use crate::token::TokenService;
    use aegis_protocol::{OAuth2Error, TokenResponse, User};
    use std::sync::Arc;

    struct NoopTokens;

    #[async_trait]
    impl TokenService for NoopTokens {
        async fn create(
            &self,
            request: &TokenRequest,
            _client: &Client,
            _user: Option<&User>,
        ) -> OAuth2Result<TokenResponse> {
            let _ = request;
            Ok(TokenResponse::bearer("t".into(), 60, None))
        }
    }

    struct NoopProvider;

    #[async_trait]
    impl ExtensionGrantProvider for NoopProvider {
        async fn grant(&self, _request: &TokenRequest) -> OAuth2Result<Option<User>> {
            Err(OAuth2Error::invalid_grant("Unknown or expired assertion"))
        }
    }

    /// Validates every assertion and asserts the same resource owner.
    struct AssertingProvider;

    #[async_trait]
    impl ExtensionGrantProvider for AssertingProvider {
        async fn grant(&self, _request: &TokenRequest) -> OAuth2Result<Option<User>> {
            Ok(Some(User::new("asserted-1", "bob", "dom-1")))
        }
    }

    fn grant_record(grant_type: &str, id: &str, created_at: DateTime<Utc>) -> ExtensionGrant {
        ExtensionGrant {
            id: id.into(),
            name: id.into(),
            domain: "dom-1".into(),
            grant_type: grant_type.into(),
            plugin_type: "test".into(),
            configuration: "{}".into(),
            create_user: false,
            created_at,
            updated_at: created_at,
        }
    }

    fn granter(grant_type: &str, id: &str, created_at: DateTime<Utc>) -> ExtensionTokenGranter {
        let support = GranterSupport::new(
            Arc::new(InMemoryUserRepository::new()),
            Arc::new(NoopTokens),
        );
        ExtensionTokenGranter::new(
            support,
            grant_record(grant_type, id, created_at),
            Arc::new(NoopProvider),
        )
    }

    fn asserting_granter(
        create_user: bool,
        users: Arc<InMemoryUserRepository>,
    ) -> ExtensionTokenGranter {
        let support = GranterSupport::new(users, Arc::new(NoopTokens));
        let mut grant = grant_record("urn:jwt-bearer", "g1", Utc::now());
        grant.create_user = create_user;
        ExtensionTokenGranter::new(support, grant, Arc::new(AssertingProvider))
    }

    fn jwt_bearer_client() -> Client {
        Client {
            id: "internal-1".into(),
            domain: "dom-1".into(),
            client_id: "app".into(),
            authorized_grant_types: [aegis_protocol::GrantType::from("urn:jwt-bearer")]
                .into_iter()
                .collect(),
            scopes: ["openid".to_string()].into_iter().collect(),
            ..Client::default()
        }
    }

    fn jwt_bearer_request() -> TokenRequest {
        TokenRequest {
            client_id: "app".into(),
            grant_type: "urn:jwt-bearer~g1".into(),
            ..TokenRequest::default()
        }
    }

    #[test]
    fn composite_grant_type_always_handled() {
        let g = granter("urn:jwt-bearer", "g1", Utc::now());
        assert!(g.can_handle("urn:jwt-bearer~g1"));
        assert!(!g.can_handle("urn:jwt-bearer~g2"));
    }

    #[test]
    fn bare_grant_type_only_for_the_oldest_grant() {
        let created = Utc::now();
        let g = granter("urn:jwt-bearer", "g1", created);

        // No cutoff pushed yet: the bare form is not claimed.
        assert!(!g.can_handle("urn:jwt-bearer"));

        g.set_min_date(Some(created));
        assert!(g.can_handle("urn:jwt-bearer"));

        // Another, older grant took over the bare form.
        g.set_min_date(Some(created - chrono::Duration::seconds(5)));
        assert!(!g.can_handle("urn:jwt-bearer"));
    }

    #[tokio::test]
    async fn asserted_subject_must_be_a_known_user_by_default() {
        // create_user is off and the repository has no "asserted-1": the
        // asserted identity is rejected opaquely.
        let g = asserting_granter(false, Arc::new(InMemoryUserRepository::new()));
        let err = g
            .grant(jwt_bearer_request(), &jwt_bearer_client())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid_grant: Unable to resolve the resource owner");
    }

    #[tokio::test]
    async fn asserted_subject_resolves_from_the_repository() {
        let users = Arc::new(InMemoryUserRepository::new());
        users.save(User::new("asserted-1", "bob", "dom-1"));

        let g = asserting_granter(false, users);
        assert!(g
            .grant(jwt_bearer_request(), &jwt_bearer_client())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn create_user_trusts_the_asserted_identity() {
        // create_user is on: no repository lookup, the assertion stands alone.
        let g = asserting_granter(true, Arc::new(InMemoryUserRepository::new()));
        assert!(g
            .grant(jwt_bearer_request(), &jwt_bearer_client())
            .await
            .is_ok());
    }
}
