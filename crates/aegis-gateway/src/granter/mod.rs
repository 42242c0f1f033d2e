//! Token granters
//!
//! The state machine turning a validated `/token` request into an issued
//! token set. [`GranterSupport`] carries the steps every grant shares
//! (grant-type authorization, scope normalization, resource-owner resolution,
//! token issuance); concrete granters add their protocol on top:
//!
//! - [`AuthorizationCodeTokenGranter`] - RFC 6749 §4.1 code redemption with
//!   redirect-URI and PKCE re-checks
//! - [`ExtensionTokenGranter`] - tenant-deployed extension grants (§4.5)
//!
//! [`CompositeTokenGranter`] is the dispatch entry point the HTTP layer calls.

mod authorization_code;
mod extension;

pub use authorization_code::AuthorizationCodeTokenGranter;
pub use extension::ExtensionTokenGranter;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use aegis_protocol::{Client, OAuth2Error, OAuth2Result, TokenRequest, TokenResponse, User};

use crate::plugins::ExtensionGrantManager;
use crate::resolver::TokenRequestResolver;
use crate::storage::UserRepository;
use crate::token::TokenService;

/// A grant-type handler.
#[async_trait]
pub trait TokenGranter: Send + Sync {
    /// Whether this granter answers to the wire-level `grant_type`.
    fn can_handle(&self, grant_type: &str) -> bool;

    /// Run the grant protocol and issue tokens.
    ///
    /// # Errors
    ///
    /// A typed [`OAuth2Error`]; every validation failure is terminal (no
    /// retries - a consumed authorization code would fail again anyway).
    async fn grant(&self, request: TokenRequest, client: &Client) -> OAuth2Result<TokenResponse>;
}

/// Shared grant-flow plumbing.
pub struct GranterSupport {
    resolver: TokenRequestResolver,
    users: Arc<dyn UserRepository>,
    token_service: Arc<dyn TokenService>,
}

impl GranterSupport {
    /// Support over the given collaborators.
    pub fn new(users: Arc<dyn UserRepository>, token_service: Arc<dyn TokenService>) -> Self {
        Self {
            resolver: TokenRequestResolver,
            users,
            token_service,
        }
    }

    /// Validate the request against the client registration and normalize
    /// its scopes.
    pub(crate) fn resolve(
        &self,
        request: TokenRequest,
        client: &Client,
    ) -> OAuth2Result<TokenRequest> {
        self.resolver.resolve(request, client)
    }

    /// Load the pre-authenticated resource owner by subject.
    ///
    /// Any resolution failure is surfaced as an opaque `invalid_grant`; the
    /// underlying cause never reaches the client.
    pub(crate) async fn resolve_resource_owner(&self, subject: &str) -> OAuth2Result<User> {
        match self.users.find_by_id(subject).await {
            Ok(Some(user)) => Ok(user),
            Ok(None) => Err(OAuth2Error::invalid_grant(
                "Unable to resolve the resource owner",
            )),
            Err(e) => {
                debug!(subject = %subject, error = %e, "Resource owner resolution failed");
                Err(OAuth2Error::invalid_grant(
                    "Unable to resolve the resource owner",
                ))
            }
        }
    }

    /// Terminal step: hand the fully validated request to the token service.
    pub(crate) async fn issue(
        &self,
        request: &TokenRequest,
        client: &Client,
        user: Option<&User>,
    ) -> OAuth2Result<TokenResponse> {
        self.token_service.create(request, client, user).await
    }
}

/// Dispatches a `/token` call to the granter owning its grant type.
pub struct CompositeTokenGranter {
    code_granter: Arc<AuthorizationCodeTokenGranter>,
    extension_grants: Option<Arc<ExtensionGrantManager>>,
}

impl CompositeTokenGranter {
    /// Composite over the built-in code granter and, when the domain has
    /// extension grants deployed, their lifecycle manager.
    pub fn new(
        code_granter: Arc<AuthorizationCodeTokenGranter>,
        extension_grants: Option<Arc<ExtensionGrantManager>>,
    ) -> Self {
        Self {
            code_granter,
            extension_grants,
        }
    }
}

#[async_trait]
impl TokenGranter for CompositeTokenGranter {
    fn can_handle(&self, grant_type: &str) -> bool {
        self.code_granter.can_handle(grant_type)
            || self
                .extension_grants
                .as_ref()
                .is_some_and(|manager| manager.granter_for(grant_type).is_some())
    }

    async fn grant(&self, request: TokenRequest, client: &Client) -> OAuth2Result<TokenResponse> {
        if request.grant_type.is_empty() {
            return Err(OAuth2Error::invalid_request("Missing parameter: grant_type"));
        }
        if self.code_granter.can_handle(&request.grant_type) {
            return self.code_granter.grant(request, client).await;
        }
        if let Some(manager) = &self.extension_grants {
            if let Some(granter) = manager.granter_for(&request.grant_type) {
                return granter.grant(request, client).await;
            }
        }
        Err(OAuth2Error::unauthorized_client(format!(
            "Unsupported grant type: {}",
            request.grant_type
        )))
    }
}
