//! Authorization-code grant (RFC 6749 §4.1.3)
//!
//! Redemption protocol, in order: extract the code, atomically consume it,
//! restore the authentication-flow context, re-check `redirect_uri` against
//! the original authorization request, verify PKCE, carry the stored request
//! forward, resolve the resource owner, issue. Every failure is terminal -
//! the single-use code is already consumed, so a retry would fail again.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use aegis_protocol::{
    AuthorizationCode, Client, OAuth2Error, OAuth2Result, TokenRequest, TokenResponse,
};

use super::{GranterSupport, TokenGranter};
use crate::config::GatewayConfig;
use crate::context::{AuthenticationFlowContext, FlowContextService};
use crate::pkce;
use crate::storage::AuthorizationCodeStore;

/// Wire-level grant type handled here.
pub const GRANT_TYPE: &str = "authorization_code";

/// The authorization-code granter.
pub struct AuthorizationCodeTokenGranter {
    support: GranterSupport,
    codes: Arc<dyn AuthorizationCodeStore>,
    contexts: Arc<dyn FlowContextService>,
    exit_on_error: bool,
}

impl AuthorizationCodeTokenGranter {
    /// Granter over the given collaborators. `exit_on_error` decides whether
    /// a context-restore failure aborts redemption or degrades to an empty
    /// context.
    pub fn new(
        support: GranterSupport,
        codes: Arc<dyn AuthorizationCodeStore>,
        contexts: Arc<dyn FlowContextService>,
        exit_on_error: bool,
    ) -> Self {
        Self {
            support,
            codes,
            contexts,
            exit_on_error,
        }
    }

    /// Granter with the restore policy taken from the gateway configuration
    /// (`exit_on_error`).
    pub fn from_config(
        support: GranterSupport,
        codes: Arc<dyn AuthorizationCodeStore>,
        contexts: Arc<dyn FlowContextService>,
        config: &GatewayConfig,
    ) -> Self {
        Self::new(support, codes, contexts, config.exit_on_error)
    }

    /// If the original authorization request recorded a `redirect_uri`, the
    /// token request must repeat it verbatim (RFC 6749 §4.1.3); if it did
    /// not, no check is performed.
    fn check_redirect_uri(code: &AuthorizationCode, request: &TokenRequest) -> OAuth2Result<()> {
        let Some(original) = code.request_parameters.get("redirect_uri") else {
            return Ok(());
        };
        match request.parameter("redirect_uri") {
            Some(supplied) if supplied == original => Ok(()),
            _ => Err(OAuth2Error::invalid_grant("Redirect URI mismatch.")),
        }
    }

    /// PKCE re-verification against the stored challenge, when one exists.
    fn check_pkce(code: &AuthorizationCode, request: &TokenRequest) -> OAuth2Result<()> {
        let Some(challenge) = code.request_parameters.get("code_challenge") else {
            return Ok(());
        };
        let verifier = request
            .parameter("code_verifier")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| OAuth2Error::invalid_grant("Missing parameter: code_verifier"))?;
        if !pkce::valid_code_verifier(verifier) {
            return Err(OAuth2Error::invalid_grant("Invalid parameter: code_verifier"));
        }

        let computed = match code
            .request_parameters
            .get("code_challenge_method")
            .unwrap_or("plain")
        {
            "plain" => verifier.to_string(),
            "S256" => pkce::s256_challenge(verifier),
            _ => return Err(OAuth2Error::invalid_grant("Not supported algorithm")),
        };
        if !pkce::challenge_matches(&computed, challenge) {
            return Err(OAuth2Error::invalid_grant("Invalid code_verifier"));
        }
        Ok(())
    }
}

#[async_trait]
impl TokenGranter for AuthorizationCodeTokenGranter {
    fn can_handle(&self, grant_type: &str) -> bool {
        grant_type == GRANT_TYPE
    }

    async fn grant(&self, request: TokenRequest, client: &Client) -> OAuth2Result<TokenResponse> {
        let mut request = self.support.resolve(request, client)?;

        let code_value = request
            .parameter("code")
            .filter(|c| !c.is_empty())
            .ok_or_else(|| OAuth2Error::invalid_request("Missing parameter: code"))?
            .to_string();

        let code = self
            .codes
            .remove(&code_value, client)
            .await?
            .ok_or_else(|| {
                OAuth2Error::invalid_grant(format!("The authorization code {code_value} is invalid"))
            })?;

        let context = match self
            .contexts
            .restore(&code.transaction_id, code.context_version)
            .await
        {
            Ok(context) => context,
            Err(e) if self.exit_on_error => return Err(e),
            Err(e) => {
                warn!(
                    transaction_id = %code.transaction_id,
                    error = %e,
                    "Unable to restore the authentication flow context, continuing with an empty one"
                );
                AuthenticationFlowContext::default()
            }
        };

        Self::check_redirect_uri(&code, &request)?;
        Self::check_pkce(&code, &request)?;

        // Carry the stored authorization forward. The current request's
        // explicit parameters take precedence over the restored snapshot.
        request.subject = Some(code.subject.clone());
        request.scopes = code.scopes.clone();
        request.parameters.merge_absent(&code.request_parameters);
        request.context = context.data;

        let user = self.support.resolve_resource_owner(&code.subject).await?;
        self.support.issue(&request, client, Some(&user)).await
    }
}
