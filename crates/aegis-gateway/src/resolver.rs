//! Request resolvers
//!
//! Pure validation of incoming `/authorize` and `/token` requests against the
//! client registration: grant-type authorization, scope subsetting/defaulting
//! and redirect-URI matching. No side effects; every failure is a typed
//! [`OAuth2Error`].

use aegis_protocol::{AuthorizationRequest, Client, OAuth2Error, OAuth2Result, TokenRequest};

/// Validates the initial `/authorize` step.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthorizationRequestResolver;

impl AuthorizationRequestResolver {
    /// Validate `request` against `client` and normalize its scopes.
    ///
    /// - the client must be authorized for `authorization_code`;
    /// - an empty scope set defaults to the client's registered scopes, and
    ///   failing that is `invalid_scope`;
    /// - requested scopes must be a subset of the registered scopes;
    /// - a supplied redirect URI must exactly match a registered one
    ///   (absence is not an error at this stage).
    ///
    /// # Errors
    ///
    /// `unauthorized_client`, `invalid_scope` or `invalid_request` as above.
    pub fn resolve(
        &self,
        mut request: AuthorizationRequest,
        client: &Client,
    ) -> OAuth2Result<AuthorizationRequest> {
        if !client.is_authorized_grant("authorization_code") {
            return Err(OAuth2Error::unauthorized_client(
                "Client is not authorized for the authorization_code grant",
            ));
        }

        request.scopes = resolve_scopes(&request.scopes, client)?;

        if let Some(redirect_uri) = &request.redirect_uri {
            if !client.has_redirect_uri(redirect_uri) {
                return Err(OAuth2Error::invalid_request(
                    "The redirect_uri MUST match the registered callback URL for this application",
                ));
            }
        }

        Ok(request)
    }
}

/// Validates and normalizes a `/token` request's scopes and grant parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenRequestResolver;

impl TokenRequestResolver {
    /// Validate `request` against `client` and normalize its scopes.
    ///
    /// # Errors
    ///
    /// `unauthorized_client` when the grant type is not registered for the
    /// client; `invalid_scope` when requested scopes exceed the registration
    /// or no scope can be resolved at all.
    pub fn resolve(&self, mut request: TokenRequest, client: &Client) -> OAuth2Result<TokenRequest> {
        if !client.is_authorized_grant(&request.grant_type) {
            return Err(OAuth2Error::unauthorized_client(format!(
                "Client is not authorized for the {} grant",
                request.grant_type
            )));
        }

        request.scopes = resolve_scopes(&request.scopes, client)?;
        Ok(request)
    }
}

fn resolve_scopes(
    requested: &std::collections::HashSet<String>,
    client: &Client,
) -> OAuth2Result<std::collections::HashSet<String>> {
    if requested.is_empty() {
        if client.scopes.is_empty() {
            return Err(OAuth2Error::invalid_scope("Empty scope (either the client or the user is not allowed the requested scopes)"));
        }
        return Ok(client.scopes.clone());
    }
    if !requested.is_subset(&client.scopes) {
        return Err(OAuth2Error::invalid_scope(format!(
            "Invalid scope(s): {}",
            requested
                .difference(&client.scopes)
                .cloned()
                .collect::<Vec<_>>()
                .join(" ")
        )));
    }
    Ok(requested.clone())
}
