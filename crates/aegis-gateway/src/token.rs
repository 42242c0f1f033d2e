//! Token issuance
//!
//! The granters terminate in a call to [`TokenService::create`]. The default
//! [`JwtTokenService`] signs an HS256 access token with the owning domain's
//! secret and persists the token record so the online introspection path has
//! a revocation source of truth.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use tracing::debug;
use uuid::Uuid;

use aegis_protocol::{
    AccessToken, Client, OAuth2Error, OAuth2Result, TokenClaims, TokenRequest, TokenResponse, User,
};

use crate::config::GatewayConfig;
use crate::crypto::SigningKeys;
use crate::storage::AccessTokenRepository;

/// Collaborator boundary: converts a fully validated token request into an
/// issued token set.
#[async_trait]
pub trait TokenService: Send + Sync {
    /// Issue tokens for `request` on behalf of `client` (and `user` when the
    /// grant established a resource owner).
    ///
    /// # Errors
    ///
    /// `server_error` on signing or persistence failure.
    async fn create(
        &self,
        request: &TokenRequest,
        client: &Client,
        user: Option<&User>,
    ) -> OAuth2Result<TokenResponse>;
}

/// HS256 JWT-backed [`TokenService`].
///
/// Token validity is the client registration's `token_validity_secs`; a
/// registration of zero defers to the gateway default.
pub struct JwtTokenService {
    keys: Arc<SigningKeys>,
    tokens: Arc<dyn AccessTokenRepository>,
    issuer: String,
    default_validity_secs: i64,
}

impl JwtTokenService {
    const DEFAULT_VALIDITY_SECS: i64 = 7200;

    /// Service signing with `keys` and persisting through `tokens`.
    pub fn new(keys: Arc<SigningKeys>, tokens: Arc<dyn AccessTokenRepository>, issuer: impl Into<String>) -> Self {
        Self {
            keys,
            tokens,
            issuer: issuer.into(),
            default_validity_secs: Self::DEFAULT_VALIDITY_SECS,
        }
    }

    /// Service tuned from the gateway configuration (`issuer`,
    /// `access_token_validity_secs`).
    pub fn from_config(
        keys: Arc<SigningKeys>,
        tokens: Arc<dyn AccessTokenRepository>,
        config: &GatewayConfig,
    ) -> Self {
        Self {
            keys,
            tokens,
            issuer: config.issuer.clone(),
            default_validity_secs: config.access_token_validity_secs,
        }
    }
}

#[async_trait]
impl TokenService for JwtTokenService {
    async fn create(
        &self,
        request: &TokenRequest,
        client: &Client,
        user: Option<&User>,
    ) -> OAuth2Result<TokenResponse> {
        let secret = self.keys.secret(&client.domain).ok_or_else(|| {
            OAuth2Error::server_error(format!("No signing key registered for domain {}", client.domain))
        })?;

        let now = Utc::now();
        let validity_secs = if client.token_validity_secs > 0 {
            client.token_validity_secs
        } else {
            self.default_validity_secs
        };
        let validity = Duration::seconds(validity_secs.max(1));
        let jti = Uuid::new_v4().to_string();
        let scope = if request.scopes.is_empty() {
            None
        } else {
            let mut scopes: Vec<&str> = request.scopes.iter().map(String::as_str).collect();
            scopes.sort_unstable();
            Some(scopes.join(" "))
        };

        let claims = TokenClaims {
            jti: jti.clone(),
            iss: Some(self.issuer.clone()),
            sub: user.map(|u| u.id.clone()).or_else(|| request.subject.clone()),
            aud: client.client_id.clone(),
            domain: client.domain.clone(),
            iat: now.timestamp(),
            exp: (now + validity).timestamp(),
            scope: scope.clone(),
            additional: request.context.clone().into_iter().collect(),
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .map_err(|e| OAuth2Error::server_error(format!("Unable to sign access token: {e}")))?;

        self.tokens
            .create(AccessToken {
                jti: jti.clone(),
                domain: client.domain.clone(),
                client: client.id.clone(),
                subject: claims.sub.clone(),
                created_at: now,
                expire_at: now + validity,
            })
            .await?;

        debug!(
            domain = %client.domain,
            client_id = %client.client_id,
            jti = %jti,
            "Access token issued"
        );

        Ok(TokenResponse::bearer(token, validity.num_seconds(), scope))
    }
}
