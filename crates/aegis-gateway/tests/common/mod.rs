//! Shared fixtures for the integration suites.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;

use aegis_gateway::config::GatewayConfig;
use aegis_gateway::context::InMemoryFlowContextService;
use aegis_gateway::crypto::SigningKeys;
use aegis_gateway::granter::{AuthorizationCodeTokenGranter, GranterSupport};
use aegis_gateway::storage::{
    InMemoryAccessTokenRepository, InMemoryAuthorizationCodeStore, InMemoryClientRepository,
    InMemoryUserRepository,
};
use aegis_gateway::token::JwtTokenService;
use aegis_protocol::{Client, GrantType, User};

pub const DOMAIN: &str = "dom-1";
pub const ISSUER: &str = "https://gateway.example";
pub const SIGNING_SECRET: &str = "integration-signing-secret";

/// A registered confidential client authorized for the code grant.
pub fn client() -> Client {
    Client {
        id: "internal-1".into(),
        domain: DOMAIN.into(),
        client_id: "app".into(),
        client_secret: Some("s3cr3t".into()),
        authorized_grant_types: [GrantType::AuthorizationCode].into_iter().collect(),
        scopes: ["openid", "profile"].iter().map(|s| s.to_string()).collect(),
        redirect_uris: vec!["https://cb".into()],
        ..Client::default()
    }
}

pub fn user() -> User {
    User::new("user-1", "alice", DOMAIN)
}

/// Gateway tunables shared by the suites.
pub fn config() -> GatewayConfig {
    GatewayConfig {
        issuer: ISSUER.into(),
        ..GatewayConfig::default()
    }
}

/// Everything an authorization-code flow touches, wired over in-memory
/// collaborators.
pub struct Fixture {
    pub codes: Arc<InMemoryAuthorizationCodeStore>,
    pub contexts: Arc<InMemoryFlowContextService>,
    pub users: Arc<InMemoryUserRepository>,
    pub clients: Arc<InMemoryClientRepository>,
    pub tokens: Arc<InMemoryAccessTokenRepository>,
    pub keys: Arc<SigningKeys>,
    pub granter: Arc<AuthorizationCodeTokenGranter>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(config())
    }

    pub fn with_exit_on_error(exit_on_error: bool) -> Self {
        Self::with_config(GatewayConfig {
            exit_on_error,
            ..config()
        })
    }

    pub fn with_config(config: GatewayConfig) -> Self {
        let codes = Arc::new(InMemoryAuthorizationCodeStore::new());
        let contexts = Arc::new(InMemoryFlowContextService::new());
        let users = Arc::new(InMemoryUserRepository::new());
        let clients = Arc::new(InMemoryClientRepository::new());
        let tokens = Arc::new(InMemoryAccessTokenRepository::new());

        let keys = Arc::new(SigningKeys::new());
        keys.insert(DOMAIN, SIGNING_SECRET);

        users.save(user());
        clients.save(client());

        let token_service = Arc::new(JwtTokenService::from_config(
            keys.clone(),
            tokens.clone(),
            &config,
        ));
        let granter = Arc::new(AuthorizationCodeTokenGranter::from_config(
            GranterSupport::new(users.clone(), token_service),
            codes.clone(),
            contexts.clone(),
            &config,
        ));

        Self {
            codes,
            contexts,
            users,
            clients,
            tokens,
            keys,
            granter,
        }
    }
}

pub fn scopes(names: &[&str]) -> HashSet<String> {
    names.iter().map(|s| s.to_string()).collect()
}
