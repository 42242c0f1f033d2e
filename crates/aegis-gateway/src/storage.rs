//! Storage collaborator boundaries
//!
//! Abstract repository contracts the engine consumes, plus concurrent
//! in-memory implementations used by tests and lightweight embedders. The
//! only contract with teeth beyond CRUD is authorization-code removal: it is
//! an atomic fetch-and-delete, so two concurrent redemptions of one code
//! yield exactly one success.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;

use aegis_protocol::{
    AccessToken, AuthorizationCode, AuthorizationEngine, BotDetection, Client, Domain,
    ExtensionGrant, OAuth2Result, PushedAuthorizationRequest, User,
};

/// Single-use authorization-code storage.
#[async_trait]
pub trait AuthorizationCodeStore: Send + Sync {
    /// Persist a freshly minted code.
    async fn create(&self, code: AuthorizationCode) -> OAuth2Result<()>;

    /// Atomically fetch-and-delete the code keyed by `(code, client)`.
    ///
    /// Returns `None` when the code is unknown, already consumed, expired,
    /// or belongs to a different client - callers surface all of those as
    /// `invalid_grant` without distinguishing.
    async fn remove(&self, code: &str, client: &Client) -> OAuth2Result<Option<AuthorizationCode>>;

    /// Delete expired codes; returns how many were removed.
    async fn purge_expired(&self) -> OAuth2Result<u64>;
}

/// Pushed-authorization-request storage.
#[async_trait]
pub trait ParRepository: Send + Sync {
    /// Look up a record by its opaque identifier.
    async fn find_by_id(&self, id: &str) -> OAuth2Result<Option<PushedAuthorizationRequest>>;

    /// Persist a record.
    async fn create(&self, par: PushedAuthorizationRequest) -> OAuth2Result<()>;

    /// Delete a record; deleting an absent id is not an error.
    async fn delete(&self, id: &str) -> OAuth2Result<()>;

    /// Delete expired records; returns how many were removed.
    async fn purge_expired(&self) -> OAuth2Result<u64>;
}

/// Persisted access-token records (the online revocation source of truth).
#[async_trait]
pub trait AccessTokenRepository: Send + Sync {
    /// Look up a token record by its `jti`.
    async fn find_by_jti(&self, jti: &str) -> OAuth2Result<Option<AccessToken>>;

    /// Persist a token record.
    async fn create(&self, token: AccessToken) -> OAuth2Result<()>;

    /// Remove a token record (revocation).
    async fn delete_by_jti(&self, jti: &str) -> OAuth2Result<()>;
}

/// Client registrations.
#[async_trait]
pub trait ClientRepository: Send + Sync {
    /// Resolve a client by `(domain, public client_id)`.
    async fn find_by_domain_and_client_id(
        &self,
        domain: &str,
        client_id: &str,
    ) -> OAuth2Result<Option<Client>>;
}

/// Domain definitions, polled by the sync pass.
#[async_trait]
pub trait DomainRepository: Send + Sync {
    /// All domain definitions currently registered.
    async fn find_all(&self) -> OAuth2Result<Vec<Domain>>;
}

/// Resource owners.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Resolve a user by id.
    async fn find_by_id(&self, id: &str) -> OAuth2Result<Option<User>>;
}

/// Tenant extension-grant configurations.
#[async_trait]
pub trait ExtensionGrantRepository: Send + Sync {
    /// All configurations registered for a domain.
    async fn find_by_domain(&self, domain: &str) -> OAuth2Result<Vec<ExtensionGrant>>;

    /// One configuration by plugin id.
    async fn find_by_id(&self, id: &str) -> OAuth2Result<Option<ExtensionGrant>>;
}

/// Tenant bot-detection configurations.
#[async_trait]
pub trait BotDetectionRepository: Send + Sync {
    /// All configurations registered for a domain.
    async fn find_by_domain(&self, domain: &str) -> OAuth2Result<Vec<BotDetection>>;

    /// One configuration by plugin id.
    async fn find_by_id(&self, id: &str) -> OAuth2Result<Option<BotDetection>>;
}

/// Tenant authorization-engine configurations.
#[async_trait]
pub trait AuthorizationEngineRepository: Send + Sync {
    /// All configurations registered for a domain.
    async fn find_by_domain(&self, domain: &str) -> OAuth2Result<Vec<AuthorizationEngine>>;

    /// One configuration by plugin id.
    async fn find_by_id(&self, id: &str) -> OAuth2Result<Option<AuthorizationEngine>>;
}

/// In-memory [`AuthorizationCodeStore`].
///
/// `DashMap::remove_if` gives the atomic fetch-and-delete the contract
/// requires: the shard lock is held across predicate and removal, so a code
/// can only ever be handed out once.
#[derive(Debug, Default)]
pub struct InMemoryAuthorizationCodeStore {
    codes: DashMap<String, AuthorizationCode>,
}

impl InMemoryAuthorizationCodeStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuthorizationCodeStore for InMemoryAuthorizationCodeStore {
    async fn create(&self, code: AuthorizationCode) -> OAuth2Result<()> {
        self.codes.insert(code.code.clone(), code);
        Ok(())
    }

    async fn remove(&self, code: &str, client: &Client) -> OAuth2Result<Option<AuthorizationCode>> {
        let removed = self
            .codes
            .remove_if(code, |_, stored| stored.client_id == client.id)
            .map(|(_, stored)| stored);
        // An expired code is already gone as far as redemption is concerned;
        // removing it here doubles as the sweep.
        Ok(removed.filter(|stored| !stored.is_expired(Utc::now())))
    }

    async fn purge_expired(&self) -> OAuth2Result<u64> {
        let now = Utc::now();
        let before = self.codes.len();
        self.codes.retain(|_, code| !code.is_expired(now));
        Ok((before - self.codes.len()) as u64)
    }
}

/// In-memory [`ParRepository`].
#[derive(Debug, Default)]
pub struct InMemoryParRepository {
    requests: DashMap<String, PushedAuthorizationRequest>,
}

impl InMemoryParRepository {
    /// Empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records (test helper).
    #[must_use]
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    /// Whether the repository is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

#[async_trait]
impl ParRepository for InMemoryParRepository {
    async fn find_by_id(&self, id: &str) -> OAuth2Result<Option<PushedAuthorizationRequest>> {
        Ok(self.requests.get(id).map(|entry| entry.clone()))
    }

    async fn create(&self, par: PushedAuthorizationRequest) -> OAuth2Result<()> {
        self.requests.insert(par.id.clone(), par);
        Ok(())
    }

    async fn delete(&self, id: &str) -> OAuth2Result<()> {
        self.requests.remove(id);
        Ok(())
    }

    async fn purge_expired(&self) -> OAuth2Result<u64> {
        let now = Utc::now();
        let before = self.requests.len();
        self.requests.retain(|_, par| !par.is_expired(now));
        Ok((before - self.requests.len()) as u64)
    }
}

/// In-memory [`AccessTokenRepository`].
#[derive(Debug, Default)]
pub struct InMemoryAccessTokenRepository {
    tokens: DashMap<String, AccessToken>,
}

impl InMemoryAccessTokenRepository {
    /// Empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccessTokenRepository for InMemoryAccessTokenRepository {
    async fn find_by_jti(&self, jti: &str) -> OAuth2Result<Option<AccessToken>> {
        Ok(self.tokens.get(jti).map(|entry| entry.clone()))
    }

    async fn create(&self, token: AccessToken) -> OAuth2Result<()> {
        self.tokens.insert(token.jti.clone(), token);
        Ok(())
    }

    async fn delete_by_jti(&self, jti: &str) -> OAuth2Result<()> {
        self.tokens.remove(jti);
        Ok(())
    }
}

/// In-memory [`ClientRepository`].
#[derive(Debug, Default)]
pub struct InMemoryClientRepository {
    clients: DashMap<(String, String), Client>,
}

impl InMemoryClientRepository {
    /// Empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client under `(domain, client_id)`.
    pub fn save(&self, client: Client) {
        self.clients
            .insert((client.domain.clone(), client.client_id.clone()), client);
    }
}

#[async_trait]
impl ClientRepository for InMemoryClientRepository {
    async fn find_by_domain_and_client_id(
        &self,
        domain: &str,
        client_id: &str,
    ) -> OAuth2Result<Option<Client>> {
        Ok(self
            .clients
            .get(&(domain.to_string(), client_id.to_string()))
            .map(|entry| entry.clone()))
    }
}

/// In-memory [`DomainRepository`].
#[derive(Debug, Default)]
pub struct InMemoryDomainRepository {
    domains: DashMap<String, Domain>,
}

impl InMemoryDomainRepository {
    /// Empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a domain definition.
    pub fn save(&self, domain: Domain) {
        self.domains.insert(domain.id.clone(), domain);
    }

    /// Remove a domain definition.
    pub fn remove(&self, id: &str) {
        self.domains.remove(id);
    }
}

#[async_trait]
impl DomainRepository for InMemoryDomainRepository {
    async fn find_all(&self) -> OAuth2Result<Vec<Domain>> {
        Ok(self.domains.iter().map(|entry| entry.clone()).collect())
    }
}

/// In-memory [`UserRepository`].
#[derive(Debug, Default)]
pub struct InMemoryUserRepository {
    users: DashMap<String, User>,
}

impl InMemoryUserRepository {
    /// Empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user.
    pub fn save(&self, user: User) {
        self.users.insert(user.id.clone(), user);
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_id(&self, id: &str) -> OAuth2Result<Option<User>> {
        Ok(self.users.get(id).map(|entry| entry.clone()))
    }
}

macro_rules! in_memory_plugin_repository {
    ($name:ident, $record:ty, $trait_:ident) => {
        /// In-memory plugin-configuration repository.
        #[derive(Debug, Default)]
        pub struct $name {
            records: DashMap<String, $record>,
        }

        impl $name {
            /// Empty repository.
            #[must_use]
            pub fn new() -> Self {
                Self::default()
            }

            /// Insert or replace a configuration record.
            pub fn save(&self, record: $record) {
                self.records.insert(record.id.clone(), record);
            }

            /// Remove a configuration record.
            pub fn remove(&self, id: &str) {
                self.records.remove(id);
            }
        }

        #[async_trait]
        impl $trait_ for $name {
            async fn find_by_domain(&self, domain: &str) -> OAuth2Result<Vec<$record>> {
                Ok(self
                    .records
                    .iter()
                    .filter(|entry| entry.domain == domain)
                    .map(|entry| entry.clone())
                    .collect())
            }

            async fn find_by_id(&self, id: &str) -> OAuth2Result<Option<$record>> {
                Ok(self.records.get(id).map(|entry| entry.clone()))
            }
        }
    };
}

in_memory_plugin_repository!(InMemoryExtensionGrantRepository, ExtensionGrant, ExtensionGrantRepository);
in_memory_plugin_repository!(InMemoryBotDetectionRepository, BotDetection, BotDetectionRepository);
in_memory_plugin_repository!(
    InMemoryAuthorizationEngineRepository,
    AuthorizationEngine,
    AuthorizationEngineRepository
);
