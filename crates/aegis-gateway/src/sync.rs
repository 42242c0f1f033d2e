//! Domain synchronization
//!
//! Periodically diffs the stored domain set against what this gateway
//! instance currently serves and turns the difference into DEPLOY / UPDATE /
//! UNDEPLOY events on the bus. Sharding tags decide which domains an
//! instance picks up; master domains are never served. Scheduling is owned
//! by the embedder and must not overlap refresh invocations, but request-path
//! reads of the deployed map are safe at any time.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tracing::{debug, info, warn};

use aegis_protocol::{Domain, Event, EventKind, OAuth2Error, OAuth2Result, ReferenceType};

use crate::config::GatewayConfig;
use crate::events::EventBus;
use crate::storage::DomainRepository;

/// Parsed sharding-tag configuration.
///
/// A tag prefixed with `!` excludes rather than includes. A domain is picked
/// up when it carries at least one inclusion tag, or when exclusions are
/// configured and it carries none of them. With no tags configured at all,
/// every domain matches.
#[derive(Debug, Clone, Default)]
pub struct ShardingTags {
    inclusions: Vec<String>,
    exclusions: Vec<String>,
}

impl ShardingTags {
    /// Parse the configured tag list.
    ///
    /// # Errors
    ///
    /// `server_error` when the same tag appears both included and excluded.
    pub fn parse(tags: Option<&[String]>) -> OAuth2Result<Self> {
        let Some(tags) = tags else {
            return Ok(Self::default());
        };
        let mut inclusions = Vec::new();
        let mut exclusions = Vec::new();
        for tag in tags {
            match tag.strip_prefix('!') {
                Some(excluded) => exclusions.push(excluded.to_lowercase()),
                None => inclusions.push(tag.to_lowercase()),
            }
        }
        if let Some(conflict) = inclusions.iter().find(|tag| exclusions.contains(tag)) {
            return Err(OAuth2Error::server_error(format!(
                "Sharding tag {conflict} is both included and excluded"
            )));
        }
        Ok(Self {
            inclusions,
            exclusions,
        })
    }

    /// Tags as configured for this gateway instance (`sharding_tags`).
    ///
    /// # Errors
    ///
    /// Same contract as [`Self::parse`].
    pub fn from_config(config: &GatewayConfig) -> OAuth2Result<Self> {
        Self::parse(config.sharding_tags.as_deref())
    }

    /// Whether this instance serves `domain`.
    #[must_use]
    pub fn matches(&self, domain: &Domain) -> bool {
        if self.inclusions.is_empty() && self.exclusions.is_empty() {
            return true;
        }
        let domain_tags: Vec<String> = domain.tags.iter().map(|t| t.to_lowercase()).collect();
        let included = !self.inclusions.is_empty()
            && domain_tags.iter().any(|tag| self.inclusions.contains(tag));
        let not_excluded = !self.exclusions.is_empty()
            && !domain_tags.iter().any(|tag| self.exclusions.contains(tag));
        included || not_excluded
    }
}

/// Keeps the locally deployed domain set converged with storage.
pub struct SyncManager {
    domains: Arc<dyn DomainRepository>,
    bus: Arc<EventBus>,
    tags: ShardingTags,
    deployed: DashMap<String, Domain>,
}

impl SyncManager {
    /// Manager over the given collaborators.
    pub fn new(domains: Arc<dyn DomainRepository>, bus: Arc<EventBus>, tags: ShardingTags) -> Self {
        Self {
            domains,
            bus,
            tags,
            deployed: DashMap::new(),
        }
    }

    /// The deployed domain, if this instance serves it.
    #[must_use]
    pub fn deployed(&self, domain_id: &str) -> Option<Domain> {
        self.deployed.get(domain_id).map(|entry| entry.clone())
    }

    /// Number of domains currently served.
    #[must_use]
    pub fn deployed_count(&self) -> usize {
        self.deployed.len()
    }

    /// One convergence pass. Invocations must not overlap; the embedder's
    /// scheduler serializes them.
    ///
    /// # Errors
    ///
    /// Domain repository failures; the deployed map is left as it was.
    pub async fn refresh(&self) -> OAuth2Result<()> {
        debug!(at = %Utc::now(), "Synchronizing domains");
        let fetched = self.domains.find_all().await?;

        // Master domains never serve protocol traffic.
        let fetched: Vec<Domain> = fetched.into_iter().filter(|d| !d.master).collect();
        let fetched_ids: std::collections::HashSet<String> =
            fetched.iter().map(|d| d.id.clone()).collect();

        let vanished: Vec<String> = self
            .deployed
            .iter()
            .map(|entry| entry.key().clone())
            .filter(|id| !fetched_ids.contains(id))
            .collect();
        for id in vanished {
            self.undeploy(&id).await;
        }

        for domain in fetched {
            let serving = self.deployed.contains_key(&domain.id);
            if !domain.enabled || !self.tags.matches(&domain) {
                if serving {
                    self.undeploy(&domain.id).await;
                }
                continue;
            }
            if !serving {
                self.deploy(domain).await;
            } else if self
                .deployed
                .get(&domain.id)
                .is_some_and(|current| current.updated_at < domain.updated_at)
            {
                self.update(domain).await;
            }
        }
        Ok(())
    }

    async fn deploy(&self, domain: Domain) {
        info!(domain = %domain.id, name = %domain.name, "Domain deployed");
        let event = Event::new(
            ReferenceType::Domain,
            EventKind::Deploy,
            domain.id.clone(),
            domain.id.clone(),
        )
        .with_payload(serde_json::to_value(&domain).unwrap_or_default());
        self.deployed.insert(domain.id.clone(), domain);
        self.bus.publish(event).await;
    }

    /// Replay the change that advanced the domain: domain-typed events carry
    /// the whole domain object, plugin-typed events carry their own payload.
    async fn update(&self, domain: Domain) {
        info!(domain = %domain.id, name = %domain.name, "Domain updated");
        let event = match &domain.last_event {
            Some(last) if last.reference != ReferenceType::Domain => Event::new(
                last.reference,
                last.kind,
                last.reference_id.clone(),
                domain.id.clone(),
            )
            .with_payload(last.payload.clone()),
            Some(last) => Event::new(
                ReferenceType::Domain,
                last.kind,
                domain.id.clone(),
                domain.id.clone(),
            )
            .with_payload(serde_json::to_value(&domain).unwrap_or_default()),
            None => {
                warn!(domain = %domain.id, "Domain advanced without a recorded event, replaying as an update");
                Event::new(
                    ReferenceType::Domain,
                    EventKind::Update,
                    domain.id.clone(),
                    domain.id.clone(),
                )
                .with_payload(serde_json::to_value(&domain).unwrap_or_default())
            }
        };
        self.deployed.insert(domain.id.clone(), domain);
        self.bus.publish(event).await;
    }

    async fn undeploy(&self, domain_id: &str) {
        if self.deployed.remove(domain_id).is_none() {
            return;
        }
        info!(domain = %domain_id, "Domain undeployed");
        self.bus
            .publish(Event::new(
                ReferenceType::Domain,
                EventKind::Undeploy,
                domain_id,
                domain_id,
            ))
            .await;
        // Plugin managers scoped to the domain stop receiving events.
        self.bus.unsubscribe_domain(domain_id);
    }
}

impl std::fmt::Debug for SyncManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncManager")
            .field("deployed", &self.deployed.len())
            .field("tags", &self.tags)
            .finish()
    }
}
