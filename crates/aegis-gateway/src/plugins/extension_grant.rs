//! Extension-grant lifecycle manager
//!
//! Deploys one [`ExtensionTokenGranter`] per tenant extension-grant
//! configuration and keeps the oldest-grant cutoff (`min_date`) in sync: the
//! earliest `created_at` among currently deployed grants is pushed into every
//! granter on each add/remove, so legacy clients presenting the bare grant
//! type always resolve to the oldest registered grant.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::{debug, info, warn};

use aegis_protocol::{Event, EventKind, ExtensionGrant, OAuth2Result, ReferenceType};

use super::{
    ExtensionGrantProvider, PluginStatus, ProviderFactory, ReadinessSink, TemplateVariables,
    need_deployment,
};
use crate::events::{EventBus, EventListener};
use crate::granter::{ExtensionTokenGranter, GranterSupport};
use crate::storage::{ExtensionGrantRepository, UserRepository};
use crate::token::TokenService;

struct Deployed {
    granter: Arc<ExtensionTokenGranter>,
    provider: Arc<dyn ExtensionGrantProvider>,
}

/// Per-domain extension-grant manager.
pub struct ExtensionGrantManager {
    domain_id: String,
    repository: Arc<dyn ExtensionGrantRepository>,
    factory: Arc<ProviderFactory>,
    readiness: Arc<dyn ReadinessSink>,
    users: Arc<dyn UserRepository>,
    token_service: Arc<dyn TokenService>,
    granters: DashMap<String, Deployed>,
    min_date: RwLock<Option<DateTime<Utc>>>,
}

impl ExtensionGrantManager {
    /// Manager for `domain_id` over the given collaborators.
    pub fn new(
        domain_id: impl Into<String>,
        repository: Arc<dyn ExtensionGrantRepository>,
        factory: Arc<ProviderFactory>,
        readiness: Arc<dyn ReadinessSink>,
        users: Arc<dyn UserRepository>,
        token_service: Arc<dyn TokenService>,
    ) -> Self {
        Self {
            domain_id: domain_id.into(),
            repository,
            factory,
            readiness,
            users,
            token_service,
            granters: DashMap::new(),
            min_date: RwLock::new(None),
        }
    }

    /// Bulk-load and deploy every configuration registered for the domain.
    /// A single plugin failure is reported and does not abort the others.
    ///
    /// # Errors
    ///
    /// Only repository access failures; deployment failures are contained.
    pub async fn init(&self) -> OAuth2Result<()> {
        let grants = self.repository.find_by_domain(&self.domain_id).await?;
        info!(domain = %self.domain_id, count = grants.len(), "Loading extension grants");
        for grant in grants {
            let id = grant.id.clone();
            if let Err(e) = self.deploy(grant) {
                self.readiness
                    .report(&self.domain_id, &id, PluginStatus::Failed(e.to_string()));
            }
        }
        Ok(())
    }

    /// Register this manager on the domain-scoped event bus.
    pub fn subscribe(self: &Arc<Self>, bus: &EventBus) {
        bus.subscribe(
            ReferenceType::ExtensionGrant,
            self.domain_id.clone(),
            self.clone(),
        );
    }

    /// The granter answering to `grant_type`, if any.
    #[must_use]
    pub fn granter_for(&self, grant_type: &str) -> Option<Arc<ExtensionTokenGranter>> {
        use crate::granter::TokenGranter as _;
        self.granters
            .iter()
            .find(|entry| entry.granter.can_handle(grant_type))
            .map(|entry| entry.granter.clone())
    }

    /// Earliest `created_at` among currently deployed grants.
    #[must_use]
    pub fn min_date(&self) -> Option<DateTime<Utc>> {
        *self.min_date.read().expect("min_date lock poisoned")
    }

    /// Number of deployed grants.
    #[must_use]
    pub fn deployed_count(&self) -> usize {
        self.granters.len()
    }

    /// Deployed grant metadata for downstream templating.
    #[must_use]
    pub fn template_variables(&self) -> TemplateVariables {
        let grants: Vec<serde_json::Value> = self
            .granters
            .iter()
            .map(|entry| {
                let config = entry.granter.grant_config();
                serde_json::json!({
                    "id": config.id,
                    "name": config.name,
                    "grantType": config.grant_type,
                })
            })
            .collect();
        [("extensionGrants".to_string(), serde_json::Value::Array(grants))].into()
    }

    fn deploy(&self, grant: ExtensionGrant) -> OAuth2Result<()> {
        let deployed = self
            .granters
            .get(&grant.id)
            .map(|entry| entry.granter.grant_config().clone());
        if !need_deployment(deployed.as_ref(), &grant) {
            debug!(domain = %self.domain_id, grant = %grant.id, "Extension grant already up to date");
            return Ok(());
        }

        let provider = self
            .factory
            .create_extension_grant(&grant.plugin_type, &grant.configuration)?;
        let granter = Arc::new(ExtensionTokenGranter::new(
            GranterSupport::new(self.users.clone(), self.token_service.clone()),
            grant.clone(),
            provider.clone(),
        ));

        let replaced = self.granters.insert(grant.id.clone(), Deployed { granter, provider });
        self.recompute_min_date();
        self.readiness
            .report(&self.domain_id, &grant.id, PluginStatus::Ready);
        info!(domain = %self.domain_id, grant = %grant.id, grant_type = %grant.grant_type, "Extension grant deployed");

        if let Some(old) = replaced {
            Self::stop_quietly(&self.domain_id, &grant.id, &old.provider);
        }
        Ok(())
    }

    fn remove(&self, id: &str) {
        if let Some((_, old)) = self.granters.remove(id) {
            info!(domain = %self.domain_id, grant = %id, "Extension grant undeployed");
            self.recompute_min_date();
            Self::stop_quietly(&self.domain_id, id, &old.provider);
        }
    }

    /// Recompute the oldest-grant cutoff and push it into every granter.
    /// Becomes `None` again when the last grant is removed.
    fn recompute_min_date(&self) {
        let min = self
            .granters
            .iter()
            .map(|entry| entry.granter.grant_config().created_at)
            .min();
        *self.min_date.write().expect("min_date lock poisoned") = min;
        for entry in &self.granters {
            entry.granter.set_min_date(min);
        }
    }

    /// Stop failures must never prevent the replacement from being live.
    fn stop_quietly(domain: &str, id: &str, provider: &Arc<dyn ExtensionGrantProvider>) {
        let domain = domain.to_string();
        let id = id.to_string();
        let provider = provider.clone();
        tokio::spawn(async move {
            if let Err(e) = provider.stop().await {
                warn!(domain = %domain, grant = %id, error = %e, "Error stopping replaced extension grant provider");
            }
        });
    }
}

#[async_trait]
impl EventListener for ExtensionGrantManager {
    async fn on_event(&self, event: Event) {
        match event.kind {
            EventKind::Deploy | EventKind::Update => {
                match self.repository.find_by_id(&event.reference_id).await {
                    Ok(Some(grant)) => {
                        let id = grant.id.clone();
                        if let Err(e) = self.deploy(grant) {
                            self.readiness.report(
                                &self.domain_id,
                                &id,
                                PluginStatus::Failed(e.to_string()),
                            );
                        }
                    }
                    Ok(None) => self.remove(&event.reference_id),
                    Err(e) => {
                        warn!(
                            domain = %self.domain_id,
                            grant = %event.reference_id,
                            error = %e,
                            "Unable to fetch extension grant configuration"
                        );
                    }
                }
            }
            EventKind::Undeploy => self.remove(&event.reference_id),
        }
    }
}

impl std::fmt::Debug for ExtensionGrantManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionGrantManager")
            .field("domain_id", &self.domain_id)
            .field("deployed", &self.granters.len())
            .field("min_date", &self.min_date())
            .finish()
    }
}
