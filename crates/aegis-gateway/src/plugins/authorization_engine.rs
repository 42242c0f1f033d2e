//! Authorization-engine lifecycle manager
//!
//! A domain may deploy several policy engines; callers that do not name one
//! get the domain default, which only exists when it is unambiguous (exactly
//! one engine deployed).

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, info, warn};

use aegis_protocol::{
    AuthorizationEngine, Event, EventKind, OAuth2Error, OAuth2Result, ReferenceType,
};

use super::{
    AuthorizationEngineProvider, PluginStatus, ProviderFactory, ReadinessSink, TemplateVariables,
    need_deployment,
};
use crate::events::{EventBus, EventListener};
use crate::storage::AuthorizationEngineRepository;

struct Deployed {
    engine: AuthorizationEngine,
    provider: Arc<dyn AuthorizationEngineProvider>,
}

/// Per-domain authorization-engine manager.
pub struct AuthorizationEngineManager {
    domain_id: String,
    repository: Arc<dyn AuthorizationEngineRepository>,
    factory: Arc<ProviderFactory>,
    readiness: Arc<dyn ReadinessSink>,
    engines: DashMap<String, Deployed>,
}

impl AuthorizationEngineManager {
    /// Manager for `domain_id` over the given collaborators.
    pub fn new(
        domain_id: impl Into<String>,
        repository: Arc<dyn AuthorizationEngineRepository>,
        factory: Arc<ProviderFactory>,
        readiness: Arc<dyn ReadinessSink>,
    ) -> Self {
        Self {
            domain_id: domain_id.into(),
            repository,
            factory,
            readiness,
            engines: DashMap::new(),
        }
    }

    /// Bulk-load and deploy every engine registered for the domain; a single
    /// plugin failure is reported and does not abort the others.
    ///
    /// # Errors
    ///
    /// Only repository access failures; deployment failures are contained.
    pub async fn init(&self) -> OAuth2Result<()> {
        let engines = self.repository.find_by_domain(&self.domain_id).await?;
        info!(domain = %self.domain_id, count = engines.len(), "Loading authorization engines");
        for engine in engines {
            let id = engine.id.clone();
            if let Err(e) = self.deploy(engine) {
                self.readiness
                    .report(&self.domain_id, &id, PluginStatus::Failed(e.to_string()));
            }
        }
        Ok(())
    }

    /// Register this manager on the domain-scoped event bus.
    pub fn subscribe(self: &Arc<Self>, bus: &EventBus) {
        bus.subscribe(
            ReferenceType::AuthorizationEngine,
            self.domain_id.clone(),
            self.clone(),
        );
    }

    /// The identified provider, if deployed.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<dyn AuthorizationEngineProvider>> {
        self.engines.get(id).map(|entry| entry.provider.clone())
    }

    /// The domain default: `None` when no engine is deployed, the single
    /// engine when exactly one is, and an error when several are - the
    /// default is then ambiguous and the caller must name one.
    ///
    /// # Errors
    ///
    /// `server_error` when more than one engine is deployed.
    pub fn get_default(&self) -> OAuth2Result<Option<Arc<dyn AuthorizationEngineProvider>>> {
        match self.engines.len() {
            0 => Ok(None),
            1 => Ok(self.engines.iter().next().map(|entry| entry.provider.clone())),
            n => Err(OAuth2Error::server_error(format!(
                "Multiple authorization engines deployed ({n}), a default cannot be elected"
            ))),
        }
    }

    /// Deployed engine metadata for downstream templating.
    #[must_use]
    pub fn template_variables(&self) -> TemplateVariables {
        let engines: Vec<serde_json::Value> = self
            .engines
            .iter()
            .map(|entry| {
                serde_json::json!({
                    "id": entry.engine.id,
                    "type": entry.engine.plugin_type,
                })
            })
            .collect();
        [(
            "authorizationEngines".to_string(),
            serde_json::Value::Array(engines),
        )]
        .into()
    }

    fn deploy(&self, engine: AuthorizationEngine) -> OAuth2Result<()> {
        let deployed = self
            .engines
            .get(&engine.id)
            .map(|entry| entry.engine.clone());
        if !need_deployment(deployed.as_ref(), &engine) {
            debug!(domain = %self.domain_id, engine = %engine.id, "Authorization engine already up to date");
            return Ok(());
        }

        let provider = self
            .factory
            .create_authorization_engine(&engine.plugin_type, &engine.configuration)?;
        let id = engine.id.clone();
        let replaced = self.engines.insert(id.clone(), Deployed { engine, provider });
        self.readiness
            .report(&self.domain_id, &id, PluginStatus::Ready);
        info!(domain = %self.domain_id, engine = %id, "Authorization engine deployed");

        if let Some(old) = replaced {
            Self::stop_quietly(&self.domain_id, &id, &old.provider);
        }
        Ok(())
    }

    fn remove(&self, id: &str) {
        if let Some((_, old)) = self.engines.remove(id) {
            info!(domain = %self.domain_id, engine = %id, "Authorization engine undeployed");
            Self::stop_quietly(&self.domain_id, id, &old.provider);
        }
    }

    fn stop_quietly(domain: &str, id: &str, provider: &Arc<dyn AuthorizationEngineProvider>) {
        let domain = domain.to_string();
        let id = id.to_string();
        let provider = provider.clone();
        tokio::spawn(async move {
            if let Err(e) = provider.stop().await {
                warn!(domain = %domain, engine = %id, error = %e, "Error stopping replaced authorization engine provider");
            }
        });
    }
}

#[async_trait]
impl EventListener for AuthorizationEngineManager {
    async fn on_event(&self, event: Event) {
        match event.kind {
            EventKind::Deploy | EventKind::Update => {
                match self.repository.find_by_id(&event.reference_id).await {
                    Ok(Some(engine)) => {
                        let id = engine.id.clone();
                        if let Err(e) = self.deploy(engine) {
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
                            engine = %event.reference_id,
                            error = %e,
                            "Unable to fetch authorization engine configuration"
                        );
                    }
                }
            }
            EventKind::Undeploy => self.remove(&event.reference_id),
        }
    }
}

impl std::fmt::Debug for AuthorizationEngineManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationEngineManager")
            .field("domain_id", &self.domain_id)
            .field("deployed", &self.engines.len())
            .finish()
    }
}
