//! Bot-detection lifecycle manager

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, info, warn};

use aegis_protocol::{BotDetection, Event, EventKind, OAuth2Result, Parameters, ReferenceType};

use super::{
    BotDetectionProvider, PluginStatus, ProviderFactory, ReadinessSink, TemplateVariables,
    need_deployment,
};
use crate::events::{EventBus, EventListener};
use crate::storage::BotDetectionRepository;

struct Deployed {
    detection: BotDetection,
    provider: Arc<dyn BotDetectionProvider>,
}

/// Per-domain bot-detection manager.
pub struct BotDetectionManager {
    domain_id: String,
    repository: Arc<dyn BotDetectionRepository>,
    factory: Arc<ProviderFactory>,
    readiness: Arc<dyn ReadinessSink>,
    detections: DashMap<String, Deployed>,
}

impl BotDetectionManager {
    /// Manager for `domain_id` over the given collaborators.
    pub fn new(
        domain_id: impl Into<String>,
        repository: Arc<dyn BotDetectionRepository>,
        factory: Arc<ProviderFactory>,
        readiness: Arc<dyn ReadinessSink>,
    ) -> Self {
        Self {
            domain_id: domain_id.into(),
            repository,
            factory,
            readiness,
            detections: DashMap::new(),
        }
    }

    /// Bulk-load and deploy every detection registered for the domain; a
    /// single plugin failure is reported and does not abort the others.
    ///
    /// # Errors
    ///
    /// Only repository access failures; deployment failures are contained.
    pub async fn init(&self) -> OAuth2Result<()> {
        let detections = self.repository.find_by_domain(&self.domain_id).await?;
        info!(domain = %self.domain_id, count = detections.len(), "Loading bot detections");
        for detection in detections {
            let id = detection.id.clone();
            if let Err(e) = self.deploy(detection) {
                self.readiness
                    .report(&self.domain_id, &id, PluginStatus::Failed(e.to_string()));
            }
        }
        Ok(())
    }

    /// Register this manager on the domain-scoped event bus.
    pub fn subscribe(self: &Arc<Self>, bus: &EventBus) {
        bus.subscribe(
            ReferenceType::BotDetection,
            self.domain_id.clone(),
            self.clone(),
        );
    }

    /// The deployed detection configuration, if any.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<BotDetection> {
        self.detections.get(id).map(|entry| entry.detection.clone())
    }

    /// Run the identified detection against the request parameters.
    ///
    /// A detection that is configured but not (yet) deployed must not lock
    /// every user out, so a missing provider passes the request through.
    ///
    /// # Errors
    ///
    /// Provider evaluation failures.
    pub async fn validate(&self, id: &str, parameters: &Parameters) -> OAuth2Result<bool> {
        let Some(provider) = self.detections.get(id).map(|entry| entry.provider.clone()) else {
            warn!(domain = %self.domain_id, detection = %id, "Bot detection not deployed, letting the request through");
            return Ok(true);
        };
        provider.validate(parameters).await
    }

    /// Deployed detection metadata for downstream templating.
    #[must_use]
    pub fn template_variables(&self) -> TemplateVariables {
        let detections: Vec<serde_json::Value> = self
            .detections
            .iter()
            .map(|entry| {
                serde_json::json!({
                    "id": entry.detection.id,
                    "type": entry.detection.plugin_type,
                })
            })
            .collect();
        [(
            "botDetections".to_string(),
            serde_json::Value::Array(detections),
        )]
        .into()
    }

    fn deploy(&self, detection: BotDetection) -> OAuth2Result<()> {
        let deployed = self
            .detections
            .get(&detection.id)
            .map(|entry| entry.detection.clone());
        if !need_deployment(deployed.as_ref(), &detection) {
            debug!(domain = %self.domain_id, detection = %detection.id, "Bot detection already up to date");
            return Ok(());
        }

        let provider = self
            .factory
            .create_bot_detection(&detection.plugin_type, &detection.configuration)?;
        let id = detection.id.clone();
        let replaced = self
            .detections
            .insert(id.clone(), Deployed { detection, provider });
        self.readiness
            .report(&self.domain_id, &id, PluginStatus::Ready);
        info!(domain = %self.domain_id, detection = %id, "Bot detection deployed");

        if let Some(old) = replaced {
            Self::stop_quietly(&self.domain_id, &id, &old.provider);
        }
        Ok(())
    }

    fn remove(&self, id: &str) {
        if let Some((_, old)) = self.detections.remove(id) {
            info!(domain = %self.domain_id, detection = %id, "Bot detection undeployed");
            Self::stop_quietly(&self.domain_id, id, &old.provider);
        }
    }

    fn stop_quietly(domain: &str, id: &str, provider: &Arc<dyn BotDetectionProvider>) {
        let domain = domain.to_string();
        let id = id.to_string();
        let provider = provider.clone();
        tokio::spawn(async move {
            if let Err(e) = provider.stop().await {
                warn!(domain = %domain, detection = %id, error = %e, "Error stopping replaced bot detection provider");
            }
        });
    }
}

#[async_trait]
impl EventListener for BotDetectionManager {
    async fn on_event(&self, event: Event) {
        match event.kind {
            EventKind::Deploy | EventKind::Update => {
                match self.repository.find_by_id(&event.reference_id).await {
                    Ok(Some(detection)) => {
                        let id = detection.id.clone();
                        if let Err(e) = self.deploy(detection) {
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
                            detection = %event.reference_id,
                            error = %e,
                            "Unable to fetch bot detection configuration"
                        );
                    }
                }
            }
            EventKind::Undeploy => self.remove(&event.reference_id),
        }
    }
}

impl std::fmt::Debug for BotDetectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotDetectionManager")
            .field("domain_id", &self.domain_id)
            .field("deployed", &self.detections.len())
            .finish()
    }
}
