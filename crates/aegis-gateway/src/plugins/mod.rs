//! Per-domain plugin lifecycle
//!
//! Each deployed domain gets its own set of lifecycle managers, one per
//! provider kind. They all share the same pattern:
//!
//! - bulk-load and deploy every configuration at startup, isolating partial
//!   failures per plugin id (a bad tenant config never affects siblings);
//! - subscribe to the domain-scoped event bus for DEPLOY/UPDATE/UNDEPLOY;
//! - gate redeployment on the stored `updated_at` being strictly newer than
//!   the deployed version's (`need_deployment`), which makes duplicate and
//!   racing events converge;
//! - atomically swap the provider-map entry on deploy, then always attempt to
//!   stop the replaced instance, logging but swallowing stop failures.
//!
//! Deployment failures are reported to a per-plugin [`ReadinessSink`] and
//! never propagate to request-handling callers.

mod authorization_engine;
mod bot_detection;
mod extension_grant;
mod factory;

pub use authorization_engine::AuthorizationEngineManager;
pub use bot_detection::BotDetectionManager;
pub use extension_grant::ExtensionGrantManager;
pub use factory::{ProviderFactory, global_factory};

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::{error, info};

use aegis_protocol::{OAuth2Result, Parameters, PluginRecord, TokenRequest, User};

/// Tenant-configured extension-grant provider: validates the incoming
/// assertion and optionally yields the resource owner it asserts.
#[async_trait]
pub trait ExtensionGrantProvider: Send + Sync {
    /// Validate the grant request, returning the asserted user if any.
    async fn grant(&self, request: &TokenRequest) -> OAuth2Result<Option<User>>;

    /// Release provider resources; called when the provider is undeployed or
    /// replaced.
    async fn stop(&self) -> OAuth2Result<()> {
        Ok(())
    }
}

/// Tenant-configured bot-detection provider.
#[async_trait]
pub trait BotDetectionProvider: Send + Sync {
    /// Whether the request described by `parameters` looks human.
    async fn validate(&self, parameters: &Parameters) -> OAuth2Result<bool>;

    /// Release provider resources.
    async fn stop(&self) -> OAuth2Result<()> {
        Ok(())
    }
}

/// Tenant-configured authorization-engine provider.
#[async_trait]
pub trait AuthorizationEngineProvider: Send + Sync {
    /// Evaluate an authorization decision for `subject` in `context`.
    async fn is_authorized(&self, subject: &str, context: &serde_json::Value)
        -> OAuth2Result<bool>;

    /// Release provider resources.
    async fn stop(&self) -> OAuth2Result<()> {
        Ok(())
    }
}

impl core::fmt::Debug for dyn AuthorizationEngineProvider {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("dyn AuthorizationEngineProvider")
    }
}

/// Deployment readiness of one plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginStatus {
    /// Provider deployed and serving.
    Ready,
    /// Deployment failed; the plugin stays undeployed until a later event
    /// succeeds.
    Failed(String),
}

/// Per-plugin readiness reporting sink.
pub trait ReadinessSink: Send + Sync {
    /// Record the deployment outcome for `(domain, plugin_id)`.
    fn report(&self, domain: &str, plugin_id: &str, status: PluginStatus);
}

/// Default sink: structured logs only.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogOnlyReadinessSink;

impl ReadinessSink for LogOnlyReadinessSink {
    fn report(&self, domain: &str, plugin_id: &str, status: PluginStatus) {
        match status {
            PluginStatus::Ready => {
                info!(domain = %domain, plugin = %plugin_id, "Plugin deployed");
            }
            PluginStatus::Failed(reason) => {
                error!(domain = %domain, plugin = %plugin_id, reason = %reason, "Plugin deployment failed");
            }
        }
    }
}

/// Template-variable map exposed to downstream templating.
pub type TemplateVariables = HashMap<String, serde_json::Value>;

/// The sole gate against redundant redeployment: deploy when nothing is
/// deployed yet, or when the incoming configuration is strictly newer than
/// the deployed record.
#[must_use]
pub(crate) fn need_deployment<R: PluginRecord>(deployed: Option<&R>, incoming: &R) -> bool {
    match deployed {
        None => true,
        Some(deployed) => deployed.updated_at() < incoming.updated_at(),
    }
}
