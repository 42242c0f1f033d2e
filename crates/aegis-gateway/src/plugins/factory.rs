//! Provider factory registry
//!
//! Providers are constructed from `(type, configuration blob)` through
//! builders registered at process startup. There is no runtime classloading:
//! the set of supported provider kinds is whatever the embedding process
//! registers here, either on its own [`ProviderFactory`] instance or on the
//! process-wide [`global_factory`].

use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;

use aegis_protocol::{OAuth2Error, OAuth2Result};

use super::{AuthorizationEngineProvider, BotDetectionProvider, ExtensionGrantProvider};

type Builder<P> = Arc<dyn Fn(&str) -> OAuth2Result<Arc<P>> + Send + Sync>;

/// Registry of provider builders keyed by plugin type.
#[derive(Default)]
pub struct ProviderFactory {
    extension_grants: DashMap<String, Builder<dyn ExtensionGrantProvider>>,
    bot_detections: DashMap<String, Builder<dyn BotDetectionProvider>>,
    authorization_engines: DashMap<String, Builder<dyn AuthorizationEngineProvider>>,
}

impl ProviderFactory {
    /// Empty factory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an extension-grant provider builder for `plugin_type`.
    pub fn register_extension_grant<F>(&self, plugin_type: impl Into<String>, builder: F)
    where
        F: Fn(&str) -> OAuth2Result<Arc<dyn ExtensionGrantProvider>> + Send + Sync + 'static,
    {
        self.extension_grants
            .insert(plugin_type.into(), Arc::new(builder));
    }

    /// Register a bot-detection provider builder for `plugin_type`.
    pub fn register_bot_detection<F>(&self, plugin_type: impl Into<String>, builder: F)
    where
        F: Fn(&str) -> OAuth2Result<Arc<dyn BotDetectionProvider>> + Send + Sync + 'static,
    {
        self.bot_detections
            .insert(plugin_type.into(), Arc::new(builder));
    }

    /// Register an authorization-engine provider builder for `plugin_type`.
    pub fn register_authorization_engine<F>(&self, plugin_type: impl Into<String>, builder: F)
    where
        F: Fn(&str) -> OAuth2Result<Arc<dyn AuthorizationEngineProvider>> + Send + Sync + 'static,
    {
        self.authorization_engines
            .insert(plugin_type.into(), Arc::new(builder));
    }

    /// Build an extension-grant provider from `(plugin_type, configuration)`.
    ///
    /// # Errors
    ///
    /// `server_error` when no builder is registered for the type, or whatever
    /// the builder itself returns for a bad configuration blob.
    pub fn create_extension_grant(
        &self,
        plugin_type: &str,
        configuration: &str,
    ) -> OAuth2Result<Arc<dyn ExtensionGrantProvider>> {
        let builder = self.extension_grants.get(plugin_type).ok_or_else(|| {
            OAuth2Error::server_error(format!(
                "No extension grant provider registered for type {plugin_type}"
            ))
        })?;
        builder(configuration)
    }

    /// Build a bot-detection provider from `(plugin_type, configuration)`.
    ///
    /// # Errors
    ///
    /// Same contract as [`Self::create_extension_grant`].
    pub fn create_bot_detection(
        &self,
        plugin_type: &str,
        configuration: &str,
    ) -> OAuth2Result<Arc<dyn BotDetectionProvider>> {
        let builder = self.bot_detections.get(plugin_type).ok_or_else(|| {
            OAuth2Error::server_error(format!(
                "No bot detection provider registered for type {plugin_type}"
            ))
        })?;
        builder(configuration)
    }

    /// Build an authorization-engine provider from `(plugin_type,
    /// configuration)`.
    ///
    /// # Errors
    ///
    /// Same contract as [`Self::create_extension_grant`].
    pub fn create_authorization_engine(
        &self,
        plugin_type: &str,
        configuration: &str,
    ) -> OAuth2Result<Arc<dyn AuthorizationEngineProvider>> {
        let builder = self.authorization_engines.get(plugin_type).ok_or_else(|| {
            OAuth2Error::server_error(format!(
                "No authorization engine provider registered for type {plugin_type}"
            ))
        })?;
        builder(configuration)
    }
}

impl std::fmt::Debug for ProviderFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderFactory")
            .field("extension_grants", &self.extension_grants.len())
            .field("bot_detections", &self.bot_detections.len())
            .field("authorization_engines", &self.authorization_engines.len())
            .finish()
    }
}

static GLOBAL_FACTORY: Lazy<ProviderFactory> = Lazy::new(ProviderFactory::new);

/// The process-wide factory populated at startup.
#[must_use]
pub fn global_factory() -> &'static ProviderFactory {
    &GLOBAL_FACTORY
}

#[cfg(test)]
mod tests {
    use super::*;
    use aegis_protocol::{Parameters, TokenRequest, User};
    use async_trait::async_trait;

    struct Noop;

    #[async_trait]
    impl ExtensionGrantProvider for Noop {
        async fn grant(&self, _request: &TokenRequest) -> OAuth2Result<Option<User>> {
            Ok(None)
        }
    }

    #[async_trait]
    impl BotDetectionProvider for Noop {
        async fn validate(&self, _parameters: &Parameters) -> OAuth2Result<bool> {
            Ok(true)
        }
    }

    #[test]
    fn unknown_type_is_an_error() {
        let factory = ProviderFactory::new();
        assert!(factory.create_extension_grant("jwt-bearer", "{}").is_err());
    }

    #[test]
    fn registered_builder_is_used() {
        let factory = ProviderFactory::new();
        factory.register_extension_grant("jwt-bearer", |_config| {
            Ok(Arc::new(Noop) as Arc<dyn ExtensionGrantProvider>)
        });
        assert!(factory.create_extension_grant("jwt-bearer", "{}").is_ok());
    }

    #[test]
    fn builder_configuration_errors_propagate() {
        let factory = ProviderFactory::new();
        factory.register_bot_detection("captcha", |config| {
            serde_json::from_str::<serde_json::Value>(config)
                .map_err(|e| OAuth2Error::server_error(format!("Invalid configuration: {e}")))?;
            Ok(Arc::new(Noop) as Arc<dyn BotDetectionProvider>)
        });
        assert!(factory.create_bot_detection("captcha", "{}").is_ok());
        assert!(factory.create_bot_detection("captcha", "not json").is_err());
    }
}
