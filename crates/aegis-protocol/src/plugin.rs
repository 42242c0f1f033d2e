//! Tenant plugin configuration records
//!
//! Each record configures one provider instance for a domain. A running
//! provider is redeployed only when the stored `updated_at` is strictly newer
//! than the deployed version's `updated_at` - the sole gate against redundant
//! reloads on duplicate events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Common surface the lifecycle managers need from any plugin configuration.
pub trait PluginRecord: Clone + Send + Sync + 'static {
    /// Stable plugin identifier (the provider-map key).
    fn id(&self) -> &str;
    /// Provider type resolved through the plugin factory.
    fn plugin_type(&self) -> &str;
    /// Opaque configuration blob handed to the factory.
    fn configuration(&self) -> &str;
    /// Creation instant.
    fn created_at(&self) -> DateTime<Utc>;
    /// Last modification instant; drives the redeployment gate.
    fn updated_at(&self) -> DateTime<Utc>;
}

macro_rules! plugin_record {
    ($ty:ty) => {
        impl PluginRecord for $ty {
            fn id(&self) -> &str {
                &self.id
            }
            fn plugin_type(&self) -> &str {
                &self.plugin_type
            }
            fn configuration(&self) -> &str {
                &self.configuration
            }
            fn created_at(&self) -> DateTime<Utc> {
                self.created_at
            }
            fn updated_at(&self) -> DateTime<Utc> {
                self.updated_at
            }
        }
    };
}

/// Tenant-configurable non-standard grant type (RFC 6749 §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtensionGrant {
    /// Plugin identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Owning domain.
    pub domain: String,
    /// Wire-level `grant_type` value this grant answers to.
    pub grant_type: String,
    /// Provider type resolved through the plugin factory.
    #[serde(rename = "type")]
    pub plugin_type: String,
    /// Opaque provider configuration blob.
    pub configuration: String,
    /// Whether the grant may create a user from the validated assertion.
    pub create_user: bool,
    /// Creation instant; the oldest deployed grant wins for legacy clients.
    pub created_at: DateTime<Utc>,
    /// Last modification instant.
    pub updated_at: DateTime<Utc>,
}

plugin_record!(ExtensionGrant);

/// Tenant bot-detection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotDetection {
    /// Plugin identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Owning domain.
    pub domain: String,
    /// Provider type resolved through the plugin factory.
    #[serde(rename = "type")]
    pub plugin_type: String,
    /// Opaque provider configuration blob.
    pub configuration: String,
    /// Creation instant.
    pub created_at: DateTime<Utc>,
    /// Last modification instant.
    pub updated_at: DateTime<Utc>,
}

plugin_record!(BotDetection);

/// Tenant authorization-engine configuration. At most one engine may be
/// deployed per domain; multiplicity beyond one is an invariant violation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationEngine {
    /// Plugin identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Owning domain.
    pub domain: String,
    /// Provider type resolved through the plugin factory.
    #[serde(rename = "type")]
    pub plugin_type: String,
    /// Opaque provider configuration blob.
    pub configuration: String,
    /// Creation instant.
    pub created_at: DateTime<Utc>,
    /// Last modification instant.
    pub updated_at: DateTime<Utc>,
}

plugin_record!(AuthorizationEngine);
