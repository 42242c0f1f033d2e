//! Typed deployment events
//!
//! The gateway event bus delivers these to per-domain plugin lifecycle
//! managers. Delivery ordering per domain is preserved by the bus; the
//! managers' updated-at deployment gate makes duplicate delivery converge
//! instead of double-applying.

use serde::{Deserialize, Serialize};

/// Lifecycle action carried by an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventKind {
    /// A new object should be deployed.
    Deploy,
    /// An existing deployed object changed.
    Update,
    /// A deployed object should be removed and stopped.
    Undeploy,
}

/// What kind of object an event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferenceType {
    /// A whole security domain.
    Domain,
    /// A tenant extension-grant configuration.
    ExtensionGrant,
    /// A tenant bot-detection configuration.
    BotDetection,
    /// A tenant authorization-engine configuration.
    AuthorizationEngine,
}

/// A typed event scoped to one domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Object kind the event refers to.
    pub reference: ReferenceType,
    /// Lifecycle action.
    pub kind: EventKind,
    /// Identifier of the referenced object (plugin id, domain id, ...).
    pub reference_id: String,
    /// Domain the event is scoped to.
    pub domain_id: String,
    /// Optional payload (domain-typed events carry the whole domain object).
    pub payload: Option<serde_json::Value>,
}

impl Event {
    /// Build an event with no payload.
    #[must_use]
    pub fn new(
        reference: ReferenceType,
        kind: EventKind,
        reference_id: impl Into<String>,
        domain_id: impl Into<String>,
    ) -> Self {
        Self {
            reference,
            kind,
            reference_id: reference_id.into(),
            domain_id: domain_id.into(),
            payload: None,
        }
    }

    /// Attach a payload.
    #[must_use]
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }
}
