//! Tenant root: the security domain

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::{EventKind, ReferenceType};

/// Last lifecycle event recorded against a domain definition.
///
/// Replayed by the sync pass when a deployed domain's `updated_at` advances:
/// domain-typed events carry the whole domain object as payload, every other
/// reference type carries just this event's payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent {
    /// Object kind the change refers to.
    pub reference: ReferenceType,
    /// What kind of change the event describes.
    pub kind: EventKind,
    /// Identifier of the changed object.
    pub reference_id: String,
    /// Event payload.
    pub payload: serde_json::Value,
}

/// A tenant definition. Deployment on a gateway instance is driven entirely
/// by the sync pass diffing fresh definitions against the deployed-domain map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Domain {
    /// Domain identifier.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Disabled domains are undeployed and never serve protocol traffic.
    pub enabled: bool,
    /// The master domain is excluded from protocol serving altogether.
    pub master: bool,
    /// Sharding tags; matched against the gateway instance tag configuration.
    pub tags: HashSet<String>,
    /// Last modification instant; drives UPDATE event emission.
    pub updated_at: DateTime<Utc>,
    /// The most recent change event, replayed to listeners on update.
    pub last_event: Option<DomainEvent>,
    /// Whether the domain mandates the plain FAPI profile (a pushed
    /// authorization request without a request object is then rejected).
    pub plain_fapi_profile: bool,
}

impl Domain {
    /// Minimal enabled domain for embedding and tests.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            enabled: true,
            master: false,
            tags: HashSet::new(),
            updated_at: Utc::now(),
            last_event: None,
            plain_fapi_profile: false,
        }
    }
}
