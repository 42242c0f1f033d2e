//! In-process typed event bus
//!
//! Publish/subscribe keyed by `(reference type, domain id)`. Listeners for a
//! key are awaited in registration order per published event, and the sync
//! pass that feeds the bus is externally serialized, which together preserves
//! per-domain delivery ordering. The lifecycle managers' updated-at
//! deployment gate remains the idempotency backstop for duplicate delivery.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::trace;

use aegis_protocol::{Event, ReferenceType};

/// A subscriber to domain-scoped deployment events.
#[async_trait]
pub trait EventListener: Send + Sync {
    /// Handle one event. Implementations contain their own failures; the bus
    /// does not interpret them.
    async fn on_event(&self, event: Event);
}

/// Typed observer registry.
#[derive(Default)]
pub struct EventBus {
    listeners: DashMap<(ReferenceType, String), Vec<Arc<dyn EventListener>>>,
}

impl EventBus {
    /// Empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` for events of `reference` kind scoped to
    /// `domain_id`.
    pub fn subscribe(
        &self,
        reference: ReferenceType,
        domain_id: impl Into<String>,
        listener: Arc<dyn EventListener>,
    ) {
        self.listeners
            .entry((reference, domain_id.into()))
            .or_default()
            .push(listener);
    }

    /// Drop every listener scoped to `domain_id` (domain undeployment).
    pub fn unsubscribe_domain(&self, domain_id: &str) {
        self.listeners
            .retain(|(_, domain), _| domain != domain_id);
    }

    /// Deliver `event` to all matching listeners, in registration order.
    pub async fn publish(&self, event: Event) {
        let targets = self
            .listeners
            .get(&(event.reference, event.domain_id.clone()))
            .map(|entry| entry.clone())
            .unwrap_or_default();
        trace!(
            reference = ?event.reference,
            kind = ?event.kind,
            domain = %event.domain_id,
            listeners = targets.len(),
            "Publishing event"
        );
        for listener in targets {
            listener.on_event(event.clone()).await;
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriptions", &self.listeners.len())
            .finish()
    }
}
