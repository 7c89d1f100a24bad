//! In-process event bus — maps event kinds to registered handler sets.
//!
//! Producers call [`EventBus::publish`] fire-and-forget: each registered
//! handler runs in its own spawned task, so a failing handler can neither
//! crash the producer nor starve the other handlers of the same event.
//!
//! The bus is constructed once per process at startup, handlers are
//! registered before it is shared (`Arc<EventBus>`), and it holds no
//! global state — tests build isolated instances.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::event::{AppEvent, EventKind};

/// A consumer of application events.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Stable handler name; `subscribe` is idempotent per `(kind, name)`.
    fn name(&self) -> &'static str;

    /// Process one event. Errors are caught and logged at the bus boundary.
    async fn handle(&self, event: AppEvent) -> anyhow::Result<()>;
}

/// In-process publish/subscribe registry.
pub struct EventBus {
    handlers: HashMap<EventKind, Vec<Arc<dyn EventHandler>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler for an event kind.
    ///
    /// Idempotent per `(kind, handler.name())` — registering the same
    /// handler name twice for a kind is a no-op.
    pub fn subscribe(&mut self, kind: EventKind, handler: Arc<dyn EventHandler>) {
        let entry = self.handlers.entry(kind).or_default();
        if entry.iter().any(|h| h.name() == handler.name()) {
            tracing::debug!(
                kind = %kind,
                handler = handler.name(),
                "Handler already subscribed, skipping"
            );
            return;
        }
        entry.push(handler);
    }

    /// Number of handlers registered for a kind.
    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.handlers.get(&kind).map_or(0, |h| h.len())
    }

    /// Publish an event to every handler registered for its kind.
    ///
    /// Fire-and-forget: returns immediately, handlers run in spawned
    /// tasks. Handler errors never propagate to the producer. No handler
    /// registered for the kind is not an error.
    pub fn publish(&self, event: AppEvent) {
        let Some(handlers) = self.handlers.get(&event.kind) else {
            tracing::debug!(kind = %event.kind, "No handlers registered for event");
            return;
        };

        for handler in handlers {
            let handler = Arc::clone(handler);
            let event = event.clone();
            tokio::spawn(async move {
                let kind = event.kind;
                if let Err(e) = handler.handle(event).await {
                    tracing::error!(
                        kind = %kind,
                        handler = handler.name(),
                        error = %e,
                        "Event handler failed"
                    );
                }
            });
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
