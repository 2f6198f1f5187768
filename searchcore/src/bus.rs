//! Event subscription seam.
//!
//! The search module registers one [`Subscriber`] per schema entity and event
//! name. [`InMemoryEventBus`] is the in-process implementation used by tests
//! and single-process deployments.

use crate::errors::SearchError;
use async_trait::async_trait;
use futures::future::BoxFuture;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Handler invoked with the event payload and the event name.
pub type Subscriber =
    Arc<dyn Fn(Value, String) -> BoxFuture<'static, Result<(), SearchError>> + Send + Sync>;

/// Event bus keyed by event name.
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn subscribe(&self, event_name: &str, subscriber: Subscriber);
}

#[async_trait]
impl<T: EventBus + ?Sized> EventBus for Arc<T> {
    async fn subscribe(&self, event_name: &str, subscriber: Subscriber) {
        self.as_ref().subscribe(event_name, subscriber).await;
    }
}

/// Process-local bus; `emit` awaits every subscriber in registration order.
#[derive(Default)]
pub struct InMemoryEventBus {
    subscribers: RwLock<HashMap<String, Vec<Subscriber>>>,
}

impl InMemoryEventBus {
    /// A bus without subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Event names with at least one subscriber, sorted.
    pub fn event_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.subscribers.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Deliver `payload` to every subscriber of `event_name` in registration
    /// order, stopping at the first error. Returns the number of handlers run.
    pub async fn emit(&self, event_name: &str, payload: Value) -> Result<usize, SearchError> {
        let subscribers = self
            .subscribers
            .read()
            .get(event_name)
            .cloned()
            .unwrap_or_default();

        if subscribers.is_empty() {
            debug!(event_name, "[bus.emit] no subscribers");
        }

        for subscriber in &subscribers {
            subscriber(payload.clone(), event_name.to_string()).await?;
        }
        Ok(subscribers.len())
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    async fn subscribe(&self, event_name: &str, subscriber: Subscriber) {
        self.subscribers
            .write()
            .entry(event_name.to_string())
            .or_default()
            .push(subscriber);
    }
}
