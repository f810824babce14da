//! Publish channels.
//!
//! # Responsibilities
//! - Define the channel seam breakers publish through
//! - Provide an in-process bus keyed by address
//!
//! # Design Decisions
//! - `publish` must not block; channels backed by I/O queue internally
//! - Messages are JSON values so any subscriber can decode them
//! - The local bus drops messages for addresses nobody listens on

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::broadcast;

/// Errors a channel may report. Breakers swallow all of them.
#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("no subscribers on '{0}'")]
    NoSubscribers(String),

    #[error("failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),
}

/// An external publish/subscribe channel.
pub trait NotificationChannel: Send + Sync {
    /// Hand `message` to subscribers of `address`.
    ///
    /// Called from the breaker's delivery task, or inline when no Tokio runtime is
    /// running. Implementations backed by I/O should queue rather than block.
    fn publish(&self, address: &str, message: Value) -> Result<(), NotificationError>;
}

const DEFAULT_CAPACITY: usize = 256;

/// In-process bus: one broadcast channel per address.
#[derive(Debug, Clone)]
pub struct LocalEventBus {
    addresses: Arc<DashMap<String, broadcast::Sender<Value>>>,
    capacity: usize,
}

impl Default for LocalEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalEventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Per-address buffer size; slow subscribers lag past it.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            addresses: Arc::new(DashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Listen on `address`.
    pub fn subscribe(&self, address: &str) -> broadcast::Receiver<Value> {
        self.addresses
            .entry(address.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    pub fn subscriber_count(&self, address: &str) -> usize {
        self.addresses
            .get(address)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }
}

impl NotificationChannel for LocalEventBus {
    fn publish(&self, address: &str, message: Value) -> Result<(), NotificationError> {
        let Some(tx) = self.addresses.get(address) else {
            return Err(NotificationError::NoSubscribers(address.to_string()));
        };
        tx.send(message)
            .map(|_| ())
            .map_err(|_| NotificationError::NoSubscribers(address.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_publish_reaches_subscribers() {
        let bus = LocalEventBus::new();
        let mut first = bus.subscribe("cb.events");
        let mut second = bus.subscribe("cb.events");
        assert_eq!(bus.subscriber_count("cb.events"), 2);

        bus.publish("cb.events", json!({ "kind": "open" })).unwrap();

        assert_eq!(first.recv().await.unwrap()["kind"], "open");
        assert_eq!(second.recv().await.unwrap()["kind"], "open");
    }

    #[test]
    fn test_publish_without_subscribers_fails() {
        let bus = LocalEventBus::new();
        assert!(matches!(
            bus.publish("nobody", json!(1)),
            Err(NotificationError::NoSubscribers(ref a)) if a == "nobody"
        ));

        drop(bus.subscribe("gone"));
        assert!(bus.publish("gone", json!(1)).is_err());
    }

    #[tokio::test]
    async fn test_addresses_are_isolated() {
        let bus = LocalEventBus::new();
        let mut a = bus.subscribe("a");
        let _b = bus.subscribe("b");

        bus.publish("b", json!("for b")).unwrap();
        bus.publish("a", json!("for a")).unwrap();

        assert_eq!(a.recv().await.unwrap(), json!("for a"));
    }
}
