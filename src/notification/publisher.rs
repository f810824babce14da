//! Per-breaker event publisher.
//!
//! Events are queued and delivered by a background task, one per breaker, so a slow
//! channel never holds up the call that produced the event. Delivery order follows
//! publication order. Outside a Tokio runtime events are delivered inline.

use std::fmt;
use std::sync::{Arc, OnceLock};

use tokio::runtime::Handle;
use tokio::sync::mpsc;

use crate::notification::bus::NotificationChannel;
use crate::notification::event::{BreakerEvent, EventKind};
use crate::resilience::state::BreakerState;

#[derive(Clone)]
struct Target {
    breaker: Arc<str>,
    address: String,
    channel: Arc<dyn NotificationChannel>,
}

impl Target {
    fn deliver(&self, event: BreakerEvent) {
        let result = serde_json::to_value(&event)
            .map_err(Into::into)
            .and_then(|message| self.channel.publish(&self.address, message));

        if let Err(e) = result {
            tracing::debug!(
                breaker = %self.breaker,
                address = %self.address,
                error = %e,
                "Dropped breaker event"
            );
        }
    }
}

async fn drain(target: Target, mut rx: mpsc::UnboundedReceiver<BreakerEvent>) {
    while let Some(event) = rx.recv().await {
        target.deliver(event);
    }
}

/// Sends a breaker's events to its notification address, if it has one.
pub struct Publisher {
    breaker: Arc<str>,
    target: Option<Target>,
    queue: OnceLock<mpsc::UnboundedSender<BreakerEvent>>,
}

impl fmt::Debug for Publisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Publisher")
            .field("breaker", &self.breaker)
            .field("address", &self.target.as_ref().map(|t| t.address.as_str()))
            .field("queued", &self.queue.get().is_some())
            .finish()
    }
}

impl Publisher {
    pub fn new(
        breaker: impl Into<String>,
        address: Option<String>,
        channel: Option<Arc<dyn NotificationChannel>>,
    ) -> Self {
        let breaker: Arc<str> = breaker.into().into();
        let target = match (address, channel) {
            (Some(address), Some(channel)) => Some(Target {
                breaker: breaker.clone(),
                address,
                channel,
            }),
            _ => None,
        };
        Self {
            breaker,
            target,
            queue: OnceLock::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.target.is_some()
    }

    /// Best effort. Never blocks on the channel; failures are logged at debug.
    pub fn publish(&self, kind: EventKind, state: BreakerState, failure_count: u32) {
        let Some(target) = &self.target else {
            return;
        };
        let event = BreakerEvent::new(&*self.breaker, kind, state, failure_count);

        let queue = match self.queue.get() {
            Some(queue) => Some(queue),
            None => Handle::try_current().ok().map(|runtime| {
                self.queue.get_or_init(|| {
                    let (tx, rx) = mpsc::unbounded_channel();
                    runtime.spawn(drain(target.clone(), rx));
                    tx
                })
            }),
        };

        let unsent = match queue {
            Some(queue) => queue.send(event).err().map(|e| e.0),
            None => Some(event),
        };
        // No runtime, or the runtime that hosted the queue is gone.
        if let Some(event) = unsent {
            target.deliver(event);
        }
    }
}
