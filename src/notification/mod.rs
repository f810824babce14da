//! Notification subsystem.
//!
//! # Data Flow
//! ```text
//! Breaker transition or classified failure
//!     → publisher.rs (build event, after the breaker lock is released, and queue it)
//!     → per-breaker delivery task
//!     → bus.rs (NotificationChannel::publish to the breaker's address)
//!     → subscribers on that address
//! ```
//!
//! # Design Decisions
//! - Produce only; breakers never consume from a channel
//! - Best effort: a failed publish never reaches the caller
//! - Breakers without a notification address publish nothing

pub mod bus;
pub mod event;
pub mod publisher;

pub use bus::{LocalEventBus, NotificationChannel, NotificationError};
pub use event::{BreakerEvent, EventKind};
pub use publisher::Publisher;
