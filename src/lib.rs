//! tripwire: circuit breakers for calls to remote services.
//!
//! # Architecture Overview
//!
//! ```text
//!     caller ──▶ CircuitBreaker::execute ──▶ operation (bounded by timeout)
//!                    │         │
//!                    │         └──▶ fallback (when enabled)
//!                    ▼
//!              state machine ──▶ reset timer ──▶ HALF_OPEN trial
//!                    │
//!                    └──▶ publisher ──▶ notification channel (event bus)
//!
//!     BreakerRegistry ◀── config (TOML, hot reload) / admin API / tripwire-cli
//! ```

// Core
pub mod config;
pub mod notification;
pub mod registry;
pub mod resilience;

// Collaborators
pub mod discovery;

// Service surface
pub mod admin;
pub mod lifecycle;
pub mod observability;

pub use config::{BreakerOptions, ServiceConfig};
pub use lifecycle::Shutdown;
pub use notification::{BreakerEvent, EventKind, LocalEventBus, NotificationChannel};
pub use registry::BreakerRegistry;
pub use resilience::{BreakerError, BreakerSnapshot, BreakerState, CircuitBreaker};
