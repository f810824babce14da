//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Guarded call:
//!     → circuit_breaker.rs (admit, classify, fallback)
//!     → timeouts.rs (enforce the per-call deadline)
//!     → state.rs (count failures, open/close the circuit)
//!     → reset.rs (timer that moves OPEN to HALF_OPEN)
//! ```
//!
//! # Design Decisions
//! - Timeouts are opt-in per breaker; a fired timeout is always a failure
//! - No retries: a guarded call is classified exactly once
//! - Circuit breaker prevents cascading failures

pub mod circuit_breaker;
pub mod error;
pub mod reset;
pub mod state;
pub mod timeouts;

pub use circuit_breaker::{BreakerSnapshot, CircuitBreaker};
pub use error::BreakerError;
pub use state::BreakerState;
