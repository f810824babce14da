//! Breaker event record.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::resilience::state::{BreakerState, Transition};

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Open,
    HalfOpen,
    Closed,
    Failure,
}

impl From<Transition> for EventKind {
    fn from(transition: Transition) -> Self {
        match transition {
            Transition::Opened => EventKind::Open,
            Transition::HalfOpened => EventKind::HalfOpen,
            Transition::Closed => EventKind::Closed,
        }
    }
}

/// Record published to a breaker's notification address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakerEvent {
    pub breaker_name: String,
    pub state: BreakerState,
    pub failure_count: u32,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    pub kind: EventKind,
}

impl BreakerEvent {
    pub fn new(
        breaker_name: impl Into<String>,
        kind: EventKind,
        state: BreakerState,
        failure_count: u32,
    ) -> Self {
        Self {
            breaker_name: breaker_name.into(),
            state,
            failure_count,
            timestamp: now_millis(),
            kind,
        }
    }
}

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
