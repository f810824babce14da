//! Metrics collection and exposition.
//!
//! # Metrics
//! - `tripwire_calls_total` (counter): guarded calls by breaker, outcome
//! - `tripwire_fallbacks_total` (counter): fallback invocations by breaker, outcome
//! - `tripwire_transitions_total` (counter): state changes by breaker, target state
//! - `tripwire_state` (gauge): 0=closed, 1=open, 2=half_open
//! - `tripwire_call_duration_seconds` (histogram): admitted call latency
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed exporter it is a no-op
//! - Prometheus exporter is opt-in via config

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::resilience::state::BreakerState;

/// Outcome label of a guarded call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    Success,
    Failure,
    Timeout,
    Rejected,
}

impl CallOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallOutcome::Success => "success",
            CallOutcome::Failure => "failure",
            CallOutcome::Timeout => "timeout",
            CallOutcome::Rejected => "rejected",
        }
    }
}

/// Install the Prometheus exporter with an HTTP scrape listener on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;

    describe_counter!("tripwire_calls_total", "Guarded calls by breaker and outcome");
    describe_counter!("tripwire_fallbacks_total", "Fallback invocations by breaker and outcome");
    describe_counter!("tripwire_transitions_total", "Breaker state transitions");
    describe_gauge!("tripwire_state", "Current breaker state (0=closed, 1=open, 2=half_open)");
    describe_histogram!("tripwire_call_duration_seconds", "Latency of admitted calls");

    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_call(breaker: &str, outcome: CallOutcome, duration: Option<Duration>) {
    counter!(
        "tripwire_calls_total",
        "breaker" => breaker.to_string(),
        "outcome" => outcome.as_str()
    )
    .increment(1);

    if let Some(duration) = duration {
        histogram!("tripwire_call_duration_seconds", "breaker" => breaker.to_string())
            .record(duration.as_secs_f64());
    }
}

pub fn record_fallback(breaker: &str, succeeded: bool) {
    let outcome = if succeeded { "success" } else { "failure" };
    counter!(
        "tripwire_fallbacks_total",
        "breaker" => breaker.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_transition(breaker: &str, state: BreakerState) {
    counter!(
        "tripwire_transitions_total",
        "breaker" => breaker.to_string(),
        "state" => state.as_str()
    )
    .increment(1);
    record_state(breaker, state);
}

pub fn record_state(breaker: &str, state: BreakerState) {
    gauge!("tripwire_state", "breaker" => breaker.to_string()).set(state.gauge_value());
}
