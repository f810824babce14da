//! Observability subsystem.
//!
//! Breakers, the registry and the admin API report through two channels:
//! - logging.rs: `tracing` subscriber setup (pretty or JSON lines on stdout)
//! - metrics.rs: call, fallback and transition counters plus a per-breaker state gauge,
//!   scraped by Prometheus when the exporter is enabled
//!
//! Every log line and metric carries the breaker name.

pub mod logging;
pub mod metrics;
