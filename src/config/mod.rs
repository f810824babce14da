//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! tripwire.toml
//!     → loader.rs (parse & deserialize)
//!         → options.rs (permissive per-field decode of each [[breakers]] entry)
//!     → validation.rs (semantic checks)
//!     → ServiceConfig (validated, immutable)
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → registry reconciles its breakers against the new entries
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Breaker options never fail to decode; mistyped fields keep their defaults

pub mod loader;
pub mod options;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use options::BreakerOptions;
pub use schema::{AdminConfig, BreakerEntry, LogFormat, ObservabilityConfig, ServiceConfig};
