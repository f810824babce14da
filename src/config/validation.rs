//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Breaker names are present and unique
//! - Addresses parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Breaker option values are never rejected here; the record decoder already
//!   dropped anything mistyped

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ServiceConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("breaker #{index} has an empty name")]
    EmptyBreakerName { index: usize },

    #[error("breaker '{0}' is defined more than once")]
    DuplicateBreaker(String),

    #[error("breaker '{0}' has an empty notification address")]
    EmptyNotificationAddress(String),

    #[error("invalid {field} '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("admin API is enabled without an api_key")]
    MissingApiKey,
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for (index, entry) in config.breakers.iter().enumerate() {
        if entry.name.trim().is_empty() {
            errors.push(ValidationError::EmptyBreakerName { index });
            continue;
        }
        if !seen.insert(entry.name.as_str()) {
            errors.push(ValidationError::DuplicateBreaker(entry.name.clone()));
        }
        if entry.options.notification_address() == Some("") {
            errors.push(ValidationError::EmptyNotificationAddress(entry.name.clone()));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if config.admin.enabled {
        if config.admin.bind_address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::InvalidAddress {
                field: "admin.bind_address",
                value: config.admin.bind_address.clone(),
            });
        }
        if config.admin.api_key.trim().is_empty() {
            errors.push(ValidationError::MissingApiKey);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
