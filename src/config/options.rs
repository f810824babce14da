//! Breaker options and their key/value record format.
//!
//! # Record Format
//! ```text
//! {
//!   "fallbackOnFailure":   bool    (default false)
//!   "maxFailures":         integer (default 5)
//!   "notificationAddress": string  (absent when unset)
//!   "resetTimeoutInMs":    integer (default 30000, <= 0 disables auto-reset)
//!   "timeoutInMs":         integer (default -1, <= 0 disables the call timeout)
//! }
//! ```
//!
//! # Design Decisions
//! - Decoding is permissive: every field is optional and type-checked on its own
//! - A present-but-mistyped field keeps its previous value instead of failing the decode
//! - Encoding always emits every field except an unset notification address

use std::time::Duration;

use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};
use serde_json::{Map, Value};

/// Sentinel stored in the timeout fields when they are disabled.
pub const DISABLED: i64 = -1;

pub const DEFAULT_MAX_FAILURES: u32 = 5;
pub const DEFAULT_TIMEOUT_MS: i64 = DISABLED;
pub const DEFAULT_RESET_TIMEOUT_MS: i64 = 30_000;

const FALLBACK_ON_FAILURE: &str = "fallbackOnFailure";
const MAX_FAILURES: &str = "maxFailures";
const NOTIFICATION_ADDRESS: &str = "notificationAddress";
const RESET_TIMEOUT_MS: &str = "resetTimeoutInMs";
const TIMEOUT_MS: &str = "timeoutInMs";

/// Immutable configuration of a single breaker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerOptions {
    max_failures: u32,
    timeout_ms: i64,
    reset_timeout_ms: i64,
    fallback_on_failure: bool,
    notification_address: Option<String>,
}

impl Default for BreakerOptions {
    fn default() -> Self {
        Self {
            max_failures: DEFAULT_MAX_FAILURES,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            reset_timeout_ms: DEFAULT_RESET_TIMEOUT_MS,
            fallback_on_failure: false,
            notification_address: None,
        }
    }
}

impl BreakerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_failures(mut self, max_failures: u32) -> Self {
        self.max_failures = max_failures;
        self
    }

    /// Set the call timeout in milliseconds. Zero or negative disables it.
    pub fn with_timeout_ms(mut self, timeout_ms: i64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set the open-to-half-open delay in milliseconds. Zero or negative disables auto-reset.
    pub fn with_reset_timeout_ms(mut self, reset_timeout_ms: i64) -> Self {
        self.reset_timeout_ms = reset_timeout_ms;
        self
    }

    pub fn with_fallback_on_failure(mut self, fallback_on_failure: bool) -> Self {
        self.fallback_on_failure = fallback_on_failure;
        self
    }

    pub fn with_notification_address(mut self, address: impl Into<String>) -> Self {
        self.notification_address = Some(address.into());
        self
    }

    pub fn without_notification_address(mut self) -> Self {
        self.notification_address = None;
        self
    }

    pub fn max_failures(&self) -> u32 {
        self.max_failures
    }

    /// Raw timeout value as carried in the record.
    pub fn timeout_ms(&self) -> i64 {
        self.timeout_ms
    }

    /// Raw reset timeout value as carried in the record.
    pub fn reset_timeout_ms(&self) -> i64 {
        self.reset_timeout_ms
    }

    /// Call timeout, or `None` when disabled.
    pub fn timeout(&self) -> Option<Duration> {
        enabled_duration(self.timeout_ms)
    }

    /// Delay before an open breaker admits a trial call, or `None` when auto-reset is disabled.
    pub fn reset_timeout(&self) -> Option<Duration> {
        enabled_duration(self.reset_timeout_ms)
    }

    pub fn fallback_on_failure(&self) -> bool {
        self.fallback_on_failure
    }

    pub fn notification_address(&self) -> Option<&str> {
        self.notification_address.as_deref()
    }

    /// Decode options from a key/value document, starting from the defaults.
    ///
    /// Anything other than a JSON object decodes to the defaults.
    pub fn from_json(value: &Value) -> Self {
        let mut options = Self::default();
        options.merge_json(value);
        options
    }

    /// Apply every well-typed field of `value` on top of the current values.
    pub fn merge_json(&mut self, value: &Value) {
        let Some(map) = value.as_object() else {
            return;
        };

        if let Some(Value::Bool(flag)) = map.get(FALLBACK_ON_FAILURE) {
            self.fallback_on_failure = *flag;
        }
        if let Some(max) = map
            .get(MAX_FAILURES)
            .and_then(integral)
            .and_then(|n| u32::try_from(n).ok())
        {
            self.max_failures = max;
        }
        if let Some(Value::String(address)) = map.get(NOTIFICATION_ADDRESS) {
            self.notification_address = Some(address.clone());
        }
        if let Some(ms) = map.get(RESET_TIMEOUT_MS).and_then(integral) {
            self.reset_timeout_ms = ms;
        }
        if let Some(ms) = map.get(TIMEOUT_MS).and_then(integral) {
            self.timeout_ms = ms;
        }
    }

    /// Encode into the flat record format.
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        map.insert(FALLBACK_ON_FAILURE.into(), Value::Bool(self.fallback_on_failure));
        map.insert(MAX_FAILURES.into(), Value::from(self.max_failures));
        if let Some(address) = &self.notification_address {
            map.insert(NOTIFICATION_ADDRESS.into(), Value::String(address.clone()));
        }
        map.insert(RESET_TIMEOUT_MS.into(), Value::from(self.reset_timeout_ms));
        map.insert(TIMEOUT_MS.into(), Value::from(self.timeout_ms));
        Value::Object(map)
    }
}

fn enabled_duration(ms: i64) -> Option<Duration> {
    u64::try_from(ms)
        .ok()
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis)
}

/// Accept any JSON number, truncating fractions toward zero.
fn integral(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_u64().map(|u| i64::try_from(u).unwrap_or(i64::MAX)))
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        _ => None,
    }
}

impl Serialize for BreakerOptions {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for BreakerOptions {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Self::from_json(&value))
    }
}
