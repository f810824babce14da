//! Guarded call errors.

use std::error::Error;
use std::fmt;
use std::time::Duration;

/// Why a guarded call did not produce the operation's value.
#[derive(Debug)]
pub enum BreakerError<E> {
    /// The breaker is open, or a half-open trial is already running. The operation was
    /// never invoked.
    OpenCircuit { breaker: String },

    /// The operation did not finish within the configured timeout.
    Timeout { breaker: String, after: Duration },

    /// The operation's own failure, unmodified.
    Operation(E),

    /// The fallback failed too.
    Fallback {
        cause: Box<BreakerError<E>>,
        fallback: E,
    },
}

impl<E> BreakerError<E> {
    pub fn is_open_circuit(&self) -> bool {
        matches!(self, BreakerError::OpenCircuit { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, BreakerError::Timeout { .. })
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, BreakerError::Fallback { .. })
    }

    /// The operation's failure, if that is what this is.
    pub fn operation_error(&self) -> Option<&E> {
        match self {
            BreakerError::Operation(e) => Some(e),
            _ => None,
        }
    }

    pub fn into_operation_error(self) -> Option<E> {
        match self {
            BreakerError::Operation(e) => Some(e),
            _ => None,
        }
    }

    /// Short label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            BreakerError::OpenCircuit { .. } => "open_circuit",
            BreakerError::Timeout { .. } => "timeout",
            BreakerError::Operation(_) => "operation",
            BreakerError::Fallback { .. } => "fallback",
        }
    }
}

impl<E: fmt::Display> fmt::Display for BreakerError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BreakerError::OpenCircuit { breaker } => {
                write!(f, "circuit breaker '{}' is open", breaker)
            }
            BreakerError::Timeout { breaker, after } => {
                write!(f, "call through '{}' timed out after {}ms", breaker, after.as_millis())
            }
            BreakerError::Operation(e) => write!(f, "operation failed: {}", e),
            BreakerError::Fallback { cause, fallback } => {
                write!(f, "fallback failed: {} (triggered by: {})", fallback, cause)
            }
        }
    }
}

impl<E> Error for BreakerError<E>
where
    E: Error + 'static,
{
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            BreakerError::Operation(e) => Some(e),
            BreakerError::Fallback { fallback, .. } => Some(fallback),
            _ => None,
        }
    }
}
