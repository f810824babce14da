//! Reset scheduling.
//!
//! # Responsibilities
//! - Hold the single reset timer of a breaker
//! - Fire once, after the reset timeout, to move OPEN to HALF_OPEN
//!
//! # Design Decisions
//! - Arming aborts the previous timer; superseded timers never linger
//! - The callback carries the epoch it was armed for; the state machine ignores stale fires
//! - Dropping the scheduler aborts the pending timer

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// One timer slot.
#[derive(Debug, Default)]
pub struct ResetScheduler {
    slot: Mutex<Option<JoinHandle<()>>>,
}

impl ResetScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace any pending timer with one that runs `on_fire` after `delay`.
    ///
    /// Returns false when no Tokio runtime is available to host the timer.
    pub fn arm<F>(&self, delay: Duration, on_fire: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = slot.take() {
            previous.abort();
        }

        match Handle::try_current() {
            Ok(runtime) => {
                *slot = Some(runtime.spawn(async move {
                    tokio::time::sleep(delay).await;
                    on_fire();
                }));
                true
            }
            Err(_) => false,
        }
    }

    /// Abort the pending timer, if any.
    pub fn cancel(&self) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(pending) = slot.take() {
            pending.abort();
        }
    }

    /// True while a timer is armed and has not completed.
    pub fn is_armed(&self) -> bool {
        let slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        slot.as_ref().is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for ResetScheduler {
    fn drop(&mut self) {
        let slot = self.slot.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(pending) = slot.take() {
            pending.abort();
        }
    }
}
