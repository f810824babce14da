//! Circuit breaker for remote call protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: dependency assumed down, calls fail fast
//! - Half-Open: a single trial call tests whether it recovered
//!
//! # Call Flow
//! ```text
//! execute(op)
//!     → admit (under lock): Closed → go, Open → reject, HalfOpen → take the trial permit or reject
//!     → run op outside the lock, raced against timeouts.rs
//!     → record outcome (under lock), arm/cancel reset.rs
//!     → publish events, update metrics (lock released)
//!     → fallback when enabled and the call did not succeed
//! ```
//!
//! # Design Decisions
//! - Per-dependency breaker (not global), cheap to clone
//! - Bookkeeping is serialized, operation bodies are not
//! - Single trial in Half-Open (prevents hammering a recovering dependency)
//! - The trial permit is a drop guard, so it is returned however the call ends

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::config::options::BreakerOptions;
use crate::notification::{EventKind, NotificationChannel, Publisher};
use crate::observability::metrics::{self, CallOutcome};
use crate::resilience::error::BreakerError;
use crate::resilience::reset::ResetScheduler;
use crate::resilience::state::{BreakerState, StateMachine, Ticket, Transition};
use crate::resilience::timeouts::with_timeout;

/// Point-in-time view of a breaker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakerSnapshot {
    pub name: String,
    pub state: BreakerState,
    pub failure_count: u32,
    /// Milliseconds since the Unix epoch of the last open transition.
    pub opened_at: Option<u64>,
    pub trial_in_flight: bool,
    pub options: BreakerOptions,
}

/// A change that happened under the lock and still needs announcing.
struct Announcement {
    transition: Transition,
    failure_count: u32,
}

struct Shared {
    name: String,
    options: BreakerOptions,
    machine: Mutex<StateMachine>,
    scheduler: ResetScheduler,
    publisher: Publisher,
}

/// Guards calls to one remote dependency.
#[derive(Clone)]
pub struct CircuitBreaker {
    inner: Arc<Shared>,
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.inner.name)
            .field("state", &self.state())
            .field("failure_count", &self.failure_count())
            .finish()
    }
}

impl CircuitBreaker {
    /// Create a breaker that publishes nowhere.
    pub fn new(name: impl Into<String>, options: BreakerOptions) -> Self {
        Self::build(name.into(), options, None)
    }

    /// Create a breaker publishing to `channel` when its options name an address.
    pub fn with_channel(
        name: impl Into<String>,
        options: BreakerOptions,
        channel: Arc<dyn NotificationChannel>,
    ) -> Self {
        Self::build(name.into(), options, Some(channel))
    }

    fn build(
        name: String,
        options: BreakerOptions,
        channel: Option<Arc<dyn NotificationChannel>>,
    ) -> Self {
        tracing::info!(
            breaker = %name,
            max_failures = options.max_failures(),
            timeout_ms = options.timeout_ms(),
            reset_timeout_ms = options.reset_timeout_ms(),
            fallback_on_failure = options.fallback_on_failure(),
            "Circuit breaker initialized"
        );
        metrics::record_state(&name, BreakerState::Closed);

        let publisher = Publisher::new(
            name.clone(),
            options.notification_address().map(str::to_string),
            channel,
        );

        Self {
            inner: Arc::new(Shared {
                machine: Mutex::new(StateMachine::new(options.max_failures())),
                scheduler: ResetScheduler::new(),
                publisher,
                options,
                name,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn options(&self) -> &BreakerOptions {
        &self.inner.options
    }

    pub fn state(&self) -> BreakerState {
        self.lock().state()
    }

    pub fn failure_count(&self) -> u32 {
        self.lock().failure_count()
    }

    /// When the breaker last opened, while it is open or half-open.
    pub fn opened_at(&self) -> Option<Instant> {
        self.lock().opened_at()
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let machine = self.lock();
        BreakerSnapshot {
            name: self.inner.name.clone(),
            state: machine.state(),
            failure_count: machine.failure_count(),
            opened_at: machine.opened_at_wall().map(epoch_millis),
            trial_in_flight: machine.trial_in_flight(),
            options: self.inner.options.clone(),
        }
    }

    /// Run `operation` through the breaker.
    pub async fn execute<T, E, F, Fut>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.guarded(operation).await
    }

    /// Run `operation` through the breaker, answering with `fallback` when the call is
    /// rejected or fails and the options enable fallback.
    ///
    /// The breaker always accounts for the original outcome, whatever the fallback returns.
    pub async fn execute_with_fallback<T, E, F, Fut, FB, FBFut>(
        &self,
        operation: F,
        fallback: FB,
    ) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        FB: FnOnce(&BreakerError<E>) -> FBFut,
        FBFut: Future<Output = Result<T, E>>,
    {
        match self.guarded(operation).await {
            Ok(value) => Ok(value),
            Err(cause) if self.inner.options.fallback_on_failure() => {
                match fallback(&cause).await {
                    Ok(value) => {
                        metrics::record_fallback(&self.inner.name, true);
                        tracing::debug!(breaker = %self.inner.name, cause = cause.kind(), "Fallback answered");
                        Ok(value)
                    }
                    Err(e) => {
                        metrics::record_fallback(&self.inner.name, false);
                        Err(BreakerError::Fallback {
                            cause: Box::new(cause),
                            fallback: e,
                        })
                    }
                }
            }
            Err(cause) => Err(cause),
        }
    }

    async fn guarded<T, E, F, Fut>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let (ticket, announcement) = {
            let mut machine = self.lock();
            let (ticket, transition) =
                machine.admit(Instant::now(), self.inner.options.reset_timeout());
            let announcement = self.schedule(&machine, transition);
            (ticket, announcement)
        };
        self.announce(announcement);

        let Some(ticket) = ticket else {
            metrics::record_call(&self.inner.name, CallOutcome::Rejected, None);
            tracing::debug!(breaker = %self.inner.name, "Call rejected, circuit open");
            return Err(BreakerError::OpenCircuit {
                breaker: self.inner.name.clone(),
            });
        };

        let _permit = ticket.trial.then(|| TrialPermit {
            shared: &self.inner,
            epoch: ticket.epoch,
        });

        let started = Instant::now();
        let outcome = with_timeout(self.inner.options.timeout(), operation()).await;
        let elapsed = started.elapsed();

        match outcome {
            Ok(Ok(value)) => {
                self.record_success(ticket);
                metrics::record_call(&self.inner.name, CallOutcome::Success, Some(elapsed));
                Ok(value)
            }
            Ok(Err(e)) => {
                self.record_failure(ticket);
                metrics::record_call(&self.inner.name, CallOutcome::Failure, Some(elapsed));
                Err(BreakerError::Operation(e))
            }
            Err(timeout) => {
                tracing::warn!(
                    breaker = %self.inner.name,
                    timeout_ms = timeout.after.as_millis() as u64,
                    "Call timed out"
                );
                self.record_failure(ticket);
                metrics::record_call(&self.inner.name, CallOutcome::Timeout, Some(elapsed));
                Err(BreakerError::Timeout {
                    breaker: self.inner.name.clone(),
                    after: timeout.after,
                })
            }
        }
    }

    fn record_success(&self, ticket: Ticket) {
        let announcement = {
            let mut machine = self.lock();
            let transition = machine.on_success(ticket);
            self.schedule(&machine, transition)
        };
        self.announce(announcement);
    }

    fn record_failure(&self, ticket: Ticket) {
        let (announcement, state, failure_count) = {
            let mut machine = self.lock();
            let transition = machine.on_failure(ticket, Instant::now());
            let announcement = self.schedule(&machine, transition);
            (announcement, machine.state(), machine.failure_count())
        };
        self.inner
            .publisher
            .publish(EventKind::Failure, state, failure_count);
        self.announce(announcement);
    }

    /// Force the breaker closed and forget its failures.
    pub fn reset(&self) {
        let announcement = {
            let mut machine = self.lock();
            let transition = machine.reset();
            self.schedule(&machine, transition)
        };
        tracing::warn!(breaker = %self.inner.name, "Circuit breaker manually reset");
        self.announce(announcement);
    }

    /// Force the breaker open, as if the failure threshold had been crossed.
    pub fn force_open(&self) {
        let announcement = {
            let mut machine = self.lock();
            let transition = machine.force_open(Instant::now());
            self.schedule(&machine, transition)
        };
        tracing::warn!(breaker = %self.inner.name, "Circuit breaker forced open");
        self.announce(announcement);
    }

    /// Arm or cancel the reset timer for `transition`. Runs under the machine lock.
    fn schedule(
        &self,
        machine: &StateMachine,
        transition: Option<Transition>,
    ) -> Option<Announcement> {
        let transition = transition?;
        match transition {
            Transition::Opened => match self.inner.options.reset_timeout() {
                Some(delay) => {
                    let weak = Arc::downgrade(&self.inner);
                    let epoch = machine.epoch();
                    let armed = self
                        .inner
                        .scheduler
                        .arm(delay, move || fire_reset(weak, epoch));
                    if !armed {
                        tracing::warn!(
                            breaker = %self.inner.name,
                            "No runtime for reset timer; next call after the deadline will probe"
                        );
                    }
                }
                None => self.inner.scheduler.cancel(),
            },
            Transition::HalfOpened | Transition::Closed => self.inner.scheduler.cancel(),
        }
        Some(Announcement {
            transition,
            failure_count: machine.failure_count(),
        })
    }

    fn announce(&self, announcement: Option<Announcement>) {
        if let Some(announcement) = announcement {
            announce(&self.inner, announcement);
        }
    }

    fn lock(&self) -> MutexGuard<'_, StateMachine> {
        lock_machine(&self.inner)
    }
}

fn lock_machine(shared: &Shared) -> MutexGuard<'_, StateMachine> {
    shared.machine.lock().unwrap_or_else(PoisonError::into_inner)
}

fn announce(shared: &Shared, announcement: Announcement) {
    let Announcement {
        transition,
        failure_count,
    } = announcement;
    let state = transition.target();

    match transition {
        Transition::Opened => tracing::warn!(
            breaker = %shared.name,
            state = %state,
            failure_count,
            reset_timeout_ms = shared.options.reset_timeout_ms(),
            "Circuit breaker opened (failing fast)"
        ),
        Transition::HalfOpened => tracing::info!(
            breaker = %shared.name,
            state = %state,
            failure_count,
            "Circuit breaker half-open (admitting one trial call)"
        ),
        Transition::Closed => tracing::info!(
            breaker = %shared.name,
            state = %state,
            failure_count,
            "Circuit breaker closed"
        ),
    }

    metrics::record_transition(&shared.name, state);
    shared
        .publisher
        .publish(EventKind::from(transition), state, failure_count);
}

/// Reset timer callback.
fn fire_reset(weak: Weak<Shared>, epoch: u64) {
    let Some(shared) = weak.upgrade() else {
        return;
    };
    let announcement = {
        let mut machine = lock_machine(&shared);
        machine
            .fire_reset(epoch)
            .map(|transition| Announcement {
                transition,
                failure_count: machine.failure_count(),
            })
    };
    if let Some(announcement) = announcement {
        announce(&shared, announcement);
    }
}

/// Holds the half-open trial slot until dropped.
struct TrialPermit<'a> {
    shared: &'a Shared,
    epoch: u64,
}

impl Drop for TrialPermit<'_> {
    fn drop(&mut self) {
        lock_machine(self.shared).release_trial(self.epoch);
    }
}

fn epoch_millis(at: SystemTime) -> u64 {
    at.duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}
