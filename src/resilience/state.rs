//! Breaker state machine.
//!
//! # States
//! - Closed: calls pass through
//! - Open: calls fail fast
//! - HalfOpen: exactly one trial call may pass through
//!
//! # State Transitions
//! ```text
//! Closed → Closed:   success (failure_count := 0) or failure below threshold (failure_count += 1)
//! Closed → Open:     failure_count + 1 >= max_failures
//! Open → HalfOpen:   reset deadline reached (timer or admitting call)
//! HalfOpen → Closed: trial succeeds
//! HalfOpen → Open:   trial fails
//! any → Closed:      manual reset
//! ```
//!
//! # Design Decisions
//! - Pure bookkeeping: no clocks, tasks or I/O; the caller passes `now` and owns the lock
//! - Every state change bumps an epoch so stale timers and permits can be recognised
//! - Outcomes of calls admitted before a state change never drive transitions

use std::fmt;
use std::time::{Duration, Instant, SystemTime};

use serde::{Deserialize, Serialize};

/// Operational mode of a breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl BreakerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakerState::Closed => "CLOSED",
            BreakerState::Open => "OPEN",
            BreakerState::HalfOpen => "HALF_OPEN",
        }
    }

    /// Numeric form exported as the state gauge.
    pub fn gauge_value(&self) -> f64 {
        match self {
            BreakerState::Closed => 0.0,
            BreakerState::Open => 1.0,
            BreakerState::HalfOpen => 2.0,
        }
    }
}

impl fmt::Display for BreakerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A state change produced by the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Opened,
    HalfOpened,
    Closed,
}

impl Transition {
    pub fn target(&self) -> BreakerState {
        match self {
            Transition::Opened => BreakerState::Open,
            Transition::HalfOpened => BreakerState::HalfOpen,
            Transition::Closed => BreakerState::Closed,
        }
    }
}

/// Proof that a call was admitted, tied to the epoch it was admitted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    pub epoch: u64,
    pub trial: bool,
}

#[derive(Debug)]
pub struct StateMachine {
    max_failures: u32,
    state: BreakerState,
    failure_count: u32,
    opened_at: Option<Instant>,
    opened_at_wall: Option<SystemTime>,
    trial_in_flight: bool,
    epoch: u64,
}

impl StateMachine {
    pub fn new(max_failures: u32) -> Self {
        Self {
            max_failures,
            state: BreakerState::Closed,
            failure_count: 0,
            opened_at: None,
            opened_at_wall: None,
            trial_in_flight: false,
            epoch: 0,
        }
    }

    pub fn state(&self) -> BreakerState {
        self.state
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    pub fn opened_at(&self) -> Option<Instant> {
        self.opened_at
    }

    pub fn opened_at_wall(&self) -> Option<SystemTime> {
        self.opened_at_wall
    }

    pub fn trial_in_flight(&self) -> bool {
        self.trial_in_flight
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Decide whether a call may proceed.
    ///
    /// An open breaker whose reset deadline has passed moves to half-open first, so the
    /// admitted call becomes the trial. Returns the ticket (if admitted) and any transition
    /// taken on the way.
    pub fn admit(
        &mut self,
        now: Instant,
        reset_timeout: Option<Duration>,
    ) -> (Option<Ticket>, Option<Transition>) {
        let mut transition = None;

        if self.state == BreakerState::Open && self.reset_due(now, reset_timeout) {
            self.half_open();
            transition = Some(Transition::HalfOpened);
        }

        let ticket = match self.state {
            BreakerState::Closed => Some(Ticket {
                epoch: self.epoch,
                trial: false,
            }),
            BreakerState::HalfOpen => self.try_acquire_trial(),
            BreakerState::Open => None,
        };

        (ticket, transition)
    }

    fn reset_due(&self, now: Instant, reset_timeout: Option<Duration>) -> bool {
        match (self.opened_at, reset_timeout) {
            (Some(opened_at), Some(delay)) => now.saturating_duration_since(opened_at) >= delay,
            _ => false,
        }
    }

    /// Compare-and-set of the single trial slot.
    fn try_acquire_trial(&mut self) -> Option<Ticket> {
        if self.trial_in_flight {
            return None;
        }
        self.trial_in_flight = true;
        Some(Ticket {
            epoch: self.epoch,
            trial: true,
        })
    }

    /// Give the trial slot back if it still belongs to `epoch`.
    pub fn release_trial(&mut self, epoch: u64) {
        if self.epoch == epoch && self.state == BreakerState::HalfOpen {
            self.trial_in_flight = false;
        }
    }

    /// A non-trial ticket still counts only in the closed epoch that issued it.
    fn is_current(&self, ticket: Ticket) -> bool {
        self.state == BreakerState::Closed && self.epoch == ticket.epoch
    }

    pub fn on_success(&mut self, ticket: Ticket) -> Option<Transition> {
        if ticket.trial {
            if self.state == BreakerState::HalfOpen && self.epoch == ticket.epoch {
                self.close();
                return Some(Transition::Closed);
            }
            return None;
        }

        if self.is_current(ticket) {
            self.failure_count = 0;
        }
        None
    }

    pub fn on_failure(&mut self, ticket: Ticket, now: Instant) -> Option<Transition> {
        if ticket.trial {
            if self.state == BreakerState::HalfOpen && self.epoch == ticket.epoch {
                self.open(now);
                return Some(Transition::Opened);
            }
            return None;
        }

        if !self.is_current(ticket) {
            return None;
        }

        if self.failure_count.saturating_add(1) >= self.max_failures {
            self.open(now);
            Some(Transition::Opened)
        } else {
            self.failure_count += 1;
            None
        }
    }

    /// Reset timer callback. Only acts on the open epoch that armed it.
    pub fn fire_reset(&mut self, epoch: u64) -> Option<Transition> {
        if self.state == BreakerState::Open && self.epoch == epoch {
            self.half_open();
            Some(Transition::HalfOpened)
        } else {
            None
        }
    }

    /// Operator reset: force CLOSED from any state.
    pub fn reset(&mut self) -> Option<Transition> {
        if self.state == BreakerState::Closed {
            self.failure_count = 0;
            return None;
        }
        self.close();
        Some(Transition::Closed)
    }

    /// Operator trip: force OPEN unless already open.
    pub fn force_open(&mut self, now: Instant) -> Option<Transition> {
        if self.state == BreakerState::Open {
            return None;
        }
        self.open(now);
        Some(Transition::Opened)
    }

    fn open(&mut self, now: Instant) {
        self.state = BreakerState::Open;
        self.failure_count = self.failure_count.max(self.max_failures);
        self.opened_at = Some(now);
        self.opened_at_wall = Some(SystemTime::now());
        self.trial_in_flight = false;
        self.epoch += 1;
    }

    fn half_open(&mut self) {
        self.state = BreakerState::HalfOpen;
        self.trial_in_flight = false;
        self.epoch += 1;
    }

    fn close(&mut self) {
        self.state = BreakerState::Closed;
        self.failure_count = 0;
        self.opened_at = None;
        self.opened_at_wall = None;
        self.trial_in_flight = false;
        self.epoch += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESET: Option<Duration> = Some(Duration::from_secs(30));

    fn admit(machine: &mut StateMachine) -> Ticket {
        machine.admit(Instant::now(), RESET).0.unwrap()
    }

    #[test]
    fn test_starts_closed() {
        let machine = StateMachine::new(3);
        assert_eq!(machine.state(), BreakerState::Closed);
        assert_eq!(machine.failure_count(), 0);
        assert!(machine.opened_at().is_none());
    }

    #[test]
    fn test_opens_exactly_at_threshold() {
        let mut machine = StateMachine::new(3);
        let mut transitions = Vec::new();
        for _ in 0..3 {
            let ticket = admit(&mut machine);
            transitions.push(machine.on_failure(ticket, Instant::now()));
        }
        assert_eq!(transitions, vec![None, None, Some(Transition::Opened)]);
        assert_eq!(machine.state(), BreakerState::Open);
        assert_eq!(machine.failure_count(), 3);
        assert!(machine.opened_at().is_some());
    }

    #[test]
    fn test_success_resets_failure_count() {
        let mut machine = StateMachine::new(3);
        let ticket = admit(&mut machine);
        machine.on_failure(ticket, Instant::now());
        let ticket = admit(&mut machine);
        machine.on_failure(ticket, Instant::now());
        assert_eq!(machine.failure_count(), 2);

        let ticket = admit(&mut machine);
        assert_eq!(machine.on_success(ticket), None);
        assert_eq!(machine.failure_count(), 0);
    }

    #[test]
    fn test_zero_threshold_opens_on_first_failure() {
        let mut machine = StateMachine::new(0);
        let ticket = admit(&mut machine);
        assert_eq!(machine.on_failure(ticket, Instant::now()), Some(Transition::Opened));
        assert_eq!(machine.failure_count(), 0);
    }

    #[test]
    fn test_open_rejects_until_deadline() {
        let mut machine = StateMachine::new(1);
        let opened = Instant::now();
        let ticket = admit(&mut machine);
        machine.on_failure(ticket, opened);

        let (ticket, transition) = machine.admit(opened + Duration::from_secs(29), RESET);
        assert!(ticket.is_none());
        assert!(transition.is_none());

        let (ticket, transition) = machine.admit(opened + Duration::from_secs(30), RESET);
        assert_eq!(transition, Some(Transition::HalfOpened));
        assert!(ticket.unwrap().trial);
        assert!(machine.trial_in_flight());
    }

    #[test]
    fn test_open_is_terminal_without_reset_timeout() {
        let mut machine = StateMachine::new(1);
        let ticket = admit(&mut machine);
        machine.on_failure(ticket, Instant::now());

        let later = Instant::now() + Duration::from_secs(3600);
        assert_eq!(machine.admit(later, None), (None, None));
        assert_eq!(machine.reset(), Some(Transition::Closed));
        assert_eq!(machine.state(), BreakerState::Closed);
    }

    #[test]
    fn test_single_trial_permit() {
        let mut machine = StateMachine::new(1);
        let ticket = admit(&mut machine);
        machine.on_failure(ticket, Instant::now());
        let epoch = machine.epoch();
        assert_eq!(machine.fire_reset(epoch), Some(Transition::HalfOpened));

        let trial = admit(&mut machine);
        assert!(trial.trial);
        assert_eq!(machine.admit(Instant::now(), RESET), (None, None));

        machine.release_trial(trial.epoch);
        assert!(!machine.trial_in_flight());
        assert!(admit(&mut machine).trial);
    }

    #[test]
    fn test_trial_success_closes() {
        let mut machine = StateMachine::new(2);
        machine.force_open(Instant::now());
        machine.fire_reset(machine.epoch());

        let trial = admit(&mut machine);
        assert_eq!(machine.on_success(trial), Some(Transition::Closed));
        assert_eq!(machine.state(), BreakerState::Closed);
        assert_eq!(machine.failure_count(), 0);
        assert!(machine.opened_at().is_none());
    }

    #[test]
    fn test_trial_failure_reopens_with_fresh_timestamp() {
        let mut machine = StateMachine::new(2);
        let first = Instant::now();
        machine.force_open(first);
        machine.fire_reset(machine.epoch());

        let trial = admit(&mut machine);
        let later = first + Duration::from_millis(5);
        assert_eq!(machine.on_failure(trial, later), Some(Transition::Opened));
        assert_eq!(machine.state(), BreakerState::Open);
        assert_eq!(machine.opened_at(), Some(later));
        assert_eq!(machine.failure_count(), 2);
    }

    #[test]
    fn test_stale_timer_is_ignored() {
        let mut machine = StateMachine::new(1);
        machine.force_open(Instant::now());
        let stale = machine.epoch();
        machine.reset();
        machine.force_open(Instant::now());
        assert_eq!(machine.fire_reset(stale), None);
        assert_eq!(machine.state(), BreakerState::Open);
    }

    #[test]
    fn test_stale_outcomes_do_not_drive_transitions() {
        let mut machine = StateMachine::new(1);
        let late = admit(&mut machine);
        machine.force_open(Instant::now());
        machine.fire_reset(machine.epoch());

        // A non-trial success arriving in half-open must not close the breaker.
        assert_eq!(machine.on_success(late), None);
        assert_eq!(machine.on_failure(late, Instant::now()), None);
        assert_eq!(machine.state(), BreakerState::HalfOpen);
    }

    #[test]
    fn test_outcomes_from_an_earlier_closed_epoch_are_ignored() {
        let mut machine = StateMachine::new(2);
        let late = admit(&mut machine);
        machine.force_open(Instant::now());
        machine.reset();
        assert_eq!(machine.state(), BreakerState::Closed);

        let current = admit(&mut machine);
        assert_eq!(machine.on_failure(current, Instant::now()), None);
        assert_eq!(machine.failure_count(), 1);

        // Neither outcome of the earlier call touches the fresh count.
        assert_eq!(machine.on_failure(late, Instant::now()), None);
        assert_eq!(machine.failure_count(), 1);
        assert_eq!(machine.on_success(late), None);
        assert_eq!(machine.failure_count(), 1);
        assert_eq!(machine.state(), BreakerState::Closed);
    }

    #[test]
    fn test_state_names() {
        assert_eq!(BreakerState::HalfOpen.to_string(), "HALF_OPEN");
        assert_eq!(
            serde_json::to_value(BreakerState::HalfOpen).unwrap(),
            serde_json::json!("HALF_OPEN")
        );
    }
}
