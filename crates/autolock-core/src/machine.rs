//! Lock state machine
//!
//! # Architecture: Intent-Returning State Machine
//!
//! - Methods accept the current instant as a parameter
//! - [`LockStateMachine::handle`] returns a [`Transition`] carrying an
//!   optional [`Intent`]
//! - The driver executes intents (shows the prompt) and feeds the outcome
//!   back in as another event
//!
//! The machine never performs I/O, so every decision can be replayed in tests
//! with arbitrary timestamps.

use std::time::{Duration, Instant};

use crate::config::{ErrorPolicy, GuardConfig};
use crate::error::{CoreError, Result};
use crate::types::{AuthOutcome, LifecycleSignal, LockState};

/// Events accepted by the state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardEvent {
    /// First evaluation after the app renders
    ColdStart,
    /// App returned to the foreground
    Resumed,
    /// App moved to the background
    Paused,
    /// App lost focus without being backgrounded
    Inactive,
    /// The gateway finished an attempt
    AuthOutcomeReceived(AuthOutcome),
    /// User pressed "Authenticate" on the lock overlay
    RetryRequested,
}

impl From<LifecycleSignal> for GuardEvent {
    fn from(signal: LifecycleSignal) -> Self {
        match signal {
            LifecycleSignal::Resumed => GuardEvent::Resumed,
            LifecycleSignal::Paused => GuardEvent::Paused,
            LifecycleSignal::Inactive => GuardEvent::Inactive,
        }
    }
}

/// Side effects the driver must carry out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// Start exactly one gateway attempt
    Authenticate,
}

/// Environment facts sampled by the driver at evaluation time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conditions {
    /// Auto-lock preference
    pub enabled: bool,
    /// Capability probe result
    pub available: bool,
}

impl Conditions {
    /// Both the preference and the hardware allow locking
    pub fn can_lock(self) -> bool {
        self.enabled && self.available
    }
}

/// Result of feeding one event to the machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// State before the event
    pub previous: LockState,
    /// State after the event
    pub state: LockState,
    /// Side effect to execute, if any
    pub intent: Option<Intent>,
}

impl Transition {
    /// Whether the event moved the machine or requested work
    pub fn is_noop(&self) -> bool {
        self.previous == self.state && self.intent.is_none()
    }
}

/// The live per-session guard record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionGuard {
    state: LockState,
    last_success_at: Option<Instant>,
    quiet_until: Option<Instant>,
    attempt_in_flight: bool,
}

impl SessionGuard {
    /// Current lock state
    pub fn state(&self) -> LockState {
        self.state
    }

    /// Instant of the most recent successful authentication
    pub fn last_success_at(&self) -> Option<Instant> {
        self.last_success_at
    }

    /// End of the window in which `Resumed` is ignored
    pub fn quiet_until(&self) -> Option<Instant> {
        self.quiet_until
    }

    /// Whether a gateway call is outstanding
    pub fn attempt_in_flight(&self) -> bool {
        self.attempt_in_flight
    }
}

/// Pure decision core of the guard
#[derive(Debug, Clone)]
pub struct LockStateMachine {
    guard: SessionGuard,
    cooldown: Duration,
    error_policy: ErrorPolicy,
}

impl LockStateMachine {
    /// Create an unlocked machine using the cooldown and error policy of `config`
    pub fn new(config: &GuardConfig) -> Self {
        Self {
            guard: SessionGuard::default(),
            cooldown: config.cooldown,
            error_policy: config.error_policy,
        }
    }

    /// Read-only view of the guard record
    pub fn guard(&self) -> &SessionGuard {
        &self.guard
    }

    /// Current lock state
    pub fn state(&self) -> LockState {
        self.guard.state
    }

    /// Configured platform-error policy
    pub fn error_policy(&self) -> ErrorPolicy {
        self.error_policy
    }

    /// True while `now` falls inside the window opened by the last unlock
    pub fn in_cooldown(&self, now: Instant) -> bool {
        self.guard.quiet_until.is_some_and(|until| now < until)
    }

    /// Feed one event and return the resulting transition
    pub fn handle(
        &mut self,
        event: GuardEvent,
        conditions: Conditions,
        now: Instant,
    ) -> Transition {
        let previous = self.guard.state;

        let intent = match event {
            GuardEvent::ColdStart => self.evaluate_lock(conditions),
            GuardEvent::Resumed => {
                if self.in_cooldown(now) {
                    None
                } else {
                    self.evaluate_lock(conditions)
                }
            }
            // Background transitions never unlock or authenticate
            GuardEvent::Paused | GuardEvent::Inactive => None,
            GuardEvent::AuthOutcomeReceived(outcome) => {
                self.apply_outcome(outcome, now);
                None
            }
            GuardEvent::RetryRequested => {
                if self.guard.state == LockState::Locked && !self.guard.attempt_in_flight {
                    Some(Intent::Authenticate)
                } else {
                    None
                }
            }
        };

        Transition {
            previous,
            state: self.guard.state,
            intent,
        }
    }

    /// Mark the start of a gateway call requested by [`Intent::Authenticate`]
    pub fn begin_attempt(&mut self) -> Result<Transition> {
        if self.guard.state != LockState::Locked || self.guard.attempt_in_flight {
            return Err(CoreError::AttemptNotAllowed(self.guard.state));
        }
        self.guard.state = LockState::Authenticating;
        self.guard.attempt_in_flight = true;
        Ok(Transition {
            previous: LockState::Locked,
            state: LockState::Authenticating,
            intent: None,
        })
    }

    fn evaluate_lock(&mut self, conditions: Conditions) -> Option<Intent> {
        if self.guard.state != LockState::Unlocked || !conditions.can_lock() {
            return None;
        }
        self.guard.state = LockState::Locked;
        Some(Intent::Authenticate)
    }

    fn apply_outcome(&mut self, outcome: AuthOutcome, now: Instant) {
        // Stale outcome after the guard was already released
        if self.guard.state == LockState::Unlocked {
            return;
        }
        self.guard.attempt_in_flight = false;

        self.guard.state = match outcome {
            AuthOutcome::Success => {
                self.guard.last_success_at = Some(now);
                self.guard.quiet_until = now.checked_add(self.cooldown);
                LockState::Unlocked
            }
            AuthOutcome::Failed | AuthOutcome::Cancelled => LockState::Locked,
            AuthOutcome::Error(_) => match self.error_policy {
                ErrorPolicy::FailSecure => LockState::Locked,
                // Not a success, but the prompt's own focus change must not re-lock
                ErrorPolicy::FailOpen => {
                    self.guard.quiet_until = now.checked_add(self.cooldown);
                    LockState::Unlocked
                }
            },
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const ON: Conditions = Conditions {
        enabled: true,
        available: true,
    };

    fn ms(base: Instant, offset: u64) -> Instant {
        base + Duration::from_millis(offset)
    }

    fn machine() -> LockStateMachine {
        LockStateMachine::new(&GuardConfig::default().with_enabled(true))
    }

    /// Drive the machine to Unlocked with a success at `at`
    fn unlocked_at(at: Instant) -> LockStateMachine {
        let mut m = machine();
        let t = m.handle(GuardEvent::ColdStart, ON, at);
        assert_eq!(t.intent, Some(Intent::Authenticate));
        m.begin_attempt().unwrap();
        m.handle(GuardEvent::AuthOutcomeReceived(AuthOutcome::Success), ON, at);
        assert_eq!(m.state(), LockState::Unlocked);
        m
    }

    #[rstest]
    #[case(false, true)]
    #[case(true, false)]
    #[case(false, false)]
    fn test_cold_start_without_lock_conditions(#[case] enabled: bool, #[case] available: bool) {
        let mut m = machine();
        let t = m.handle(
            GuardEvent::ColdStart,
            Conditions { enabled, available },
            Instant::now(),
        );
        assert!(t.is_noop());
        assert_eq!(m.state(), LockState::Unlocked);
    }

    #[test]
    fn test_cold_start_locks_then_authenticates() {
        let mut m = machine();
        let now = Instant::now();

        let t = m.handle(GuardEvent::ColdStart, ON, now);
        assert_eq!(t.previous, LockState::Unlocked);
        assert_eq!(t.state, LockState::Locked);
        assert_eq!(t.intent, Some(Intent::Authenticate));
        assert!(!m.guard().attempt_in_flight());

        m.begin_attempt().unwrap();
        assert_eq!(m.state(), LockState::Authenticating);
        assert!(m.guard().attempt_in_flight());

        m.handle(GuardEvent::AuthOutcomeReceived(AuthOutcome::Success), ON, now);
        assert_eq!(m.state(), LockState::Unlocked);
        assert_eq!(m.guard().last_success_at(), Some(now));
        assert!(!m.guard().attempt_in_flight());
    }

    #[test]
    fn test_resume_inside_cooldown_is_ignored() {
        let base = Instant::now();
        let mut m = unlocked_at(base);

        let t = m.handle(GuardEvent::Resumed, ON, ms(base, 500));
        assert!(t.is_noop());
        assert_eq!(m.state(), LockState::Unlocked);

        // 1999ms is still inside a 2000ms window
        let t = m.handle(GuardEvent::Resumed, ON, ms(base, 1999));
        assert!(t.is_noop());
    }

    #[test]
    fn test_resume_after_cooldown_relocks() {
        let base = Instant::now();
        let mut m = unlocked_at(base);

        let t = m.handle(GuardEvent::Resumed, ON, ms(base, 2500));
        assert_eq!(t.state, LockState::Locked);
        assert_eq!(t.intent, Some(Intent::Authenticate));
    }

    #[test]
    fn test_resume_at_cooldown_boundary_relocks() {
        let base = Instant::now();
        let mut m = unlocked_at(base);

        let t = m.handle(GuardEvent::Resumed, ON, ms(base, 2000));
        assert_eq!(t.state, LockState::Locked);
    }

    #[test]
    fn test_resume_while_authenticating_is_ignored() {
        let mut m = machine();
        let now = Instant::now();
        m.handle(GuardEvent::ColdStart, ON, now);
        m.begin_attempt().unwrap();

        let t = m.handle(GuardEvent::Resumed, ON, now);
        assert!(t.is_noop());
        assert_eq!(m.state(), LockState::Authenticating);

        let t = m.handle(GuardEvent::RetryRequested, ON, now);
        assert!(t.is_noop());
        assert!(m.begin_attempt().is_err());
    }

    #[test]
    fn test_resume_while_locked_does_not_reprompt() {
        let mut m = machine();
        let now = Instant::now();
        m.handle(GuardEvent::ColdStart, ON, now);
        m.begin_attempt().unwrap();
        m.handle(GuardEvent::AuthOutcomeReceived(AuthOutcome::Cancelled), ON, now);

        let t = m.handle(GuardEvent::Resumed, ON, now);
        assert!(t.is_noop());
        assert_eq!(m.state(), LockState::Locked);
    }

    #[rstest]
    #[case(AuthOutcome::Failed)]
    #[case(AuthOutcome::Cancelled)]
    #[case(AuthOutcome::Error("sensor timeout".into()))]
    fn test_non_success_stays_locked(#[case] outcome: AuthOutcome) {
        let mut m = machine();
        let now = Instant::now();
        m.handle(GuardEvent::ColdStart, ON, now);
        m.begin_attempt().unwrap();

        let t = m.handle(GuardEvent::AuthOutcomeReceived(outcome), ON, now);
        assert_eq!(t.state, LockState::Locked);
        assert!(!m.guard().attempt_in_flight());
        assert_eq!(m.guard().last_success_at(), None);
    }

    #[test]
    fn test_fail_open_unlocks_on_error_and_suppresses_relock() {
        let config = GuardConfig::default()
            .with_enabled(true)
            .with_error_policy(ErrorPolicy::FailOpen);
        let mut m = LockStateMachine::new(&config);
        let base = Instant::now();
        m.handle(GuardEvent::ColdStart, ON, base);
        m.begin_attempt().unwrap();

        let t = m.handle(
            GuardEvent::AuthOutcomeReceived(AuthOutcome::Error("hw".into())),
            ON,
            base,
        );
        assert_eq!(t.state, LockState::Unlocked);
        assert_eq!(m.guard().last_success_at(), None);
        assert_eq!(m.guard().quiet_until(), Some(ms(base, 2000)));

        // The prompt's focus change right after the error is ignored
        let t = m.handle(GuardEvent::Resumed, ON, ms(base, 10));
        assert!(t.is_noop());
        assert_eq!(m.state(), LockState::Unlocked);

        // Once the window closes the sensor is tried again
        let t = m.handle(GuardEvent::Resumed, ON, ms(base, 2000));
        assert_eq!(t.intent, Some(Intent::Authenticate));
    }

    #[test]
    fn test_retry_has_no_limit() {
        let mut m = machine();
        let now = Instant::now();
        m.handle(GuardEvent::ColdStart, ON, now);
        m.begin_attempt().unwrap();

        for _ in 0..50 {
            m.handle(GuardEvent::AuthOutcomeReceived(AuthOutcome::Failed), ON, now);
            let t = m.handle(GuardEvent::RetryRequested, ON, now);
            assert_eq!(t.intent, Some(Intent::Authenticate));
            m.begin_attempt().unwrap();
        }

        m.handle(GuardEvent::AuthOutcomeReceived(AuthOutcome::Success), ON, now);
        assert_eq!(m.state(), LockState::Unlocked);
    }

    #[rstest]
    #[case(GuardEvent::Paused)]
    #[case(GuardEvent::Inactive)]
    fn test_background_signals_never_change_state(#[case] event: GuardEvent) {
        let mut m = machine();
        let now = Instant::now();
        assert!(m.handle(event.clone(), ON, now).is_noop());

        m.handle(GuardEvent::ColdStart, ON, now);
        assert!(m.handle(event.clone(), ON, now).is_noop());

        m.begin_attempt().unwrap();
        assert!(m.handle(event, ON, now).is_noop());
    }

    #[test]
    fn test_stale_outcome_while_unlocked_is_ignored() {
        let mut m = machine();
        let now = Instant::now();
        let t = m.handle(GuardEvent::AuthOutcomeReceived(AuthOutcome::Success), ON, now);
        assert!(t.is_noop());
        assert_eq!(m.guard().last_success_at(), None);
    }

    #[test]
    fn test_retry_while_unlocked_is_ignored() {
        let mut m = machine();
        assert!(m
            .handle(GuardEvent::RetryRequested, ON, Instant::now())
            .is_noop());
        assert_eq!(
            m.begin_attempt(),
            Err(CoreError::AttemptNotAllowed(LockState::Unlocked))
        );
    }

    #[test]
    fn test_lifecycle_signal_conversion() {
        assert_eq!(GuardEvent::from(LifecycleSignal::Resumed), GuardEvent::Resumed);
        assert_eq!(GuardEvent::from(LifecycleSignal::Paused), GuardEvent::Paused);
        assert_eq!(GuardEvent::from(LifecycleSignal::Inactive), GuardEvent::Inactive);
    }
}
