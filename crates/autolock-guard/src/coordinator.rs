//! Session guard coordinator
//!
//! One tokio task owns the [`LockStateMachine`] and is the only code that
//! mutates it. Lifecycle signals, gateway completions, and shell commands are
//! all delivered to that task and processed one at a time:
//!
//! ```text
//!  LifecycleSignalSource ──┐
//!                          │   ┌────────────────────────┐   watch    ┌────────────┐
//!  in-flight authenticate ─┼──>│ SessionGuardCoordinator│──────────> │ GuardHandle│
//!                          │   └────────────────────────┘            └────────────┘
//!  GuardHandle commands ───┘               │ Intent::Authenticate
//!                                          v
//!                                AuthenticationGateway
//! ```
//!
//! The authentication future is polled inside the same loop, so signals keep
//! flowing while a prompt is up; the machine drops them as re-entrant.

use std::sync::Arc;
use std::time::{Duration, Instant};

use autolock_core::{
    AuthOutcome, Conditions, GuardConfig, GuardEvent, Intent, LifecycleSignal, LockState,
    LockStateMachine, Transition,
};
use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, OptionFuture};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::load_guard_config;
use crate::error::{GuardError, Result};
use crate::gateway::AuthenticationGateway;
use crate::lifecycle::LifecycleSignalSource;
use crate::preferences::{PreferenceStore, BIOMETRIC_ENABLED_KEY};
use crate::probe::CapabilityProbe;

/// Upper bound on a capability check; a probe that hangs counts as unavailable
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Read-only view of the guard published to the host shell
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuardSnapshot {
    /// Current lock state
    pub state: LockState,
    /// Whether a prompt is outstanding
    pub attempt_in_flight: bool,
    /// Auto-lock preference currently in effect
    pub enabled: bool,
    /// Outcome of the most recent attempt
    pub last_outcome: Option<AuthOutcome>,
    /// Wall-clock time of the most recent unlock
    pub unlocked_at: Option<DateTime<Utc>>,
    /// Attempts started this session
    pub attempts: u64,
}

/// Injected platform collaborators
#[derive(Clone)]
pub struct Collaborators {
    /// Biometric capability check
    pub probe: Arc<dyn CapabilityProbe>,
    /// Native prompt
    pub gateway: Arc<dyn AuthenticationGateway>,
    /// Preference persistence
    pub store: Arc<dyn PreferenceStore>,
}

/// Commands from the host shell
enum Command {
    Retry,
    Cancel,
    SetEnabled(bool, oneshot::Sender<Result<()>>),
    Sync(oneshot::Sender<()>),
    Shutdown,
}

/// Owner of the live session guard
pub struct SessionGuardCoordinator {
    machine: LockStateMachine,
    config: GuardConfig,
    collaborators: Collaborators,
    signals: broadcast::Receiver<LifecycleSignal>,
    commands: mpsc::UnboundedReceiver<Command>,
    snapshot: watch::Sender<GuardSnapshot>,
    in_flight: Option<BoxFuture<'static, AuthOutcome>>,
    attempts: u64,
    last_outcome: Option<AuthOutcome>,
    unlocked_at: Option<DateTime<Utc>>,
}

impl SessionGuardCoordinator {
    /// Seed the configuration from the preference store and start the guard
    pub fn start(
        base: GuardConfig,
        collaborators: Collaborators,
        source: &dyn LifecycleSignalSource,
    ) -> Result<GuardHandle> {
        let config = load_guard_config(collaborators.store.as_ref(), base);
        Self::spawn(config, collaborators, source)
    }

    /// Start the guard with an already resolved configuration
    ///
    /// Subscribes to `source` immediately; the subscription is released when
    /// the coordinator task ends. Must be called within a tokio runtime.
    pub fn spawn(
        config: GuardConfig,
        collaborators: Collaborators,
        source: &dyn LifecycleSignalSource,
    ) -> Result<GuardHandle> {
        config.validate()?;

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let machine = LockStateMachine::new(&config);
        let (snapshot_tx, snapshot_rx) = watch::channel(GuardSnapshot {
            state: machine.state(),
            attempt_in_flight: false,
            enabled: config.enabled,
            last_outcome: None,
            unlocked_at: None,
            attempts: 0,
        });

        let coordinator = Self {
            machine,
            config,
            collaborators,
            signals: source.subscribe(),
            commands: command_rx,
            snapshot: snapshot_tx,
            in_flight: None,
            attempts: 0,
            last_outcome: None,
            unlocked_at: None,
        };

        info!(
            enabled = coordinator.config.enabled,
            cooldown_ms = coordinator.config.cooldown.as_millis() as u64,
            policy = ?coordinator.config.error_policy,
            gateway = coordinator.collaborators.gateway.name(),
            probe = coordinator.collaborators.probe.name(),
            "Starting session guard"
        );

        let task = tokio::spawn(coordinator.run());

        Ok(GuardHandle {
            commands: command_tx,
            snapshot: snapshot_rx,
            task: Some(task),
        })
    }

    async fn run(mut self) {
        self.process(GuardEvent::ColdStart).await;

        loop {
            tokio::select! {
                biased;

                signal = self.signals.recv() => match signal {
                    Ok(signal) => self.process(signal.into()).await,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Lifecycle subscription lagged, {} signals skipped", skipped);
                    }
                    Err(RecvError::Closed) => {
                        info!("Lifecycle source closed");
                        break;
                    }
                },

                Some(outcome) = OptionFuture::from(self.in_flight.as_mut()), if self.in_flight.is_some() => {
                    self.in_flight = None;
                    self.process(GuardEvent::AuthOutcomeReceived(outcome)).await;
                }

                command = self.commands.recv() => match command {
                    Some(Command::Retry) => self.process(GuardEvent::RetryRequested).await,
                    Some(Command::Cancel) => self.cancel_attempt(),
                    Some(Command::SetEnabled(enabled, reply)) => {
                        let _ = reply.send(self.set_enabled(enabled));
                    }
                    Some(Command::Sync(reply)) => {
                        let _ = reply.send(());
                    }
                    Some(Command::Shutdown) | None => break,
                },
            }
        }

        if self.in_flight.take().is_some() {
            debug!("Abandoning in-flight authentication at teardown");
        }
        debug!("Session guard stopped, releasing lifecycle subscription");
    }

    /// Feed one event through the machine and act on the result
    async fn process(&mut self, event: GuardEvent) {
        let now = tokio::time::Instant::now().into_std();
        let enabled = self.config.enabled;
        let available = if enabled && self.could_lock(&event, now) {
            let probe = Arc::clone(&self.collaborators.probe);
            let available = match tokio::time::timeout(PROBE_TIMEOUT, probe.is_available()).await
            {
                Ok(available) => available,
                Err(_) => {
                    warn!(
                        probe = probe.name(),
                        "Capability probe timed out after {:?}", PROBE_TIMEOUT
                    );
                    false
                }
            };
            if !available {
                info!("Biometric hardware unavailable, not locking");
            }
            available
        } else {
            false
        };
        let conditions = Conditions { enabled, available };

        if let GuardEvent::AuthOutcomeReceived(outcome) = &event {
            self.log_outcome(outcome);
            self.last_outcome = Some(outcome.clone());
        }

        let label = event_label(&event);
        let transition = self.machine.handle(event, conditions, now);
        self.log_transition(label, &transition);

        if transition.previous.is_locked() && transition.state == LockState::Unlocked {
            self.unlocked_at = Some(Utc::now());
        }

        if transition.intent == Some(Intent::Authenticate) {
            self.start_attempt();
        }

        self.publish();
    }

    /// Hardware is only probed when the event could actually lock
    fn could_lock(&self, event: &GuardEvent, now: Instant) -> bool {
        if self.machine.state() != LockState::Unlocked {
            return false;
        }
        match event {
            GuardEvent::ColdStart => true,
            GuardEvent::Resumed => !self.machine.in_cooldown(now),
            _ => false,
        }
    }

    fn start_attempt(&mut self) {
        if let Err(e) = self.machine.begin_attempt() {
            warn!("Refusing to start authentication: {}", e);
            return;
        }
        self.attempts += 1;

        let gateway = Arc::clone(&self.collaborators.gateway);
        let reason = self.config.reason.clone();
        let sticky = self.config.sticky;
        self.in_flight = Some(Box::pin(async move {
            gateway.authenticate(&reason, sticky).await
        }));

        info!(attempt = self.attempts, "Authentication prompt requested");
    }

    fn cancel_attempt(&self) {
        if self.in_flight.is_some() {
            info!("Cancelling authentication prompt on request");
            self.collaborators.gateway.cancel();
        } else {
            debug!("Cancel requested with no prompt outstanding");
        }
    }

    fn set_enabled(&mut self, enabled: bool) -> Result<()> {
        self.collaborators
            .store
            .set(BIOMETRIC_ENABLED_KEY, enabled)
            .map_err(|e| {
                warn!("Failed to persist auto-lock preference: {}", e);
                GuardError::from(e)
            })?;

        self.config.enabled = enabled;
        info!("Auto-lock {}", if enabled { "enabled" } else { "disabled" });
        self.publish();
        Ok(())
    }

    fn publish(&self) {
        let guard = self.machine.guard();
        // send_replace updates the value even with no receivers left
        self.snapshot.send_replace(GuardSnapshot {
            state: guard.state(),
            attempt_in_flight: guard.attempt_in_flight(),
            enabled: self.config.enabled,
            last_outcome: self.last_outcome.clone(),
            unlocked_at: self.unlocked_at,
            attempts: self.attempts,
        });
    }

    fn log_outcome(&self, outcome: &AuthOutcome) {
        if outcome.is_expected_failure() {
            info!("Authentication {}, retry available", outcome);
        } else if let AuthOutcome::Error(reason) = outcome {
            warn!(
                policy = ?self.machine.error_policy(),
                "Platform error during authentication: {}", reason
            );
        } else {
            info!("Authentication succeeded");
        }
    }

    fn log_transition(&self, label: &'static str, transition: &Transition) {
        if transition.is_noop() {
            debug!(
                event = label,
                state = %transition.state,
                in_flight = self.machine.guard().attempt_in_flight(),
                "Event had no effect"
            );
        } else {
            info!(
                event = label,
                from = %transition.previous,
                to = %transition.state,
                "Lock state transition"
            );
        }
    }
}

fn event_label(event: &GuardEvent) -> &'static str {
    match event {
        GuardEvent::ColdStart => "cold_start",
        GuardEvent::Resumed => "resumed",
        GuardEvent::Paused => "paused",
        GuardEvent::Inactive => "inactive",
        GuardEvent::AuthOutcomeReceived(_) => "auth_outcome",
        GuardEvent::RetryRequested => "retry",
    }
}

/// Host-shell handle to a running session guard
///
/// Dropping the handle stops the coordinator and releases its lifecycle
/// subscription.
pub struct GuardHandle {
    commands: mpsc::UnboundedSender<Command>,
    snapshot: watch::Receiver<GuardSnapshot>,
    task: Option<JoinHandle<()>>,
}

impl GuardHandle {
    /// Lock state to render right now
    pub fn current_state(&self) -> LockState {
        self.snapshot.borrow().state
    }

    /// Full read-only view of the guard
    pub fn snapshot(&self) -> GuardSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Watch for snapshot changes
    pub fn subscribe(&self) -> watch::Receiver<GuardSnapshot> {
        self.snapshot.clone()
    }

    /// Ask for another prompt; ignored while one is outstanding
    pub fn retry(&self) {
        self.send(Command::Retry);
    }

    /// Dismiss the outstanding prompt, if any
    pub fn cancel(&self) {
        self.send(Command::Cancel);
    }

    /// Persist the auto-lock preference
    ///
    /// Applies from the next evaluation. Disabling never releases a lock that
    /// is already showing; only a successful authentication does.
    pub async fn set_enabled(&self, enabled: bool) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(Command::SetEnabled(enabled, reply_tx))
            .map_err(|_| GuardError::Stopped)?;
        reply_rx.await.map_err(|_| GuardError::Stopped)?
    }

    /// Wait until everything queued before this call has been processed
    pub async fn sync(&self) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(Command::Sync(reply_tx))
            .map_err(|_| GuardError::Stopped)?;
        reply_rx.await.map_err(|_| GuardError::Stopped)
    }

    /// Whether the coordinator task is still running
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop the coordinator and wait for it to release its resources
    pub async fn shutdown(mut self) -> Result<()> {
        // Already-stopped coordinators have dropped the receiver
        let _ = self.commands.send(Command::Shutdown);
        if let Some(task) = self.task.take() {
            task.await.map_err(|e| {
                warn!("Session guard task ended abnormally: {}", e);
                GuardError::Stopped
            })?;
        }
        Ok(())
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            debug!("Session guard is not running, command dropped");
        }
    }
}
