//! Adapters over the fprintd command-line tools (Linux fingerprint daemon)
//!
//! `fprintd-list <user>` reports enrolled fingers and `fprintd-verify` runs a
//! single verification, printing a final line of the form
//! `Verify result: verify-match (done)`.

use std::process::Stdio;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use autolock_core::AuthOutcome;
use tokio::process::Command;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::gateway::AuthenticationGateway;
use crate::probe::CapabilityProbe;

const LIST_PROGRAM: &str = "fprintd-list";
const VERIFY_PROGRAM: &str = "fprintd-verify";
const RESULT_PREFIX: &str = "Verify result:";

/// Longest `fprintd-list` may take before the hardware counts as unavailable
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

fn current_user() -> Option<String> {
    std::env::var("USER")
        .or_else(|_| std::env::var("LOGNAME"))
        .ok()
        .filter(|u| !u.is_empty())
}

/// Probe that asks fprintd whether the current user has enrolled fingers
#[derive(Debug, Clone)]
pub struct FprintdProbe {
    program: String,
    user: Option<String>,
    timeout: Duration,
}

impl FprintdProbe {
    /// Probe for the user running the process
    pub fn new() -> Self {
        Self {
            program: LIST_PROGRAM.to_string(),
            user: current_user(),
            timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    /// Use a different executable (e.g. a wrapper script)
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Ask about `user` instead of the current one
    pub fn for_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Give up on a daemon that does not answer within `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for FprintdProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CapabilityProbe for FprintdProbe {
    async fn is_available(&self) -> bool {
        let Some(user) = &self.user else {
            warn!("Cannot determine current user, treating biometrics as unavailable");
            return false;
        };

        let list = Command::new(&self.program)
            .arg(user)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, list).await {
            Ok(output) => output,
            Err(_) => {
                warn!(
                    "{} did not answer within {:?}, treating biometrics as unavailable",
                    self.program, self.timeout
                );
                return false;
            }
        };

        match output {
            Ok(out) if out.status.success() => {
                let enrolled = has_enrolled_fingers(&String::from_utf8_lossy(&out.stdout));
                debug!("{} reports enrolled={}", self.program, enrolled);
                enrolled
            }
            Ok(out) => {
                debug!("{} exited with {}", self.program, out.status);
                false
            }
            Err(e) => {
                warn!("Failed to run {}: {}", self.program, e);
                false
            }
        }
    }

    fn name(&self) -> &'static str {
        "fprintd"
    }
}

/// Gateway that runs one `fprintd-verify` per attempt
///
/// The verify process is killed when the attempt is cancelled or the pending
/// call is dropped. Each attempt gets its own cancel channel, so a cancel that
/// races with a finished verify cannot leak into the next attempt.
#[derive(Debug)]
pub struct FprintdGateway {
    program: String,
    user: Option<String>,
    cancel: Mutex<Option<oneshot::Sender<()>>>,
}

impl FprintdGateway {
    /// Gateway using the stock `fprintd-verify` for the current user
    pub fn new() -> Self {
        Self {
            program: VERIFY_PROGRAM.to_string(),
            user: None,
            cancel: Mutex::new(None),
        }
    }

    /// Use a different executable (e.g. a wrapper script)
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Verify `user` instead of the current one
    pub fn for_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Whether a verify process is currently running
    pub fn is_verifying(&self) -> bool {
        self.cancel.lock().map(|slot| slot.is_some()).unwrap_or(false)
    }

    fn arm_cancel(&self) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        if let Ok(mut slot) = self.cancel.lock() {
            *slot = Some(tx);
        }
        rx
    }

    fn disarm_cancel(&self) {
        if let Ok(mut slot) = self.cancel.lock() {
            slot.take();
        }
    }

    async fn run_verify(&self, cancelled: oneshot::Receiver<()>) -> AuthOutcome {
        let mut command = Command::new(&self.program);
        if let Some(user) = &self.user {
            command.arg(user);
        }
        let child = command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let child = match child {
            Ok(child) => child,
            Err(e) => return AuthOutcome::Error(format!("failed to start {}: {}", self.program, e)),
        };

        tokio::select! {
            output = child.wait_with_output() => match output {
                Ok(out) => {
                    let stdout = String::from_utf8_lossy(&out.stdout);
                    let outcome = classify_verify_output(&stdout);
                    if let AuthOutcome::Error(_) = &outcome {
                        let stderr = String::from_utf8_lossy(&out.stderr);
                        debug!("{} stderr: {}", self.program, stderr.trim());
                    }
                    outcome
                }
                Err(e) => AuthOutcome::Error(format!("{} failed: {}", self.program, e)),
            },
            // Dropping the wait future drops the child, which kills it
            Ok(()) = cancelled => AuthOutcome::Cancelled,
        }
    }
}

impl Default for FprintdGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthenticationGateway for FprintdGateway {
    async fn authenticate(&self, reason: &str, sticky: bool) -> AuthOutcome {
        // fprintd has no prompt text or focus handling of its own
        info!(sticky, "{}", reason);

        let cancelled = self.arm_cancel();
        let outcome = self.run_verify(cancelled).await;
        self.disarm_cancel();
        outcome
    }

    fn cancel(&self) {
        let pending = self.cancel.lock().ok().and_then(|mut slot| slot.take());
        match pending {
            Some(tx) => {
                let _ = tx.send(());
            }
            None => debug!("No verify running, nothing to cancel"),
        }
    }

    fn name(&self) -> &'static str {
        "fprintd"
    }
}

/// True when `fprintd-list` output names at least one enrolled finger
pub fn has_enrolled_fingers(stdout: &str) -> bool {
    stdout
        .lines()
        .any(|line| line.trim_start().starts_with("- #"))
}

/// Map `fprintd-verify` output to an outcome using its final result line
pub fn classify_verify_output(stdout: &str) -> AuthOutcome {
    let result = stdout
        .lines()
        .rev()
        .find_map(|line| line.trim().strip_prefix(RESULT_PREFIX))
        .and_then(|rest| rest.split_whitespace().next());

    match result {
        Some("verify-match") => AuthOutcome::Success,
        Some("verify-no-match") => AuthOutcome::Failed,
        Some(other) => AuthOutcome::Error(other.to_string()),
        None => {
            let detail = stdout.lines().last().unwrap_or("").trim();
            if detail.is_empty() {
                AuthOutcome::Error("no verify result".to_string())
            } else {
                AuthOutcome::Error(detail.to_string())
            }
        }
    }
}
