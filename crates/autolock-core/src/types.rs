//! Core value types shared by the state machine and its drivers

use std::fmt;

use serde::{Deserialize, Serialize};

/// Whether app content may be shown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockState {
    /// Content is visible
    #[default]
    Unlocked,
    /// Content is hidden; no prompt is showing
    Locked,
    /// Content is hidden and an authentication prompt is in flight
    Authenticating,
}

impl LockState {
    /// True when content must stay behind the lock overlay
    pub fn is_locked(self) -> bool {
        !matches!(self, LockState::Unlocked)
    }
}

impl fmt::Display for LockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LockState::Unlocked => "unlocked",
            LockState::Locked => "locked",
            LockState::Authenticating => "authenticating",
        };
        f.write_str(name)
    }
}

/// Result of a single authentication prompt
///
/// Gateways normalize every platform-specific failure into
/// [`AuthOutcome::Error`], so this is the complete set of outcomes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "reason", rename_all = "lowercase")]
pub enum AuthOutcome {
    /// Biometric matched
    Success,
    /// Biometric did not match
    Failed,
    /// User dismissed the prompt
    Cancelled,
    /// Hardware or platform failure
    Error(String),
}

impl AuthOutcome {
    /// Outcomes the user can resolve by simply trying again
    pub fn is_expected_failure(&self) -> bool {
        matches!(self, AuthOutcome::Failed | AuthOutcome::Cancelled)
    }
}

impl fmt::Display for AuthOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthOutcome::Success => f.write_str("success"),
            AuthOutcome::Failed => f.write_str("failed"),
            AuthOutcome::Cancelled => f.write_str("cancelled"),
            AuthOutcome::Error(reason) => write!(f, "error: {}", reason),
        }
    }
}

/// Foreground/background transition reported by the host framework
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleSignal {
    /// App returned to the foreground
    Resumed,
    /// App moved to the background
    Paused,
    /// App lost focus but is still visible (e.g. a system overlay)
    Inactive,
}
