//! Guard configuration
//!
//! The cooldown window exists because presenting the native biometric prompt
//! makes the host OS report a background/foreground transition of its own.
//! Without the window the guard would re-lock immediately after every
//! successful unlock.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Default cooldown after a successful unlock (2 seconds)
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(2);

/// Default prompt text shown by the gateway
pub const DEFAULT_REASON: &str = "Authenticate to unlock";

/// Longest accepted cooldown; anything longer effectively disables the lock
const MAX_COOLDOWN: Duration = Duration::from_secs(5 * 60);

/// What to do when the gateway reports a platform error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorPolicy {
    /// Stay locked and offer retry
    #[default]
    FailSecure,
    /// Unlock so a broken sensor cannot strand the user
    FailOpen,
}

/// Guard configuration, seeded at startup from the preference store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Whether auto-lock is switched on
    #[serde(default)]
    pub enabled: bool,

    /// Window after a success during which `Resumed` is ignored
    #[serde(default = "default_cooldown")]
    pub cooldown: Duration,

    /// Platform-error policy
    #[serde(default)]
    pub error_policy: ErrorPolicy,

    /// Prompt text handed to the gateway
    #[serde(default = "default_reason")]
    pub reason: String,

    /// Ask the gateway to keep its prompt across a brief focus loss
    #[serde(default = "default_sticky")]
    pub sticky: bool,
}

fn default_cooldown() -> Duration {
    DEFAULT_COOLDOWN
}

fn default_reason() -> String {
    DEFAULT_REASON.to_string()
}

fn default_sticky() -> bool {
    true
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            cooldown: DEFAULT_COOLDOWN,
            error_policy: ErrorPolicy::FailSecure,
            reason: default_reason(),
            sticky: true,
        }
    }
}

impl GuardConfig {
    /// Enabled config with a short cooldown
    pub fn strict() -> Self {
        Self {
            enabled: true,
            cooldown: Duration::from_millis(750),
            ..Self::default()
        }
    }

    /// Enabled config that tolerates slow OS overlays
    ///
    /// Leaves the error policy at [`ErrorPolicy::FailSecure`]; opting into
    /// fail-open is always a separate, explicit choice.
    pub fn relaxed() -> Self {
        Self {
            enabled: true,
            cooldown: Duration::from_secs(5),
            ..Self::default()
        }
    }

    /// Builder-style override of the enabled flag
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Builder-style override of the cooldown
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Builder-style override of the error policy
    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    /// Check the configuration for values the guard cannot honor
    pub fn validate(&self) -> Result<()> {
        if self.cooldown > MAX_COOLDOWN {
            return Err(CoreError::InvalidConfig(format!(
                "cooldown {:?} exceeds maximum of {:?}",
                self.cooldown, MAX_COOLDOWN
            )));
        }
        if self.reason.trim().is_empty() {
            return Err(CoreError::InvalidConfig(
                "prompt reason must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
