//! Stdin command parsing

use std::str::FromStr;

use anyhow::{anyhow, Error};
use autolock_core::LifecycleSignal;

/// One line typed into the shell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellCommand {
    /// Forward a lifecycle transition to the guard
    Signal(LifecycleSignal),
    /// Press "Authenticate" on the lock overlay
    Retry,
    /// Dismiss the outstanding prompt
    Cancel,
    /// Turn auto-lock on and persist it
    Enable,
    /// Turn auto-lock off and persist it
    Disable,
    /// Print the current snapshot
    Status,
    /// Print the command list
    Help,
    /// Stop the guard and exit
    Quit,
}

impl FromStr for ShellCommand {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "resume" | "resumed" | "fg" => Ok(Self::Signal(LifecycleSignal::Resumed)),
            "pause" | "paused" | "bg" => Ok(Self::Signal(LifecycleSignal::Paused)),
            "inactive" | "blur" => Ok(Self::Signal(LifecycleSignal::Inactive)),
            "retry" | "auth" => Ok(Self::Retry),
            "cancel" => Ok(Self::Cancel),
            "enable" => Ok(Self::Enable),
            "disable" => Ok(Self::Disable),
            "status" => Ok(Self::Status),
            "help" | "?" => Ok(Self::Help),
            "quit" | "exit" | "q" => Ok(Self::Quit),
            other => Err(anyhow!("unknown command `{}`, type `help` for a list", other)),
        }
    }
}

pub const HELP: &str = "\
commands:
  resume     app returned to the foreground
  pause      app moved to the background
  inactive   app lost focus
  retry      show the prompt again after a failure
  cancel     dismiss the outstanding prompt
  enable     turn auto-lock on
  disable    turn auto-lock off
  status     print the guard snapshot
  quit       stop the guard and exit";
