//! Autolock Core - decision logic for the biometric auto-lock session guard
//!
//! This crate holds the data model and the pure [`LockStateMachine`]. It does
//! no I/O and never reads a clock: every time-dependent decision takes the
//! current instant as a parameter, so the same logic runs in production and
//! under virtual time in tests.
//!
//! # State Machine
//!
//! ```text
//!              ColdStart / Resumed
//!              (enabled, available,
//!               outside cooldown)
//! ┌──────────┐ ───────────────────> ┌────────┐  begin_attempt  ┌────────────────┐
//! │ Unlocked │                      │ Locked │ ──────────────> │ Authenticating │
//! └──────────┘ <─────────────────── └────────┘ <────────────── └────────────────┘
//!       ^          (never directly)      Failed / Cancelled / Error      │
//!       │                                                                │
//!       └──────────────────────── Success ───────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod machine;
pub mod types;

pub use config::{ErrorPolicy, GuardConfig, DEFAULT_COOLDOWN, DEFAULT_REASON};
pub use error::{CoreError, Result};
pub use machine::{Conditions, GuardEvent, Intent, LockStateMachine, SessionGuard, Transition};
pub use types::{AuthOutcome, LifecycleSignal, LockState};
