//! Autolock Guard - runtime side of the biometric auto-lock session guard
//!
//! This crate provides:
//! - Collaborator traits at the platform boundary ([`PreferenceStore`],
//!   [`CapabilityProbe`], [`AuthenticationGateway`], [`LifecycleSignalSource`])
//! - Adapters for those traits (JSON preference file, fprintd command-line
//!   tools, scripted outcomes, broadcast lifecycle bus)
//! - The [`SessionGuardCoordinator`] that drives the core state machine from a
//!   single serialized event loop, and the [`GuardHandle`] the host shell uses

pub mod config;
pub mod coordinator;
pub mod error;
pub mod fprintd;
pub mod gateway;
pub mod lifecycle;
pub mod preferences;
pub mod probe;

pub use config::load_guard_config;
pub use coordinator::{
    Collaborators, GuardHandle, GuardSnapshot, SessionGuardCoordinator, PROBE_TIMEOUT,
};
pub use error::{GuardError, PreferenceError, Result};
pub use fprintd::{FprintdGateway, FprintdProbe};
pub use gateway::{AuthenticationGateway, ScriptedGateway};
pub use lifecycle::{LifecycleBus, LifecycleSignalSource};
pub use preferences::{
    JsonPreferenceStore, MemoryPreferenceStore, PreferenceStore, BIOMETRIC_ENABLED_KEY,
};
pub use probe::{CapabilityProbe, StaticProbe};

pub use autolock_core::{AuthOutcome, ErrorPolicy, GuardConfig, LifecycleSignal, LockState};
