//! Error types for the core state machine

use thiserror::Error;

use crate::types::LockState;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised by the state machine and configuration validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// An attempt was started from a state that does not allow it
    #[error("Cannot start an authentication attempt while {0}")]
    AttemptNotAllowed(LockState),

    /// Configuration failed validation
    #[error("Invalid guard configuration: {0}")]
    InvalidConfig(String),
}
