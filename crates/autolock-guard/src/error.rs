//! Error types for the session guard

use thiserror::Error;

/// Result type alias for guard operations
pub type Result<T> = std::result::Result<T, GuardError>;

/// Errors surfaced to the host shell
#[derive(Debug, Error)]
pub enum GuardError {
    /// Preference store failure
    #[error("Preference error: {0}")]
    Preference(#[from] PreferenceError),

    /// Invalid configuration or state machine misuse
    #[error("Core error: {0}")]
    Core(#[from] autolock_core::CoreError),

    /// The coordinator task has exited
    #[error("Session guard is no longer running")]
    Stopped,
}

/// Preference store failures
#[derive(Debug, Error)]
pub enum PreferenceError {
    /// Could not determine where preferences live
    #[error("Could not determine config directory")]
    NoConfigDir,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored data could not be parsed
    #[error("Corrupt preference data: {0}")]
    Corrupt(String),

    /// Backing store cannot be used right now
    #[error("Preference store unavailable: {0}")]
    Unavailable(String),
}

impl From<serde_json::Error> for PreferenceError {
    fn from(e: serde_json::Error) -> Self {
        PreferenceError::Corrupt(e.to_string())
    }
}
