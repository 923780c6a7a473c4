//! Startup configuration loading

use autolock_core::GuardConfig;
use tracing::{info, warn};

use crate::preferences::{PreferenceStore, BIOMETRIC_ENABLED_KEY};

/// Seed a guard configuration from the preference store
///
/// A preference that cannot be read disables the guard rather than risking a
/// permanent lock-out; the failure is logged. This fail-open rule applies to
/// the preference read only, never to authentication outcomes.
pub fn load_guard_config(store: &dyn PreferenceStore, base: GuardConfig) -> GuardConfig {
    let enabled = match store.get(BIOMETRIC_ENABLED_KEY) {
        Ok(Some(enabled)) => enabled,
        Ok(None) => {
            info!("No auto-lock preference stored, defaulting to disabled");
            false
        }
        Err(e) => {
            warn!("Failed to read auto-lock preference, defaulting to disabled: {}", e);
            false
        }
    };

    GuardConfig { enabled, ..base }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PreferenceError;
    use crate::preferences::MemoryPreferenceStore;
    use std::time::Duration;

    struct BrokenStore;

    impl PreferenceStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<bool>, PreferenceError> {
            Err(PreferenceError::Corrupt("truncated".to_string()))
        }

        fn set(&self, _key: &str, _value: bool) -> Result<(), PreferenceError> {
            Err(PreferenceError::Unavailable("read-only".to_string()))
        }
    }

    #[test]
    fn test_reads_enabled_preference() {
        let base = GuardConfig::default().with_cooldown(Duration::from_secs(1));
        let config = load_guard_config(&MemoryPreferenceStore::with_enabled(true), base);
        assert!(config.enabled);
        assert_eq!(config.cooldown, Duration::from_secs(1));
    }

    #[test]
    fn test_missing_preference_is_disabled() {
        let base = GuardConfig::default().with_enabled(true);
        let config = load_guard_config(&MemoryPreferenceStore::new(), base);
        assert!(!config.enabled);
    }

    #[test]
    fn test_read_error_is_disabled() {
        let base = GuardConfig::default().with_enabled(true);
        let config = load_guard_config(&BrokenStore, base);
        assert!(!config.enabled);
    }
}
