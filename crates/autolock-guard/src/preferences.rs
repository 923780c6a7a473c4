//! Preference persistence
//!
//! The guard only needs one boolean, but the store is a plain key/value
//! contract so hosts can back it with whatever they already persist settings
//! in.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::error::PreferenceError;

/// Key holding the auto-lock preference
pub const BIOMETRIC_ENABLED_KEY: &str = "biometric_enabled";

/// Preference file name
const PREFERENCES_FILE_NAME: &str = "preferences.json";

/// Configuration directory under ~/.config
const CONFIG_DIR_NAME: &str = "autolock";

/// Key/value boolean store owned by the host application
pub trait PreferenceStore: Send + Sync {
    /// Read a flag; `None` when it was never written
    fn get(&self, key: &str) -> Result<Option<bool>, PreferenceError>;

    /// Persist a flag
    fn set(&self, key: &str, value: bool) -> Result<(), PreferenceError>;
}

/// Preferences kept in a JSON object on disk
#[derive(Debug, Clone)]
pub struct JsonPreferenceStore {
    path: PathBuf,
}

impl JsonPreferenceStore {
    /// Store backed by an explicit file
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the platform config location
    pub fn at_default_location() -> Result<Self, PreferenceError> {
        Self::default_path()
            .map(Self::new)
            .ok_or(PreferenceError::NoConfigDir)
    }

    /// Get the configuration directory path
    pub fn config_dir() -> Option<PathBuf> {
        // Try XDG_CONFIG_HOME first, then fall back to the platform default
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            return Some(PathBuf::from(xdg_config).join(CONFIG_DIR_NAME));
        }
        dirs::config_dir().map(|p| p.join(CONFIG_DIR_NAME))
    }

    /// Get the full preference file path
    pub fn default_path() -> Option<PathBuf> {
        Self::config_dir().map(|d| d.join(PREFERENCES_FILE_NAME))
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, bool>, PreferenceError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = fs::read_to_string(&self.path)?;
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&contents)?)
    }
}

impl PreferenceStore for JsonPreferenceStore {
    fn get(&self, key: &str) -> Result<Option<bool>, PreferenceError> {
        Ok(self.read_all()?.get(key).copied())
    }

    fn set(&self, key: &str, value: bool) -> Result<(), PreferenceError> {
        let mut values = match self.read_all() {
            Ok(values) => values,
            Err(PreferenceError::Corrupt(e)) => {
                tracing::warn!("Replacing corrupt preference file {:?}: {}", self.path, e);
                BTreeMap::new()
            }
            Err(e) => return Err(e),
        };
        values.insert(key.to_string(), value);

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let contents = serde_json::to_string_pretty(&values)?;
        fs::write(&self.path, contents)?;

        tracing::debug!("Saved preference {}={} to {:?}", key, value, self.path);
        Ok(())
    }
}

/// Process-local store, for hosts that persist elsewhere and for tests
#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    values: RwLock<HashMap<String, bool>>,
}

impl MemoryPreferenceStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with the auto-lock preference
    pub fn with_enabled(enabled: bool) -> Self {
        let mut values = HashMap::new();
        values.insert(BIOMETRIC_ENABLED_KEY.to_string(), enabled);
        Self {
            values: RwLock::new(values),
        }
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn get(&self, key: &str) -> Result<Option<bool>, PreferenceError> {
        let values = self
            .values
            .read()
            .map_err(|e| PreferenceError::Unavailable(e.to_string()))?;
        Ok(values.get(key).copied())
    }

    fn set(&self, key: &str, value: bool) -> Result<(), PreferenceError> {
        let mut values = self
            .values
            .write()
            .map_err(|e| PreferenceError::Unavailable(e.to_string()))?;
        values.insert(key.to_string(), value);
        Ok(())
    }
}
