//! Shared fixtures for autolock integration tests

use std::sync::Arc;
use std::time::Duration;

use autolock_core::{GuardConfig, LifecycleSignal};
use autolock_guard::{
    CapabilityProbe, Collaborators, GuardHandle, LifecycleBus, MemoryPreferenceStore,
    PreferenceError, PreferenceStore, ScriptedGateway, SessionGuardCoordinator, StaticProbe,
};

/// Cooldown used by the literal scenarios (2000ms)
pub const SCENARIO_COOLDOWN: Duration = Duration::from_millis(2000);

/// A running guard wired to in-process test doubles
pub struct Harness {
    /// Lifecycle bus the test emits into
    pub bus: LifecycleBus,
    /// Gateway whose outcomes the test pushes
    pub gateway: Arc<ScriptedGateway>,
    /// Preference store seen by the guard
    pub store: Arc<dyn PreferenceStore>,
    /// Handle to the running guard
    pub handle: GuardHandle,
}

impl Harness {
    /// Guard with the preference stored as `enabled` and hardware `available`
    pub fn start(enabled: bool, available: bool) -> Self {
        Self::start_with(
            GuardConfig::default().with_cooldown(SCENARIO_COOLDOWN),
            Arc::new(MemoryPreferenceStore::with_enabled(enabled)),
            available,
        )
    }

    /// Guard with an explicit base config and store
    pub fn start_with(base: GuardConfig, store: Arc<dyn PreferenceStore>, available: bool) -> Self {
        Self::start_on(
            LifecycleBus::new(),
            base,
            store,
            Arc::new(StaticProbe(available)),
        )
    }

    /// Guard on a caller-built bus and probe
    pub fn start_on(
        bus: LifecycleBus,
        base: GuardConfig,
        store: Arc<dyn PreferenceStore>,
        probe: Arc<dyn CapabilityProbe>,
    ) -> Self {
        let gateway = Arc::new(ScriptedGateway::new());
        let collaborators = Collaborators {
            probe,
            gateway: gateway.clone(),
            store: store.clone(),
        };

        let handle = SessionGuardCoordinator::start(base, collaborators, &bus)
            .expect("guard should start");

        Self {
            bus,
            gateway,
            store,
            handle,
        }
    }

    /// Emit a signal and wait until the guard has processed it
    pub async fn signal(&self, signal: LifecycleSignal) {
        self.bus.emit(signal);
        self.sync().await;
    }

    /// Wait until the guard has processed everything queued so far
    pub async fn sync(&self) {
        self.handle.sync().await.expect("guard should be running");
    }
}

/// Store whose reads and writes always fail
pub struct BrokenStore;

impl PreferenceStore for BrokenStore {
    fn get(&self, _key: &str) -> Result<Option<bool>, PreferenceError> {
        Err(PreferenceError::Corrupt("unexpected end of input".to_string()))
    }

    fn set(&self, _key: &str, _value: bool) -> Result<(), PreferenceError> {
        Err(PreferenceError::Unavailable("store is read-only".to_string()))
    }
}
