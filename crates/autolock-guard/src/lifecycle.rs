//! Lifecycle signal delivery
//!
//! The host framework publishes foreground/background transitions on a
//! broadcast channel. A subscription is a [`broadcast::Receiver`]; dropping it
//! is the unsubscribe.

use autolock_core::LifecycleSignal;
use tokio::sync::broadcast;
use tracing::debug;

/// Default buffered signals per subscriber
const DEFAULT_CAPACITY: usize = 16;

/// Source of lifecycle transitions owned by the host framework
pub trait LifecycleSignalSource: Send + Sync {
    /// Subscribe to future signals
    fn subscribe(&self) -> broadcast::Receiver<LifecycleSignal>;
}

/// In-process lifecycle bus the host shell emits into
#[derive(Debug, Clone)]
pub struct LifecycleBus {
    event_tx: broadcast::Sender<LifecycleSignal>,
}

impl LifecycleBus {
    /// Bus with the default buffer
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Bus buffering `capacity` signals per subscriber
    pub fn with_capacity(capacity: usize) -> Self {
        let (event_tx, _) = broadcast::channel(capacity.max(1));
        Self { event_tx }
    }

    /// Publish a signal; returns how many subscribers received it
    pub fn emit(&self, signal: LifecycleSignal) -> usize {
        match self.event_tx.send(signal) {
            Ok(receivers) => receivers,
            Err(_) => {
                debug!("Lifecycle signal {:?} dropped: no subscribers", signal);
                0
            }
        }
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.event_tx.receiver_count()
    }
}

impl Default for LifecycleBus {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleSignalSource for LifecycleBus {
    fn subscribe(&self) -> broadcast::Receiver<LifecycleSignal> {
        self.event_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribe_and_release() {
        let bus = LifecycleBus::new();
        assert_eq!(bus.emit(LifecycleSignal::Resumed), 0);

        let mut rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(bus.emit(LifecycleSignal::Paused), 1);
        assert_eq!(rx.recv().await.unwrap(), LifecycleSignal::Paused);

        drop(rx);
        assert_eq!(bus.subscriber_count(), 0);
    }
}
