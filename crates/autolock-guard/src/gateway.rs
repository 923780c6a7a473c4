//! Authentication prompt abstraction

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use autolock_core::AuthOutcome;
use tokio::sync::{mpsc, Mutex};

/// Presents the native authentication prompt
///
/// `authenticate` suspends until the user completes or dismisses the prompt,
/// or the platform fails. Every platform error code is normalized into
/// [`AuthOutcome::Error`].
#[async_trait]
pub trait AuthenticationGateway: Send + Sync {
    /// Show the prompt and wait for its outcome
    ///
    /// # Arguments
    /// * `reason` - Text shown to the user
    /// * `sticky` - Keep the prompt alive across a brief loss of focus
    async fn authenticate(&self, reason: &str, sticky: bool) -> AuthOutcome;

    /// Dismiss an outstanding prompt; the pending call then resolves
    fn cancel(&self) {}

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// Gateway whose outcomes are supplied by the caller
///
/// Each `authenticate` call consumes the next pushed outcome. With a fallback
/// configured, a call that receives nothing within the delay resolves to the
/// fallback instead. `cancel` resolves an outstanding call as
/// [`AuthOutcome::Cancelled`].
pub struct ScriptedGateway {
    sender: mpsc::UnboundedSender<AuthOutcome>,
    receiver: Mutex<mpsc::UnboundedReceiver<AuthOutcome>>,
    fallback: Option<(AuthOutcome, Duration)>,
    calls: AtomicUsize,
    cancels: AtomicUsize,
    in_flight: AtomicBool,
    last_request: Mutex<Option<(String, bool)>>,
}

impl ScriptedGateway {
    /// Gateway that waits for pushed outcomes
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Mutex::new(receiver),
            fallback: None,
            calls: AtomicUsize::new(0),
            cancels: AtomicUsize::new(0),
            in_flight: AtomicBool::new(false),
            last_request: Mutex::new(None),
        }
    }

    /// Gateway that answers `outcome` after `delay` unless told otherwise
    pub fn with_fallback(outcome: AuthOutcome, delay: Duration) -> Self {
        Self {
            fallback: Some((outcome, delay)),
            ..Self::new()
        }
    }

    /// Queue the outcome for the current or next attempt
    pub fn push(&self, outcome: AuthOutcome) {
        // The receiver lives as long as self, so this cannot fail
        let _ = self.sender.send(outcome);
    }

    /// Number of `authenticate` calls started
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of `cancel` calls that reached an outstanding prompt
    pub fn cancels(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }

    /// Whether a call is currently waiting for an outcome
    pub fn is_prompting(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Reason and sticky flag of the most recent call
    pub async fn last_request(&self) -> Option<(String, bool)> {
        self.last_request.lock().await.clone()
    }
}

impl Default for ScriptedGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthenticationGateway for ScriptedGateway {
    async fn authenticate(&self, reason: &str, sticky: bool) -> AuthOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().await = Some((reason.to_string(), sticky));

        let mut receiver = self.receiver.lock().await;
        self.in_flight.store(true, Ordering::SeqCst);

        let outcome = match &self.fallback {
            Some((fallback, delay)) => tokio::select! {
                pushed = receiver.recv() => pushed.unwrap_or_else(|| fallback.clone()),
                _ = tokio::time::sleep(*delay) => fallback.clone(),
            },
            None => receiver
                .recv()
                .await
                .unwrap_or_else(|| AuthOutcome::Error("outcome script closed".to_string())),
        };

        self.in_flight.store(false, Ordering::SeqCst);
        outcome
    }

    fn cancel(&self) {
        if self.in_flight.load(Ordering::SeqCst) {
            self.cancels.fetch_add(1, Ordering::SeqCst);
            self.push(AuthOutcome::Cancelled);
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_pushed_outcome_is_returned() {
        let gateway = ScriptedGateway::new();
        gateway.push(AuthOutcome::Failed);

        let outcome = gateway.authenticate("unlock", true).await;
        assert_eq!(outcome, AuthOutcome::Failed);
        assert_eq!(gateway.calls(), 1);
        assert_eq!(
            gateway.last_request().await,
            Some(("unlock".to_string(), true))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_after_delay() {
        let gateway =
            ScriptedGateway::with_fallback(AuthOutcome::Success, Duration::from_millis(300));
        let outcome = gateway.authenticate("unlock", false).await;
        assert_eq!(outcome, AuthOutcome::Success);
    }

    #[tokio::test]
    async fn test_cancel_resolves_outstanding_call() {
        let gateway = Arc::new(ScriptedGateway::new());

        // Cancel with nothing outstanding is a no-op
        gateway.cancel();
        assert_eq!(gateway.cancels(), 0);

        let prompt = {
            let gateway = Arc::clone(&gateway);
            tokio::spawn(async move { gateway.authenticate("unlock", true).await })
        };
        while !gateway.is_prompting() {
            tokio::task::yield_now().await;
        }

        gateway.cancel();
        assert_eq!(prompt.await.unwrap(), AuthOutcome::Cancelled);
        assert_eq!(gateway.cancels(), 1);
    }
}
