//! Biometric capability probing

use async_trait::async_trait;

/// Reports whether biometric authentication can be used right now
///
/// Implementations must not fail: any internal error resolves to `false`.
#[async_trait]
pub trait CapabilityProbe: Send + Sync {
    /// True only if hardware is present, enrolled, and supported
    async fn is_available(&self) -> bool;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// Probe with a fixed answer
#[derive(Debug, Clone, Copy)]
pub struct StaticProbe(pub bool);

#[async_trait]
impl CapabilityProbe for StaticProbe {
    async fn is_available(&self) -> bool {
        self.0
    }

    fn name(&self) -> &'static str {
        "static"
    }
}
