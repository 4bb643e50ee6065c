//! Run context shared by the round driver and whoever may stop it.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Carries the shutdown signal. The driver looks at it between states, never
/// in the middle of a network call.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    shutdown: CancellationToken,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Sleep for `delay` unless shutdown arrives first. Returns `false` if
    /// the pause was cut short.
    pub async fn pause(&self, delay: Duration) -> bool {
        if delay.is_zero() {
            return !self.is_shutdown();
        }
        tokio::select! {
            _ = tokio::time::sleep(delay) => true,
            _ = self.shutdown.cancelled() => false,
        }
    }
}
