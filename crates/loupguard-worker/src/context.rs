//! Per-worker execution context.

use std::sync::Arc;
use std::time::Duration;

use loupguard_core::{Hub, Severity};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// What a worker sees of the outside world: its name, the hub and its stop
/// signal.
#[derive(Debug, Clone)]
pub struct WorkerContext {
    name: Arc<str>,
    hub: Arc<Hub>,
    cancel: CancellationToken,
}

impl WorkerContext {
    pub fn new(name: impl Into<Arc<str>>, hub: Arc<Hub>, cancel: CancellationToken) -> Self {
        Self {
            name: name.into(),
            hub,
            cancel,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    /// Current time on the hub clock.
    pub fn now(&self) -> f64 {
        self.hub.now()
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Ask this worker to stop at its next loop boundary.
    pub fn request_stop(&self) {
        self.cancel.cancel();
    }

    pub fn should_stop(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Sleep for `duration` unless a stop is requested first.
    ///
    /// Returns `false` when woken by the stop signal.
    pub async fn sleep(&self, duration: Duration) -> bool {
        if duration.is_zero() {
            return !self.should_stop();
        }
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }

    /// Sleep for `secs` seconds. Non-positive values return immediately.
    pub async fn sleep_secs(&self, secs: f64) -> bool {
        self.sleep(Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO))
            .await
    }

    /// Record a diagnostic entry attributed to this worker.
    pub fn log_event(&self, severity: Severity, message: impl Into<String>, details: Option<Value>) {
        self.hub.log_event(&self.name, severity, message, details);
    }
}
