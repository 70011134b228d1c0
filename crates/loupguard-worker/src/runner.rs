//! The supervised run-loop.

use std::time::Duration;

use async_trait::async_trait;
use loupguard_config::{ConfigError, Settings};
use loupguard_core::{Severity, WorkerStatus};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::context::WorkerContext;
use crate::error::WorkerError;

/// One logical task of the system.
#[async_trait]
pub trait Worker: Send {
    /// Worker name, also its configuration prefix.
    fn name(&self) -> &str;

    /// Runs once before the loop. A failure aborts the worker.
    async fn init(&mut self, _ctx: &WorkerContext) -> Result<(), WorkerError> {
        Ok(())
    }

    /// One unit of work. Must not block without a bound.
    async fn step(&mut self, ctx: &WorkerContext) -> Result<(), WorkerError>;

    /// Runs once after the loop. Failures are recorded, never raised.
    async fn teardown(&mut self, _ctx: &WorkerContext) -> Result<(), WorkerError> {
        Ok(())
    }
}

/// Failure handling options, read from `<worker>_max_consecutive_fail` and
/// `<worker>_fail_backoff_s`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SupervisorConfig {
    #[serde(default = "default_max_consecutive_fail")]
    pub max_consecutive_fail: u32,
    #[serde(default = "default_fail_backoff_s")]
    pub fail_backoff_s: f64,
}

fn default_max_consecutive_fail() -> u32 {
    5
}

fn default_fail_backoff_s() -> f64 {
    0.1
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            max_consecutive_fail: default_max_consecutive_fail(),
            fail_backoff_s: default_fail_backoff_s(),
        }
    }
}

impl SupervisorConfig {
    pub fn from_settings(settings: &Settings, prefix: &str) -> Result<Self, ConfigError> {
        let scoped = settings.scoped(prefix);
        let config = Self {
            max_consecutive_fail: scoped
                .u64_or("max_consecutive_fail", default_max_consecutive_fail() as u64)?
                .try_into()
                .map_err(|_| ConfigError::invalid(scoped.key("max_consecutive_fail"), "too large"))?,
            fail_backoff_s: scoped.f64_or("fail_backoff_s", default_fail_backoff_s())?,
        };
        config.validate(prefix)?;
        Ok(config)
    }

    pub fn validate(&self, prefix: &str) -> Result<(), ConfigError> {
        if self.max_consecutive_fail == 0 {
            return Err(ConfigError::invalid(
                format!("{prefix}_max_consecutive_fail"),
                "must be at least 1",
            ));
        }
        if !self.fail_backoff_s.is_finite() || self.fail_backoff_s < 0.0 {
            return Err(ConfigError::invalid(
                format!("{prefix}_fail_backoff_s"),
                "must be a non-negative number of seconds",
            ));
        }
        Ok(())
    }

    fn backoff(&self) -> Duration {
        Duration::try_from_secs_f64(self.fail_backoff_s).unwrap_or(Duration::ZERO)
    }
}

/// How a run-loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// Stopped on request.
    Stopped,
    /// Stopped itself after an init failure or too many step failures.
    Halted,
}

/// Drive `worker` until it is stopped or halts itself.
///
/// The worker's health record in the hub is updated after every `step`
/// call, whatever its outcome.
pub async fn run_worker<W>(
    worker: &mut W,
    ctx: &WorkerContext,
    supervisor: &SupervisorConfig,
) -> WorkerExit
where
    W: Worker + ?Sized,
{
    let name = ctx.name().to_string();
    let hub = ctx.hub().clone();
    hub.update_health(&name, |h| h.status = WorkerStatus::Starting);

    if let Err(e) = worker.init(ctx).await {
        let now = ctx.now();
        error!("Worker '{}' failed to initialise: {}", name, e);
        hub.update_health(&name, |h| {
            h.status = WorkerStatus::Halted;
            h.fail_count += 1;
            h.consecutive_failures += 1;
            h.last_failure = Some(e.to_string());
            h.last_failure_ts = Some(now);
            h.last_step_duration_s = Some(0.0);
            h.last_heartbeat = Some(now);
        });
        ctx.log_event(Severity::Error, format!("init failed: {e}"), None);
        return WorkerExit::Halted;
    }

    info!("Worker '{}' started", name);
    hub.update_health(&name, |h| h.status = WorkerStatus::Running);

    let mut consecutive: u32 = 0;
    let mut exit = WorkerExit::Stopped;

    while !ctx.should_stop() {
        let started = Instant::now();
        let result = worker.step(ctx).await;
        let elapsed = started.elapsed().as_secs_f64();
        let now = ctx.now();

        match result {
            Ok(()) => {
                consecutive = 0;
                hub.update_health(&name, |h| {
                    h.ok_count += 1;
                    h.consecutive_failures = 0;
                    h.last_failure = None;
                    h.last_failure_ts = None;
                    h.last_step_duration_s = Some(elapsed);
                    h.last_heartbeat = Some(now);
                });
            }
            Err(e) => {
                consecutive += 1;
                let failure = e.to_string();
                hub.update_health(&name, |h| {
                    h.fail_count += 1;
                    h.consecutive_failures = consecutive;
                    h.last_failure = Some(failure);
                    h.last_failure_ts = Some(now);
                    h.last_step_duration_s = Some(elapsed);
                    h.last_heartbeat = Some(now);
                });

                if consecutive >= supervisor.max_consecutive_fail {
                    error!(
                        "Worker '{}' halted after {} consecutive failures: {}",
                        name, consecutive, e
                    );
                    ctx.log_event(
                        Severity::Critical,
                        format!("halted after {consecutive} consecutive failures: {e}"),
                        None,
                    );
                    exit = WorkerExit::Halted;
                    break;
                }

                warn!(
                    "Worker '{}' step failed ({}/{}): {}",
                    name, consecutive, supervisor.max_consecutive_fail, e
                );
                ctx.sleep(supervisor.backoff()).await;
            }
        }
    }

    if let Err(e) = worker.teardown(ctx).await {
        let now = ctx.now();
        warn!("Worker '{}' teardown failed: {}", name, e);
        hub.update_health(&name, |h| {
            h.fail_count += 1;
            h.last_failure = Some(e.to_string());
            h.last_failure_ts = Some(now);
        });
    }

    let status = match exit {
        WorkerExit::Stopped => WorkerStatus::Stopped,
        WorkerExit::Halted => WorkerStatus::Halted,
    };
    hub.update_health(&name, |h| h.status = status);
    debug!("Worker '{}' exited ({:?})", name, exit);
    exit
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
