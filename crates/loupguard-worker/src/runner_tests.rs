use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use loupguard_core::Hub;
use tokio_util::sync::CancellationToken;

use super::*;

/// Scripted worker: fails the steps listed in `fail_on` (1-based) and asks
/// to stop after `stop_after` steps.
#[derive(Default)]
struct Scripted {
    fail_init: bool,
    fail_teardown: bool,
    fail_on: Vec<usize>,
    always_fail: bool,
    stop_after: Option<usize>,
    steps: Arc<AtomicUsize>,
    teardowns: Arc<AtomicUsize>,
}

#[async_trait]
impl Worker for Scripted {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn init(&mut self, _ctx: &WorkerContext) -> Result<(), WorkerError> {
        if self.fail_init {
            return Err(WorkerError::custom("no device"));
        }
        Ok(())
    }

    async fn step(&mut self, ctx: &WorkerContext) -> Result<(), WorkerError> {
        let n = self.steps.fetch_add(1, Ordering::SeqCst) + 1;
        if self.stop_after == Some(n) {
            ctx.request_stop();
        }
        if self.always_fail || self.fail_on.contains(&n) {
            return Err(WorkerError::custom(format!("step {n} failed")));
        }
        Ok(())
    }

    async fn teardown(&mut self, _ctx: &WorkerContext) -> Result<(), WorkerError> {
        self.teardowns.fetch_add(1, Ordering::SeqCst);
        if self.fail_teardown {
            return Err(WorkerError::custom("close failed"));
        }
        Ok(())
    }
}

fn context() -> WorkerContext {
    WorkerContext::new("scripted", Arc::new(Hub::default()), CancellationToken::new())
}

fn supervisor(max: u32) -> SupervisorConfig {
    SupervisorConfig {
        max_consecutive_fail: max,
        fail_backoff_s: 0.1,
    }
}

#[tokio::test(start_paused = true)]
async fn test_always_failing_worker_halts_after_exact_ceiling() {
    let ctx = context();
    let mut worker = Scripted {
        always_fail: true,
        ..Default::default()
    };

    let exit = run_worker(&mut worker, &ctx, &supervisor(5)).await;

    assert_eq!(exit, WorkerExit::Halted);
    assert_eq!(worker.steps.load(Ordering::SeqCst), 5);
    assert_eq!(worker.teardowns.load(Ordering::SeqCst), 1);

    let health = ctx.hub().health("scripted").unwrap();
    assert_eq!(health.status, WorkerStatus::Halted);
    assert_eq!(health.fail_count, 5);
    assert_eq!(health.ok_count, 0);
    assert_eq!(health.consecutive_failures, 5);
    assert_eq!(health.last_failure.as_deref(), Some("step 5 failed"));
}

#[tokio::test(start_paused = true)]
async fn test_init_failure_never_enters_loop() {
    let ctx = context();
    let mut worker = Scripted {
        fail_init: true,
        ..Default::default()
    };

    let exit = run_worker(&mut worker, &ctx, &supervisor(5)).await;

    assert_eq!(exit, WorkerExit::Halted);
    assert_eq!(worker.steps.load(Ordering::SeqCst), 0);
    assert_eq!(worker.teardowns.load(Ordering::SeqCst), 0);

    let health = ctx.hub().health("scripted").unwrap();
    assert_eq!(health.fail_count, 1);
    assert_eq!(health.status, WorkerStatus::Halted);
    assert!(health.last_failure.unwrap().contains("no device"));
}

#[tokio::test(start_paused = true)]
async fn test_stop_request_ends_loop() {
    let ctx = context();
    let mut worker = Scripted {
        stop_after: Some(4),
        ..Default::default()
    };

    let exit = run_worker(&mut worker, &ctx, &supervisor(5)).await;

    assert_eq!(exit, WorkerExit::Stopped);
    assert_eq!(worker.steps.load(Ordering::SeqCst), 4);

    let health = ctx.hub().health("scripted").unwrap();
    assert_eq!(health.ok_count, 4);
    assert_eq!(health.status, WorkerStatus::Stopped);
    assert!(health.last_heartbeat.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_success_resets_consecutive_failures() {
    let ctx = context();
    let mut worker = Scripted {
        fail_on: vec![1, 2, 4, 5],
        stop_after: Some(6),
        ..Default::default()
    };

    let exit = run_worker(&mut worker, &ctx, &supervisor(3)).await;

    assert_eq!(exit, WorkerExit::Stopped);
    let health = ctx.hub().health("scripted").unwrap();
    assert_eq!(health.fail_count, 4);
    assert_eq!(health.ok_count, 2);
    assert_eq!(health.consecutive_failures, 0);
    assert!(health.last_failure.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_failure_backs_off() {
    let ctx = context();
    let mut worker = Scripted {
        fail_on: vec![1, 2],
        stop_after: Some(3),
        ..Default::default()
    };

    let start = tokio::time::Instant::now();
    run_worker(&mut worker, &ctx, &supervisor(5)).await;

    assert!(start.elapsed() >= Duration::from_millis(200));
}

#[tokio::test(start_paused = true)]
async fn test_teardown_failure_is_recorded_only() {
    let ctx = context();
    let mut worker = Scripted {
        fail_teardown: true,
        stop_after: Some(1),
        ..Default::default()
    };

    let exit = run_worker(&mut worker, &ctx, &supervisor(5)).await;

    assert_eq!(exit, WorkerExit::Stopped);
    let health = ctx.hub().health("scripted").unwrap();
    assert_eq!(health.ok_count, 1);
    assert_eq!(health.fail_count, 1);
    assert_eq!(health.last_failure.as_deref(), Some("close failed"));
}

#[tokio::test(start_paused = true)]
async fn test_halt_is_logged_to_hub() {
    let ctx = context();
    let mut worker = Scripted {
        always_fail: true,
        ..Default::default()
    };

    run_worker(&mut worker, &ctx, &supervisor(1)).await;

    let entries = ctx.hub().error_log().drain(10);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].severity, Severity::Critical);
    assert_eq!(entries[0].source, "scripted");
}

#[test]
fn test_supervisor_from_settings() {
    let mut settings = Settings::new();
    settings.set("lora_max_consecutive_fail", 3);
    settings.set("lora_fail_backoff_s", 0.5);

    let config = SupervisorConfig::from_settings(&settings, "lora").unwrap();
    assert_eq!(config.max_consecutive_fail, 3);
    assert_eq!(config.fail_backoff_s, 0.5);

    let defaults = SupervisorConfig::from_settings(&settings, "motor").unwrap();
    assert_eq!(defaults, SupervisorConfig::default());
}

#[test]
fn test_supervisor_rejects_zero_ceiling() {
    let mut settings = Settings::new();
    settings.set("motor_max_consecutive_fail", 0);
    assert!(SupervisorConfig::from_settings(&settings, "motor").is_err());

    let mut settings = Settings::new();
    settings.set("motor_fail_backoff_s", -1.0);
    assert!(SupervisorConfig::from_settings(&settings, "motor").is_err());
}
