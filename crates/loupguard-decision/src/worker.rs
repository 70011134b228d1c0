//! Decision engine worker.

use async_trait::async_trait;
use loupguard_core::Severity;
use loupguard_worker::{Worker, WorkerContext, WorkerError};
use tracing::{debug, info};

use crate::config::DecisionConfig;
use crate::engine::{DecisionEngine, TriggerDecision};

/// Drains the detection queue and drives the trigger flag.
pub struct DecisionWorker {
    engine: DecisionEngine,
}

impl DecisionWorker {
    pub fn new(config: DecisionConfig) -> Self {
        Self {
            engine: DecisionEngine::new(config),
        }
    }

    pub fn engine(&self) -> &DecisionEngine {
        &self.engine
    }
}

#[async_trait]
impl Worker for DecisionWorker {
    fn name(&self) -> &str {
        crate::WORKER_NAME
    }

    async fn init(&mut self, ctx: &WorkerContext) -> Result<(), WorkerError> {
        let config = self.engine.config();
        info!(
            "[{}] window={}s min_ratio={} min_score={} cooldown={}s reset={}s",
            ctx.name(),
            config.time_window_s,
            config.min_frame_ratio,
            config.min_total_score,
            config.cooldown_s,
            config.reset_delay_s
        );
        self.engine.warm_start(ctx.hub().trigger_flag(), ctx.now());
        Ok(())
    }

    async fn step(&mut self, ctx: &WorkerContext) -> Result<(), WorkerError> {
        let hub = ctx.hub();
        let now = ctx.now();

        if self.engine.should_reset(hub.trigger_flag(), now) {
            hub.set_trigger(false);
            ctx.log_event(
                Severity::Info,
                format!(
                    "RESET: trigger cleared after {}s",
                    self.engine.config().reset_delay_s
                ),
                None,
            );
        }

        let events = hub.detections().drain(self.engine.config().batch_size);
        if events.is_empty() {
            ctx.sleep(self.engine.config().idle_interval()).await;
            return Ok(());
        }

        match self.engine.evaluate(events, now) {
            TriggerDecision::Trigger(stats) => {
                ctx.log_event(
                    Severity::Info,
                    format!(
                        "TRIGGERED: {}/{} frames (min ratio {}), score {:.2}; cooldown passed",
                        stats.detected,
                        stats.samples,
                        self.engine.config().min_frame_ratio,
                        stats.score
                    ),
                    None,
                );
                hub.set_trigger(true);
            }
            TriggerDecision::CoolingDown(stats) => {
                debug!(
                    "[{}] presence holds ({}/{} frames) but cooldown pending",
                    ctx.name(),
                    stats.detected,
                    stats.samples
                );
            }
            TriggerDecision::Absent(_) => {}
        }
        Ok(())
    }
}
