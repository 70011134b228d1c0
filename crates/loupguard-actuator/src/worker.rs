//! The actuator coordinator worker.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use loupguard_core::{ActuatorState, BoundedQueue, Hub, HubError, OutboundMessage, Severity, keys};
use loupguard_worker::{Worker, WorkerContext, WorkerError};
use serde_json::json;
use tracing::{debug, info};

use crate::WORKER_NAME;
use crate::config::ActuatorConfig;
use crate::driver::StepperDriver;
use crate::geometry::{SweepGeometry, alert_payload};

/// Where the coordinator is in its two-state cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MotionState {
    Scanning,
    /// Dwelling after an alert raised at hub time `since`.
    AlertPaused { since: f64 },
}

/// Sweeps the stepper and turns trigger edges into radio alerts.
pub struct ActuatorWorker {
    config: ActuatorConfig,
    geometry: SweepGeometry,
    driver: Box<dyn StepperDriver>,
    tx_queue: Arc<BoundedQueue<OutboundMessage>>,
    state: MotionState,
    index: i64,
    direction: i8,
    last_flag: bool,
}

fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

impl ActuatorWorker {
    pub fn new(
        config: ActuatorConfig,
        driver: impl StepperDriver + 'static,
        hub: &Hub,
    ) -> Result<Self, HubError> {
        let tx_queue = hub.link_tx_queue(keys::LINK_QUEUE_CAPACITY)?;
        Ok(Self {
            geometry: SweepGeometry::from_config(&config),
            config,
            driver: Box::new(driver),
            tx_queue,
            state: MotionState::Scanning,
            index: 0,
            direction: 1,
            last_flag: false,
        })
    }

    pub fn state(&self) -> MotionState {
        self.state
    }

    pub fn index(&self) -> i64 {
        self.index
    }

    pub fn direction(&self) -> i8 {
        self.direction
    }

    pub fn angle(&self) -> f64 {
        self.geometry.angle(self.index)
    }

    fn snapshot(&self, moving: bool, now: f64) -> ActuatorState {
        ActuatorState {
            angle: (self.angle() * 10.0).round() / 10.0,
            direction: self.direction,
            moving,
            timestamp: now,
        }
    }

    /// One step pulse. Returns `false` if a stop was requested meanwhile.
    async fn pulse(&mut self, ctx: &WorkerContext, phase: Duration) -> Result<bool, WorkerError> {
        self.driver.set_step(true)?;
        let running = ctx.sleep(phase).await;
        self.driver.set_step(false)?;
        Ok(running && ctx.sleep(phase).await)
    }

    /// Short wiggle out and back; position is unchanged afterwards.
    async fn calibrate(&mut self, ctx: &WorkerContext) -> Result<(), WorkerError> {
        info!("[{}] Calibration wiggle", WORKER_NAME);
        let phase = secs(self.config.calibration_step_delay_s);
        for (direction, settle) in [(1, 0.2), (-1, 0.5)] {
            self.driver.set_direction(direction)?;
            for _ in 0..self.config.calibration_steps {
                if !self.pulse(ctx, phase).await? {
                    return Ok(());
                }
            }
            if !ctx.sleep_secs(settle).await {
                return Ok(());
            }
        }
        info!("[{}] Calibration OK", WORKER_NAME);
        Ok(())
    }

    async fn sweep_batch(&mut self, ctx: &WorkerContext) -> Result<(), WorkerError> {
        self.driver.set_direction(self.direction)?;
        let phase = secs(self.config.step_delay_s);

        for _ in 0..self.config.batch_size {
            let running = self.pulse(ctx, phase).await?;
            self.index += i64::from(self.direction);

            if self.geometry.at_boundary(self.index, self.direction) {
                self.direction = -self.direction;
                debug!(
                    "[{}] End of arc at step {}, now heading {}",
                    WORKER_NAME, self.index, self.direction
                );
                ctx.sleep_secs(self.config.dir_delay_s).await;
                break;
            }
            if !running {
                break;
            }
        }
        Ok(())
    }

    async fn raise_alert(&mut self, ctx: &WorkerContext) -> Result<(), WorkerError> {
        let angle = self.angle();
        let payload = alert_payload(angle);
        ctx.log_event(
            Severity::Info,
            format!("ALERT: trigger at {:.1} deg, pausing {}s", angle, self.config.pause_s),
            Some(json!({ "angle": angle, "direction": self.direction })),
        );

        let limit = secs(self.config.alert_enqueue_timeout_s);
        match self.tx_queue.push_timeout(payload.clone().into(), limit).await {
            Ok(()) => info!("[{}] Alert queued: {}", WORKER_NAME, payload),
            Err(e) => ctx.log_event(
                Severity::Warning,
                format!("Alert '{}' dropped: {}", payload, e),
                None,
            ),
        }

        let now = ctx.now();
        self.state = MotionState::AlertPaused { since: now };
        ctx.hub().set_actuator_state(&self.snapshot(false, now))?;
        Ok(())
    }
}

#[async_trait]
impl Worker for ActuatorWorker {
    fn name(&self) -> &str {
        WORKER_NAME
    }

    async fn init(&mut self, ctx: &WorkerContext) -> Result<(), WorkerError> {
        info!(
            "[{}] arc={} deg ({} steps) batch={} pause={}s",
            WORKER_NAME,
            self.config.sweep_angle_deg,
            self.geometry.steps_to_sweep(),
            self.config.batch_size,
            self.config.pause_s
        );
        self.driver.enable()?;
        if self.config.calibrate {
            self.calibrate(ctx).await?;
        }
        ctx.hub().set_actuator_state(&self.snapshot(true, ctx.now()))?;
        Ok(())
    }

    async fn step(&mut self, ctx: &WorkerContext) -> Result<(), WorkerError> {
        if let MotionState::AlertPaused { since } = self.state {
            if ctx.now() - since < self.config.pause_s {
                ctx.sleep_secs(self.config.pause_poll_s).await;
                return Ok(());
            }
            info!("[{}] Resuming sweep at {:.1} deg", WORKER_NAME, self.angle());
            self.state = MotionState::Scanning;
        }

        let flag = ctx.hub().trigger_flag();
        let rising = flag && !self.last_flag;
        self.last_flag = flag;
        if rising {
            return self.raise_alert(ctx).await;
        }

        self.sweep_batch(ctx).await?;
        ctx.hub().set_actuator_state(&self.snapshot(true, ctx.now()))?;
        Ok(())
    }

    async fn teardown(&mut self, ctx: &WorkerContext) -> Result<(), WorkerError> {
        self.driver.disable()?;
        ctx.hub().set_actuator_state(&self.snapshot(false, ctx.now()))?;
        info!("[{}] Motor disabled", WORKER_NAME);
        Ok(())
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
