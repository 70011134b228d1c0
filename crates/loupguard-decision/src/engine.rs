//! Trigger and reset rules, independent of the hub.

use loupguard_core::DetectionEvent;

use crate::config::DecisionConfig;
use crate::window::{DetectionWindow, PresenceStats};

/// Outcome of evaluating one batch of detections.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TriggerDecision {
    /// Presence criteria not met.
    Absent(PresenceStats),
    /// Presence holds but the cooldown has not elapsed.
    CoolingDown(PresenceStats),
    /// Presence holds and the cooldown elapsed: set the trigger.
    Trigger(PresenceStats),
}

/// Sliding-window presence test with cooldown and auto-reset timers.
///
/// Triggering is gated on presence and the cooldown; clearing depends only
/// on time since the trigger was set.
#[derive(Debug, Clone)]
pub struct DecisionEngine {
    config: DecisionConfig,
    window: DetectionWindow,
    last_trigger_ts: Option<f64>,
    last_trigger_active_ts: Option<f64>,
}

impl DecisionEngine {
    pub fn new(config: DecisionConfig) -> Self {
        let window = DetectionWindow::new(config.time_window_s);
        Self {
            config,
            window,
            last_trigger_ts: None,
            last_trigger_active_ts: None,
        }
    }

    pub fn config(&self) -> &DecisionConfig {
        &self.config
    }

    pub fn window(&self) -> &DetectionWindow {
        &self.window
    }

    pub fn last_trigger_ts(&self) -> Option<f64> {
        self.last_trigger_ts
    }

    /// Adopt a trigger that was already set before the engine started.
    ///
    /// Both timers start at `now`, so the flag clears after the reset delay
    /// and the cooldown applies.
    pub fn warm_start(&mut self, active: bool, now: f64) {
        if active {
            self.last_trigger_ts = Some(now);
            self.last_trigger_active_ts = Some(now);
        }
    }

    /// Whether an active trigger is due to be cleared.
    ///
    /// A trigger set by someone else, with no recorded set time, is cleared
    /// immediately.
    pub fn should_reset(&self, active: bool, now: f64) -> bool {
        active && now - self.last_trigger_active_ts.unwrap_or(f64::NEG_INFINITY) >= self.config.reset_delay_s
    }

    fn cooldown_elapsed(&self, now: f64) -> bool {
        match self.last_trigger_ts {
            None => true,
            Some(last) => now - last >= self.config.cooldown_s,
        }
    }

    /// Feed a non-empty batch of events and decide.
    ///
    /// A `Trigger` decision records `now` as the trigger time.
    pub fn evaluate(&mut self, events: Vec<DetectionEvent>, now: f64) -> TriggerDecision {
        self.window.update(events, now);
        let stats = self.window.stats();

        if !stats.is_present(self.config.min_frame_ratio, self.config.min_total_score) {
            return TriggerDecision::Absent(stats);
        }
        if !self.cooldown_elapsed(now) {
            return TriggerDecision::CoolingDown(stats);
        }

        self.last_trigger_ts = Some(now);
        self.last_trigger_active_ts = Some(now);
        TriggerDecision::Trigger(stats)
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
