//! Decision engine configuration.

use std::time::Duration;

use loupguard_config::{ConfigError, Settings};
use serde::{Deserialize, Serialize};

/// Options under the `decision_logic_` prefix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionConfig {
    /// Length of the sliding window, seconds.
    #[serde(default = "default_time_window_s")]
    pub time_window_s: f64,
    /// Minimum share of window samples with at least one box.
    #[serde(default = "default_min_frame_ratio")]
    pub min_frame_ratio: f64,
    /// Minimum sum of confidence scores over the window.
    #[serde(default = "default_min_total_score")]
    pub min_total_score: f64,
    /// Minimum time between two triggers, seconds.
    #[serde(default = "default_cooldown_s")]
    pub cooldown_s: f64,
    /// Time after which a set trigger clears itself, seconds.
    #[serde(default = "default_reset_delay_s")]
    pub reset_delay_s: f64,
    /// Idle sleep when no detections arrived, seconds.
    #[serde(default = "default_queue_timeout_s")]
    pub queue_timeout_s: f64,
    /// Maximum detections drained per step.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_time_window_s() -> f64 {
    2.0
}

fn default_min_frame_ratio() -> f64 {
    0.6
}

fn default_min_total_score() -> f64 {
    8.0
}

fn default_cooldown_s() -> f64 {
    15.0
}

fn default_reset_delay_s() -> f64 {
    2.0
}

fn default_queue_timeout_s() -> f64 {
    0.05
}

fn default_batch_size() -> usize {
    20
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            time_window_s: default_time_window_s(),
            min_frame_ratio: default_min_frame_ratio(),
            min_total_score: default_min_total_score(),
            cooldown_s: default_cooldown_s(),
            reset_delay_s: default_reset_delay_s(),
            queue_timeout_s: default_queue_timeout_s(),
            batch_size: default_batch_size(),
        }
    }
}

impl DecisionConfig {
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        let config: Self = settings.scoped(crate::WORKER_NAME).extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let field = |name: &str| format!("{}_{}", crate::WORKER_NAME, name);

        if !(self.time_window_s.is_finite() && self.time_window_s > 0.0) {
            return Err(ConfigError::invalid(field("time_window_s"), "must be positive"));
        }
        if !(0.0..=1.0).contains(&self.min_frame_ratio) {
            return Err(ConfigError::invalid(
                field("min_frame_ratio"),
                "must be within [0, 1]",
            ));
        }
        for (name, value) in [
            ("min_total_score", self.min_total_score),
            ("cooldown_s", self.cooldown_s),
            ("reset_delay_s", self.reset_delay_s),
            ("queue_timeout_s", self.queue_timeout_s),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::invalid(field(name), "must be non-negative"));
            }
        }
        if self.batch_size == 0 {
            return Err(ConfigError::invalid(field("batch_size"), "must be at least 1"));
        }
        Ok(())
    }

    pub fn idle_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.queue_timeout_s).unwrap_or(Duration::ZERO)
    }
}
