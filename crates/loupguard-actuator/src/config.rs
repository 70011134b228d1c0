//! Actuator configuration.

use loupguard_config::{ConfigError, Settings};
use serde::{Deserialize, Serialize};

/// Options under the `motor_` prefix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActuatorConfig {
    #[serde(default = "default_steps_per_rev")]
    pub steps_per_rev: u32,
    #[serde(default = "default_microsteps")]
    pub microsteps: u32,
    /// Width of the sweep arc, degrees.
    #[serde(default = "default_sweep_angle_deg")]
    pub sweep_angle_deg: f64,
    /// Micro-steps per iteration; state is published once per batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    /// Duration of each pulse phase (high, then low), seconds.
    #[serde(default = "default_step_delay_s")]
    pub step_delay_s: f64,
    /// Pause at each end of the arc, seconds.
    #[serde(default = "default_dir_delay_s")]
    pub dir_delay_s: f64,
    /// Dwell after an alert, seconds.
    #[serde(default = "default_pause_s")]
    pub pause_s: f64,
    #[serde(default = "default_pause_poll_s")]
    pub pause_poll_s: f64,
    /// Bound on the wait for room in the outbound radio queue, seconds.
    #[serde(default = "default_alert_enqueue_timeout_s")]
    pub alert_enqueue_timeout_s: f64,
    /// Run the short back-and-forth wiggle at init.
    #[serde(default = "default_calibrate")]
    pub calibrate: bool,
    #[serde(default = "default_calibration_steps")]
    pub calibration_steps: u32,
    #[serde(default = "default_calibration_step_delay_s")]
    pub calibration_step_delay_s: f64,
}

fn default_steps_per_rev() -> u32 {
    200
}

fn default_microsteps() -> u32 {
    16
}

fn default_sweep_angle_deg() -> f64 {
    120.0
}

fn default_batch_size() -> u32 {
    20
}

fn default_step_delay_s() -> f64 {
    0.005
}

fn default_dir_delay_s() -> f64 {
    0.2
}

fn default_pause_s() -> f64 {
    2.0
}

fn default_pause_poll_s() -> f64 {
    0.05
}

fn default_alert_enqueue_timeout_s() -> f64 {
    0.5
}

fn default_calibrate() -> bool {
    true
}

fn default_calibration_steps() -> u32 {
    50
}

fn default_calibration_step_delay_s() -> f64 {
    0.002
}

impl Default for ActuatorConfig {
    fn default() -> Self {
        Self {
            steps_per_rev: default_steps_per_rev(),
            microsteps: default_microsteps(),
            sweep_angle_deg: default_sweep_angle_deg(),
            batch_size: default_batch_size(),
            step_delay_s: default_step_delay_s(),
            dir_delay_s: default_dir_delay_s(),
            pause_s: default_pause_s(),
            pause_poll_s: default_pause_poll_s(),
            alert_enqueue_timeout_s: default_alert_enqueue_timeout_s(),
            calibrate: default_calibrate(),
            calibration_steps: default_calibration_steps(),
            calibration_step_delay_s: default_calibration_step_delay_s(),
        }
    }
}

impl ActuatorConfig {
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        let config: Self = settings.scoped(crate::WORKER_NAME).extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let field = |name: &str| format!("{}_{}", crate::WORKER_NAME, name);

        if self.steps_per_rev == 0 || self.microsteps == 0 {
            return Err(ConfigError::invalid(field("steps_per_rev"), "must be at least 1"));
        }
        if !(self.sweep_angle_deg > 0.0 && self.sweep_angle_deg <= 360.0) {
            return Err(ConfigError::invalid(
                field("sweep_angle_deg"),
                "must be within (0, 360]",
            ));
        }
        if crate::SweepGeometry::from_config(self).steps_to_sweep() < 1 {
            return Err(ConfigError::invalid(
                field("sweep_angle_deg"),
                "arc is shorter than one step",
            ));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::invalid(field("batch_size"), "must be at least 1"));
        }
        for (name, value) in [
            ("step_delay_s", self.step_delay_s),
            ("dir_delay_s", self.dir_delay_s),
            ("pause_s", self.pause_s),
            ("alert_enqueue_timeout_s", self.alert_enqueue_timeout_s),
            ("calibration_step_delay_s", self.calibration_step_delay_s),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::invalid(field(name), "must be non-negative"));
            }
        }
        if !(self.pause_poll_s.is_finite() && self.pause_poll_s > 0.0) {
            return Err(ConfigError::invalid(field("pause_poll_s"), "must be positive"));
        }
        Ok(())
    }
}
