//! Step counts and angles of the sweep arc.

use crate::config::ActuatorConfig;

/// Maps a step index in `0..=steps_to_sweep` onto the sweep arc.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepGeometry {
    steps_to_sweep: i64,
    sweep_angle_deg: f64,
}

impl SweepGeometry {
    pub fn new(steps_per_rev: u32, microsteps: u32, sweep_angle_deg: f64) -> Self {
        let full_turn = f64::from(steps_per_rev) * f64::from(microsteps);
        Self {
            steps_to_sweep: (sweep_angle_deg / 360.0 * full_turn) as i64,
            sweep_angle_deg,
        }
    }

    pub fn from_config(config: &ActuatorConfig) -> Self {
        Self::new(config.steps_per_rev, config.microsteps, config.sweep_angle_deg)
    }

    pub fn steps_to_sweep(&self) -> i64 {
        self.steps_to_sweep
    }

    /// Angle of `index`, degrees from the start of the arc.
    pub fn angle(&self, index: i64) -> f64 {
        index as f64 / self.steps_to_sweep as f64 * self.sweep_angle_deg
    }

    /// Whether a step moving in `direction` has reached the end of the arc.
    pub fn at_boundary(&self, index: i64, direction: i8) -> bool {
        if direction > 0 {
            index >= self.steps_to_sweep
        } else {
            index <= 0
        }
    }
}

/// Radio alert for a trigger seen at `angle`.
pub fn alert_payload(angle: f64) -> String {
    format!("LOUP_ANGLE:{angle:.1}")
}
