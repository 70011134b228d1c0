//! # LoupGuard Actuator
//!
//! Sweeps a stepper back and forth across a fixed arc and reacts to the
//! trigger flag.
//!
//! ```text
//!            rising edge of trigger_flag
//!   SCANNING ---------------------------> ALERT_PAUSED
//!      ^      (send LOUP_ANGLE:<deg>)          |
//!      +------------ dwell elapsed ------------+
//! ```
//!
//! Position and direction survive the pause, so the sweep resumes where it
//! stopped.

mod config;
mod driver;
mod error;
mod geometry;
mod worker;

pub use config::ActuatorConfig;
pub use driver::{SimulatedStepper, StepperDriver, StepperLog};
pub use error::ActuatorError;
pub use geometry::{SweepGeometry, alert_payload};
pub use worker::{ActuatorWorker, MotionState};

/// Configuration prefix and worker name.
pub const WORKER_NAME: &str = "motor";
