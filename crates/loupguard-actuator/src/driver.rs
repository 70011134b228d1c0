//! Stepper driver seam.
//!
//! Pin writes are synchronous and cheap; all timing between them belongs to
//! the coordinator so it can be cancelled.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::ActuatorError;

/// Direction, enable and step lines of a stepper driver.
pub trait StepperDriver: Send {
    fn enable(&mut self) -> Result<(), ActuatorError>;

    fn disable(&mut self) -> Result<(), ActuatorError>;

    /// `1` drives towards the end of the arc, `-1` back to its start.
    fn set_direction(&mut self, direction: i8) -> Result<(), ActuatorError>;

    /// Drive the step line. A low-to-high transition moves one micro-step.
    fn set_step(&mut self, high: bool) -> Result<(), ActuatorError>;
}

/// What a [`SimulatedStepper`] has been told so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepperLog {
    pub enabled: bool,
    pub direction: i8,
    pub step_high: bool,
    /// Rising edges seen on the step line.
    pub pulses: u64,
    /// Net micro-steps, signed by direction.
    pub position: i64,
}

/// In-memory driver for benches without motor hardware.
///
/// Clones share one log.
#[derive(Debug, Clone, Default)]
pub struct SimulatedStepper {
    log: Arc<Mutex<StepperLog>>,
}

impl SimulatedStepper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> StepperLog {
        self.log.lock().clone()
    }
}

impl StepperDriver for SimulatedStepper {
    fn enable(&mut self) -> Result<(), ActuatorError> {
        self.log.lock().enabled = true;
        debug!("Simulated stepper enabled");
        Ok(())
    }

    fn disable(&mut self) -> Result<(), ActuatorError> {
        self.log.lock().enabled = false;
        debug!("Simulated stepper disabled");
        Ok(())
    }

    fn set_direction(&mut self, direction: i8) -> Result<(), ActuatorError> {
        self.log.lock().direction = direction.signum();
        Ok(())
    }

    fn set_step(&mut self, high: bool) -> Result<(), ActuatorError> {
        let mut log = self.log.lock();
        if high && !log.step_high {
            log.pulses += 1;
            log.position += i64::from(log.direction);
        }
        log.step_high = high;
        Ok(())
    }
}
