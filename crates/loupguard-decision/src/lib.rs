//! # LoupGuard Decision
//!
//! Turns the noisy detection stream into one debounced trigger flag.
//!
//! A trigger fires when a sliding window of recent detection events shows
//! sustained presence (enough samples, enough frames with boxes, enough total
//! confidence) and the cooldown since the previous trigger has elapsed. A set
//! trigger clears itself after a fixed delay, independently of new data.

mod config;
mod engine;
mod window;
mod worker;

pub use config::DecisionConfig;
pub use engine::{DecisionEngine, TriggerDecision};
pub use window::{DetectionWindow, PresenceStats, MIN_SAMPLES};
pub use worker::DecisionWorker;

/// Configuration prefix and worker name.
pub const WORKER_NAME: &str = "decision_logic";
