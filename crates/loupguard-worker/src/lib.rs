//! # LoupGuard Worker
//!
//! Supervised execution of one logical task.
//!
//! A [`Worker`] provides `init`, `step` and `teardown`. [`run_worker`] is the
//! single run-loop shared by every worker: it times each step, keeps the
//! worker's health record in the hub, backs off after failures and stops the
//! worker once too many steps fail in a row.

mod context;
mod error;
mod handle;
mod runner;

pub use context::WorkerContext;
pub use error::WorkerError;
pub use handle::{WorkerHandle, WorkerSet};
pub use runner::{run_worker, SupervisorConfig, Worker, WorkerExit};
