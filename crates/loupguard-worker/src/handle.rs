//! Spawning and stopping workers.

use std::sync::Arc;
use std::time::Duration;

use loupguard_core::Hub;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::context::WorkerContext;
use crate::error::WorkerError;
use crate::runner::{run_worker, SupervisorConfig, Worker, WorkerExit};

/// A worker running on its own task.
#[derive(Debug)]
pub struct WorkerHandle {
    name: String,
    cancel: CancellationToken,
    join: JoinHandle<WorkerExit>,
}

impl WorkerHandle {
    /// Spawn `worker` with a stop signal derived from `parent`.
    pub fn spawn<W>(
        worker: W,
        hub: Arc<Hub>,
        supervisor: SupervisorConfig,
        parent: &CancellationToken,
    ) -> Self
    where
        W: Worker + 'static,
    {
        let name = worker.name().to_string();
        let cancel = parent.child_token();
        let ctx = WorkerContext::new(name.as_str(), hub, cancel.clone());

        let join = tokio::spawn(async move {
            let mut worker = worker;
            run_worker(&mut worker, &ctx, &supervisor).await
        });

        Self { name, cancel, join }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Request a cooperative stop.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the run-loop to end.
    pub async fn join(self) -> Result<WorkerExit, WorkerError> {
        self.join
            .await
            .map_err(|e| WorkerError::Join(format!("{}: {}", self.name, e)))
    }

    /// Stop and wait at most `timeout`. Returns `None` if the worker did not
    /// finish in time; it is then aborted.
    pub async fn shutdown(self, timeout: Duration) -> Option<WorkerExit> {
        self.stop();
        let Self { name, join, .. } = self;
        let abort = join.abort_handle();

        match tokio::time::timeout(timeout, join).await {
            Ok(Ok(exit)) => Some(exit),
            Ok(Err(e)) => {
                warn!("Worker '{}' task failed: {}", name, e);
                None
            }
            Err(_) => {
                warn!(
                    "Worker '{}' did not stop within {:?}, aborting",
                    name, timeout
                );
                abort.abort();
                None
            }
        }
    }
}

/// All workers of one process, sharing one stop signal.
#[derive(Debug)]
pub struct WorkerSet {
    hub: Arc<Hub>,
    cancel: CancellationToken,
    handles: Vec<WorkerHandle>,
}

impl WorkerSet {
    pub fn new(hub: Arc<Hub>) -> Self {
        Self {
            hub,
            cancel: CancellationToken::new(),
            handles: Vec::new(),
        }
    }

    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    /// Spawn a worker into the set.
    pub fn spawn<W>(&mut self, worker: W, supervisor: SupervisorConfig)
    where
        W: Worker + 'static,
    {
        info!("Spawning worker '{}'", worker.name());
        let handle = WorkerHandle::spawn(worker, self.hub.clone(), supervisor, &self.cancel);
        self.handles.push(handle);
    }

    pub fn names(&self) -> Vec<&str> {
        self.handles.iter().map(|h| h.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Whether every worker has exited on its own.
    pub fn all_finished(&self) -> bool {
        self.handles.iter().all(|h| h.is_finished())
    }

    /// Signal every worker to stop without waiting.
    pub fn stop_all(&self) {
        self.cancel.cancel();
    }

    /// Stop every worker and wait for each with a bounded timeout.
    pub async fn shutdown(self, timeout: Duration) -> Vec<(String, Option<WorkerExit>)> {
        info!("Stopping {} workers", self.handles.len());
        self.cancel.cancel();

        let mut results = Vec::with_capacity(self.handles.len());
        for handle in self.handles {
            let name = handle.name().to_string();
            let exit = handle.shutdown(timeout).await;
            results.push((name, exit));
        }
        results
    }
}
