//! Foreground controller run.

use std::path::Path;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use loupguard_worker::WorkerExit;

use crate::cli::RunArgs;
use crate::register::Plan;
use crate::status;

/// Upper bound on waiting for each worker at shutdown.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// How often the run loop checks whether every worker has exited.
const WATCH_INTERVAL: Duration = Duration::from_secs(1);

/// Run the controller until a shutdown signal or until every worker exits.
pub(crate) async fn run_server(
    config_path: &Path,
    args: RunArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting LoupGuard v{}", env!("CARGO_PKG_VERSION"));

    let settings = crate::load_settings(config_path)?;
    let plan = Plan::new(settings, &args)?;
    let hub = plan.build_hub();
    let workers = plan.spawn(hub.clone())?;

    let status_stop = CancellationToken::new();
    let status_task = args.status_addr.map(|addr| {
        let hub = hub.clone();
        let stop = status_stop.clone();
        tokio::spawn(async move {
            if let Err(e) = status::serve(addr, hub, stop).await {
                error!("Status endpoint failed: {}", e);
            }
        })
    });

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    let mut watch = tokio::time::interval(WATCH_INTERVAL);
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = watch.tick() => {
                if workers.all_finished() {
                    warn!("All workers have exited");
                    break;
                }
            }
        }
    }

    for (name, exit) in workers.shutdown(SHUTDOWN_TIMEOUT).await {
        match exit {
            Some(WorkerExit::Halted) => warn!("Worker '{}' halted", name),
            Some(WorkerExit::Stopped) => info!("Worker '{}' stopped", name),
            None => warn!("Worker '{}' did not stop cleanly", name),
        }
    }

    status_stop.cancel();
    if let Some(task) = status_task {
        let _ = task.await;
    }

    info!("LoupGuard stopped");
    Ok(())
}

/// Resolve on SIGINT or SIGTERM.
#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("Received SIGINT"),
                _ = sigterm.recv() => info!("Received SIGTERM"),
            }
        }
        Err(e) => {
            warn!("Cannot install SIGTERM handler: {}", e);
            let _ = tokio::signal::ctrl_c().await;
            info!("Received SIGINT");
        }
    }
}

/// Resolve on Ctrl+C.
#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Received Ctrl+C");
}
