//! Detection replay worker.
//!
//! Feeds recorded detection events into the hub so the decision, actuator and
//! link workers can run on a bench without camera or model.
//!
//! The file holds one JSON event per line; blank lines and lines starting
//! with `#` are skipped:
//!
//! ```text
//! {"boxes": [[10, 10, 50, 80]], "scores": [0.91], "labels": ["loup"]}
//! {"boxes": [], "scores": [], "labels": []}
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use loupguard_core::DetectionEvent;
use loupguard_worker::{Worker, WorkerContext, WorkerError};
use tracing::{debug, info};

use crate::config::ReplayConfig;
use crate::error::PerceptionError;
use crate::names;

/// Parse a replay file.
pub async fn load_events(path: &Path) -> Result<Vec<DetectionEvent>, PerceptionError> {
    let content = tokio::fs::read_to_string(path).await?;
    let replay_error = |line: usize, message: String| PerceptionError::Replay {
        path: path.display().to_string(),
        line,
        message,
    };

    let mut events = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let event: DetectionEvent =
            serde_json::from_str(line).map_err(|e| replay_error(idx + 1, e.to_string()))?;
        events.push(event);
    }

    if events.is_empty() {
        return Err(replay_error(0, "no events".to_string()));
    }
    Ok(events)
}

/// Pushes one recorded event per period, stamped with the current time.
pub struct ReplayWorker {
    config: ReplayConfig,
    path: PathBuf,
    events: Vec<DetectionEvent>,
    cursor: usize,
    passes: u64,
}

impl ReplayWorker {
    pub fn new(config: ReplayConfig, path: impl Into<PathBuf>) -> Self {
        Self {
            config,
            path: path.into(),
            events: Vec::new(),
            cursor: 0,
            passes: 0,
        }
    }

    /// Completed passes over the file.
    pub fn passes(&self) -> u64 {
        self.passes
    }
}

#[async_trait]
impl Worker for ReplayWorker {
    fn name(&self) -> &str {
        names::REPLAY
    }

    async fn init(&mut self, ctx: &WorkerContext) -> Result<(), WorkerError> {
        self.events = load_events(&self.path).await?;
        self.cursor = 0;
        info!(
            "[{}] Replaying {} events from {} every {}s",
            ctx.name(),
            self.events.len(),
            self.path.display(),
            self.config.period_s
        );
        Ok(())
    }

    async fn step(&mut self, ctx: &WorkerContext) -> Result<(), WorkerError> {
        let Some(mut event) = self.events.get(self.cursor).cloned() else {
            ctx.request_stop();
            return Ok(());
        };
        event.timestamp = ctx.now();
        ctx.hub().detections().push_drop_oldest(event);

        self.cursor += 1;
        if self.cursor == self.events.len() {
            self.passes += 1;
            if !self.config.loop_playback {
                info!("[{}] Replay finished after {} events", ctx.name(), self.cursor);
                ctx.request_stop();
                return Ok(());
            }
            debug!("[{}] Replay pass {} done, looping", ctx.name(), self.passes);
            self.cursor = 0;
        }

        ctx.sleep(self.config.period()).await;
        Ok(())
    }
}
