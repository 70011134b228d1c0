//! Archival logger worker.
//!
//! Writes one JSON line per trigger cycle to the working log and keeps the
//! annotated frame next to it. Failures land in the hub's error log; they
//! never fail the worker.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use loupguard_core::{ActuatorState, Meta, Severity};
use loupguard_worker::{Worker, WorkerContext, WorkerError};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::config::ArchiveConfig;
use crate::names;

/// Metadata of the processed snapshot at trigger time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotInfo {
    pub item_timestamp: f64,
    pub width: u32,
    pub height: u32,
    pub content_type: String,
    pub detection_count: usize,
    /// Detector metadata: source, inference time, frame timestamp.
    #[serde(default)]
    pub meta: Meta,
}

/// One line of the working log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveRecord {
    pub event_id: String,
    pub timestamp_utc: String,
    pub trigger_source: String,
    pub motor_location: Option<ActuatorState>,
    pub processed_image_info: Option<SnapshotInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_archive_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_archive_error: Option<String>,
}

/// Watches the trigger flag and archives each trigger cycle once.
pub struct ArchiveWorker {
    config: ArchiveConfig,
    log_path: PathBuf,
    archive_dir: PathBuf,
    logging_active: bool,
    records: u64,
}

impl ArchiveWorker {
    pub fn new(config: ArchiveConfig) -> Self {
        Self {
            log_path: config.working_log_path(),
            archive_dir: config.image_archive_dir(),
            config,
            logging_active: false,
            records: 0,
        }
    }

    /// Records written so far.
    pub fn records(&self) -> u64 {
        self.records
    }

    async fn archive(&mut self, ctx: &WorkerContext) {
        let hub = ctx.hub();
        let now = ctx.now();
        let stamp = DateTime::<Utc>::from_timestamp_micros((now * 1e6) as i64).unwrap_or_default();
        let event_id = stamp.format("%Y%m%d_%H%M%S_%3f").to_string();

        let mut record = ArchiveRecord {
            event_id: event_id.clone(),
            timestamp_utc: stamp.to_rfc3339_opts(SecondsFormat::Micros, true),
            trigger_source: ctx.name().to_string(),
            motor_location: hub.actuator_state(),
            processed_image_info: None,
            image_archive_path: None,
            image_archive_error: None,
        };

        if let Some(snapshot) = hub.latest_snapshot() {
            record.processed_image_info = Some(SnapshotInfo {
                item_timestamp: snapshot.timestamp,
                width: snapshot.frame.width,
                height: snapshot.frame.height,
                content_type: snapshot.frame.content_type.clone(),
                detection_count: snapshot.num_detections,
                meta: snapshot.meta.clone(),
            });

            let image_path = self
                .archive_dir
                .join(format!("{}_det.{}", event_id, snapshot.frame.extension()));
            match tokio::fs::write(&image_path, &snapshot.frame.data).await {
                Ok(()) => record.image_archive_path = Some(image_path.display().to_string()),
                Err(e) => record.image_archive_error = Some(format!("Failed to save image: {e}")),
            }
        }

        match append_line(&self.log_path, &record).await {
            Ok(()) => {
                self.records += 1;
                info!("[{}] Logged event {}", ctx.name(), event_id);
            }
            Err(e) => ctx.log_event(
                Severity::Error,
                format!("Failed to write log file: {e}"),
                None,
            ),
        }
    }
}

async fn append_line(path: &Path, record: &ArchiveRecord) -> std::io::Result<()> {
    let mut line = serde_json::to_string(record)?;
    line.push('\n');
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(line.as_bytes()).await?;
    file.flush().await
}

#[async_trait]
impl Worker for ArchiveWorker {
    fn name(&self) -> &str {
        names::ARCHIVE
    }

    async fn init(&mut self, ctx: &WorkerContext) -> Result<(), WorkerError> {
        if let Some(parent) = self.log_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::create_dir_all(&self.archive_dir).await?;
        info!(
            "[{}] Logging to {}, archiving to {}",
            ctx.name(),
            self.log_path.display(),
            self.archive_dir.display()
        );
        Ok(())
    }

    async fn step(&mut self, ctx: &WorkerContext) -> Result<(), WorkerError> {
        let flag = ctx.hub().trigger_flag();
        if flag && !self.logging_active {
            self.logging_active = true;
            self.archive(ctx).await;
        } else if !flag && self.logging_active {
            self.logging_active = false;
        }

        // Wakes early when the trigger is raised; clearing is seen on timeout.
        let hub = ctx.hub().clone();
        tokio::select! {
            _ = ctx.cancel_token().cancelled() => {}
            _ = hub.wait_for_change(self.config.poll_interval()) => {}
        }
        Ok(())
    }
}
