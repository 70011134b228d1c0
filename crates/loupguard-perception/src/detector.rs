//! Detector worker.

use async_trait::async_trait;
use loupguard_core::{DetectionEvent, ProcessedSnapshot, Severity};
use loupguard_worker::{Worker, WorkerContext, WorkerError};
use serde_json::json;
use tokio::time::Instant;
use tracing::info;

use crate::config::DetectorConfig;
use crate::names;
use crate::seams::Detector;

/// Runs a [`Detector`] over queued frames and publishes its results.
pub struct DetectorWorker<D> {
    config: DetectorConfig,
    detector: D,
}

impl<D: Detector> DetectorWorker<D> {
    pub fn new(config: DetectorConfig, detector: D) -> Self {
        Self { config, detector }
    }
}

#[async_trait]
impl<D: Detector> Worker for DetectorWorker<D> {
    fn name(&self) -> &str {
        names::DETECTOR
    }

    async fn init(&mut self, ctx: &WorkerContext) -> Result<(), WorkerError> {
        info!("[{}] Using detector {}", ctx.name(), self.detector.describe());
        Ok(())
    }

    async fn step(&mut self, ctx: &WorkerContext) -> Result<(), WorkerError> {
        let hub = ctx.hub();
        let Some(item) = hub.frames().pop(Some(self.config.queue_timeout())).await else {
            return Ok(());
        };

        if item.frame.data.is_empty() {
            ctx.log_event(Severity::Warning, "Received an empty frame", None);
            return Ok(());
        }

        let started = Instant::now();
        let detections = self.detector.detect(&item.frame).await?;
        let inference_ms = started.elapsed().as_secs_f64() * 1000.0;

        let mut meta = item.meta;
        meta.insert("detector".into(), json!(self.detector.describe()));
        meta.insert("frame_timestamp".into(), json!(item.timestamp));
        meta.insert("inference_ms".into(), json!(inference_ms));
        meta.insert("detections".into(), json!(detections.boxes.len()));

        let now = ctx.now();
        let count = detections.boxes.len();
        let snapshot = ProcessedSnapshot {
            frame: detections.annotated,
            timestamp: now,
            num_detections: count,
            meta: meta.clone(),
        };
        let event = DetectionEvent {
            boxes: detections.boxes,
            scores: detections.scores,
            labels: detections.labels,
            timestamp: now,
            meta,
        };
        hub.publish_detection(event, Some(snapshot));

        if count > 0 {
            ctx.log_event(
                Severity::Info,
                format!("Detection found: {count} object(s)."),
                None,
            );
        }
        Ok(())
    }
}
