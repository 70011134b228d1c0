//! Frame capture worker.

use async_trait::async_trait;
use loupguard_core::{FrameItem, Meta};
use loupguard_worker::{Worker, WorkerContext, WorkerError};
use serde_json::json;
use tracing::{debug, info};

use crate::config::CaptureConfig;
use crate::names;
use crate::seams::FrameSource;

/// Pulls frames from a [`FrameSource`] into the hub's frame queue.
///
/// The queue drops its oldest frame when full, so a slow detector always
/// sees recent images.
pub struct CaptureWorker<S> {
    config: CaptureConfig,
    source: S,
    last_frame_ts: Option<f64>,
}

impl<S: FrameSource> CaptureWorker<S> {
    pub fn new(config: CaptureConfig, source: S) -> Self {
        Self {
            config,
            source,
            last_frame_ts: None,
        }
    }
}

#[async_trait]
impl<S: FrameSource> Worker for CaptureWorker<S> {
    fn name(&self) -> &str {
        names::CAPTURE
    }

    async fn init(&mut self, ctx: &WorkerContext) -> Result<(), WorkerError> {
        self.source.open().await?;
        info!("[{}] Capturing from {}", ctx.name(), self.source.describe());
        Ok(())
    }

    async fn step(&mut self, ctx: &WorkerContext) -> Result<(), WorkerError> {
        if let Some(last) = self.last_frame_ts {
            let remaining = self.config.period_s - (ctx.now() - last);
            if remaining > 0.0 && !ctx.sleep_secs(remaining).await {
                return Ok(());
            }
        }

        let frame = self.source.next_frame().await?;
        let now = ctx.now();

        let mut meta = Meta::new();
        meta.insert("source".into(), json!(self.source.describe()));
        meta.insert("width".into(), json!(frame.width));
        meta.insert("height".into(), json!(frame.height));

        let item = FrameItem {
            frame,
            timestamp: now,
            meta,
        };
        if ctx.hub().frames().push_drop_oldest(item).is_some() {
            debug!("[{}] Frame queue full, dropped oldest frame", ctx.name());
        }
        self.last_frame_ts = Some(now);
        Ok(())
    }

    async fn teardown(&mut self, ctx: &WorkerContext) -> Result<(), WorkerError> {
        info!("[{}] Releasing {}", ctx.name(), self.source.describe());
        self.source.close().await?;
        Ok(())
    }
}
