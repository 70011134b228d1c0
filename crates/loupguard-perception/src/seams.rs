//! Camera and model seams, plus bench implementations.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use loupguard_core::{BoundingBox, Frame};
use tracing::info;

use crate::error::PerceptionError;

/// Produces encoded frames.
#[async_trait]
pub trait FrameSource: Send {
    /// Human-readable device name, recorded in frame metadata.
    fn describe(&self) -> String;

    async fn open(&mut self) -> Result<(), PerceptionError> {
        Ok(())
    }

    /// Next frame. May wait for the device.
    async fn next_frame(&mut self) -> Result<Frame, PerceptionError>;

    async fn close(&mut self) -> Result<(), PerceptionError> {
        Ok(())
    }
}

/// Output of one inference pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Detections {
    pub boxes: Vec<BoundingBox>,
    pub scores: Vec<f64>,
    pub labels: Vec<String>,
    /// The input frame with detections drawn on it.
    pub annotated: Frame,
}

/// Runs a model over one frame.
#[async_trait]
pub trait Detector: Send {
    fn describe(&self) -> String;

    async fn detect(&mut self, frame: &Frame) -> Result<Detections, PerceptionError>;
}

fn content_type_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        _ => None,
    }
}

/// Cycles through the JPEG and PNG files of a directory, in name order.
#[derive(Debug)]
pub struct DirectorySource {
    dir: PathBuf,
    files: Vec<PathBuf>,
    cursor: usize,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            files: Vec::new(),
            cursor: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[async_trait]
impl FrameSource for DirectorySource {
    fn describe(&self) -> String {
        format!("dir:{}", self.dir.display())
    }

    async fn open(&mut self) -> Result<(), PerceptionError> {
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if content_type_for(&path).is_some() {
                files.push(path);
            }
        }
        files.sort();

        if files.is_empty() {
            return Err(PerceptionError::Source(format!(
                "no images in {}",
                self.dir.display()
            )));
        }
        info!("Frame source {} holds {} images", self.dir.display(), files.len());
        self.files = files;
        self.cursor = 0;
        Ok(())
    }

    async fn next_frame(&mut self) -> Result<Frame, PerceptionError> {
        let path = self
            .files
            .get(self.cursor)
            .ok_or_else(|| PerceptionError::Source("source is not open".to_string()))?;
        let data = tokio::fs::read(path).await?;
        let content_type = content_type_for(path).unwrap_or("application/octet-stream");
        self.cursor = (self.cursor + 1) % self.files.len();

        Ok(Frame {
            width: 0,
            height: 0,
            content_type: content_type.to_string(),
            data: Bytes::from(data),
        })
    }
}

/// Finds nothing and returns the frame untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughDetector;

#[async_trait]
impl Detector for PassthroughDetector {
    fn describe(&self) -> String {
        "passthrough".to_string()
    }

    async fn detect(&mut self, frame: &Frame) -> Result<Detections, PerceptionError> {
        Ok(Detections {
            boxes: Vec::new(),
            scores: Vec::new(),
            labels: Vec::new(),
            annotated: frame.clone(),
        })
    }
}
