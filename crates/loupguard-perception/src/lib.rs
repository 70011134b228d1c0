//! # LoupGuard Perception
//!
//! The collaborators around the core: frame capture, detection, detection
//! replay and archival of trigger events.
//!
//! Camera access and model inference sit behind the [`FrameSource`] and
//! [`Detector`] seams. The crate ships a directory-backed source and a
//! pass-through detector for benches; the replay worker can stand in for
//! both.

mod archive;
mod capture;
mod config;
mod detector;
mod error;
mod replay;
mod seams;

pub use archive::{ArchiveRecord, ArchiveWorker};
pub use capture::CaptureWorker;
pub use config::{ArchiveConfig, CaptureConfig, DetectorConfig, ReplayConfig};
pub use detector::DetectorWorker;
pub use error::PerceptionError;
pub use replay::{ReplayWorker, load_events};
pub use seams::{Detections, Detector, DirectorySource, FrameSource, PassthroughDetector};

/// Worker names, also their configuration prefixes.
pub mod names {
    pub const CAPTURE: &str = "camera";
    pub const DETECTOR: &str = "detector";
    pub const REPLAY: &str = "replay";
    pub const ARCHIVE: &str = "logger";
}
