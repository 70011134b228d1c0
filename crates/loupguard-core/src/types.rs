//! Data model shared by every worker.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Free-form metadata attached to events and frames.
pub type Meta = serde_json::Map<String, Value>;

/// Axis-aligned box in pixel coordinates, serialized as `[x1, y1, x2, y2]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }
}

impl From<[f64; 4]> for BoundingBox {
    fn from(v: [f64; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x1, b.y1, b.x2, b.y2]
    }
}

/// Output of one detector pass over one frame.
///
/// `boxes`, `scores` and `labels` are parallel sequences.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DetectionEvent {
    #[serde(default)]
    pub boxes: Vec<BoundingBox>,
    #[serde(default)]
    pub scores: Vec<f64>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub timestamp: f64,
    #[serde(default)]
    pub meta: Meta,
}

impl DetectionEvent {
    /// An event with no detections.
    pub fn empty(timestamp: f64) -> Self {
        Self {
            timestamp,
            ..Default::default()
        }
    }

    /// Whether at least one box was detected.
    pub fn has_detections(&self) -> bool {
        !self.boxes.is_empty()
    }

    /// Sum of all confidence scores.
    pub fn total_score(&self) -> f64 {
        self.scores.iter().sum()
    }
}

/// Encoded image bytes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// MIME type of `data`, e.g. `image/jpeg`.
    pub content_type: String,
    pub data: Bytes,
}

impl Frame {
    /// File extension matching the content type.
    pub fn extension(&self) -> &'static str {
        match self.content_type.as_str() {
            "image/jpeg" | "image/jpg" => "jpg",
            "image/png" => "png",
            _ => "bin",
        }
    }
}

/// A captured frame travelling through the frame queue.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameItem {
    pub frame: Frame,
    pub timestamp: f64,
    pub meta: Meta,
}

/// The newest annotated frame, published by the detector.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedSnapshot {
    pub frame: Frame,
    pub timestamp: f64,
    pub num_detections: usize,
    /// Metadata of the detection that produced the frame.
    pub meta: Meta,
}

/// Severity of a diagnostic entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
        };
        f.write_str(s)
    }
}

/// One entry of the bounded diagnostic stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorLogEntry {
    pub timestamp: f64,
    pub source: String,
    pub severity: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Trigger flag together with its transition timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TriggerState {
    pub active: bool,
    pub last_set: Option<f64>,
    pub last_cleared: Option<f64>,
}

/// Actuator position snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActuatorState {
    /// Degrees from the sweep origin.
    pub angle: f64,
    /// +1 forward, -1 backward.
    pub direction: i8,
    pub moving: bool,
    pub timestamp: f64,
}

impl Default for ActuatorState {
    fn default() -> Self {
        Self {
            angle: 0.0,
            direction: 1,
            moving: false,
            timestamp: 0.0,
        }
    }
}

/// Radio link counters and last-seen values.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LinkHealth {
    pub rx_count: u64,
    pub tx_count: u64,
    pub error_count: u64,
    pub last_rx_ts: Option<f64>,
    pub last_tx_ts: Option<f64>,
    pub last_error_ts: Option<f64>,
    pub last_error_type: Option<String>,
    pub last_rssi: Option<f64>,
    pub last_snr: Option<f64>,
    pub last_rx_payload: Option<String>,
    pub last_status_line: Option<String>,
}

/// A received radio payload with its link-quality line, when one arrived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceivedMessage {
    pub payload: String,
    pub rssi_dbm: Option<f64>,
    pub snr_db: Option<f64>,
    pub raw_lines: Vec<String>,
    pub timestamp: f64,
}

impl ReceivedMessage {
    pub fn new(payload: impl Into<String>, raw_line: impl Into<String>, timestamp: f64) -> Self {
        Self {
            payload: payload.into(),
            rssi_dbm: None,
            snr_db: None,
            raw_lines: vec![raw_line.into()],
            timestamp,
        }
    }

    /// True when no link-quality data was paired with the payload.
    pub fn is_degraded(&self) -> bool {
        self.rssi_dbm.is_none() && self.snr_db.is_none()
    }
}

/// A message waiting in the outbound radio queue.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMessage {
    Text(String),
    Bytes(Bytes),
    /// Map carrying a `payload` field.
    Record(Meta),
}

impl From<&str> for OutboundMessage {
    fn from(s: &str) -> Self {
        OutboundMessage::Text(s.to_string())
    }
}

impl From<String> for OutboundMessage {
    fn from(s: String) -> Self {
        OutboundMessage::Text(s)
    }
}

impl From<Vec<u8>> for OutboundMessage {
    fn from(b: Vec<u8>) -> Self {
        OutboundMessage::Bytes(Bytes::from(b))
    }
}

impl From<Bytes> for OutboundMessage {
    fn from(b: Bytes) -> Self {
        OutboundMessage::Bytes(b)
    }
}

impl From<Meta> for OutboundMessage {
    fn from(m: Meta) -> Self {
        OutboundMessage::Record(m)
    }
}

/// Lifecycle status of a supervised worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerStatus {
    #[default]
    Starting,
    Running,
    /// Stopped on request.
    Stopped,
    /// Stopped itself after init failure or too many consecutive failures.
    Halted,
}

/// Health record of one worker.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WorkerHealth {
    pub status: WorkerStatus,
    pub last_heartbeat: Option<f64>,
    pub last_step_duration_s: Option<f64>,
    pub last_failure: Option<String>,
    pub last_failure_ts: Option<f64>,
    pub ok_count: u64,
    pub fail_count: u64,
    pub consecutive_failures: u32,
}
