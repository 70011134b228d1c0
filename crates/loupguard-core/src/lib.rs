//! # LoupGuard Core
//!
//! Shared state hub and data model for the LoupGuard controller.
//!
//! Every worker in the system reaches shared state exclusively through the
//! [`Hub`]:
//!
//! - Bounded FIFO queues with per-call backpressure ([`BoundedQueue`])
//! - A key/value registry with copy-on-read semantics
//! - A single change notifier dedicated to the trigger flag
//! - Per-worker health records
//! - A single-slot "latest processed snapshot"
//! - An escape-hatch resource map ([`Hub::get_or_create`])
//!
//! ## Usage
//!
//! ```rust,ignore
//! use loupguard_core::{Backpressure, Hub, HubConfig};
//!
//! let hub = Hub::new(HubConfig::default());
//! hub.detections().push_drop_oldest(event);
//! hub.set_trigger(true);
//! ```

pub mod clock;
pub mod error;
pub mod hub;
pub mod keys;
pub mod queue;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::HubError;
pub use hub::{Hub, HubConfig, HubSnapshot, QueueDepth};
pub use queue::{Backpressure, BoundedQueue};
pub use types::{
    ActuatorState, BoundingBox, DetectionEvent, ErrorLogEntry, Frame, FrameItem, LinkHealth,
    Meta, OutboundMessage, ProcessedSnapshot, ReceivedMessage, Severity, TriggerState,
    WorkerHealth, WorkerStatus,
};
