//! Shared State Hub.
//!
//! Independent resource groups sit behind independent locks: each queue has
//! its own mutex, the key/value registry has one, health records one, the
//! processed snapshot one, and ad-hoc resources live in a sharded map. No lock
//! is ever held across an `.await`.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::HubError;
use crate::keys;
use crate::queue::BoundedQueue;
use crate::types::{
    ActuatorState, DetectionEvent, ErrorLogEntry, FrameItem, LinkHealth, Meta, OutboundMessage,
    ProcessedSnapshot, ReceivedMessage, Severity, TriggerState, WorkerHealth,
};

/// Capacities of the hub-owned queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubConfig {
    #[serde(default = "default_image_queue_size")]
    pub image_queue_size: usize,
    #[serde(default = "default_detection_queue_size")]
    pub detection_queue_size: usize,
    #[serde(default = "default_error_log_size")]
    pub error_log_size: usize,
}

fn default_image_queue_size() -> usize {
    3
}

fn default_detection_queue_size() -> usize {
    20
}

fn default_error_log_size() -> usize {
    200
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            image_queue_size: default_image_queue_size(),
            detection_queue_size: default_detection_queue_size(),
            error_log_size: default_error_log_size(),
        }
    }
}

#[derive(Default)]
struct Registry {
    values: HashMap<String, Value>,
    trigger_last_set: Option<f64>,
    trigger_last_cleared: Option<f64>,
}

/// Depth of one queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueDepth {
    pub len: usize,
    pub capacity: usize,
}

/// Read-only view of the hub for status consumers.
#[derive(Debug, Clone, Serialize)]
pub struct HubSnapshot {
    pub timestamp: f64,
    pub queues: BTreeMap<String, QueueDepth>,
    pub trigger: TriggerState,
    pub actuator: Option<ActuatorState>,
    pub link: Option<LinkHealth>,
    pub has_processed_snapshot: bool,
    pub keys: Vec<String>,
    pub config_keys: Vec<String>,
    pub workers: BTreeMap<String, WorkerHealth>,
}

/// The process-wide shared state hub.
pub struct Hub {
    clock: Arc<dyn Clock>,
    frames: BoundedQueue<FrameItem>,
    detections: BoundedQueue<DetectionEvent>,
    error_log: BoundedQueue<ErrorLogEntry>,
    registry: Mutex<Registry>,
    trigger_changed: Notify,
    resources: DashMap<String, Arc<dyn Any + Send + Sync>>,
    health: RwLock<BTreeMap<String, WorkerHealth>>,
    processed: RwLock<Option<Arc<ProcessedSnapshot>>>,
}

impl std::fmt::Debug for Hub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hub")
            .field("frames", &self.frames)
            .field("detections", &self.detections)
            .field("error_log", &self.error_log)
            .finish_non_exhaustive()
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new(HubConfig::default())
    }
}

impl Hub {
    /// Create a hub on the system clock.
    pub fn new(config: HubConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a hub on an explicit clock.
    pub fn with_clock(config: HubConfig, clock: Arc<dyn Clock>) -> Self {
        let mut registry = Registry::default();
        registry
            .values
            .insert(keys::TRIGGER_FLAG.to_string(), Value::Bool(false));

        Self {
            clock,
            frames: BoundedQueue::new("frames", config.image_queue_size),
            detections: BoundedQueue::new("detections", config.detection_queue_size),
            error_log: BoundedQueue::new("error_log", config.error_log_size),
            registry: Mutex::new(registry),
            trigger_changed: Notify::new(),
            resources: DashMap::new(),
            health: RwLock::new(BTreeMap::new()),
            processed: RwLock::new(None),
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Current time on the hub clock.
    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    // ---- Queues -------------------------------------------------------

    pub fn frames(&self) -> &BoundedQueue<FrameItem> {
        &self.frames
    }

    pub fn detections(&self) -> &BoundedQueue<DetectionEvent> {
        &self.detections
    }

    pub fn error_log(&self) -> &BoundedQueue<ErrorLogEntry> {
        &self.error_log
    }

    // ---- Key/value registry -------------------------------------------

    /// Read a state value. The result is an independent copy.
    pub fn get_state(&self, key: &str) -> Option<Value> {
        self.registry.lock().values.get(key).cloned()
    }

    /// Write a state value.
    ///
    /// Writing the trigger flag wakes change waiters only on a false to true
    /// transition.
    pub fn set_state(&self, key: &str, value: Value) {
        let fired = {
            let mut registry = self.registry.lock();
            let now = self.clock.now();
            let is_trigger = key == keys::TRIGGER_FLAG;
            let new_active = is_trigger && truthy(&value);
            let old = registry.values.insert(key.to_string(), value);
            if !is_trigger {
                false
            } else {
                let old_active = old.as_ref().is_some_and(truthy);
                if new_active && !old_active {
                    registry.trigger_last_set = Some(now);
                } else if !new_active && old_active {
                    registry.trigger_last_cleared = Some(now);
                }
                new_active && !old_active
            }
        };

        if fired {
            debug!("Trigger flag set, waking change waiters");
            self.trigger_changed.notify_waiters();
        }
    }

    /// Merge fields into a map-typed state entry, creating it when absent.
    pub fn update_state(&self, key: &str, fields: Meta) -> Result<(), HubError> {
        let mut registry = self.registry.lock();
        let entry = registry
            .values
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Meta::new()));
        match entry {
            Value::Object(map) => {
                map.extend(fields);
                Ok(())
            }
            _ => Err(HubError::NotAMap(key.to_string())),
        }
    }

    /// Read a state value as `T`.
    pub fn get_typed<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, HubError> {
        match self.get_state(key) {
            None => Ok(None),
            Some(value) => serde_json::from_value(value).map(Some).map_err(|e| {
                HubError::StateConversion {
                    key: key.to_string(),
                    reason: e.to_string(),
                }
            }),
        }
    }

    /// Write `value` as a state entry.
    pub fn set_typed<T: Serialize>(&self, key: &str, value: &T) -> Result<(), HubError> {
        let value = serde_json::to_value(value).map_err(|e| HubError::StateConversion {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        self.set_state(key, value);
        Ok(())
    }

    /// Whether a state entry or resource exists under `key`.
    pub fn has_key(&self, key: &str) -> bool {
        self.registry.lock().values.contains_key(key) || self.resources.contains_key(key)
    }

    /// Sorted names of all state entries and resources.
    pub fn registry_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.registry.lock().values.keys().cloned().collect();
        keys.extend(self.resources.iter().map(|entry| entry.key().clone()));
        keys.sort();
        keys.dedup();
        keys
    }

    // ---- Typed accessors ----------------------------------------------

    pub fn trigger_flag(&self) -> bool {
        self.registry
            .lock()
            .values
            .get(keys::TRIGGER_FLAG)
            .is_some_and(truthy)
    }

    pub fn set_trigger(&self, active: bool) {
        self.set_state(keys::TRIGGER_FLAG, Value::Bool(active));
    }

    pub fn trigger_state(&self) -> TriggerState {
        let registry = self.registry.lock();
        TriggerState {
            active: registry.values.get(keys::TRIGGER_FLAG).is_some_and(truthy),
            last_set: registry.trigger_last_set,
            last_cleared: registry.trigger_last_cleared,
        }
    }

    pub fn actuator_state(&self) -> Option<ActuatorState> {
        self.get_typed(keys::ACTUATOR_STATE).ok().flatten()
    }

    pub fn set_actuator_state(&self, state: &ActuatorState) -> Result<(), HubError> {
        self.set_typed(keys::ACTUATOR_STATE, state)
    }

    pub fn link_health(&self) -> Option<LinkHealth> {
        self.get_typed(keys::LINK_HEALTH).ok().flatten()
    }

    pub fn set_link_health(&self, health: &LinkHealth) -> Result<(), HubError> {
        self.set_typed(keys::LINK_HEALTH, health)
    }

    /// Effective configuration map stored at startup.
    pub fn config(&self) -> Meta {
        match self.get_state(keys::CONFIG) {
            Some(Value::Object(map)) => map,
            _ => Meta::new(),
        }
    }

    // ---- Change notifier ----------------------------------------------

    /// Wait for the next trigger-set notification or until `timeout`.
    ///
    /// Carries no payload. Callers re-read the trigger flag to tell a wake-up
    /// from an expiry.
    pub async fn wait_for_change(&self, timeout: Duration) {
        let _ = tokio::time::timeout(timeout, self.trigger_changed.notified()).await;
    }

    // ---- Resources ----------------------------------------------------

    /// Return the resource under `key`, constructing it on first access.
    ///
    /// Every caller converges on the same instance.
    pub fn get_or_create<T, F>(&self, key: &str, factory: F) -> Result<Arc<T>, HubError>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> T,
    {
        let resource = self
            .resources
            .entry(key.to_string())
            .or_insert_with(|| {
                debug!("Creating hub resource '{}'", key);
                Arc::new(factory()) as Arc<dyn Any + Send + Sync>
            })
            .value()
            .clone();

        resource
            .downcast::<T>()
            .map_err(|_| HubError::ResourceType {
                key: key.to_string(),
                expected: std::any::type_name::<T>(),
            })
    }

    /// Shared outbound radio queue. The first caller fixes its capacity.
    pub fn link_tx_queue(
        &self,
        capacity: usize,
    ) -> Result<Arc<BoundedQueue<OutboundMessage>>, HubError> {
        self.get_or_create(keys::LINK_TX_QUEUE, || {
            BoundedQueue::new(keys::LINK_TX_QUEUE, capacity)
        })
    }

    /// Shared inbound radio record queue. The first caller fixes its capacity.
    pub fn link_rx_queue(
        &self,
        capacity: usize,
    ) -> Result<Arc<BoundedQueue<ReceivedMessage>>, HubError> {
        self.get_or_create(keys::LINK_RX_QUEUE, || {
            BoundedQueue::new(keys::LINK_RX_QUEUE, capacity)
        })
    }

    // ---- Health -------------------------------------------------------

    /// Apply `update` to a worker's health record, creating it if needed.
    pub fn update_health<F>(&self, worker: &str, update: F)
    where
        F: FnOnce(&mut WorkerHealth),
    {
        let mut health = self.health.write();
        update(health.entry(worker.to_string()).or_default());
    }

    pub fn health(&self, worker: &str) -> Option<WorkerHealth> {
        self.health.read().get(worker).cloned()
    }

    /// Copy of every worker's health record.
    pub fn health_snapshot(&self) -> BTreeMap<String, WorkerHealth> {
        self.health.read().clone()
    }

    // ---- Diagnostics --------------------------------------------------

    /// Append to the diagnostic stream and mirror the entry to tracing.
    pub fn log_event(
        &self,
        source: &str,
        severity: Severity,
        message: impl Into<String>,
        details: Option<Value>,
    ) {
        let message = message.into();
        match severity {
            Severity::Info => info!("[{}] {}", source, message),
            Severity::Warning => warn!("[{}] {}", source, message),
            Severity::Error | Severity::Critical => error!("[{}] {}: {}", source, severity, message),
        }

        self.error_log.push_drop_oldest(ErrorLogEntry {
            timestamp: self.clock.now(),
            source: source.to_string(),
            severity,
            message,
            details,
        });
    }

    // ---- Processed snapshot -------------------------------------------

    /// Push a detection and then replace the latest processed snapshot.
    ///
    /// The two writes are independent; a reader can see the detection before
    /// the snapshot.
    pub fn publish_detection(&self, event: DetectionEvent, snapshot: Option<ProcessedSnapshot>) {
        self.detections.push_drop_oldest(event);
        if let Some(snapshot) = snapshot {
            self.set_processed_snapshot(snapshot);
        }
    }

    pub fn set_processed_snapshot(&self, snapshot: ProcessedSnapshot) {
        *self.processed.write() = Some(Arc::new(snapshot));
    }

    pub fn latest_snapshot(&self) -> Option<Arc<ProcessedSnapshot>> {
        self.processed.read().clone()
    }

    // ---- Introspection ------------------------------------------------

    pub fn snapshot(&self) -> HubSnapshot {
        let mut queues = BTreeMap::new();
        queues.insert(self.frames.name().to_string(), depth(&self.frames));
        queues.insert(self.detections.name().to_string(), depth(&self.detections));
        queues.insert(self.error_log.name().to_string(), depth(&self.error_log));

        let mut config_keys: Vec<String> = self.config().keys().cloned().collect();
        config_keys.sort();

        HubSnapshot {
            timestamp: self.clock.now(),
            queues,
            trigger: self.trigger_state(),
            actuator: self.actuator_state(),
            link: self.link_health(),
            has_processed_snapshot: self.processed.read().is_some(),
            keys: self.registry_keys(),
            config_keys,
            workers: self.health_snapshot(),
        }
    }
}

fn depth<T>(queue: &BoundedQueue<T>) -> QueueDepth {
    QueueDepth {
        len: queue.len(),
        capacity: queue.capacity(),
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

#[cfg(test)]
#[path = "hub_tests.rs"]
mod tests;
