//! Well-known registry keys.
//!
//! Keys in the `lora.` namespace are resources owned by the link worker.
//! Everything else is hub-wide state.

/// Effective namespaced configuration map.
pub const CONFIG: &str = "config";

/// Trigger flag (boolean). The only key the change notifier watches.
pub const TRIGGER_FLAG: &str = "trigger_flag";

/// Latest actuator snapshot (map).
pub const ACTUATOR_STATE: &str = "actuator.state";

/// Link health summary (map).
pub const LINK_HEALTH: &str = "link.health";

/// Outbound radio queue resource.
pub const LINK_TX_QUEUE: &str = "lora.tx_queue";

/// Inbound radio record queue resource.
pub const LINK_RX_QUEUE: &str = "lora.rx_queue";

/// Default capacity of the link queues.
pub const LINK_QUEUE_CAPACITY: usize = 10;
