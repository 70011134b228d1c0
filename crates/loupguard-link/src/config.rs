//! Link configuration.

use std::time::Duration;

use loupguard_config::{ConfigError, Settings};
use serde::{Deserialize, Serialize};

/// Options under the `lora_` prefix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Device path, or `tcp://host:port` for a network bridge.
    #[serde(default = "default_serial_port")]
    pub serial_port: String,
    /// Line rate of a serial device, opened 8N1 raw. Ignored for TCP.
    #[serde(default = "default_serial_baud")]
    pub serial_baud: u32,
    #[serde(default = "default_min_tx_interval_s")]
    pub min_tx_interval_s: f64,
    /// Upper bound of one read wait, seconds.
    #[serde(default = "default_read_timeout_s")]
    pub read_timeout_s: f64,
    #[serde(default = "default_write_timeout_s")]
    pub write_timeout_s: f64,
    #[serde(default = "default_queue_size")]
    pub tx_queue_size: usize,
    #[serde(default = "default_queue_size")]
    pub rx_queue_size: usize,
}

fn default_serial_port() -> String {
    "/dev/ttyACM0".to_string()
}

/// Line rate used when `lora_serial_baud` is unset.
pub const DEFAULT_SERIAL_BAUD: u32 = 115_200;

fn default_serial_baud() -> u32 {
    DEFAULT_SERIAL_BAUD
}

fn default_min_tx_interval_s() -> f64 {
    0.05
}

fn default_read_timeout_s() -> f64 {
    0.02
}

fn default_write_timeout_s() -> f64 {
    1.0
}

fn default_queue_size() -> usize {
    loupguard_core::keys::LINK_QUEUE_CAPACITY
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            serial_port: default_serial_port(),
            serial_baud: default_serial_baud(),
            min_tx_interval_s: default_min_tx_interval_s(),
            read_timeout_s: default_read_timeout_s(),
            write_timeout_s: default_write_timeout_s(),
            tx_queue_size: default_queue_size(),
            rx_queue_size: default_queue_size(),
        }
    }
}

impl LinkConfig {
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        let config: Self = settings.scoped(crate::WORKER_NAME).extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let field = |name: &str| format!("{}_{}", crate::WORKER_NAME, name);

        if self.serial_port.trim().is_empty() {
            return Err(ConfigError::invalid(field("serial_port"), "must not be empty"));
        }
        if self.serial_baud == 0 {
            return Err(ConfigError::invalid(field("serial_baud"), "must be positive"));
        }
        for (name, value) in [
            ("min_tx_interval_s", self.min_tx_interval_s),
            ("read_timeout_s", self.read_timeout_s),
            ("write_timeout_s", self.write_timeout_s),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::invalid(field(name), "must be non-negative"));
            }
        }
        if self.read_timeout_s == 0.0 {
            return Err(ConfigError::invalid(field("read_timeout_s"), "must be positive"));
        }
        if self.tx_queue_size == 0 || self.rx_queue_size == 0 {
            return Err(ConfigError::invalid(field("tx_queue_size"), "queues need capacity"));
        }
        Ok(())
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.read_timeout_s).unwrap_or(Duration::ZERO)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.write_timeout_s).unwrap_or(Duration::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LinkConfig::from_settings(&Settings::new()).unwrap();
        assert_eq!(config.serial_port, "/dev/ttyACM0");
        assert_eq!(config.serial_baud, 115_200);
        assert_eq!(config.min_tx_interval_s, 0.05);
        assert_eq!(config.read_timeout(), Duration::from_millis(20));
        assert_eq!(config.tx_queue_size, 10);
        assert_eq!(config.rx_queue_size, 10);
    }

    #[test]
    fn test_from_settings() {
        let mut settings = Settings::new();
        settings.set("lora_serial_port", "tcp://10.0.0.2:4000");
        settings.set("lora_serial_baud", 9600);
        settings.set("lora_tx_queue_size", 4);

        let config = LinkConfig::from_settings(&settings).unwrap();
        assert_eq!(config.serial_port, "tcp://10.0.0.2:4000");
        assert_eq!(config.serial_baud, 9600);
        assert_eq!(config.tx_queue_size, 4);
    }

    #[test]
    fn test_validation() {
        let config = LinkConfig {
            read_timeout_s: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = LinkConfig {
            serial_port: " ".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = LinkConfig {
            serial_baud: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
