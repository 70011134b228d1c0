//! Flat namespaced settings map.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::ConfigError;

/// All options of a deployment, keyed `<worker>_<option>`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    values: BTreeMap<String, Value>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a TOML document.
    ///
    /// Top-level tables are flattened to `<table>_<key>`; top-level scalars
    /// are kept as-is.
    pub fn from_toml(doc: toml::Table) -> Result<Self, ConfigError> {
        let mut settings = Self::new();
        for (key, value) in doc {
            let value = serde_json::to_value(value)
                .map_err(|e| ConfigError::InvalidFormat(e.to_string()))?;
            settings.insert_flattened(&key, value);
        }
        Ok(settings)
    }

    fn insert_flattened(&mut self, key: &str, value: Value) {
        match value {
            Value::Object(map) => {
                for (child, value) in map {
                    self.insert_flattened(&format!("{key}_{child}"), value);
                }
            }
            other => {
                self.values.insert(key.to_string(), other);
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Set or replace one option.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// Overlay `other` on top of these settings.
    pub fn merge(&mut self, other: Settings) {
        self.values.extend(other.values);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    /// View restricted to one worker's namespace.
    pub fn scoped<'a>(&'a self, prefix: &'a str) -> ScopedSettings<'a> {
        ScopedSettings {
            settings: self,
            prefix,
        }
    }

    /// The full map, as stored in the hub under the `config` key.
    pub fn to_map(&self) -> Map<String, Value> {
        self.values
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// One worker's slice of [`Settings`].
#[derive(Debug, Clone, Copy)]
pub struct ScopedSettings<'a> {
    settings: &'a Settings,
    prefix: &'a str,
}

impl<'a> ScopedSettings<'a> {
    pub fn prefix(&self) -> &str {
        self.prefix
    }

    /// Fully qualified key for `option`.
    pub fn key(&self, option: &str) -> String {
        format!("{}_{}", self.prefix, option)
    }

    pub fn get(&self, option: &str) -> Option<&'a Value> {
        self.settings.get(&self.key(option))
    }

    /// Options under this prefix with the prefix stripped.
    pub fn options(&self) -> Map<String, Value> {
        let head = format!("{}_", self.prefix);
        self.settings
            .iter()
            .filter_map(|(k, v)| k.strip_prefix(&head).map(|rest| (rest.to_string(), v.clone())))
            .collect()
    }

    /// Deserialize this namespace into a typed config struct.
    ///
    /// Absent options take the struct's serde defaults.
    pub fn extract<T: DeserializeOwned>(&self) -> Result<T, ConfigError> {
        serde_json::from_value(Value::Object(self.options()))
            .map_err(|e| ConfigError::invalid(format!("{}_*", self.prefix), e.to_string()))
    }

    pub fn f64_or(&self, option: &str, default: f64) -> Result<f64, ConfigError> {
        match self.get(option) {
            None => Ok(default),
            Some(v) => v
                .as_f64()
                .ok_or_else(|| ConfigError::invalid(self.key(option), "expected a number")),
        }
    }

    pub fn u64_or(&self, option: &str, default: u64) -> Result<u64, ConfigError> {
        match self.get(option) {
            None => Ok(default),
            Some(v) => v.as_u64().ok_or_else(|| {
                ConfigError::invalid(self.key(option), "expected a non-negative integer")
            }),
        }
    }

    pub fn bool_or(&self, option: &str, default: bool) -> Result<bool, ConfigError> {
        match self.get(option) {
            None => Ok(default),
            Some(v) => v
                .as_bool()
                .ok_or_else(|| ConfigError::invalid(self.key(option), "expected a boolean")),
        }
    }

    pub fn string_or(&self, option: &str, default: &str) -> Result<String, ConfigError> {
        match self.get(option) {
            None => Ok(default.to_string()),
            Some(Value::String(s)) => Ok(s.clone()),
            Some(_) => Err(ConfigError::invalid(self.key(option), "expected a string")),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::*;

    fn parse(doc: &str) -> Settings {
        Settings::from_toml(doc.parse::<toml::Table>().unwrap()).unwrap()
    }

    #[test]
    fn test_tables_flatten_to_prefixed_keys() {
        let settings = parse(
            r#"
            motor_pause_s = 3.0

            [decision_logic]
            cooldown_s = 10
            min_frame_ratio = 0.5
            "#,
        );

        assert_eq!(settings.get("motor_pause_s"), Some(&json!(3.0)));
        assert_eq!(settings.get("decision_logic_cooldown_s"), Some(&json!(10)));
        assert_eq!(settings.len(), 3);
    }

    #[test]
    fn test_table_and_flat_forms_are_equivalent() {
        let a = parse("[lora]\nserial_port = \"/dev/ttyUSB0\"");
        let b = parse("lora_serial_port = \"/dev/ttyUSB0\"");
        assert_eq!(a, b);
    }

    #[test]
    fn test_scoped_getters() {
        let settings = parse(
            r#"
            [lora]
            min_tx_interval_s = 0.1
            tx_queue_size = 4
            enabled = true
            serial_port = "tcp://127.0.0.1:7000"
            "#,
        );
        let lora = settings.scoped("lora");

        assert_eq!(lora.f64_or("min_tx_interval_s", 0.05).unwrap(), 0.1);
        assert_eq!(lora.f64_or("read_timeout_s", 0.02).unwrap(), 0.02);
        assert_eq!(lora.u64_or("tx_queue_size", 10).unwrap(), 4);
        assert!(lora.bool_or("enabled", false).unwrap());
        assert_eq!(
            lora.string_or("serial_port", "/dev/ttyACM0").unwrap(),
            "tcp://127.0.0.1:7000"
        );
        assert!(lora.u64_or("serial_port", 1).is_err());
    }

    #[test]
    fn test_scope_does_not_leak_between_workers() {
        let mut settings = Settings::new();
        settings.set("motor_batch_size", 20);
        settings.set("motorx_batch_size", 99);

        let options = settings.scoped("motor").options();
        assert_eq!(options.len(), 1);
        assert_eq!(options["batch_size"], json!(20));
    }

    #[derive(Debug, Deserialize)]
    struct Demo {
        #[serde(default = "default_window")]
        window_s: f64,
        #[serde(default)]
        batch_size: usize,
    }

    fn default_window() -> f64 {
        2.0
    }

    #[test]
    fn test_extract_uses_serde_defaults() {
        let mut settings = Settings::new();
        settings.set("demo_batch_size", 7);

        let demo: Demo = settings.scoped("demo").extract().unwrap();
        assert_eq!(demo.window_s, 2.0);
        assert_eq!(demo.batch_size, 7);

        settings.set("demo_window_s", "soon");
        let err = settings.scoped("demo").extract::<Demo>().unwrap_err();
        assert!(err.to_string().contains("demo_*"));
    }

    #[test]
    fn test_merge_and_to_map() {
        let mut base = parse("[motor]\npause_s = 2.0");
        let mut overrides = Settings::new();
        overrides.set("motor_pause_s", 5.0);
        base.merge(overrides);

        let map = base.to_map();
        assert_eq!(map["motor_pause_s"], json!(5.0));
    }
}
