//! # LoupGuard Config
//!
//! Flat, namespaced configuration. Every option is a `<worker>_<option>` key
//! in one map; each worker reads only its own prefix through
//! [`Settings::scoped`].

mod error;
mod loader;
mod settings;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use settings::{ScopedSettings, Settings};
