//! Collaborator configuration, one struct per worker prefix.

use std::path::PathBuf;
use std::time::Duration;

use loupguard_config::{ConfigError, ConfigLoader, Settings};
use serde::{Deserialize, Serialize};

use crate::names;

fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

fn non_negative(prefix: &str, name: &str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::invalid(
            format!("{prefix}_{name}"),
            "must be non-negative",
        ));
    }
    Ok(())
}

/// Options under the `camera_` prefix.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Minimum time between two frames, seconds. Zero captures freely.
    #[serde(default)]
    pub period_s: f64,
    /// Directory of still images for the bench source.
    #[serde(default)]
    pub image_dir: Option<String>,
}

impl CaptureConfig {
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        let config: Self = settings.scoped(names::CAPTURE).extract()?;
        non_negative(names::CAPTURE, "period_s", config.period_s)?;
        Ok(config)
    }

    pub fn image_dir(&self) -> Option<PathBuf> {
        self.image_dir
            .as_deref()
            .map(|dir| PathBuf::from(ConfigLoader::expand_path(dir)))
    }
}

/// Options under the `detector_` prefix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Bound on the wait for a frame, seconds.
    #[serde(default = "default_detector_queue_timeout_s")]
    pub queue_timeout_s: f64,
}

fn default_detector_queue_timeout_s() -> f64 {
    0.1
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            queue_timeout_s: default_detector_queue_timeout_s(),
        }
    }
}

impl DetectorConfig {
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        let config: Self = settings.scoped(names::DETECTOR).extract()?;
        non_negative(names::DETECTOR, "queue_timeout_s", config.queue_timeout_s)?;
        Ok(config)
    }

    pub fn queue_timeout(&self) -> Duration {
        secs(self.queue_timeout_s)
    }
}

/// Options under the `replay_` prefix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// JSON-lines file of detection events.
    #[serde(default)]
    pub file: Option<String>,
    /// Time between two replayed events, seconds.
    #[serde(default = "default_replay_period_s")]
    pub period_s: f64,
    /// Start over when the file is exhausted.
    #[serde(default = "default_loop_playback")]
    pub loop_playback: bool,
}

fn default_replay_period_s() -> f64 {
    0.1
}

fn default_loop_playback() -> bool {
    true
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            file: None,
            period_s: default_replay_period_s(),
            loop_playback: default_loop_playback(),
        }
    }
}

impl ReplayConfig {
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        let config: Self = settings.scoped(names::REPLAY).extract()?;
        non_negative(names::REPLAY, "period_s", config.period_s)?;
        Ok(config)
    }

    pub fn file(&self) -> Option<PathBuf> {
        self.file
            .as_deref()
            .map(|file| PathBuf::from(ConfigLoader::expand_path(file)))
    }

    pub fn period(&self) -> Duration {
        secs(self.period_s)
    }
}

/// Options under the `logger_` prefix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveConfig {
    #[serde(default = "default_working_log_path")]
    pub working_log_path: String,
    #[serde(default = "default_image_archive_dir")]
    pub image_archive_dir: String,
    #[serde(default = "default_poll_interval_s")]
    pub poll_interval_s: f64,
}

fn default_working_log_path() -> String {
    "logs/working_log.txt".to_string()
}

fn default_image_archive_dir() -> String {
    "archive/detections".to_string()
}

fn default_poll_interval_s() -> f64 {
    0.5
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            working_log_path: default_working_log_path(),
            image_archive_dir: default_image_archive_dir(),
            poll_interval_s: default_poll_interval_s(),
        }
    }
}

impl ArchiveConfig {
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        let config: Self = settings.scoped(names::ARCHIVE).extract()?;
        non_negative(names::ARCHIVE, "poll_interval_s", config.poll_interval_s)?;
        if config.working_log_path.trim().is_empty() {
            return Err(ConfigError::invalid(
                format!("{}_working_log_path", names::ARCHIVE),
                "must not be empty",
            ));
        }
        Ok(config)
    }

    pub fn working_log_path(&self) -> PathBuf {
        PathBuf::from(ConfigLoader::expand_path(&self.working_log_path))
    }

    pub fn image_archive_dir(&self) -> PathBuf {
        PathBuf::from(ConfigLoader::expand_path(&self.image_archive_dir))
    }

    pub fn poll_interval(&self) -> Duration {
        secs(self.poll_interval_s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::new();
        assert_eq!(CaptureConfig::from_settings(&settings).unwrap().period_s, 0.0);
        assert_eq!(
            DetectorConfig::from_settings(&settings).unwrap().queue_timeout(),
            Duration::from_millis(100)
        );

        let replay = ReplayConfig::from_settings(&settings).unwrap();
        assert!(replay.file().is_none());
        assert!(replay.loop_playback);

        let archive = ArchiveConfig::from_settings(&settings).unwrap();
        assert_eq!(archive.working_log_path(), PathBuf::from("logs/working_log.txt"));
        assert_eq!(archive.image_archive_dir(), PathBuf::from("archive/detections"));
        assert_eq!(archive.poll_interval(), Duration::from_millis(500));
    }

    #[test]
    fn test_prefixed_overrides() {
        let mut settings = Settings::new();
        settings.set("logger_poll_interval_s", 0.25);
        settings.set("replay_file", "bench.jsonl");
        settings.set("replay_loop_playback", false);
        settings.set("camera_period_s", 0.2);

        let archive = ArchiveConfig::from_settings(&settings).unwrap();
        assert_eq!(archive.poll_interval_s, 0.25);

        let replay = ReplayConfig::from_settings(&settings).unwrap();
        assert_eq!(replay.file(), Some(PathBuf::from("bench.jsonl")));
        assert!(!replay.loop_playback);

        assert_eq!(CaptureConfig::from_settings(&settings).unwrap().period_s, 0.2);
    }

    #[test]
    fn test_rejects_negative_periods() {
        let mut settings = Settings::new();
        settings.set("replay_period_s", -1.0);
        assert!(ReplayConfig::from_settings(&settings).is_err());
    }
}
