//! Time-bounded buffer of recent detection events.

use std::collections::VecDeque;

use loupguard_core::DetectionEvent;

/// Fewer buffered samples than this never count as presence.
pub const MIN_SAMPLES: usize = 3;

/// Aggregates over the current window.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PresenceStats {
    pub samples: usize,
    pub detected: usize,
    pub ratio: f64,
    pub score: f64,
}

impl PresenceStats {
    /// Presence test against the given thresholds.
    pub fn is_present(&self, min_ratio: f64, min_score: f64) -> bool {
        self.samples >= MIN_SAMPLES && self.ratio >= min_ratio && self.score >= min_score
    }
}

/// Sliding window of detection events keyed by their own timestamps.
#[derive(Debug, Clone)]
pub struct DetectionWindow {
    span_s: f64,
    events: VecDeque<DetectionEvent>,
}

impl DetectionWindow {
    pub fn new(span_s: f64) -> Self {
        Self {
            span_s,
            events: VecDeque::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Append new events, then drop everything older than `now - span`.
    pub fn update(&mut self, new_events: impl IntoIterator<Item = DetectionEvent>, now: f64) {
        self.events.extend(new_events);
        let cutoff = now - self.span_s;
        self.events.retain(|e| e.timestamp >= cutoff);
    }

    pub fn stats(&self) -> PresenceStats {
        let samples = self.events.len();
        let (detected, score) = self
            .events
            .iter()
            .filter(|e| e.has_detections())
            .fold((0usize, 0.0f64), |(n, s), e| (n + 1, s + e.total_score()));
        let ratio = if samples == 0 {
            0.0
        } else {
            detected as f64 / samples as f64
        };

        PresenceStats {
            samples,
            detected,
            ratio,
            score,
        }
    }
}
