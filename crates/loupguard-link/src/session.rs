//! Inbound correlation and link counters.

use loupguard_core::{LinkHealth, ReceivedMessage};
use tracing::{debug, warn};

use crate::protocol::InboundLine;

/// Pairs `RX:` lines with their link-quality line and keeps link health.
///
/// Holds at most one pending record. Completed records are returned to the
/// caller, which owns the receive queue.
#[derive(Debug, Default)]
pub struct LinkSession {
    pending: Option<ReceivedMessage>,
    health: LinkHealth,
}

impl LinkSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn health(&self) -> &LinkHealth {
        &self.health
    }

    pub fn pending(&self) -> Option<&ReceivedMessage> {
        self.pending.as_ref()
    }

    /// Process one framed line and return the records it completes.
    pub fn handle_line(&mut self, line: &str, now: f64) -> Vec<ReceivedMessage> {
        self.health.last_status_line = Some(line.to_string());

        let mut completed = Vec::new();
        match InboundLine::classify(line) {
            InboundLine::Rx(payload) => {
                self.health.rx_count += 1;
                self.health.last_rx_ts = Some(now);
                self.health.last_rx_payload = Some(payload.to_string());

                if let Some(stale) = self.pending.take() {
                    warn!(
                        "RX '{}' arrived before the RSSI line of '{}'; flushing without link quality",
                        payload, stale.payload
                    );
                    completed.push(stale);
                }
                self.pending = Some(ReceivedMessage::new(payload, line, now));
            }
            InboundLine::Rssi { rssi_dbm, snr_db } => {
                self.health.last_rssi = rssi_dbm;
                self.health.last_snr = snr_db;

                match self.pending.take() {
                    Some(mut record) => {
                        record.rssi_dbm = rssi_dbm;
                        record.snr_db = snr_db;
                        record.raw_lines.push(line.to_string());
                        completed.push(record);
                    }
                    None => warn!("RSSI line without a pending RX: {}", line),
                }
            }
            InboundLine::Status(token) => {
                if token.is_error() {
                    self.record_error(token.as_str(), now);
                } else {
                    debug!("Link status: {}", token);
                }
            }
            InboundLine::Other => debug!("Link line: {}", line),
        }
        completed
    }

    /// Count a successful transmission.
    pub fn record_tx(&mut self, now: f64) {
        self.health.tx_count += 1;
        self.health.last_tx_ts = Some(now);
    }

    pub fn record_error(&mut self, kind: &str, now: f64) {
        self.health.error_count += 1;
        self.health.last_error_ts = Some(now);
        self.health.last_error_type = Some(kind.to_string());
    }
}
