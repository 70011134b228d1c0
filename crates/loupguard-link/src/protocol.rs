//! Wire vocabulary: inbound line classification and outbound framing.

use loupguard_core::OutboundMessage;
use serde_json::Value;

/// Status lines emitted by the bridge firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusToken {
    TxDone,
    RxTimeout,
    RxError,
    TxTimeout,
    OnTxTimeout,
    OnRxTimeout,
    OnRxError,
}

impl StatusToken {
    pub fn parse(line: &str) -> Option<Self> {
        let token = match line {
            "TXDONE" => StatusToken::TxDone,
            "RXTIMEOUT" => StatusToken::RxTimeout,
            "RXERROR" => StatusToken::RxError,
            "TXTIMEOUT" => StatusToken::TxTimeout,
            "OnTxTimeout" => StatusToken::OnTxTimeout,
            "OnRxTimeout" => StatusToken::OnRxTimeout,
            "OnRxError" => StatusToken::OnRxError,
            _ => return None,
        };
        Some(token)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StatusToken::TxDone => "TXDONE",
            StatusToken::RxTimeout => "RXTIMEOUT",
            StatusToken::RxError => "RXERROR",
            StatusToken::TxTimeout => "TXTIMEOUT",
            StatusToken::OnTxTimeout => "OnTxTimeout",
            StatusToken::OnRxTimeout => "OnRxTimeout",
            StatusToken::OnRxError => "OnRxError",
        }
    }

    /// Every token except transmit-complete counts as a link error.
    pub fn is_error(&self) -> bool {
        !matches!(self, StatusToken::TxDone)
    }
}

impl std::fmt::Display for StatusToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One classified inbound line.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundLine<'a> {
    /// `RX:<payload>`
    Rx(&'a str),
    /// `RSSI:<float> dBm, SNR:<raw>/4 dB`
    Rssi {
        rssi_dbm: Option<f64>,
        snr_db: Option<f64>,
    },
    Status(StatusToken),
    /// Anything else; debug chatter from the bridge.
    Other,
}

impl<'a> InboundLine<'a> {
    /// Classify in priority order: RX, RSSI, status token, other.
    pub fn classify(line: &'a str) -> Self {
        if let Some(payload) = line.strip_prefix("RX:") {
            return InboundLine::Rx(payload);
        }
        if line.starts_with("RSSI:") {
            let (rssi_dbm, snr_db) = parse_rssi_snr(line);
            return InboundLine::Rssi { rssi_dbm, snr_db };
        }
        match StatusToken::parse(line) {
            Some(token) => InboundLine::Status(token),
            None => InboundLine::Other,
        }
    }
}

/// Parse `RSSI:<float> dBm, SNR:<raw>/4 dB` into dBm and dB.
///
/// The raw SNR is in quarter-dB. An unparsable RSSI yields `(None, None)`;
/// an unparsable SNR keeps the RSSI.
pub fn parse_rssi_snr(line: &str) -> (Option<f64>, Option<f64>) {
    let mut parts = line.split(',').map(str::trim);

    let mut rssi = None;
    if let Some(rest) = parts.next().and_then(|p| p.strip_prefix("RSSI:")) {
        let value = rest.trim();
        let value = value.strip_suffix("dBm").unwrap_or(value).trim();
        match value.parse::<f64>() {
            Ok(v) => rssi = Some(v),
            Err(_) => return (None, None),
        }
    }

    let snr = parts.next().and_then(|part| {
        let idx = part.find("SNR:")?;
        let value = part[idx + "SNR:".len()..].trim();
        let value = value.strip_suffix("dB").unwrap_or(value).trim();
        match value.split_once("/4") {
            Some((raw, _)) => raw.trim().parse::<f64>().ok().map(|raw| raw / 4.0),
            None => value.parse::<f64>().ok(),
        }
    });

    (rssi, snr)
}

/// Text payload of an outbound message, safe to embed in one frame.
///
/// A record uses its `payload` field; bytes are decoded lossily. Carriage
/// returns and newlines become spaces.
pub fn encode_payload(msg: &OutboundMessage) -> String {
    let text = match msg {
        OutboundMessage::Text(s) => s.clone(),
        OutboundMessage::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
        OutboundMessage::Record(map) => match map.get("payload") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => Value::Object(map.clone()).to_string(),
        },
    };
    text.replace(['\r', '\n'], " ")
}

/// Frame a payload for the bridge.
pub fn tx_frame(payload: &str) -> String {
    format!("TX:{payload}\n")
}
