//! # LoupGuard Link
//!
//! Line-oriented protocol engine for a UART-to-radio bridge.
//!
//! ```text
//! Host -> device:  TX:<payload>\n
//! Device -> host:  RX:<payload>\r\n
//!                  RSSI:<float> dBm, SNR:<raw>/4 dB\r\n
//! Status tokens:   TXDONE | RXTIMEOUT | RXERROR | TXTIMEOUT
//!                  OnTxTimeout | OnRxTimeout | OnRxError
//! ```
//!
//! Delivery is best effort. At most one received payload waits for its
//! link-quality line at any time.

mod config;
mod error;
mod framer;
mod protocol;
mod session;
mod transport;
mod worker;

pub use config::{LinkConfig, DEFAULT_SERIAL_BAUD};
pub use error::LinkError;
pub use framer::LineFramer;
pub use protocol::{encode_payload, parse_rssi_snr, tx_frame, InboundLine, StatusToken};
pub use session::LinkSession;
pub use transport::{
    open_serial, serial_transport, LinkTarget, LinkTransport, SerialTransport, StreamTransport,
    TargetOpener, TransportOpener,
};
pub use worker::LinkWorker;

/// Configuration prefix and worker name.
pub const WORKER_NAME: &str = "lora";

/// `last_error_type` recorded when a frame cannot be written.
pub const SERIAL_WRITE_ERROR: &str = "SERIAL_WRITE_ERROR";
