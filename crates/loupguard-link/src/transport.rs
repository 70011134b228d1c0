//! Byte transports for the radio bridge.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::time::timeout;
use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, SerialStream, StopBits};
use tracing::debug;

use crate::config::{LinkConfig, DEFAULT_SERIAL_BAUD};
use crate::error::LinkError;

/// A duplex byte channel to the bridge.
#[async_trait]
pub trait LinkTransport: Send {
    /// Human-readable endpoint, for logs.
    fn describe(&self) -> &str;

    /// Read whatever arrives within the read timeout.
    ///
    /// Returns `Ok(0)` when nothing arrived and [`LinkError::Closed`] when the
    /// peer has gone away.
    async fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, LinkError>;

    /// Write the whole frame within the write timeout.
    async fn write_all(&mut self, data: &[u8]) -> Result<(), LinkError>;

    async fn close(&mut self) -> Result<(), LinkError>;
}

/// Transport over any pair of async reader and writer halves.
pub struct StreamTransport<R, W> {
    label: String,
    reader: R,
    writer: W,
    read_timeout: Duration,
    write_timeout: Duration,
}

impl<R, W> StreamTransport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(
        label: impl Into<String>,
        reader: R,
        writer: W,
        read_timeout: Duration,
        write_timeout: Duration,
    ) -> Self {
        Self {
            label: label.into(),
            reader,
            writer,
            read_timeout,
            write_timeout,
        }
    }
}

impl<R, W> fmt::Debug for StreamTransport<R, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamTransport")
            .field("label", &self.label)
            .field("read_timeout", &self.read_timeout)
            .field("write_timeout", &self.write_timeout)
            .finish()
    }
}

#[async_trait]
impl<R, W> LinkTransport for StreamTransport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    fn describe(&self) -> &str {
        &self.label
    }

    async fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, LinkError> {
        match timeout(self.read_timeout, self.reader.read(buf)).await {
            Err(_) => Ok(0),
            Ok(Ok(0)) => Err(LinkError::Closed),
            Ok(Ok(n)) => Ok(n),
            Ok(Err(e)) => Err(e.into()),
        }
    }

    async fn write_all(&mut self, data: &[u8]) -> Result<(), LinkError> {
        let limit = self.write_timeout;
        let writer = &mut self.writer;
        let write = async move {
            writer.write_all(data).await?;
            writer.flush().await
        };
        match timeout(limit, write).await {
            Ok(result) => result.map_err(LinkError::from),
            Err(_) => Err(LinkError::WriteTimeout(limit)),
        }
    }

    async fn close(&mut self) -> Result<(), LinkError> {
        self.writer.shutdown().await?;
        Ok(())
    }
}

/// Where the bridge lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkTarget {
    /// A character device such as `/dev/ttyACM0`.
    Device(PathBuf),
    /// A network bridge, written as `tcp://host:port`.
    Tcp(String),
}

impl LinkTarget {
    pub fn parse(target: &str) -> Result<Self, LinkError> {
        let target = target.trim();
        if let Some(addr) = target.strip_prefix("tcp://") {
            if addr.is_empty() || !addr.contains(':') {
                return Err(LinkError::InvalidTarget(target.to_string()));
            }
            return Ok(LinkTarget::Tcp(addr.to_string()));
        }
        if target.is_empty() || target.contains("://") {
            return Err(LinkError::InvalidTarget(target.to_string()));
        }
        Ok(LinkTarget::Device(PathBuf::from(target)))
    }
}

impl fmt::Display for LinkTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkTarget::Device(path) => write!(f, "{}", path.display()),
            LinkTarget::Tcp(addr) => write!(f, "tcp://{addr}"),
        }
    }
}

/// Opens a fresh transport; called at init and after every link failure.
#[async_trait]
pub trait TransportOpener: Send + Sync {
    async fn open(&self) -> Result<Box<dyn LinkTransport>, LinkError>;
}

/// Transport over a serial port.
pub type SerialTransport = StreamTransport<ReadHalf<SerialStream>, WriteHalf<SerialStream>>;

/// Wrap an open serial port. Reads go through the runtime's reactor, so a
/// read timeout leaves nothing pending on the port.
pub fn serial_transport(
    label: impl Into<String>,
    port: SerialStream,
    read_timeout: Duration,
    write_timeout: Duration,
) -> SerialTransport {
    let (reader, writer) = tokio::io::split(port);
    StreamTransport::new(label, reader, writer, read_timeout, write_timeout)
}

/// Open `path` at `baud`, 8N1, no flow control. Ttys are put in raw mode
/// on open, so neither echo nor CR/LF translation reaches the framer.
pub fn open_serial(path: &Path, baud: u32) -> Result<SerialStream, LinkError> {
    tokio_serial::new(path.to_string_lossy(), baud)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .open_native_async()
        .map_err(|e| LinkError::Open {
            target: path.display().to_string(),
            source: e.into(),
        })
}

/// Opens a [`LinkTarget`] with the configured timeouts and line rate.
#[derive(Debug, Clone)]
pub struct TargetOpener {
    target: LinkTarget,
    baud: u32,
    read_timeout: Duration,
    write_timeout: Duration,
}

impl TargetOpener {
    pub fn new(target: LinkTarget, read_timeout: Duration, write_timeout: Duration) -> Self {
        Self {
            target,
            baud: DEFAULT_SERIAL_BAUD,
            read_timeout,
            write_timeout,
        }
    }

    /// Line rate for a device target.
    pub fn with_baud(mut self, baud: u32) -> Self {
        self.baud = baud;
        self
    }

    pub fn from_config(config: &LinkConfig) -> Result<Self, LinkError> {
        Ok(Self::new(
            LinkTarget::parse(&config.serial_port)?,
            config.read_timeout(),
            config.write_timeout(),
        )
        .with_baud(config.serial_baud))
    }

    pub fn target(&self) -> &LinkTarget {
        &self.target
    }

    pub fn baud(&self) -> u32 {
        self.baud
    }

    fn open_error(&self, source: std::io::Error) -> LinkError {
        LinkError::Open {
            target: self.target.to_string(),
            source,
        }
    }
}

#[async_trait]
impl TransportOpener for TargetOpener {
    async fn open(&self) -> Result<Box<dyn LinkTransport>, LinkError> {
        let label = self.target.to_string();
        debug!("Opening link {}", label);

        match &self.target {
            LinkTarget::Device(path) => {
                let port = open_serial(path, self.baud)?;
                Ok(Box::new(serial_transport(
                    format!("{}@{}", label, self.baud),
                    port,
                    self.read_timeout,
                    self.write_timeout,
                )))
            }
            LinkTarget::Tcp(addr) => {
                let stream = tokio::net::TcpStream::connect(addr.as_str())
                    .await
                    .map_err(|e| self.open_error(e))?;
                stream.set_nodelay(true).map_err(|e| self.open_error(e))?;
                let (reader, writer) = stream.into_split();
                Ok(Box::new(StreamTransport::new(
                    label,
                    reader,
                    writer,
                    self.read_timeout,
                    self.write_timeout,
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const READ: Duration = Duration::from_millis(20);
    const WRITE: Duration = Duration::from_secs(1);

    fn duplex_transport(
        capacity: usize,
    ) -> (
        StreamTransport<tokio::io::ReadHalf<tokio::io::DuplexStream>, tokio::io::WriteHalf<tokio::io::DuplexStream>>,
        tokio::io::DuplexStream,
    ) {
        let (host, device) = tokio::io::duplex(capacity);
        let (reader, writer) = tokio::io::split(host);
        (StreamTransport::new("duplex", reader, writer, READ, WRITE), device)
    }

    #[test]
    fn test_parse_targets() {
        assert_eq!(
            LinkTarget::parse("/dev/ttyACM0").unwrap(),
            LinkTarget::Device(PathBuf::from("/dev/ttyACM0"))
        );
        assert_eq!(
            LinkTarget::parse("tcp://10.0.0.2:4000").unwrap(),
            LinkTarget::Tcp("10.0.0.2:4000".to_string())
        );
        assert_eq!(
            LinkTarget::parse("tcp://bridge:4000").unwrap().to_string(),
            "tcp://bridge:4000"
        );
        assert!(matches!(LinkTarget::parse("tcp://"), Err(LinkError::InvalidTarget(_))));
        assert!(matches!(LinkTarget::parse("tcp://host"), Err(LinkError::InvalidTarget(_))));
        assert!(matches!(LinkTarget::parse("udp://x:1"), Err(LinkError::InvalidTarget(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_times_out_with_zero_bytes() {
        let (mut transport, _device) = duplex_transport(64);
        let mut buf = [0u8; 16];
        assert_eq!(transport.read_available(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_and_write() {
        let (mut transport, mut device) = duplex_transport(64);

        device.write_all(b"TXDONE\r\n").await.unwrap();
        let mut buf = [0u8; 16];
        let n = transport.read_available(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"TXDONE\r\n");

        transport.write_all(b"TX:hi\n").await.unwrap();
        let mut out = [0u8; 6];
        device.read_exact(&mut out).await.unwrap();
        assert_eq!(&out, b"TX:hi\n");
    }

    #[tokio::test(start_paused = true)]
    async fn test_peer_close_is_reported() {
        let (mut transport, device) = duplex_transport(64);
        drop(device);
        let mut buf = [0u8; 16];
        assert!(matches!(
            transport.read_available(&mut buf).await,
            Err(LinkError::Closed)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_times_out_when_peer_stalls() {
        let (mut transport, _device) = duplex_transport(4);
        let result = transport.write_all(b"TX:longer than four\n").await;
        assert!(matches!(result, Err(LinkError::WriteTimeout(d)) if d == WRITE));
    }

    #[tokio::test]
    async fn test_open_missing_device() {
        let dir = std::env::temp_dir().join("loupguard-no-such-device");
        let opener = TargetOpener::new(LinkTarget::Device(dir.join("ttyX")), READ, WRITE);
        let result = opener.open().await;
        assert!(matches!(result, Err(LinkError::Open { .. })));
    }

    #[tokio::test]
    async fn test_open_rejects_non_tty() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let opener =
            TargetOpener::new(LinkTarget::Device(file.path().to_path_buf()), READ, WRITE);
        let result = timeout(Duration::from_secs(2), opener.open()).await.unwrap();
        assert!(matches!(result, Err(LinkError::Open { .. })));
    }

    #[test]
    fn test_from_config_carries_baud() {
        let config = LinkConfig {
            serial_port: "/dev/ttyUSB3".to_string(),
            serial_baud: 57_600,
            ..Default::default()
        };
        let opener = TargetOpener::from_config(&config).unwrap();
        assert_eq!(opener.baud(), 57_600);
        assert_eq!(
            opener.target(),
            &LinkTarget::Device(PathBuf::from("/dev/ttyUSB3"))
        );

        let opener = TargetOpener::new(LinkTarget::Tcp("h:1".to_string()), READ, WRITE);
        assert_eq!(opener.baud(), DEFAULT_SERIAL_BAUD);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_serial_read_timeout_and_exchange() {
        let (host, device) = SerialStream::pair().unwrap();
        let mut transport = serial_transport("pty", host, READ, WRITE);
        let mut buf = [0u8; 32];
        assert_eq!(transport.read_available(&mut buf).await.unwrap(), 0);

        let mut device = device;
        transport.write_all(b"TX:ping\n").await.unwrap();
        let mut out = [0u8; 7];
        timeout(Duration::from_secs(2), device.read_exact(&mut out))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&out, b"TX:ping");
    }

    #[tokio::test]
    async fn test_open_tcp_bridge() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let opener = TargetOpener::new(LinkTarget::Tcp(addr.to_string()), READ, WRITE);

        let (transport, accepted) = tokio::join!(opener.open(), listener.accept());
        let mut transport = transport.unwrap();
        let (mut peer, _) = accepted.unwrap();

        transport.write_all(b"TX:ping\n").await.unwrap();
        let mut out = [0u8; 8];
        peer.read_exact(&mut out).await.unwrap();
        assert_eq!(&out, b"TX:ping\n");
        assert!(transport.describe().starts_with("tcp://127.0.0.1:"));
    }
}
