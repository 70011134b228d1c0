use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use loupguard_core::{HubConfig, ManualClock, WorkerStatus};
use loupguard_worker::{SupervisorConfig, WorkerExit, run_worker};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio_util::sync::CancellationToken;

use super::*;
use crate::transport::StreamTransport;

const READ: Duration = Duration::from_millis(20);
const WRITE: Duration = Duration::from_secs(1);

/// Hands out prepared transports in order, then fails.
#[derive(Default)]
struct ScriptedOpener {
    transports: Mutex<VecDeque<Box<dyn LinkTransport>>>,
    opens: Arc<AtomicUsize>,
}

impl ScriptedOpener {
    fn with(transports: Vec<Box<dyn LinkTransport>>) -> Self {
        Self {
            transports: Mutex::new(transports.into()),
            opens: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl TransportOpener for ScriptedOpener {
    async fn open(&self) -> Result<Box<dyn LinkTransport>, LinkError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let next = self.transports.lock().unwrap().pop_front();
        next.ok_or_else(|| LinkError::Open {
            target: "scripted".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no device"),
        })
    }
}

/// Reads nothing, rejects every write.
struct BrokenWriter;

#[async_trait]
impl LinkTransport for BrokenWriter {
    fn describe(&self) -> &str {
        "broken"
    }

    async fn read_available(&mut self, _buf: &mut [u8]) -> Result<usize, LinkError> {
        Ok(0)
    }

    async fn write_all(&mut self, _data: &[u8]) -> Result<(), LinkError> {
        Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "unplugged").into())
    }

    async fn close(&mut self) -> Result<(), LinkError> {
        Ok(())
    }
}

fn duplex_link() -> (Box<dyn LinkTransport>, DuplexStream) {
    let (host, device) = tokio::io::duplex(256);
    let (reader, writer) = tokio::io::split(host);
    let transport = StreamTransport::new("duplex", reader, writer, READ, WRITE);
    (Box::new(transport), device)
}

struct Rig {
    hub: Arc<Hub>,
    clock: Arc<ManualClock>,
    ctx: WorkerContext,
}

fn rig() -> Rig {
    let clock = Arc::new(ManualClock::new(100.0));
    let hub = Arc::new(Hub::with_clock(HubConfig::default(), clock.clone()));
    let ctx = WorkerContext::new(WORKER_NAME, hub.clone(), CancellationToken::new());
    Rig { hub, clock, ctx }
}

fn worker(rig: &Rig, transports: Vec<Box<dyn LinkTransport>>) -> LinkWorker {
    LinkWorker::new(LinkConfig::default(), ScriptedOpener::with(transports), &rig.hub).unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_receives_record_with_link_quality() {
    let rig = rig();
    let (transport, mut device) = duplex_link();
    let mut worker = worker(&rig, vec![transport]);

    worker.init(&rig.ctx).await.unwrap();
    assert_eq!(rig.hub.link_health(), Some(LinkHealth::default()));

    device
        .write_all(b"RX:hello\r\nRSSI:-70 dBm, SNR:8/4 dB\r\n")
        .await
        .unwrap();
    worker.step(&rig.ctx).await.unwrap();

    let rx = rig.hub.link_rx_queue(10).unwrap();
    let record = rx.try_pop().unwrap();
    assert_eq!(record.payload, "hello");
    assert_eq!(record.rssi_dbm, Some(-70.0));
    assert_eq!(record.snr_db, Some(2.0));
    assert_eq!(record.timestamp, 100.0);

    let health = rig.hub.link_health().unwrap();
    assert_eq!(health.rx_count, 1);
    assert_eq!(health.last_rssi, Some(-70.0));
    assert_eq!(health.last_rx_payload.as_deref(), Some("hello"));
}

#[tokio::test(start_paused = true)]
async fn test_back_to_back_rx_flushes_degraded() {
    let rig = rig();
    let (transport, mut device) = duplex_link();
    let mut worker = worker(&rig, vec![transport]);
    worker.init(&rig.ctx).await.unwrap();

    device.write_all(b"RX:first\r\nRX:second\r\n").await.unwrap();
    worker.step(&rig.ctx).await.unwrap();

    let rx = rig.hub.link_rx_queue(10).unwrap();
    let flushed = rx.try_pop().unwrap();
    assert_eq!(flushed.payload, "first");
    assert!(flushed.is_degraded());
    assert!(rx.is_empty());
    assert_eq!(rig.hub.link_health().unwrap().rx_count, 2);
}

#[tokio::test(start_paused = true)]
async fn test_unmatched_rssi_is_discarded() {
    let rig = rig();
    let (transport, mut device) = duplex_link();
    let mut worker = worker(&rig, vec![transport]);
    worker.init(&rig.ctx).await.unwrap();

    device.write_all(b"RSSI:-88 dBm, SNR:-4/4 dB\r\n").await.unwrap();
    worker.step(&rig.ctx).await.unwrap();

    assert!(rig.hub.link_rx_queue(10).unwrap().is_empty());
    let health = rig.hub.link_health().unwrap();
    assert_eq!(health.last_rssi, Some(-88.0));
    assert_eq!(health.last_snr, Some(-1.0));
}

#[tokio::test(start_paused = true)]
async fn test_sends_one_sanitised_frame() {
    let rig = rig();
    let (transport, mut device) = duplex_link();
    let mut worker = worker(&rig, vec![transport]);
    worker.init(&rig.ctx).await.unwrap();

    let tx = rig.hub.link_tx_queue(10).unwrap();
    tx.try_push("line1\nline2".into()).unwrap();
    worker.step(&rig.ctx).await.unwrap();

    let mut frame = vec![0u8; "TX:line1 line2\n".len()];
    device.read_exact(&mut frame).await.unwrap();
    assert_eq!(frame, b"TX:line1 line2\n");

    let health = rig.hub.link_health().unwrap();
    assert_eq!(health.tx_count, 1);
    assert_eq!(health.last_tx_ts, Some(100.0));
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_holds_second_message() {
    let rig = rig();
    let (transport, mut device) = duplex_link();
    let mut worker = worker(&rig, vec![transport]);
    worker.init(&rig.ctx).await.unwrap();

    let tx = rig.hub.link_tx_queue(10).unwrap();
    tx.try_push("a".into()).unwrap();
    tx.try_push("b".into()).unwrap();

    worker.step(&rig.ctx).await.unwrap();
    worker.step(&rig.ctx).await.unwrap();
    assert_eq!(tx.len(), 1);
    assert_eq!(worker.health().tx_count, 1);

    rig.clock.advance_secs(0.1);
    worker.step(&rig.ctx).await.unwrap();
    assert!(tx.is_empty());
    assert_eq!(worker.health().tx_count, 2);

    let mut frames = [0u8; 10];
    device.read_exact(&mut frames).await.unwrap();
    assert_eq!(&frames, b"TX:a\nTX:b\n");
}

#[tokio::test(start_paused = true)]
async fn test_write_failure_counts_and_fails_step() {
    let rig = rig();
    let mut worker = worker(&rig, vec![Box::new(BrokenWriter)]);
    worker.init(&rig.ctx).await.unwrap();

    let tx = rig.hub.link_tx_queue(10).unwrap();
    tx.try_push("LOUP_ANGLE:10.0".into()).unwrap();

    let result = worker.step(&rig.ctx).await;
    assert!(matches!(result, Err(WorkerError::Transport(_))));
    assert!(tx.is_empty());
    assert!(!worker.is_open());

    let health = rig.hub.link_health().unwrap();
    assert_eq!(health.error_count, 1);
    assert_eq!(health.tx_count, 0);
    assert_eq!(health.last_error_type.as_deref(), Some(SERIAL_WRITE_ERROR));
    assert_eq!(health.last_error_ts, Some(100.0));
}

#[tokio::test(start_paused = true)]
async fn test_reopens_after_peer_closes() {
    let rig = rig();
    let (first, first_device) = duplex_link();
    let (second, mut second_device) = duplex_link();
    let opener = ScriptedOpener::with(vec![first, second]);
    let opens = opener.opens.clone();
    let mut worker = LinkWorker::new(LinkConfig::default(), opener, &rig.hub).unwrap();

    worker.init(&rig.ctx).await.unwrap();
    drop(first_device);

    assert!(worker.step(&rig.ctx).await.is_err());
    assert!(!worker.is_open());

    second_device.write_all(b"TXDONE\r\n").await.unwrap();
    worker.step(&rig.ctx).await.unwrap();
    assert!(worker.is_open());
    assert_eq!(opens.load(Ordering::SeqCst), 2);
    assert_eq!(
        rig.hub.link_health().unwrap().last_status_line.as_deref(),
        Some("TXDONE")
    );
}

#[tokio::test(start_paused = true)]
async fn test_open_failure_halts_worker() {
    let rig = rig();
    let mut worker = worker(&rig, Vec::new());

    let exit = run_worker(&mut worker, &rig.ctx, &SupervisorConfig::default()).await;
    assert_eq!(exit, WorkerExit::Halted);

    let health = rig.hub.health(WORKER_NAME).unwrap();
    assert_eq!(health.status, WorkerStatus::Halted);
    assert_eq!(health.fail_count, 1);
}

#[tokio::test(start_paused = true)]
async fn test_teardown_closes_transport() {
    let rig = rig();
    let (transport, mut device) = duplex_link();
    let mut worker = worker(&rig, vec![transport]);
    worker.init(&rig.ctx).await.unwrap();

    worker.teardown(&rig.ctx).await.unwrap();
    assert!(!worker.is_open());

    let mut buf = [0u8; 4];
    assert_eq!(device.read(&mut buf).await.unwrap(), 0);
}
