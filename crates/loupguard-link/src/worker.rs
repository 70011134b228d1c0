//! The link protocol worker.

use std::sync::Arc;

use async_trait::async_trait;
use loupguard_core::{BoundedQueue, Hub, HubError, LinkHealth, OutboundMessage, ReceivedMessage};
use loupguard_worker::{Worker, WorkerContext, WorkerError};
use tracing::{debug, info, warn};

use crate::config::LinkConfig;
use crate::error::LinkError;
use crate::framer::LineFramer;
use crate::protocol::{encode_payload, tx_frame};
use crate::session::LinkSession;
use crate::transport::{LinkTransport, TargetOpener, TransportOpener};
use crate::{SERIAL_WRITE_ERROR, WORKER_NAME};

const READ_CHUNK: usize = 1024;

/// Moves frames between the bridge and the hub's radio queues.
///
/// Each step reads what the bridge has sent, pushes completed records to
/// the receive queue and sends at most one queued message.
pub struct LinkWorker {
    config: LinkConfig,
    opener: Box<dyn TransportOpener>,
    transport: Option<Box<dyn LinkTransport>>,
    framer: LineFramer,
    session: LinkSession,
    tx_queue: Arc<BoundedQueue<OutboundMessage>>,
    rx_queue: Arc<BoundedQueue<ReceivedMessage>>,
    read_buf: Vec<u8>,
    last_tx: Option<f64>,
    published: Option<LinkHealth>,
}

impl LinkWorker {
    /// Build the worker and attach to the shared radio queues.
    pub fn new(
        config: LinkConfig,
        opener: impl TransportOpener + 'static,
        hub: &Hub,
    ) -> Result<Self, HubError> {
        let tx_queue = hub.link_tx_queue(config.tx_queue_size)?;
        let rx_queue = hub.link_rx_queue(config.rx_queue_size)?;
        Ok(Self {
            config,
            opener: Box::new(opener),
            transport: None,
            framer: LineFramer::new(),
            session: LinkSession::new(),
            tx_queue,
            rx_queue,
            read_buf: vec![0; READ_CHUNK],
            last_tx: None,
            published: None,
        })
    }

    /// Worker for the configured serial device or TCP bridge.
    pub fn from_config(config: LinkConfig, hub: &Hub) -> Result<Self, WorkerError> {
        let opener = TargetOpener::from_config(&config)?;
        Ok(Self::new(config, opener, hub)?)
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    pub fn health(&self) -> &LinkHealth {
        self.session.health()
    }

    pub fn is_open(&self) -> bool {
        self.transport.is_some()
    }

    async fn ensure_open(&mut self) -> Result<(), LinkError> {
        if self.transport.is_none() {
            let transport = self.opener.open().await?;
            info!("[{}] Link open on {}", WORKER_NAME, transport.describe());
            self.transport = Some(transport);
        }
        Ok(())
    }

    fn disconnect(&mut self) {
        if let Some(transport) = self.transport.take() {
            warn!("[{}] Dropping link {}", WORKER_NAME, transport.describe());
        }
        self.framer.clear();
    }

    async fn exchange(&mut self, ctx: &WorkerContext) -> Result<(), LinkError> {
        self.ensure_open().await?;
        self.receive(ctx).await?;
        self.send_one(ctx).await
    }

    async fn receive(&mut self, ctx: &WorkerContext) -> Result<(), LinkError> {
        let transport = self.transport.as_mut().ok_or(LinkError::Closed)?;
        let n = transport.read_available(&mut self.read_buf).await?;
        if n == 0 {
            return Ok(());
        }

        let now = ctx.now();
        for line in self.framer.push(&self.read_buf[..n]) {
            for record in self.session.handle_line(&line, now) {
                debug!("[{}] Received '{}'", WORKER_NAME, record.payload);
                if let Some(dropped) = self.rx_queue.push_drop_oldest(record) {
                    debug!("[{}] Receive queue full, dropped '{}'", WORKER_NAME, dropped.payload);
                }
            }
        }
        Ok(())
    }

    async fn send_one(&mut self, ctx: &WorkerContext) -> Result<(), LinkError> {
        let now = ctx.now();
        if let Some(last) = self.last_tx {
            if now - last < self.config.min_tx_interval_s {
                return Ok(());
            }
        }
        let Some(msg) = self.tx_queue.try_pop() else {
            return Ok(());
        };

        let payload = encode_payload(&msg);
        let transport = self.transport.as_mut().ok_or(LinkError::Closed)?;
        match transport.write_all(tx_frame(&payload).as_bytes()).await {
            Ok(()) => {
                self.session.record_tx(now);
                self.last_tx = Some(now);
                debug!("[{}] Sent '{}'", WORKER_NAME, payload);
                Ok(())
            }
            Err(e) => {
                self.session.record_error(SERIAL_WRITE_ERROR, now);
                warn!("[{}] Failed to send '{}': {}", WORKER_NAME, payload, e);
                Err(e)
            }
        }
    }

    fn publish_health(&mut self, hub: &Hub) -> Result<(), HubError> {
        let health = self.session.health();
        if self.published.as_ref() != Some(health) {
            hub.set_link_health(health)?;
            self.published = Some(health.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl Worker for LinkWorker {
    fn name(&self) -> &str {
        WORKER_NAME
    }

    async fn init(&mut self, ctx: &WorkerContext) -> Result<(), WorkerError> {
        info!(
            "[{}] Link target {} at {} baud, min tx interval {}s",
            WORKER_NAME,
            self.config.serial_port,
            self.config.serial_baud,
            self.config.min_tx_interval_s
        );
        self.ensure_open().await?;
        self.publish_health(ctx.hub())?;
        Ok(())
    }

    async fn step(&mut self, ctx: &WorkerContext) -> Result<(), WorkerError> {
        let result = self.exchange(ctx).await;
        if result.is_err() {
            self.disconnect();
        }
        self.publish_health(ctx.hub())?;
        Ok(result?)
    }

    async fn teardown(&mut self, _ctx: &WorkerContext) -> Result<(), WorkerError> {
        if let Some(mut transport) = self.transport.take() {
            info!("[{}] Closing link {}", WORKER_NAME, transport.describe());
            transport.close().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
