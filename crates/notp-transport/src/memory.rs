use std::time::Duration;

use async_trait::async_trait;
use notp_packets::Packet;
use tokio::sync::{mpsc, Mutex};
use tokio::time::timeout;

use crate::config::TransportConfig;
use crate::error::{TransportError, TransportResult};
use crate::traits::{PacketReceiver, PacketSender};

/// Bounded in-process queue of frames.
///
/// Frames sent on a stream are received from the same stream, so two peers
/// share a pair of streams: each sends on the other's inbox and receives on
/// its own.
pub struct InMemoryStream {
    tx: mpsc::Sender<Packet>,
    rx: Mutex<mpsc::Receiver<Packet>>,
    timeout: Duration,
}

impl InMemoryStream {
    /// Stream whose sends and receives fail after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self::with_config(&TransportConfig::with_timeout(timeout))
    }

    /// Stream using the timeout and channel capacity from `config`.
    pub fn with_config(config: &TransportConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
        Self {
            tx,
            rx: Mutex::new(rx),
            timeout: config.timeout,
        }
    }

    /// Timeout applied to every send and receive.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl PacketSender for InMemoryStream {
    async fn send(&self, packet: Packet) -> TransportResult<()> {
        match timeout(self.timeout, self.tx.send(packet)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(TransportError::Channel(e.to_string())),
            Err(_) => Err(TransportError::Timeout("sending packet")),
        }
    }
}

#[async_trait]
impl PacketReceiver for InMemoryStream {
    async fn receive(&self) -> TransportResult<Option<Packet>> {
        let mut rx = self.rx.lock().await;
        match timeout(self.timeout, rx.recv()).await {
            Ok(Some(packet)) => Ok(Some(packet)),
            Ok(None) => Err(TransportError::Channel("stream closed".into())),
            Err(_) => Err(TransportError::Timeout("receiving packet")),
        }
    }
}
