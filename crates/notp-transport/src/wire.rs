use std::io;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use notp_packets::Packet;
use tokio::task;
use tokio::time::timeout;
use tracing::debug;

use crate::config::TransportConfig;
use crate::error::{TransportError, TransportResult};
use crate::traits::{PacketReceiver, PacketSender};

/// Blocking function writing one frame to the underlying connection.
pub type WireSendFn = Arc<dyn Fn(Packet) -> io::Result<()> + Send + Sync>;
/// Blocking function reading one frame from the underlying connection.
pub type WireRecvFn = Arc<dyn Fn() -> io::Result<Packet> + Send + Sync>;

/// Adapter over arbitrary blocking I/O.
///
/// Each call runs on the blocking pool and is bounded by the configured
/// timeout, whatever the underlying I/O does. A timed-out call keeps running
/// in the background; its result is discarded. `UnexpectedEof` from the
/// receive function surfaces as [`TransportError::EndOfStream`].
pub struct WireStream {
    send_fn: WireSendFn,
    recv_fn: WireRecvFn,
    timeout: Duration,
}

impl WireStream {
    /// Stream running `send_fn` and `recv_fn` on the blocking pool under `timeout`.
    pub fn new(send_fn: WireSendFn, recv_fn: WireRecvFn, timeout: Duration) -> Self {
        Self {
            send_fn,
            recv_fn,
            timeout,
        }
    }

    /// Stream using the timeout from `config`.
    pub fn with_config(send_fn: WireSendFn, recv_fn: WireRecvFn, config: &TransportConfig) -> Self {
        Self::new(send_fn, recv_fn, config.timeout)
    }
}

fn map_io(err: io::Error) -> TransportError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        TransportError::EndOfStream
    } else {
        TransportError::Io(err)
    }
}

#[async_trait]
impl PacketSender for WireStream {
    async fn send(&self, packet: Packet) -> TransportResult<()> {
        let send_fn = Arc::clone(&self.send_fn);
        let job = task::spawn_blocking(move || send_fn(packet));
        match timeout(self.timeout, job).await {
            Ok(Ok(result)) => result.map_err(map_io),
            Ok(Err(e)) => Err(TransportError::Channel(e.to_string())),
            Err(_) => {
                debug!(timeout = ?self.timeout, "wire send timed out");
                Err(TransportError::Timeout("sending packet"))
            }
        }
    }
}

#[async_trait]
impl PacketReceiver for WireStream {
    async fn receive(&self) -> TransportResult<Option<Packet>> {
        let recv_fn = Arc::clone(&self.recv_fn);
        let job = task::spawn_blocking(move || recv_fn());
        match timeout(self.timeout, job).await {
            Ok(Ok(result)) => result.map(Some).map_err(map_io),
            Ok(Err(e)) => Err(TransportError::Channel(e.to_string())),
            Err(_) => {
                debug!(timeout = ?self.timeout, "wire receive timed out");
                Err(TransportError::Timeout("receiving packet"))
            }
        }
    }
}
