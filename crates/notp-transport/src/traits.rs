use async_trait::async_trait;
use notp_packets::Packet;

use crate::error::TransportResult;

/// Delivers one physical frame to the peer.
#[async_trait]
pub trait PacketSender: Send + Sync {
    async fn send(&self, packet: Packet) -> TransportResult<()>;
}

/// Produces the next physical frame from the peer.
///
/// `Ok(None)` means the backend produced no packet at all; the transport
/// layer treats that as an error.
#[async_trait]
pub trait PacketReceiver: Send + Sync {
    async fn receive(&self) -> TransportResult<Option<Packet>>;
}
