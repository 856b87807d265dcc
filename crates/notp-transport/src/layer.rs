use std::sync::Arc;

use notp_packets::{
    DataPacketState, Packet, PacketReader, PacketWriter, Packetable, ProtocolPacket,
    PROTOCOL_VERSION,
};
use tracing::debug;

use crate::compression::{compress, decompress};
use crate::config::TransportConfig;
use crate::error::{TransportError, TransportResult};
use crate::inspector::PacketInspector;
use crate::traits::{PacketReceiver, PacketSender};

/// Frames, compresses and ships packet lists over a sender/receiver pair.
#[derive(Clone)]
pub struct TransportLayer {
    sender: Arc<dyn PacketSender>,
    receiver: Arc<dyn PacketReceiver>,
    inspector: Option<PacketInspector>,
    compression_level: i32,
}

impl TransportLayer {
    /// Transport with default settings.
    pub fn new(
        sender: Arc<dyn PacketSender>,
        receiver: Arc<dyn PacketReceiver>,
        inspector: Option<PacketInspector>,
    ) -> Self {
        Self::with_config(sender, receiver, inspector, &TransportConfig::default())
    }

    /// Transport with explicit settings.
    pub fn with_config(
        sender: Arc<dyn PacketSender>,
        receiver: Arc<dyn PacketReceiver>,
        inspector: Option<PacketInspector>,
        config: &TransportConfig,
    ) -> Self {
        Self {
            sender,
            receiver,
            inspector,
            compression_level: config.compression_level,
        }
    }

    /// Send every packet in `packets` as one frame.
    pub async fn transmit_packet(&self, packets: &[Box<dyn Packetable>]) -> TransportResult<()> {
        if packets.is_empty() {
            return Err(TransportError::EmptyTransmission);
        }
        let mut writer = PacketWriter::new();
        writer.write_protocol(&ProtocolPacket::default())?;
        for packet in packets {
            writer.append_data_packet(packet.as_ref())?;
        }
        let frame = writer.finish();
        if let Some(inspector) = &self.inspector {
            inspector.inspect_sent(&frame);
        }
        let compressed = compress(&frame.data, self.compression_level)?;
        debug!(
            packets = packets.len(),
            frame = frame.len(),
            compressed = compressed.len(),
            "transmitting frame"
        );
        self.sender.send(Packet::new(compressed)).await
    }

    /// Receive one frame and return its data packets in order.
    pub async fn receive_packet(&self) -> TransportResult<Vec<Packet>> {
        let compressed = self
            .receiver
            .receive()
            .await?
            .ok_or(TransportError::NilPacket)?;
        let frame = Packet::new(decompress(&compressed.data)?);
        if let Some(inspector) = &self.inspector {
            inspector.inspect_received(&frame);
        }

        let reader = PacketReader::new(&frame);
        let protocol = reader.read_protocol()?;
        if protocol.version != PROTOCOL_VERSION {
            return Err(TransportError::UnsupportedVersion {
                local: PROTOCOL_VERSION,
                remote: protocol.version,
            });
        }

        let mut packets = Vec::new();
        let mut state: Option<DataPacketState> = None;
        loop {
            let (data, next) = reader.read_next_data_packet(state.as_ref())?;
            packets.push(Packet::new(data));
            if next.is_complete() {
                break;
            }
            state = Some(next);
        }
        debug!(
            packets = packets.len(),
            compressed = compressed.len(),
            "received frame"
        );
        Ok(packets)
    }
}
