use crate::codec::{encode_byte_array, PACKET_NULL_BYTE};
use crate::error::{PacketError, PacketResult};
use crate::packet::{Packet, Packetable};
use crate::protocol::ProtocolPacket;

/// Width of every numeric header field.
pub(crate) const ID_SIZE: usize = 8;

/// Append `[stream?][type][size] 0xFF payload` to `buf`.
fn write_data_packet(buf: &mut Vec<u8>, packet_type: u64, stream: Option<u64>, payload: &[u8]) {
    if let Some(stream) = stream {
        buf.extend_from_slice(&stream.to_be_bytes());
    }
    buf.extend_from_slice(&packet_type.to_be_bytes());
    buf.extend_from_slice(&(payload.len() as u64).to_be_bytes());
    buf.push(PACKET_NULL_BYTE);
    buf.extend_from_slice(payload);
}

/// Builds one physical frame: a protocol envelope followed by data packets.
///
/// The first data packet carries the stream count in its header; the count
/// is rewritten in place every time another packet is appended.
#[derive(Debug, Default)]
pub struct PacketWriter {
    data: Vec<u8>,
    protocol_end: Option<usize>,
    stream_size: u64,
}

impl PacketWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Write the envelope. Must be the first thing written, exactly once.
    pub fn write_protocol(&mut self, protocol: &ProtocolPacket) -> PacketResult<()> {
        if self.protocol_end.is_some() || !self.data.is_empty() {
            return Err(PacketError::ProtocolAlreadyWritten);
        }
        let payload = protocol.serialize()?;
        write_data_packet(&mut self.data, protocol.packet_type(), None, &payload);
        self.protocol_end = Some(self.data.len());
        Ok(())
    }

    /// Append a data packet; its payload is base64-encoded on the wire.
    pub fn append_data_packet(&mut self, packet: &dyn Packetable) -> PacketResult<()> {
        let start = self.protocol_end.ok_or(PacketError::MissingProtocolPacket)?;
        let payload = encode_byte_array(&packet.serialize()?);
        if self.stream_size == 0 {
            write_data_packet(&mut self.data, packet.packet_type(), Some(1), &payload);
        } else {
            write_data_packet(&mut self.data, packet.packet_type(), None, &payload);
            let count = (self.stream_size + 1).to_be_bytes();
            self.data[start..start + ID_SIZE].copy_from_slice(&count);
        }
        self.stream_size += 1;
        Ok(())
    }

    /// Number of data packets appended so far.
    pub fn stream_size(&self) -> u64 {
        self.stream_size
    }

    /// Consume the writer and return the frame.
    pub fn finish(self) -> Packet {
        Packet::new(self.data)
    }
}
